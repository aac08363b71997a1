//! Image creation flow

use super::{CreationReport, CreatorOptions, artifact_tags, await_ready, eligible_name, image_name};
use crate::aws::{Ec2Operations, ImageRequest};
use crate::error::LifecycleError;
use anyhow::Result;
use chrono::NaiveDate;
use ec2_backup_common::retention::delete_on;
use ec2_backup_common::{ArtifactKind, Instance};
use tracing::{debug, error, info, warn};

/// Creates one image per opted-in instance, without rebooting it
pub struct ImageCreator<'a, E> {
    ec2: &'a E,
    options: CreatorOptions,
}

impl<'a, E: Ec2Operations> ImageCreator<'a, E> {
    pub fn new(ec2: &'a E, options: CreatorOptions) -> Self {
        Self { ec2, options }
    }

    /// Back up every opted-in instance.
    ///
    /// Only a failed instance listing is returned as an error; everything
    /// per-instance is logged and counted in the report.
    pub async fn run(&self, today: NaiveDate) -> Result<CreationReport> {
        let instances = self.ec2.list_backup_instances().await?;
        info!(count = instances.len(), "Found instances to image");

        let mut report = CreationReport {
            instances_found: instances.len(),
            ..Default::default()
        };

        for instance in &instances {
            self.backup_instance(instance, today, &mut report).await;
        }

        report.log_buckets(ArtifactKind::Image);
        Ok(report)
    }

    async fn backup_instance(
        &self,
        instance: &Instance,
        today: NaiveDate,
        report: &mut CreationReport,
    ) {
        let instance_id = instance.instance_id.as_str();
        let name = match eligible_name(instance) {
            Ok(name) => name,
            Err(e @ LifecycleError::MissingNameTag { .. }) => {
                warn!(instance_id = %instance_id, "{e}");
                report.skipped += 1;
                return;
            }
            Err(e) => {
                info!(instance_id = %instance_id, reason = %e, "Skipping instance");
                report.skipped += 1;
                return;
            }
        };

        let (retention_days, source) = self
            .options
            .retention
            .resolve_with_source(instance.tag_index());
        debug!(instance_id = %instance_id, retention_days, source = ?source, "Resolved retention");

        let image_name = image_name(name, today);
        let delete_on = delete_on(today, retention_days);

        if self.options.dry_run {
            info!(
                instance_id = %instance_id,
                image_name = %image_name,
                delete_on = %delete_on,
                "[DRY RUN] Would create image"
            );
            report.skipped += 1;
            return;
        }

        let request = ImageRequest::new(
            instance_id,
            &image_name,
            format!("Automated backup of instance {instance_id}"),
        );
        let image_id = match self.ec2.create_image(request).await {
            Ok(id) => id,
            Err(e) => {
                warn!(instance_id = %instance_id, error = ?e, "Failed to create image");
                report.failed += 1;
                return;
            }
        };

        if let Err(e) = self
            .ec2
            .tag_resource(&image_id, artifact_tags(&image_name, delete_on))
            .await
        {
            warn!(
                instance_id = %instance_id,
                image_id = %image_id,
                error = ?e,
                "Image created but could not be tagged"
            );
            report.failed += 1;
            self.release_untagged(instance_id, &image_id).await;
            return;
        }

        report.record_created(retention_days, &image_id);
        info!(
            instance_id = %instance_id,
            image_id = %image_id,
            image_name = %image_name,
            delete_on = %delete_on,
            "Created image"
        );

        await_ready(
            self.ec2,
            &image_id,
            ArtifactKind::Image,
            self.options.wait,
            report,
        )
        .await;
    }

    /// Deregister an image whose tags never landed.
    ///
    /// Without `DeleteOn` no sweep will ever expire it.
    async fn release_untagged(&self, instance_id: &str, image_id: &str) {
        match self.ec2.deregister_image(image_id).await {
            Ok(()) => info!(
                instance_id = %instance_id,
                image_id = %image_id,
                "Deregistered untagged image"
            ),
            Err(e) => error!(
                instance_id = %instance_id,
                image_id = %image_id,
                error = ?e,
                "Untagged image left registered and will never be swept; deregister it manually"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::MockEc2Operations;
    use crate::wait::{WaitOutcome, WaitPolicy};
    use ec2_backup_common::{ResourceTag, RetentionPolicy};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn instance(id: &str, tags: &[(&str, &str)]) -> Instance {
        let mut all = vec![ResourceTag::new("Backup", "Y")];
        all.extend(tags.iter().map(|(k, v)| ResourceTag::new(*k, *v)));
        Instance {
            instance_id: id.to_string(),
            state: "running".to_string(),
            tags: all,
            volumes: vec![],
        }
    }

    fn options() -> CreatorOptions {
        CreatorOptions {
            retention: RetentionPolicy::default(),
            wait: WaitPolicy::new(1, 2),
            dry_run: false,
        }
    }

    #[tokio::test]
    async fn creates_tags_and_waits() {
        let mut ec2 = MockEc2Operations::new();
        ec2.expect_list_backup_instances()
            .returning(|| Ok(vec![instance("i-1", &[("Name", "web1")])]));
        ec2.expect_create_image()
            .withf(|req| {
                req.instance_id == "i-1" && req.name == "web1-2024-01-01" && req.no_reboot
            })
            .times(1)
            .returning(|_| Ok("ami-1".to_string()));
        ec2.expect_tag_resource()
            .withf(|id, tags| {
                id == "ami-1"
                    && tags
                        == &vec![
                            ResourceTag::new("Name", "web1-2024-01-01"),
                            ResourceTag::new("DeleteOn", "2024-01-15"),
                        ]
            })
            .times(1)
            .returning(|_, _| Ok(()));
        ec2.expect_wait_until_ready()
            .withf(|ids, kind, policy| {
                ids == &vec!["ami-1".to_string()]
                    && *kind == ArtifactKind::Image
                    && *policy == WaitPolicy::new(1, 2)
            })
            .times(1)
            .returning(|_, _, _| Ok(WaitOutcome::Ready));

        let report = ImageCreator::new(&ec2, options()).run(today()).await.unwrap();
        assert_eq!(report.instances_found, 1);
        assert_eq!(report.created, 1);
        assert_eq!(report.by_retention[&14], vec!["ami-1"]);
    }

    #[tokio::test]
    async fn missing_name_is_skipped_and_others_continue() {
        let mut ec2 = MockEc2Operations::new();
        ec2.expect_list_backup_instances().returning(|| {
            Ok(vec![
                instance("i-1", &[]),
                instance("i-2", &[("Name", "db"), ("Retention", "5")]),
            ])
        });
        ec2.expect_create_image()
            .withf(|req| req.instance_id == "i-2")
            .times(1)
            .returning(|_| Ok("ami-2".to_string()));
        ec2.expect_tag_resource()
            .withf(|_, tags| tags.contains(&ResourceTag::new("DeleteOn", "2024-01-06")))
            .times(1)
            .returning(|_, _| Ok(()));
        ec2.expect_wait_until_ready()
            .returning(|_, _, _| Ok(WaitOutcome::Ready));

        let report = ImageCreator::new(&ec2, options()).run(today()).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.created, 1);
        assert_eq!(report.by_retention[&5], vec!["ami-2"]);
    }

    #[tokio::test]
    async fn timeout_is_not_fatal() {
        let mut ec2 = MockEc2Operations::new();
        ec2.expect_list_backup_instances().returning(|| {
            Ok(vec![
                instance("i-1", &[("Name", "web1")]),
                instance("i-2", &[("Name", "web2")]),
            ])
        });
        ec2.expect_create_image()
            .times(2)
            .returning(|req| Ok(format!("ami-{}", req.name)));
        ec2.expect_tag_resource().times(2).returning(|_, _| Ok(()));
        ec2.expect_wait_until_ready()
            .times(2)
            .returning(|_, _, _| Ok(WaitOutcome::TimedOut { attempts: 2 }));

        let report = ImageCreator::new(&ec2, options()).run(today()).await.unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(report.timed_out, 2);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn create_failure_is_isolated() {
        let mut ec2 = MockEc2Operations::new();
        ec2.expect_list_backup_instances().returning(|| {
            Ok(vec![
                instance("i-1", &[("Name", "web1")]),
                instance("i-2", &[("Name", "web2")]),
            ])
        });
        ec2.expect_create_image().returning(|req| {
            if req.instance_id == "i-1" {
                Err(anyhow::anyhow!("UnauthorizedOperation"))
            } else {
                Ok("ami-2".to_string())
            }
        });
        ec2.expect_tag_resource().times(1).returning(|_, _| Ok(()));
        ec2.expect_wait_until_ready()
            .times(1)
            .returning(|_, _, _| Ok(WaitOutcome::Ready));

        let report = ImageCreator::new(&ec2, options()).run(today()).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.created, 1);
    }

    #[tokio::test]
    async fn tag_failure_releases_image_and_continues() {
        let mut ec2 = MockEc2Operations::new();
        ec2.expect_list_backup_instances().returning(|| {
            Ok(vec![
                instance("i-1", &[("Name", "web1")]),
                instance("i-2", &[("Name", "web2")]),
            ])
        });
        ec2.expect_create_image()
            .times(2)
            .returning(|req| Ok(format!("ami-{}", req.instance_id)));
        ec2.expect_tag_resource().returning(|id, _| {
            if id == "ami-i-1" {
                Err(anyhow::anyhow!("UnauthorizedOperation: CreateTags denied"))
            } else {
                Ok(())
            }
        });
        ec2.expect_deregister_image()
            .withf(|id| id == "ami-i-1")
            .times(1)
            .returning(|_| Ok(()));
        ec2.expect_wait_until_ready()
            .withf(|ids, _, _| ids == &vec!["ami-i-2".to_string()])
            .times(1)
            .returning(|_, _, _| Ok(WaitOutcome::Ready));

        let report = ImageCreator::new(&ec2, options()).run(today()).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.created, 1);
        assert_eq!(report.by_retention[&14], vec!["ami-i-2"]);
    }

    #[tokio::test]
    async fn failed_release_of_untagged_image_is_not_fatal() {
        let mut ec2 = MockEc2Operations::new();
        ec2.expect_list_backup_instances()
            .returning(|| Ok(vec![instance("i-1", &[("Name", "web1")])]));
        ec2.expect_create_image()
            .returning(|_| Ok("ami-1".to_string()));
        ec2.expect_tag_resource()
            .returning(|_, _| Err(anyhow::anyhow!("RequestLimitExceeded")));
        ec2.expect_deregister_image()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("InvalidAMIID.Unavailable")));
        ec2.expect_wait_until_ready().never();

        let report = ImageCreator::new(&ec2, options()).run(today()).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.created, 0);
    }

    #[tokio::test]
    async fn readiness_error_is_counted_and_pass_continues() {
        let mut ec2 = MockEc2Operations::new();
        ec2.expect_list_backup_instances().returning(|| {
            Ok(vec![
                instance("i-1", &[("Name", "web1")]),
                instance("i-2", &[("Name", "web2")]),
            ])
        });
        ec2.expect_create_image()
            .times(2)
            .returning(|req| Ok(format!("ami-{}", req.instance_id)));
        ec2.expect_tag_resource().times(2).returning(|_, _| Ok(()));
        ec2.expect_wait_until_ready().times(2).returning(|ids, _, _| {
            if ids[0] == "ami-i-1" {
                Err(anyhow::anyhow!("Image ami-i-1 entered state failed"))
            } else {
                Ok(WaitOutcome::Ready)
            }
        });

        let report = ImageCreator::new(&ec2, options()).run(today()).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.created, 2);
        assert_eq!(report.timed_out, 0);
    }

    #[tokio::test]
    async fn dry_run_makes_no_calls() {
        let mut ec2 = MockEc2Operations::new();
        ec2.expect_list_backup_instances()
            .returning(|| Ok(vec![instance("i-1", &[("Name", "web1")])]));
        ec2.expect_create_image().never();
        ec2.expect_tag_resource().never();
        ec2.expect_wait_until_ready().never();

        let opts = CreatorOptions {
            dry_run: true,
            ..options()
        };
        let report = ImageCreator::new(&ec2, opts).run(today()).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.created, 0);
    }

    #[tokio::test]
    async fn listing_failure_propagates() {
        let mut ec2 = MockEc2Operations::new();
        ec2.expect_list_backup_instances()
            .returning(|| Err(anyhow::anyhow!("DescribeInstances failed")));

        let result = ImageCreator::new(&ec2, options()).run(today()).await;
        assert!(result.is_err());
    }
}
