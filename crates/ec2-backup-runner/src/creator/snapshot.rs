//! Snapshot creation flow

use super::{
    CreationReport, CreatorOptions, artifact_tags, await_ready, eligible_name,
    snapshot_description,
};
use crate::aws::{Ec2Operations, SnapshotRequest};
use crate::error::LifecycleError;
use anyhow::Result;
use chrono::NaiveDate;
use ec2_backup_common::retention::delete_on;
use ec2_backup_common::{ArtifactKind, Instance};
use tracing::{debug, info, warn};

/// Creates one snapshot per persistent volume of each opted-in instance
pub struct SnapshotCreator<'a, E> {
    ec2: &'a E,
    options: CreatorOptions,
}

impl<'a, E: Ec2Operations> SnapshotCreator<'a, E> {
    pub fn new(ec2: &'a E, options: CreatorOptions) -> Self {
        Self { ec2, options }
    }

    /// Snapshot every persistent volume of every opted-in instance.
    ///
    /// Only a failed instance listing is returned as an error.
    pub async fn run(&self, today: NaiveDate) -> Result<CreationReport> {
        let instances = self.ec2.list_backup_instances().await?;
        info!(count = instances.len(), "Found instances to snapshot");

        let mut report = CreationReport {
            instances_found: instances.len(),
            ..Default::default()
        };

        for instance in &instances {
            self.backup_instance(instance, today, &mut report).await;
        }

        report.log_buckets(ArtifactKind::Snapshot);
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

        let description = snapshot_description(name, today);
        let (retention_days, source) = self
            .options
            .retention
            .resolve_with_source(instance.tag_index());
        let delete_on = delete_on(today, retention_days);
        debug!(instance_id = %instance_id, retention_days, source = ?source, "Resolved retention");

        let volume_ids: Vec<&str> = instance.persistent_volume_ids().collect();
        if volume_ids.is_empty() {
            info!(instance_id = %instance_id, "Skipping instance with no persistent volumes");
            report.skipped += 1;
            return;
        }

        for volume_id in volume_ids {
            if self.options.dry_run {
                info!(
                    instance_id = %instance_id,
                    volume_id = %volume_id,
                    description = %description,
                    delete_on = %delete_on,
                    "[DRY RUN] Would create snapshot"
                );
                report.skipped += 1;
                continue;
            }

            let request = SnapshotRequest {
                volume_id: volume_id.to_string(),
                description: description.clone(),
                tags: artifact_tags(&description, delete_on),
            };
            let snapshot_id = match self.ec2.create_snapshot(request).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(
                        instance_id = %instance_id,
                        volume_id = %volume_id,
                        error = ?e,
                        "Failed to create snapshot"
                    );
                    report.failed += 1;
                    continue;
                }
            };

            report.record_created(retention_days, &snapshot_id);
            info!(
                instance_id = %instance_id,
                volume_id = %volume_id,
                snapshot_id = %snapshot_id,
                delete_on = %delete_on,
                "Created snapshot"
            );

            await_ready(
                self.ec2,
                &snapshot_id,
                ArtifactKind::Snapshot,
                self.options.wait,
                report,
            )
            .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::MockEc2Operations;
    use crate::wait::{WaitOutcome, WaitPolicy};
    use ec2_backup_common::{AttachedVolume, ResourceTag, RetentionPolicy};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn volume(device: &str, id: Option<&str>) -> AttachedVolume {
        AttachedVolume {
            device_name: Some(device.to_string()),
            volume_id: id.map(str::to_string),
        }
    }

    fn web1() -> Instance {
        Instance {
            instance_id: "i-1".to_string(),
            state: "running".to_string(),
            tags: vec![
                ResourceTag::new("Backup", "Y"),
                ResourceTag::new("Name", "web1"),
                ResourceTag::new("Retention", "7"),
            ],
            volumes: vec![
                volume("/dev/xvda", Some("vol-root")),
                volume("/dev/sdb", None),
                volume("/dev/sdc", Some("vol-data")),
            ],
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
    async fn snapshots_each_persistent_volume_with_tags() {
        let mut ec2 = MockEc2Operations::new();
        ec2.expect_list_backup_instances()
            .returning(|| Ok(vec![web1()]));
        ec2.expect_create_snapshot()
            .withf(|req| {
                req.description == "web1-20240101"
                    && req.tags
                        == vec![
                            ResourceTag::new("Name", "web1-20240101"),
                            ResourceTag::new("DeleteOn", "2024-01-08"),
                        ]
            })
            .times(2)
            .returning(|req| Ok(format!("snap-{}", req.volume_id)));
        ec2.expect_tag_resource().never();
        ec2.expect_wait_until_ready()
            .withf(|_, kind, _| *kind == ArtifactKind::Snapshot)
            .times(2)
            .returning(|_, _, _| Ok(WaitOutcome::Ready));

        let report = SnapshotCreator::new(&ec2, options())
            .run(today())
            .await
            .unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(
            report.by_retention[&7],
            vec!["snap-vol-root", "snap-vol-data"]
        );
    }

    #[tokio::test]
    async fn volume_failure_does_not_stop_siblings() {
        let mut ec2 = MockEc2Operations::new();
        ec2.expect_list_backup_instances()
            .returning(|| Ok(vec![web1()]));
        ec2.expect_create_snapshot().returning(|req| {
            if req.volume_id == "vol-root" {
                Err(anyhow::anyhow!("IncorrectState"))
            } else {
                Ok("snap-2".to_string())
            }
        });
        ec2.expect_wait_until_ready()
            .times(1)
            .returning(|_, _, _| Ok(WaitOutcome::TimedOut { attempts: 2 }));

        let report = SnapshotCreator::new(&ec2, options())
            .run(today())
            .await
            .unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.created, 1);
        assert_eq!(report.timed_out, 1);
    }

    #[tokio::test]
    async fn dry_run_counts_volumes_as_skipped() {
        let mut ec2 = MockEc2Operations::new();
        ec2.expect_list_backup_instances()
            .returning(|| Ok(vec![web1()]));
        ec2.expect_create_snapshot().never();
        ec2.expect_wait_until_ready().never();

        let opts = CreatorOptions {
            dry_run: true,
            ..options()
        };
        let report = SnapshotCreator::new(&ec2, opts).run(today()).await.unwrap();
        assert_eq!(report.skipped, 2);
        assert_eq!(report.created, 0);
    }

    #[tokio::test]
    async fn instance_without_persistent_volumes_is_skipped() {
        let mut diskless = web1();
        diskless.instance_id = "i-2".to_string();
        diskless.volumes = vec![volume("/dev/sdb", None)];

        let mut ec2 = MockEc2Operations::new();
        ec2.expect_list_backup_instances()
            .returning(move || Ok(vec![diskless.clone(), web1()]));
        ec2.expect_create_snapshot()
            .times(2)
            .returning(|req| Ok(format!("snap-{}", req.volume_id)));
        ec2.expect_wait_until_ready()
            .returning(|_, _, _| Ok(WaitOutcome::Ready));

        let report = SnapshotCreator::new(&ec2, options())
            .run(today())
            .await
            .unwrap();
        assert_eq!(report.instances_found, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.created, 2);
    }
}
