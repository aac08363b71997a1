//! Artifact creation for opted-in instances
//!
//! Two flows share the same shape: list eligible instances, resolve each
//! instance's retention, create the artifact, make sure `Name` and
//! `DeleteOn` are attached, then wait a bounded time for it to be ready.
//! A failure on one instance or volume never stops the others.

mod image;
mod snapshot;

pub use image::ImageCreator;
pub use snapshot::SnapshotCreator;

use crate::aws::Ec2Operations;
use crate::error::LifecycleError;
use crate::wait::{WaitOutcome, WaitPolicy};
use chrono::NaiveDate;
use ec2_backup_common::tags::{TAG_DELETE_ON, TAG_NAME, format_delete_on};
use ec2_backup_common::{ArtifactKind, Instance, ResourceTag, RetentionPolicy};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Settings shared by both creation flows
#[derive(Debug, Clone, Copy, Default)]
pub struct CreatorOptions {
    pub retention: RetentionPolicy,
    pub wait: WaitPolicy,
    pub dry_run: bool,
}

/// Summary of a creation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreationReport {
    /// Instances returned by the opt-in listing
    pub instances_found: usize,
    /// Artifacts created and tagged
    pub created: usize,
    /// Instances or volumes skipped (ineligible or dry run)
    pub skipped: usize,
    /// Create, tag or readiness failures
    pub failed: usize,
    /// Artifacts created but not confirmed ready within the wait policy
    pub timed_out: usize,
    /// Artifact ids grouped by the retention they were created with
    pub by_retention: BTreeMap<u32, Vec<String>>,
}

impl CreationReport {
    fn record_created(&mut self, retention_days: u32, artifact_id: &str) {
        self.created += 1;
        self.by_retention
            .entry(retention_days)
            .or_default()
            .push(artifact_id.to_string());
    }

    fn log_buckets(&self, kind: ArtifactKind) {
        for (days, ids) in &self.by_retention {
            info!(
                kind = %kind,
                retention_days = days,
                ids = %ids.join(","),
                "Created artifacts by retention"
            );
        }
    }
}

/// Image name: `<Name>-YYYY-MM-DD`
pub fn image_name(instance_name: &str, today: NaiveDate) -> String {
    format!("{}-{}", instance_name, today.format("%Y-%m-%d"))
}

/// Snapshot description, also used as its `Name`: `<Name>-YYYYMMDD`
pub fn snapshot_description(instance_name: &str, today: NaiveDate) -> String {
    format!("{}-{}", instance_name, today.format("%Y%m%d"))
}

/// The two tags every artifact carries
pub fn artifact_tags(name: &str, delete_on: NaiveDate) -> Vec<ResourceTag> {
    vec![
        ResourceTag::new(TAG_NAME, name),
        ResourceTag::new(TAG_DELETE_ON, format_delete_on(delete_on)),
    ]
}

/// Check that an instance can be backed up, returning its `Name`.
///
/// The listing already filters on state and opt-in; this guards against
/// instances that changed in between or a gateway that filters loosely.
pub(crate) fn eligible_name(instance: &Instance) -> Result<&str, LifecycleError> {
    if !instance.is_running() {
        return Err(LifecycleError::NotEligible {
            instance_id: instance.instance_id.clone(),
            reason: format!("state is {}", instance.state),
        });
    }
    if !instance.wants_backup() {
        return Err(LifecycleError::NotEligible {
            instance_id: instance.instance_id.clone(),
            reason: "Backup tag is not Y".to_string(),
        });
    }
    instance
        .name()
        .ok_or_else(|| LifecycleError::MissingNameTag {
            instance_id: instance.instance_id.clone(),
        })
}

/// Wait for a freshly created artifact and fold the outcome into the report.
///
/// The artifact is already tagged at this point, so neither a timeout nor a
/// failed check stops the pass.
pub(crate) async fn await_ready<E: Ec2Operations>(
    ec2: &E,
    artifact_id: &str,
    kind: ArtifactKind,
    policy: WaitPolicy,
    report: &mut CreationReport,
) {
    match ec2
        .wait_until_ready(vec![artifact_id.to_string()], kind, policy)
        .await
    {
        Ok(WaitOutcome::Ready) => {
            debug!(kind = %kind, artifact_id = %artifact_id, "Artifact ready");
        }
        Ok(WaitOutcome::TimedOut { attempts }) => {
            let err = LifecycleError::CompletionTimeout {
                kind,
                ids: vec![artifact_id.to_string()],
                attempts,
            };
            warn!(artifact_id = %artifact_id, "{err}, continuing");
            report.timed_out += 1;
        }
        Err(e) => {
            warn!(
                kind = %kind,
                artifact_id = %artifact_id,
                error = ?e,
                "Readiness check failed"
            );
            report.failed += 1;
        }
    }
}
