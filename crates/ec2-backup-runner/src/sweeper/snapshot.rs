//! Standalone snapshot expiration pass

use super::{SweepOptions, SweepReport, delete_artifact};
use crate::aws::Ec2Operations;
use anyhow::Result;
use chrono::NaiveDate;
use ec2_backup_common::{ArtifactKind, ExpiryPolicy};
use tracing::{debug, info};

/// Deletes expired snapshots that were not created as an image's backing
pub struct StandaloneSnapshotSweeper<'a, E> {
    ec2: &'a E,
    options: SweepOptions,
}

impl<'a, E: Ec2Operations> StandaloneSnapshotSweeper<'a, E> {
    pub fn new(ec2: &'a E, options: SweepOptions) -> Self {
        Self { ec2, options }
    }

    pub async fn run(&self, today: NaiveDate) -> Result<SweepReport> {
        let snapshots = self.ec2.list_snapshots().await?;
        let candidates: Vec<_> = snapshots
            .iter()
            .filter(|s| ExpiryPolicy::is_standalone_candidate(s))
            .collect();
        info!(
            snapshots = snapshots.len(),
            candidates = candidates.len(),
            cutoff = %self.options.expiry.cutoff(today),
            rule = %self.options.expiry.rule,
            "Sweeping standalone snapshots"
        );

        let mut report = SweepReport::default();
        for snapshot in candidates {
            if self.options.expiry.standalone_snapshot_expired(snapshot, today) {
                let outcome = delete_artifact(
                    self.ec2,
                    ArtifactKind::Snapshot,
                    &snapshot.snapshot_id,
                    self.options.dry_run,
                )
                .await;
                report.record(ArtifactKind::Snapshot, outcome);
            } else {
                debug!(
                    snapshot_id = %snapshot.snapshot_id,
                    started = ?snapshot.start_day(),
                    "Retaining snapshot"
                );
                report.snapshots_retained += 1;
            }
        }

        info!(
            deleted = report.snapshots_deleted,
            retained = report.snapshots_retained,
            failed = report.failed,
            "Snapshot sweep complete"
        );
        Ok(report)
    }
}
