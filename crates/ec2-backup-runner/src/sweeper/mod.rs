//! Expiration sweep of backup artifacts
//!
//! Two independent passes:
//! - [`ImageSweeper`] deregisters expired images, then deletes the snapshots
//!   backing each image only if that image went away in the same pass.
//! - [`StandaloneSnapshotSweeper`] deletes expired snapshots that were
//!   created directly rather than as an image's backing store.
//!
//! Deletes are attempted once. A failed delete is logged and counted; the
//! pass moves on to the next resource.

mod image;
mod snapshot;

pub use image::ImageSweeper;
pub use snapshot::StandaloneSnapshotSweeper;

use crate::aws::{AwsError, Ec2Operations, classify_anyhow_error};
use ec2_backup_common::{ArtifactKind, ExpiryPolicy};
use tracing::{info, warn};

/// Settings shared by both sweep passes
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOptions {
    pub expiry: ExpiryPolicy,
    pub dry_run: bool,
}

/// Summary of a sweep pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub images_deregistered: usize,
    pub images_retained: usize,
    pub snapshots_deleted: usize,
    pub snapshots_retained: usize,
    /// Deletes the provider answered with NotFound
    pub already_deleted: usize,
    pub failed: usize,
    /// Deletes not issued because of dry run
    pub skipped: usize,
}

impl SweepReport {
    fn record(&mut self, kind: ArtifactKind, outcome: DeleteOutcome) {
        match (outcome, kind) {
            (DeleteOutcome::Deleted, ArtifactKind::Image) => self.images_deregistered += 1,
            (DeleteOutcome::Deleted, ArtifactKind::Snapshot) => self.snapshots_deleted += 1,
            (DeleteOutcome::AlreadyDeleted, _) => self.already_deleted += 1,
            (DeleteOutcome::Failed, _) => self.failed += 1,
            (DeleteOutcome::Skipped, _) => self.skipped += 1,
        }
    }

    /// Total deregistrations and deletions issued successfully
    pub fn removed(&self) -> usize {
        self.images_deregistered + self.snapshots_deleted
    }
}

/// Result of a single delete or deregister
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Resource was successfully deleted
    Deleted,
    /// Resource was already deleted (not found)
    AlreadyDeleted,
    /// Delete failed with error
    Failed,
    /// Delete was not issued (dry run)
    Skipped,
}

impl DeleteOutcome {
    /// Whether the resource can be treated as gone for the rest of the pass.
    ///
    /// Dry run counts as gone so the dependent decisions are still logged.
    pub fn is_gone(self) -> bool {
        !matches!(self, DeleteOutcome::Failed)
    }
}

/// Deregister an image or delete a snapshot, treating NotFound as success.
pub(crate) async fn delete_artifact<E: Ec2Operations>(
    ec2: &E,
    kind: ArtifactKind,
    resource_id: &str,
    dry_run: bool,
) -> DeleteOutcome {
    let verb = match kind {
        ArtifactKind::Image => "deregister",
        ArtifactKind::Snapshot => "delete",
    };

    if dry_run {
        info!(kind = %kind, resource_id = %resource_id, "[DRY RUN] Would {verb}");
        return DeleteOutcome::Skipped;
    }

    let result = match kind {
        ArtifactKind::Image => ec2.deregister_image(resource_id).await,
        ArtifactKind::Snapshot => ec2.delete_snapshot(resource_id).await,
    };

    match result {
        Ok(()) => {
            info!(kind = %kind, resource_id = %resource_id, "Removed expired {kind}");
            DeleteOutcome::Deleted
        }
        Err(e) => match classify_anyhow_error(&e) {
            AwsError::NotFound { .. } => {
                info!(kind = %kind, resource_id = %resource_id, "Already deleted");
                DeleteOutcome::AlreadyDeleted
            }
            AwsError::InUse { message } => {
                warn!(
                    kind = %kind,
                    resource_id = %resource_id,
                    reason = %message,
                    "Still in use, not removed"
                );
                DeleteOutcome::Failed
            }
            _ => {
                warn!(
                    kind = %kind,
                    resource_id = %resource_id,
                    error = ?e,
                    "Failed to {verb}"
                );
                DeleteOutcome::Failed
            }
        },
    }
}
