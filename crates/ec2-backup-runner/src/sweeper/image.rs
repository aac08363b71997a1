//! Image expiration pass

use super::{SweepOptions, SweepReport, delete_artifact};
use crate::aws::Ec2Operations;
use anyhow::Result;
use chrono::NaiveDate;
use ec2_backup_common::{ArtifactKind, Image, Snapshot};
use tracing::{debug, info};

/// Deregisters expired images and the snapshots backing them
pub struct ImageSweeper<'a, E> {
    ec2: &'a E,
    options: SweepOptions,
}

impl<'a, E: Ec2Operations> ImageSweeper<'a, E> {
    pub fn new(ec2: &'a E, options: SweepOptions) -> Self {
        Self { ec2, options }
    }

    /// Sweep all owned images in listing order.
    ///
    /// Listing failures are returned as errors; individual deletes are not.
    pub async fn run(&self, today: NaiveDate) -> Result<SweepReport> {
        let images = self.ec2.list_images().await?;
        let snapshots = self.ec2.list_snapshots().await?;
        info!(
            images = images.len(),
            snapshots = snapshots.len(),
            cutoff = %self.options.expiry.cutoff(today),
            rule = %self.options.expiry.rule,
            "Sweeping images"
        );

        let mut report = SweepReport::default();
        for image in &images {
            self.sweep_image(image, &snapshots, today, &mut report).await;
        }

        info!(
            deregistered = report.images_deregistered,
            snapshots_deleted = report.snapshots_deleted,
            failed = report.failed,
            "Image sweep complete"
        );
        Ok(report)
    }

    async fn sweep_image(
        &self,
        image: &Image,
        snapshots: &[Snapshot],
        today: NaiveDate,
        report: &mut SweepReport,
    ) {
        let expiry = &self.options.expiry;

        // Scoped to this image: its snapshots may only go if it went first.
        let image_gone = if expiry.image_expired(image, today) {
            let outcome =
                delete_artifact(self.ec2, ArtifactKind::Image, &image.image_id, self.options.dry_run)
                    .await;
            report.record(ArtifactKind::Image, outcome);
            outcome.is_gone()
        } else {
            debug!(
                image_id = %image.image_id,
                created = ?image.creation_day(),
                "Retaining image"
            );
            report.images_retained += 1;
            false
        };

        let image_delete_on = image.tag_index().delete_on();
        for snapshot in snapshots.iter().filter(|s| s.is_owned_by(&image.image_id)) {
            if image_gone && expiry.owned_snapshot_expired(snapshot, image_delete_on, today) {
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
                    image_id = %image.image_id,
                    snapshot_id = %snapshot.snapshot_id,
                    image_gone,
                    "Retaining image snapshot"
                );
                report.snapshots_retained += 1;
            }
        }
    }
}
