//! Volume snapshot lifecycle operations

use super::types::{SnapshotRequest, snapshot_from_sdk, tags_to_sdk};
use super::{Ec2Client, OWNER_SELF, retry_throttled};
use crate::aws::error::classify_anyhow_error;
use crate::wait::{WaitOutcome, WaitPolicy, poll_until_ready};
use anyhow::{Context, Result};
use aws_sdk_ec2::operation::describe_snapshots::DescribeSnapshotsOutput;
use aws_sdk_ec2::types::{self as sdk, ResourceType, SnapshotState, TagSpecification};
use ec2_backup_common::Snapshot;
use tracing::{debug, info};

impl Ec2Client {
    /// Snapshot a volume with its tags applied at creation time
    pub async fn create_snapshot(&self, request: &SnapshotRequest) -> Result<String> {
        info!(
            volume_id = %request.volume_id,
            description = %request.description,
            "Creating snapshot"
        );

        let tag_spec = TagSpecification::builder()
            .resource_type(ResourceType::Snapshot)
            .set_tags(Some(tags_to_sdk(&request.tags)))
            .build();

        let response = retry_throttled("CreateSnapshot", || async {
            self.client
                .create_snapshot()
                .volume_id(&request.volume_id)
                .description(&request.description)
                .tag_specifications(tag_spec.clone())
                .send()
                .await
                .with_context(|| format!("Failed to snapshot volume {}", request.volume_id))
        })
        .await?;

        let snapshot_id = response
            .snapshot_id()
            .context("No snapshot ID returned")?
            .to_string();

        Ok(snapshot_id)
    }

    /// List all snapshots owned by the calling account
    pub async fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        let mut snapshots = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = retry_throttled("DescribeSnapshots", || {
                self.describe_snapshots_page(next_token.clone())
            })
            .await?;

            snapshots.extend(page.snapshots().iter().filter_map(snapshot_from_sdk));

            next_token = page.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        debug!(count = snapshots.len(), "Found owned snapshots");
        Ok(snapshots)
    }

    async fn describe_snapshots_page(
        &self,
        next_token: Option<String>,
    ) -> Result<DescribeSnapshotsOutput> {
        self.client
            .describe_snapshots()
            .owner_ids(OWNER_SELF)
            .set_next_token(next_token)
            .send()
            .await
            .context("Failed to describe snapshots")
    }

    /// Delete a snapshot. Attempted once, never retried.
    pub async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        self.client
            .delete_snapshot()
            .snapshot_id(snapshot_id)
            .send()
            .await
            .with_context(|| format!("Failed to delete snapshot {}", snapshot_id))?;

        Ok(())
    }

    /// Poll until every snapshot is `completed`.
    pub async fn wait_for_snapshots(
        &self,
        snapshot_ids: &[String],
        policy: WaitPolicy,
    ) -> Result<WaitOutcome> {
        poll_until_ready(
            policy.delay(),
            policy.max_attempts,
            || async {
                let response = self
                    .client
                    .describe_snapshots()
                    .set_snapshot_ids(Some(snapshot_ids.to_vec()))
                    .send()
                    .await
                    .context("Failed to describe snapshots");

                let response = match response {
                    Ok(r) => r,
                    Err(e) if classify_anyhow_error(&e).is_not_found() => return Ok(false),
                    Err(e) => return Err(e),
                };

                snapshots_ready(response.snapshots(), snapshot_ids.len())
            },
            &format!("snapshots {}", snapshot_ids.join(",")),
        )
        .await
    }
}

/// Readiness of one describe response: `Ok(true)` once all `expected`
/// snapshots are `completed`, an error if any is in `error`.
fn snapshots_ready(snapshots: &[sdk::Snapshot], expected: usize) -> Result<bool> {
    if snapshots.len() < expected {
        return Ok(false);
    }

    for snapshot in snapshots {
        match snapshot.state() {
            Some(SnapshotState::Completed) => {}
            Some(SnapshotState::Error) => {
                anyhow::bail!(
                    "Snapshot {} entered error state: {}",
                    snapshot.snapshot_id().unwrap_or("unknown"),
                    snapshot.state_message().unwrap_or("no message provided")
                );
            }
            _ => return Ok(false),
        }
    }
    Ok(true)
}
