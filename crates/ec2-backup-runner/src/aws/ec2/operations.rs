//! EC2 operations trait for testing

use super::Ec2Client;
use super::types::{ImageRequest, SnapshotRequest};
use crate::wait::{WaitOutcome, WaitPolicy};
use anyhow::Result;
use ec2_backup_common::{ArtifactKind, Image, Instance, ResourceTag, Snapshot};

/// Provider calls the backup lifecycle depends on.
///
/// This trait abstracts the EC2 client so the creator, sweeper and runner
/// can be exercised without hitting real AWS.
///
/// Note: Parameters use owned values where a borrowed one would trip
/// mockall lifetime limitations.
#[allow(async_fn_in_trait)] // Internal use only, Send+Sync bounds on trait are sufficient
#[cfg_attr(test, mockall::automock)]
pub trait Ec2Operations: Send + Sync {
    /// List running instances that opted in with `Backup=Y`
    async fn list_backup_instances(&self) -> Result<Vec<Instance>>;

    /// Create an image of an instance, returning the image id
    async fn create_image(&self, request: ImageRequest) -> Result<String>;

    /// Snapshot a volume, returning the snapshot id
    async fn create_snapshot(&self, request: SnapshotRequest) -> Result<String>;

    /// Attach tags to a resource
    async fn tag_resource(&self, resource_id: &str, tags: Vec<ResourceTag>) -> Result<()>;

    /// Block until the artifacts are ready or the policy's attempts run out
    async fn wait_until_ready(
        &self,
        resource_ids: Vec<String>,
        kind: ArtifactKind,
        policy: WaitPolicy,
    ) -> Result<WaitOutcome>;

    /// List images owned by the caller
    async fn list_images(&self) -> Result<Vec<Image>>;

    /// List snapshots owned by the caller
    async fn list_snapshots(&self) -> Result<Vec<Snapshot>>;

    /// Deregister an image
    async fn deregister_image(&self, image_id: &str) -> Result<()>;

    /// Delete a snapshot
    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()>;
}

impl Ec2Operations for Ec2Client {
    async fn list_backup_instances(&self) -> Result<Vec<Instance>> {
        Ec2Client::list_backup_instances(self).await
    }

    async fn create_image(&self, request: ImageRequest) -> Result<String> {
        Ec2Client::create_image(self, &request).await
    }

    async fn create_snapshot(&self, request: SnapshotRequest) -> Result<String> {
        Ec2Client::create_snapshot(self, &request).await
    }

    async fn tag_resource(&self, resource_id: &str, tags: Vec<ResourceTag>) -> Result<()> {
        Ec2Client::tag_resource(self, resource_id, &tags).await
    }

    async fn wait_until_ready(
        &self,
        resource_ids: Vec<String>,
        kind: ArtifactKind,
        policy: WaitPolicy,
    ) -> Result<WaitOutcome> {
        match kind {
            ArtifactKind::Image => self.wait_for_images(&resource_ids, policy).await,
            ArtifactKind::Snapshot => self.wait_for_snapshots(&resource_ids, policy).await,
        }
    }

    async fn list_images(&self) -> Result<Vec<Image>> {
        Ec2Client::list_images(self).await
    }

    async fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        Ec2Client::list_snapshots(self).await
    }

    async fn deregister_image(&self, image_id: &str) -> Result<()> {
        Ec2Client::deregister_image(self, image_id).await
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        Ec2Client::delete_snapshot(self, snapshot_id).await
    }
}
