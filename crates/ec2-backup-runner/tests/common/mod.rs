//! In-memory EC2 gateway for lifecycle tests
//!
//! Behaves like the provider where the lifecycle depends on it: listings
//! filter like the real queries, deletes of unknown ids fail with NotFound
//! codes, and a backing snapshot cannot be deleted while its image exists.

#![allow(dead_code)]

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, TimeZone, Utc};
use ec2_backup::aws::{Ec2Operations, ImageRequest, SnapshotRequest};
use ec2_backup::wait::{WaitOutcome, WaitPolicy};
use ec2_backup_common::resources::parse_owner_image_id;
use ec2_backup_common::{ArtifactKind, Image, Instance, ResourceTag, Snapshot};
use std::collections::HashSet;
use std::sync::Mutex;

/// A call the lifecycle made against the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListInstances,
    CreateImage(ImageRequest),
    CreateSnapshot(SnapshotRequest),
    Tag(String, Vec<ResourceTag>),
    Wait(Vec<String>, ArtifactKind),
    ListImages,
    ListSnapshots,
    Deregister(String),
    DeleteSnapshot(String),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::CreateImage(_)
                | Call::CreateSnapshot(_)
                | Call::Tag(..)
                | Call::Deregister(_)
                | Call::DeleteSnapshot(_)
        )
    }
}

#[derive(Debug)]
struct State {
    instances: Vec<Instance>,
    images: Vec<Image>,
    snapshots: Vec<Snapshot>,
    /// Returned by listings but already gone from the store
    stale_snapshots: Vec<Snapshot>,
    calls: Vec<Call>,
    wait_outcome: WaitOutcome,
    /// Instance or volume ids whose create call fails
    failing: HashSet<String>,
    /// Return every instance from the listing, not only opted-in running ones
    unfiltered_listing: bool,
    next_id: u32,
}

pub struct FakeEc2 {
    today: NaiveDate,
    state: Mutex<State>,
}

impl FakeEc2 {
    /// Gateway whose clock for new artifacts reads `today`
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            state: Mutex::new(State {
                instances: Vec::new(),
                images: Vec::new(),
                snapshots: Vec::new(),
                stale_snapshots: Vec::new(),
                calls: Vec::new(),
                wait_outcome: WaitOutcome::Ready,
                failing: HashSet::new(),
                unfiltered_listing: false,
                next_id: 1,
            }),
        }
    }

    pub fn with_instances(self, instances: impl IntoIterator<Item = Instance>) -> Self {
        self.state().instances.extend(instances);
        self
    }

    pub fn with_images(self, images: impl IntoIterator<Item = Image>) -> Self {
        self.state().images.extend(images);
        self
    }

    pub fn with_snapshots(self, snapshots: impl IntoIterator<Item = Snapshot>) -> Self {
        self.state().snapshots.extend(snapshots);
        self
    }

    pub fn with_stale_snapshots(self, snapshots: impl IntoIterator<Item = Snapshot>) -> Self {
        self.state().stale_snapshots.extend(snapshots);
        self
    }

    pub fn with_wait_outcome(self, outcome: WaitOutcome) -> Self {
        self.state().wait_outcome = outcome;
        self
    }

    pub fn failing_for(self, id: &str) -> Self {
        self.state().failing.insert(id.to_string());
        self
    }

    pub fn unfiltered_listing(self) -> Self {
        self.state().unfiltered_listing = true;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn record(&self, call: Call) {
        self.state().calls.push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn images(&self) -> Vec<Image> {
        self.state().images.clone()
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.state().snapshots.clone()
    }

    pub fn image(&self, image_id: &str) -> Option<Image> {
        self.state()
            .images
            .iter()
            .find(|i| i.image_id == image_id)
            .cloned()
    }

    pub fn snapshot(&self, snapshot_id: &str) -> Option<Snapshot> {
        self.state()
            .snapshots
            .iter()
            .find(|s| s.snapshot_id == snapshot_id)
            .cloned()
    }

    pub fn deregistered(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Deregister(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn deleted_snapshots(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::DeleteSnapshot(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn allocate(&self, prefix: &str) -> String {
        let mut state = self.state();
        let id = format!("{prefix}-{:08x}", state.next_id);
        state.next_id += 1;
        id
    }
}

impl Ec2Operations for FakeEc2 {
    async fn list_backup_instances(&self) -> Result<Vec<Instance>> {
        self.record(Call::ListInstances);
        let state = self.state();
        Ok(state
            .instances
            .iter()
            .filter(|i| state.unfiltered_listing || (i.is_running() && i.wants_backup()))
            .cloned()
            .collect())
    }

    async fn create_image(&self, request: ImageRequest) -> Result<String> {
        self.record(Call::CreateImage(request.clone()));
        if self.state().failing.contains(&request.instance_id) {
            return Err(anyhow!("UnauthorizedOperation: cannot image {}", request.instance_id));
        }

        let image_id = self.allocate("ami");
        let created = Utc.from_utc_datetime(&self.today.and_hms_opt(0, 30, 0).unwrap());
        self.state().images.push(Image {
            image_id: image_id.clone(),
            creation_date: Some(created.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()),
            tags: Vec::new(),
        });
        Ok(image_id)
    }

    async fn create_snapshot(&self, request: SnapshotRequest) -> Result<String> {
        self.record(Call::CreateSnapshot(request.clone()));
        if self.state().failing.contains(&request.volume_id) {
            return Err(anyhow!("IncorrectState: volume {} is busy", request.volume_id));
        }

        let snapshot_id = self.allocate("snap");
        self.state().snapshots.push(Snapshot {
            snapshot_id: snapshot_id.clone(),
            volume_id: Some(request.volume_id.clone()),
            owner_image_id: parse_owner_image_id(&request.description),
            description: request.description,
            start_time: Some(Utc.from_utc_datetime(&self.today.and_hms_opt(0, 30, 0).unwrap())),
            tags: request.tags,
        });
        Ok(snapshot_id)
    }

    async fn tag_resource(&self, resource_id: &str, tags: Vec<ResourceTag>) -> Result<()> {
        self.record(Call::Tag(resource_id.to_string(), tags.clone()));
        let mut state = self.state();
        if let Some(image) = state.images.iter_mut().find(|i| i.image_id == resource_id) {
            image.tags.extend(tags);
            return Ok(());
        }
        if let Some(snap) = state
            .snapshots
            .iter_mut()
            .find(|s| s.snapshot_id == resource_id)
        {
            snap.tags.extend(tags);
            return Ok(());
        }
        Err(anyhow!("InvalidID: {resource_id} does not exist"))
    }

    async fn wait_until_ready(
        &self,
        resource_ids: Vec<String>,
        kind: ArtifactKind,
        _policy: WaitPolicy,
    ) -> Result<WaitOutcome> {
        self.record(Call::Wait(resource_ids, kind));
        Ok(self.state().wait_outcome)
    }

    async fn list_images(&self) -> Result<Vec<Image>> {
        self.record(Call::ListImages);
        Ok(self.images())
    }

    async fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        self.record(Call::ListSnapshots);
        let state = self.state();
        Ok(state
            .snapshots
            .iter()
            .chain(&state.stale_snapshots)
            .cloned()
            .collect())
    }

    async fn deregister_image(&self, image_id: &str) -> Result<()> {
        self.record(Call::Deregister(image_id.to_string()));
        let mut state = self.state();
        let before = state.images.len();
        state.images.retain(|i| i.image_id != image_id);
        if state.images.len() == before {
            return Err(anyhow!(
                "InvalidAMIID.NotFound: The image id '{image_id}' does not exist"
            ));
        }
        Ok(())
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        self.record(Call::DeleteSnapshot(snapshot_id.to_string()));
        let mut state = self.state();
        let Some(pos) = state
            .snapshots
            .iter()
            .position(|s| s.snapshot_id == snapshot_id)
        else {
            return Err(anyhow!(
                "InvalidSnapshot.NotFound: The snapshot '{snapshot_id}' does not exist"
            ));
        };

        let owner = state.snapshots[pos].owner_image_id.clone();
        if let Some(owner) = owner.filter(|id| state.images.iter().any(|i| &i.image_id == id)) {
            return Err(anyhow!(
                "InvalidSnapshot.InUse: The snapshot {snapshot_id} is currently in use by {owner}"
            ));
        }

        state.snapshots.remove(pos);
        Ok(())
    }
}
