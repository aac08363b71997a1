//! EC2 request types and SDK record conversion

use aws_sdk_ec2::types as sdk;
use chrono::{DateTime, Utc};
use ec2_backup_common::resources::parse_owner_image_id;
use ec2_backup_common::{AttachedVolume, Image, Instance, ResourceTag, Snapshot};

/// Parameters for creating a machine image of an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub instance_id: String,
    pub name: String,
    pub description: String,
    /// Keep the instance running while the image is taken
    pub no_reboot: bool,
}

impl ImageRequest {
    /// Create a request that never reboots the source instance
    pub fn new(
        instance_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            name: name.into(),
            description: description.into(),
            no_reboot: true,
        }
    }
}

/// Parameters for snapshotting a single volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub volume_id: String,
    pub description: String,
    /// Tags applied atomically at creation time
    pub tags: Vec<ResourceTag>,
}

pub(crate) fn tags_from_sdk(tags: &[sdk::Tag]) -> Vec<ResourceTag> {
    tags.iter()
        .filter_map(|t| Some(ResourceTag::new(t.key()?, t.value().unwrap_or_default())))
        .collect()
}

pub(crate) fn tags_to_sdk(tags: &[ResourceTag]) -> Vec<sdk::Tag> {
    tags.iter()
        .map(|t| sdk::Tag::builder().key(&t.key).value(&t.value).build())
        .collect()
}

pub(crate) fn instance_from_sdk(instance: &sdk::Instance) -> Option<Instance> {
    let instance_id = instance.instance_id()?.to_string();
    let state = instance
        .state()
        .and_then(|s| s.name())
        .map(|n| n.as_str().to_string())
        .unwrap_or_default();
    let volumes = instance
        .block_device_mappings()
        .iter()
        .map(|mapping| AttachedVolume {
            device_name: mapping.device_name().map(str::to_string),
            volume_id: mapping
                .ebs()
                .and_then(|ebs| ebs.volume_id())
                .map(str::to_string),
        })
        .collect();

    Some(Instance {
        instance_id,
        state,
        tags: tags_from_sdk(instance.tags()),
        volumes,
    })
}

pub(crate) fn image_from_sdk(image: &sdk::Image) -> Option<Image> {
    Some(Image {
        image_id: image.image_id()?.to_string(),
        creation_date: image.creation_date().map(str::to_string),
        tags: tags_from_sdk(image.tags()),
    })
}

pub(crate) fn snapshot_from_sdk(snapshot: &sdk::Snapshot) -> Option<Snapshot> {
    let description = snapshot.description().unwrap_or_default().to_string();
    let start_time = snapshot
        .start_time()
        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()));

    Some(Snapshot {
        snapshot_id: snapshot.snapshot_id()?.to_string(),
        volume_id: snapshot.volume_id().map(str::to_string),
        owner_image_id: parse_owner_image_id(&description),
        description,
        start_time,
        tags: tags_from_sdk(snapshot.tags()),
    })
}
