//! Provider resource records
//!
//! Plain records for the instances, images and snapshots the lifecycle
//! reads. The gateway converts provider responses into these so the
//! creator and sweeper never touch SDK types.

use crate::tags::{TAG_BACKUP, TAG_BACKUP_VALUE, TAG_NAME, ResourceTag, TagIndex};
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;

/// Instance lifecycle state that makes an instance eligible for backup
pub const INSTANCE_STATE_RUNNING: &str = "running";

/// First word of the description the provider puts on snapshots it creates
/// as the backing store of an image
pub const IMAGE_FLOW_MARKER: &str = "Created";

/// Kind of backup artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Image,
    Snapshot,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Image => "image",
            ArtifactKind::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage device attached to an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedVolume {
    pub device_name: Option<String>,
    /// Persistent volume id; `None` for ephemeral devices
    pub volume_id: Option<String>,
}

/// Compute instance as listed by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub instance_id: String,
    pub state: String,
    pub tags: Vec<ResourceTag>,
    pub volumes: Vec<AttachedVolume>,
}

impl Instance {
    pub fn tag_index(&self) -> TagIndex<'_> {
        TagIndex::new(Some(&self.tags))
    }

    pub fn name(&self) -> Option<&str> {
        self.tag_index().first(TAG_NAME)
    }

    pub fn is_running(&self) -> bool {
        self.state == INSTANCE_STATE_RUNNING
    }

    /// Whether the instance opted in with `Backup=Y`
    pub fn wants_backup(&self) -> bool {
        self.tag_index()
            .values(TAG_BACKUP)
            .contains(&TAG_BACKUP_VALUE)
    }

    /// Volume ids backed by persistent storage, skipping ephemeral devices
    pub fn persistent_volume_ids(&self) -> impl Iterator<Item = &str> {
        self.volumes.iter().filter_map(|v| v.volume_id.as_deref())
    }
}

/// Machine image owned by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub image_id: String,
    /// Provider timestamp, e.g. `2024-01-01T03:12:45.000Z`
    pub creation_date: Option<String>,
    pub tags: Vec<ResourceTag>,
}

impl Image {
    pub fn tag_index(&self) -> TagIndex<'_> {
        TagIndex::new(Some(&self.tags))
    }

    /// Date component of the creation timestamp
    pub fn creation_day(&self) -> Option<NaiveDate> {
        let raw = self.creation_date.as_deref()?;
        let day = raw.split('T').next()?;
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }
}

/// Block storage snapshot owned by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub snapshot_id: String,
    pub volume_id: Option<String>,
    pub description: String,
    pub start_time: Option<DateTime<Utc>>,
    pub tags: Vec<ResourceTag>,
    /// Image this snapshot backs, if it was created as part of one
    pub owner_image_id: Option<String>,
}

impl Snapshot {
    pub fn tag_index(&self) -> TagIndex<'_> {
        TagIndex::new(Some(&self.tags))
    }

    pub fn start_day(&self) -> Option<NaiveDate> {
        self.start_time.map(|t| t.date_naive())
    }

    /// Whether the provider created this snapshot while building an image
    pub fn created_by_image_flow(&self) -> bool {
        self.description.split(' ').next() == Some(IMAGE_FLOW_MARKER)
    }

    /// Whether this snapshot backs the given image
    pub fn is_owned_by(&self, image_id: &str) -> bool {
        self.owner_image_id.as_deref() == Some(image_id)
    }
}

/// Extract the owning image id from a provider-generated snapshot description.
///
/// Image backing snapshots are described as
/// `Created by CreateImage(i-0abc) for ami-0def from vol-0123`; the first
/// `ami-` token is the owner.
pub fn parse_owner_image_id(description: &str) -> Option<String> {
    description
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-'))
        .find(|word| word.len() > "ami-".len() && word.starts_with("ami-"))
        .map(str::to_string)
}
