//! Builders for resource records
//!
//! ```
//! use ec2_backup_test_utils::fixtures::{day, instance};
//!
//! let web1 = instance("i-1").name("web1").backup().volume("vol-1").build();
//! assert!(web1.wants_backup());
//! assert_eq!(day(2024, 1, 1).to_string(), "2024-01-01");
//! ```

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use ec2_backup_common::resources::{INSTANCE_STATE_RUNNING, parse_owner_image_id};
use ec2_backup_common::tags::{TAG_BACKUP, TAG_BACKUP_VALUE, TAG_DELETE_ON, TAG_NAME, TAG_RETENTION};
use ec2_backup_common::{AttachedVolume, Image, Instance, ResourceTag, Snapshot};

/// Calendar date, panicking on invalid input
pub fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// Timestamp at 03:00 UTC on the given date
pub fn at(year: i32, month: u32, d: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day(year, month, d).and_hms_opt(3, 0, 0).expect("valid time"))
}

pub fn instance(instance_id: &str) -> InstanceBuilder {
    InstanceBuilder {
        instance: Instance {
            instance_id: instance_id.to_string(),
            state: INSTANCE_STATE_RUNNING.to_string(),
            tags: Vec::new(),
            volumes: Vec::new(),
        },
    }
}

pub struct InstanceBuilder {
    instance: Instance,
}

impl InstanceBuilder {
    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.instance.tags.push(ResourceTag::new(key, value));
        self
    }

    pub fn name(self, name: &str) -> Self {
        self.tag(TAG_NAME, name)
    }

    /// Opt in with `Backup=Y`
    pub fn backup(self) -> Self {
        self.tag(TAG_BACKUP, TAG_BACKUP_VALUE)
    }

    pub fn retention(self, value: &str) -> Self {
        self.tag(TAG_RETENTION, value)
    }

    pub fn state(mut self, state: &str) -> Self {
        self.instance.state = state.to_string();
        self
    }

    pub fn volume(mut self, volume_id: &str) -> Self {
        let device = format!("/dev/sd{}", (b'a' + self.instance.volumes.len() as u8) as char);
        self.instance.volumes.push(AttachedVolume {
            device_name: Some(device),
            volume_id: Some(volume_id.to_string()),
        });
        self
    }

    /// Instance-store device with no persistent volume
    pub fn ephemeral(mut self, device_name: &str) -> Self {
        self.instance.volumes.push(AttachedVolume {
            device_name: Some(device_name.to_string()),
            volume_id: None,
        });
        self
    }

    pub fn build(self) -> Instance {
        self.instance
    }
}

pub fn image(image_id: &str, created: NaiveDate) -> ImageBuilder {
    ImageBuilder {
        image: Image {
            image_id: image_id.to_string(),
            creation_date: Some(format!("{}T03:00:00.000Z", created.format("%Y-%m-%d"))),
            tags: Vec::new(),
        },
    }
}

pub struct ImageBuilder {
    image: Image,
}

impl ImageBuilder {
    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.image.tags.push(ResourceTag::new(key, value));
        self
    }

    pub fn delete_on(self, value: &str) -> Self {
        self.tag(TAG_DELETE_ON, value)
    }

    pub fn build(self) -> Image {
        self.image
    }
}

pub fn snapshot(snapshot_id: &str, started: NaiveDate) -> SnapshotBuilder {
    SnapshotBuilder {
        snapshot: Snapshot {
            snapshot_id: snapshot_id.to_string(),
            volume_id: Some("vol-1".to_string()),
            description: String::new(),
            start_time: Some(Utc.from_utc_datetime(
                &started.and_hms_opt(3, 0, 0).expect("valid time"),
            )),
            tags: Vec::new(),
            owner_image_id: None,
        },
    }
}

pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

impl SnapshotBuilder {
    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.snapshot.tags.push(ResourceTag::new(key, value));
        self
    }

    pub fn delete_on(self, value: &str) -> Self {
        self.tag(TAG_DELETE_ON, value)
    }

    pub fn description(mut self, description: &str) -> Self {
        self.snapshot.description = description.to_string();
        self.snapshot.owner_image_id = parse_owner_image_id(description);
        self
    }

    /// Backing store of `image_id`, described the way the provider does
    pub fn backing(self, image_id: &str) -> Self {
        self.description(&format!(
            "Created by CreateImage(i-0000) for {image_id} from vol-1"
        ))
    }

    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}
