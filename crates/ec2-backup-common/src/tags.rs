//! Tag keys and the read-only tag view
//!
//! All lifecycle state lives in provider-side tags. Instances opt in with
//! `Backup=Y` and may override retention with `Retention=<days>`; created
//! artifacts always carry `Name` and `DeleteOn`.
//!
//! ## Tag Schema
//!
//! | Tag Key | Applies to | Description |
//! |---------|------------|-------------|
//! | `Backup` | instance | Opt-in marker, must equal `Y` |
//! | `Retention` | instance | Retention in days (optional) |
//! | `Name` | instance, artifact | Human-readable name |
//! | `DeleteOn` | artifact | Expiration date (`YYYY-MM-DD`) |

use chrono::NaiveDate;

/// Tag key for the human-readable name
pub const TAG_NAME: &str = "Name";

/// Tag key for the backup opt-in marker
pub const TAG_BACKUP: &str = "Backup";

/// Tag value that opts an instance into backups
pub const TAG_BACKUP_VALUE: &str = "Y";

/// Tag key for the per-instance retention override
pub const TAG_RETENTION: &str = "Retention";

/// Tag key for the computed expiration date of an artifact
pub const TAG_DELETE_ON: &str = "DeleteOn";

/// Date format used in `DeleteOn` values
pub const DELETE_ON_FORMAT: &str = "%Y-%m-%d";

/// A single key/value tag on a provider resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTag {
    pub key: String,
    pub value: String,
}

impl ResourceTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Read-only lookup view over a resource's tags.
///
/// Keys are not unique on the provider side, so lookups return every match
/// in listing order. A missing tag collection behaves like an empty one.
#[derive(Debug, Clone, Copy)]
pub struct TagIndex<'a> {
    tags: &'a [ResourceTag],
}

impl<'a> TagIndex<'a> {
    pub fn new(tags: Option<&'a [ResourceTag]>) -> Self {
        Self {
            tags: tags.unwrap_or(&[]),
        }
    }

    /// All values stored under `key`, in listing order
    pub fn values(&self, key: &str) -> Vec<&'a str> {
        self.tags
            .iter()
            .filter(|t| t.key == key)
            .map(|t| t.value.as_str())
            .collect()
    }

    /// First value stored under `key`
    pub fn first(&self, key: &str) -> Option<&'a str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    /// The value under `key` if exactly one tag carries it
    pub fn single(&self, key: &str) -> Option<&'a str> {
        match self.values(key).as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.tags.iter().any(|t| t.key == key)
    }

    /// Parsed `DeleteOn` date, if the first such tag holds a valid date
    pub fn delete_on(&self) -> Option<NaiveDate> {
        self.first(TAG_DELETE_ON).and_then(parse_delete_on)
    }
}

/// Format an expiration date for the `DeleteOn` tag
pub fn format_delete_on(date: NaiveDate) -> String {
    date.format(DELETE_ON_FORMAT).to_string()
}

/// Parse a `DeleteOn` tag value
pub fn parse_delete_on(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DELETE_ON_FORMAT).ok()
}
