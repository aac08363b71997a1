//! Per-instance retention resolution
//!
//! Retention comes from the instance's `Retention` tag and falls back to a
//! configured default. Resolution is total: a malformed tag must never
//! block the backup of an otherwise eligible instance.

use crate::defaults::DEFAULT_RETENTION_DAYS;
use crate::tags::{TAG_RETENTION, TagIndex};
use chrono::{Days, NaiveDate};

/// Where a resolved retention value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionSource {
    /// A single, well-formed `Retention` tag
    Tag,
    /// No tag, duplicate tags, or an unparseable value
    Default,
}

/// Retention resolver holding the fallback value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub default_days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            default_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl RetentionPolicy {
    pub fn new(default_days: u32) -> Self {
        Self { default_days }
    }

    /// Retention in days, along with whether the tag or the default was used
    pub fn resolve_with_source(&self, tags: TagIndex<'_>) -> (u32, RetentionSource) {
        match tags
            .single(TAG_RETENTION)
            .and_then(|v| v.trim().parse::<u32>().ok())
        {
            Some(days) => (days, RetentionSource::Tag),
            None => (self.default_days, RetentionSource::Default),
        }
    }
}

/// Expiration date for an artifact created on `created` and kept for `days`.
///
/// Saturates at the latest representable date instead of overflowing.
pub fn delete_on(created: NaiveDate, days: u32) -> NaiveDate {
    created
        .checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}
