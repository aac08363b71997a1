//! Expiration rules applied by the sweep
//!
//! Two rules are supported. [`ExpiryRule::Horizon`] judges an artifact by
//! its age against a fixed horizon and only uses the `DeleteOn` tag as a
//! "managed by us" marker. [`ExpiryRule::DeleteOnTag`] compares today
//! against the date recorded in the artifact's own `DeleteOn` tag.

use crate::defaults::DEFAULT_HORIZON_DAYS;
use crate::resources::{Image, Snapshot};
use crate::tags::TAG_DELETE_ON;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the sweep decides an artifact has expired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpiryRule {
    /// Expired once the artifact is at least `horizon_days` old
    #[default]
    Horizon,
    /// Expired once today reaches the artifact's `DeleteOn` date
    DeleteOnTag,
}

impl ExpiryRule {
    pub fn as_str(self) -> &'static str {
        match self {
            ExpiryRule::Horizon => "horizon",
            ExpiryRule::DeleteOnTag => "delete-on-tag",
        }
    }
}

impl fmt::Display for ExpiryRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpiryRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "horizon" => Ok(ExpiryRule::Horizon),
            "delete-on-tag" => Ok(ExpiryRule::DeleteOnTag),
            other => Err(format!(
                "unknown expiry rule '{other}', expected 'horizon' or 'delete-on-tag'"
            )),
        }
    }
}

/// Expiry decision inputs shared by both sweep passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub horizon_days: u32,
    pub rule: ExpiryRule,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            horizon_days: DEFAULT_HORIZON_DAYS,
            rule: ExpiryRule::Horizon,
        }
    }
}

impl ExpiryPolicy {
    pub fn new(horizon_days: u32, rule: ExpiryRule) -> Self {
        Self { horizon_days, rule }
    }

    /// Latest creation date that counts as expired under the horizon rule
    pub fn cutoff(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_sub_days(Days::new(u64::from(self.horizon_days)))
            .unwrap_or(NaiveDate::MIN)
    }

    fn aged_out(&self, created: Option<NaiveDate>, today: NaiveDate) -> bool {
        created.is_some_and(|day| day <= self.cutoff(today))
    }

    /// Whether an image should be deregistered.
    ///
    /// Images without a `DeleteOn` tag were not created by this lifecycle
    /// and are never expired.
    pub fn image_expired(&self, image: &Image, today: NaiveDate) -> bool {
        let tags = image.tag_index();
        if !tags.has(TAG_DELETE_ON) {
            return false;
        }
        match self.rule {
            ExpiryRule::Horizon => self.aged_out(image.creation_day(), today),
            ExpiryRule::DeleteOnTag => tags.delete_on().is_some_and(|d| d <= today),
        }
    }

    /// Whether a snapshot backing an already deregistered image should go.
    ///
    /// Under the tag rule a snapshot without its own `DeleteOn` inherits
    /// the owning image's date.
    pub fn owned_snapshot_expired(
        &self,
        snapshot: &Snapshot,
        image_delete_on: Option<NaiveDate>,
        today: NaiveDate,
    ) -> bool {
        match self.rule {
            ExpiryRule::Horizon => self.aged_out(snapshot.start_day(), today),
            ExpiryRule::DeleteOnTag => snapshot
                .tag_index()
                .delete_on()
                .or(image_delete_on)
                .is_some_and(|d| d <= today),
        }
    }

    /// Whether a snapshot that is subject to the standalone pass has expired.
    ///
    /// Only snapshots carrying `DeleteOn` and not produced by the image flow
    /// are subject to that pass; see [`Self::is_standalone_candidate`].
    pub fn standalone_snapshot_expired(&self, snapshot: &Snapshot, today: NaiveDate) -> bool {
        if !Self::is_standalone_candidate(snapshot) {
            return false;
        }
        match self.rule {
            ExpiryRule::Horizon => self.aged_out(snapshot.start_day(), today),
            ExpiryRule::DeleteOnTag => snapshot
                .tag_index()
                .delete_on()
                .is_some_and(|d| d <= today),
        }
    }

    /// Snapshots the standalone pass is responsible for
    pub fn is_standalone_candidate(snapshot: &Snapshot) -> bool {
        snapshot.tag_index().has(TAG_DELETE_ON) && !snapshot.created_by_image_flow()
    }
}
