//! Configuration types for the backup lifecycle
//!
//! A [`BackupConfig`] is assembled from CLI flags or loaded from a JSON
//! file. Missing JSON fields take the same defaults as the CLI.

use crate::error::ConfigError;
use crate::wait::WaitPolicy;
use ec2_backup_common::defaults::{
    DEFAULT_HORIZON_DAYS, DEFAULT_REGION, DEFAULT_RETENTION_DAYS, default_horizon_days,
    default_region, default_retention_days,
};
use ec2_backup_common::{ExpiryPolicy, ExpiryRule, RetentionPolicy};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Which artifact the lifecycle creates and sweeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleKind {
    /// Machine images, swept together with their backing snapshots
    #[default]
    Image,
    /// One snapshot per persistent volume
    Snapshot,
}

/// AWS connection settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsConfig {
    #[serde(default = "default_region")]
    pub region: String,
    /// Profile name (overrides default credential resolution)
    #[serde(default)]
    pub profile: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            profile: None,
        }
    }
}

/// Retention and expiry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Retention for instances without a usable `Retention` tag
    #[serde(default = "default_retention_days")]
    pub default_days: u32,
    /// Age threshold used by the horizon expiry rule
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    #[serde(default)]
    pub expiry_rule: ExpiryRule,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            default_days: DEFAULT_RETENTION_DAYS,
            horizon_days: DEFAULT_HORIZON_DAYS,
            expiry_rule: ExpiryRule::default(),
        }
    }
}

impl RetentionConfig {
    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy::new(self.default_days)
    }

    pub fn expiry_policy(&self) -> ExpiryPolicy {
        ExpiryPolicy::new(self.horizon_days, self.expiry_rule)
    }
}

/// Configuration for one lifecycle invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupConfig {
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub lifecycle: LifecycleKind,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub wait: WaitPolicy,
    /// Decide and log, but do not create, tag or delete anything
    #[serde(default)]
    pub dry_run: bool,
    /// Create artifacts only
    #[serde(default)]
    pub skip_sweep: bool,
}

impl BackupConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::io(path.display().to_string(), e))?;
        Self::from_json(&content)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.aws.region.trim().is_empty() {
            return Err(ConfigError::EmptyRegion);
        }
        if self.wait.max_attempts == 0 {
            return Err(ConfigError::InvalidWaitAttempts(self.wait.max_attempts));
        }
        if self.wait.delay_secs == 0 {
            return Err(ConfigError::InvalidWaitDelay);
        }
        Ok(())
    }
}
