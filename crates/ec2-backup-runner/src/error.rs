//! Lifecycle and configuration errors
//!
//! Typed errors for the decisions the lifecycle recovers from locally.
//! Provider call failures stay `anyhow::Error` and are classified with
//! [`crate::aws::classify_anyhow_error`] where the sweep needs to know why.

use ec2_backup_common::ArtifactKind;
use thiserror::Error;

/// Per-resource lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Instance has no `Name` tag to derive the artifact name from
    #[error("instance {instance_id} has no Name tag, backup skipped")]
    MissingNameTag { instance_id: String },

    /// Instance is not running or did not opt in
    #[error("instance {instance_id} is not eligible for backup: {reason}")]
    NotEligible { instance_id: String, reason: String },

    /// Artifact did not become ready within the wait policy
    #[error("{kind} {} not ready after {attempts} attempts", .ids.join(","))]
    CompletionTimeout {
        kind: ArtifactKind,
        ids: Vec<String>,
        attempts: u32,
    },
}

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// region field is empty
    #[error("region cannot be empty")]
    EmptyRegion,

    /// wait.max_attempts is zero
    #[error("wait.max_attempts must be at least 1, got {0}")]
    InvalidWaitAttempts(u32),

    /// wait.delay_secs is zero
    #[error("wait.delay_secs must be greater than 0")]
    InvalidWaitDelay,

    /// Failed to parse JSON configuration
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Failed to read configuration file
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Create an IO error with path context
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
