//! Default configuration values
//!
//! These constants keep the CLI, the JSON config loader and the library
//! components in agreement when a value is not supplied.

/// Retention applied when an instance has no usable `Retention` tag
pub const DEFAULT_RETENTION_DAYS: u32 = 14;

/// Age in days after which the sweep considers an artifact expired
pub const DEFAULT_HORIZON_DAYS: u32 = 14;

/// Delay between readiness checks after creating an artifact
pub const DEFAULT_WAIT_DELAY_SECS: u64 = 10;

/// Number of readiness checks before giving up on an artifact
pub const DEFAULT_WAIT_MAX_ATTEMPTS: u32 = 2;

/// Default AWS region
pub const DEFAULT_REGION: &str = "ap-northeast-2";

// Serde default functions for struct field defaults

/// Returns the default retention in days
pub fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

/// Returns the default sweep horizon in days
pub fn default_horizon_days() -> u32 {
    DEFAULT_HORIZON_DAYS
}

/// Returns the default readiness poll delay
pub fn default_wait_delay_secs() -> u64 {
    DEFAULT_WAIT_DELAY_SECS
}

/// Returns the default readiness poll attempt count
pub fn default_wait_max_attempts() -> u32 {
    DEFAULT_WAIT_MAX_ATTEMPTS
}

/// Returns the default region
pub fn default_region() -> String {
    DEFAULT_REGION.to_string()
}
