//! ec2-backup-common - Shared types and utilities
//!
//! This crate provides the provider-agnostic pieces of the backup lifecycle,
//! without any AWS SDK dependencies to keep it lightweight.
//!
//! ## Modules
//!
//! - [`defaults`]: Default configuration values
//! - [`expiry`]: Expiration rules applied by the sweep
//! - [`resources`]: Instance, image and snapshot records
//! - [`retention`]: Per-instance retention resolution
//! - [`tags`]: Tag keys and the read-only [`TagIndex`] view

pub mod defaults;
pub mod expiry;
pub mod resources;
pub mod retention;
pub mod tags;

// Re-export commonly used types
pub use expiry::{ExpiryPolicy, ExpiryRule};
pub use resources::{ArtifactKind, AttachedVolume, Image, Instance, Snapshot};
pub use retention::RetentionPolicy;
pub use tags::{ResourceTag, TagIndex};
