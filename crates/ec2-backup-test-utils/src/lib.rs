//! Shared test utilities for ec2-backup
//!
//! This crate provides common test helpers that can be used across
//! multiple test modules without circular dependencies.
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection
//! - [`fixtures`]: Builders for instance, image and snapshot records

pub mod aws;
pub mod fixtures;

// Re-export commonly used items
pub use aws::get_test_region;
pub use fixtures::{at, day, image, instance, snapshot};
