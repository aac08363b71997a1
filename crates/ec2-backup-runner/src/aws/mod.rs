//! AWS client modules
//!
//! This module provides wrappers around AWS SDK clients for:
//! - EC2: instance discovery, image and snapshot lifecycle
//! - context: shared SDK configuration

pub mod context;
pub mod ec2;
pub mod error;

pub use context::{AwsContext, FromAwsContext};
pub use ec2::{Ec2Client, Ec2Operations, ImageRequest, SnapshotRequest};

#[cfg(test)]
pub use ec2::MockEc2Operations;

// Error handling
pub use error::{AwsError, classify_anyhow_error, classify_aws_error};
