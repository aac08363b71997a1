//! EC2 instance, image and snapshot management

mod image;
mod instance;
mod operations;
mod snapshot;
mod types;

pub use operations::Ec2Operations;
pub use types::{ImageRequest, SnapshotRequest};

#[cfg(test)]
pub use operations::MockEc2Operations;

use crate::aws::context::{AwsContext, FromAwsContext};
use crate::aws::error::classify_anyhow_error;
use anyhow::Result;
use aws_sdk_ec2::Client;
use backon::{ExponentialBuilder, Retryable};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Owner alias for resources belonging to the calling account
pub(crate) const OWNER_SELF: &str = "self";

/// EC2 client for the backup lifecycle
pub struct Ec2Client {
    pub(crate) client: Client,
}

impl Ec2Client {
    /// Create a new EC2 client (loads AWS config from environment)
    pub async fn new(region: &str) -> Result<Self> {
        let ctx = AwsContext::new(region).await;
        Ok(Self::from_context(&ctx))
    }
}

impl FromAwsContext for Ec2Client {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.ec2_client(),
        }
    }
}

fn is_throttled(e: &anyhow::Error) -> bool {
    classify_anyhow_error(e).is_retryable()
}

/// Run a provider call, backing off while AWS reports throttling.
///
/// Any other error is returned immediately. Deletes do not go through
/// this helper; they are attempted exactly once.
pub(crate) async fn retry_throttled<T, F, Fut>(operation: &str, call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    call.retry(
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(20))
            .with_max_times(5),
    )
    .when(is_throttled)
    .notify(|e, dur| {
        warn!(
            operation = %operation,
            delay = ?dur,
            error = %e,
            "AWS rate limited, backing off..."
        );
    })
    .await
}
