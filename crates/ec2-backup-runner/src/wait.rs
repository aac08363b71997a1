//! Bounded readiness waiting.
//!
//! Newly created artifacts are polled at a fixed interval for a fixed number
//! of attempts. Running out of attempts is reported as
//! [`WaitOutcome::TimedOut`] rather than an error: callers treat it as a
//! soft failure because the artifact is already tagged.

use anyhow::Result;
use backon::{BackoffBuilder, ConstantBuilder};
use ec2_backup_common::defaults::{
    default_wait_delay_secs, default_wait_max_attempts, DEFAULT_WAIT_DELAY_SECS,
    DEFAULT_WAIT_MAX_ATTEMPTS,
};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Fixed-delay polling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WaitPolicy {
    /// Seconds between checks
    #[serde(default = "default_wait_delay_secs")]
    pub delay_secs: u64,
    /// Total number of checks, including the first one
    #[serde(default = "default_wait_max_attempts")]
    pub max_attempts: u32,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            delay_secs: DEFAULT_WAIT_DELAY_SECS,
            max_attempts: DEFAULT_WAIT_MAX_ATTEMPTS,
        }
    }
}

impl WaitPolicy {
    pub fn new(delay_secs: u64, max_attempts: u32) -> Self {
        Self {
            delay_secs,
            max_attempts,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

/// Result of a bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    TimedOut { attempts: u32 },
}

/// Poll `check` until it reports ready or the attempts run out.
///
/// # Arguments
/// * `delay` - Sleep between checks
/// * `max_attempts` - Total number of checks (at least one is always made)
/// * `check` - Async function that returns `Ok(true)` when ready, `Ok(false)` to retry
/// * `resource_name` - Name for logging
///
/// # Returns
/// * `Ok(WaitOutcome::Ready)` - Resource is ready
/// * `Ok(WaitOutcome::TimedOut)` - Attempts exhausted
/// * `Err` - The check itself failed
pub async fn poll_until_ready<F, Fut>(
    delay: Duration,
    max_attempts: u32,
    check: F,
    resource_name: &str,
) -> Result<WaitOutcome>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let max_attempts = max_attempts.max(1);
    let mut delays = ConstantBuilder::default()
        .with_delay(delay)
        .with_max_times((max_attempts - 1) as usize)
        .build();
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        match check().await {
            Ok(true) => {
                debug!(resource = %resource_name, attempts, "Resource ready");
                return Ok(WaitOutcome::Ready);
            }
            Ok(false) => match delays.next() {
                Some(delay) => {
                    debug!(
                        resource = %resource_name,
                        attempt = attempts,
                        delay_ms = delay.as_millis(),
                        "Resource not ready, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    debug!(resource = %resource_name, attempts, "Resource still not ready");
                    return Ok(WaitOutcome::TimedOut { attempts });
                }
            },
            Err(e) => {
                warn!(resource = %resource_name, error = ?e, "Resource check failed");
                return Err(e);
            }
        }
    }
}
