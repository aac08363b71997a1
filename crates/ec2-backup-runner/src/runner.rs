//! Lifecycle runner: creation first, then the sweep

use crate::aws::{AwsContext, Ec2Client, Ec2Operations, FromAwsContext};
use crate::config::{BackupConfig, LifecycleKind};
use crate::creator::{CreationReport, CreatorOptions, ImageCreator, SnapshotCreator};
use crate::sweeper::{ImageSweeper, StandaloneSnapshotSweeper, SweepOptions, SweepReport};
use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

/// Status reported by a completed invocation
pub const STATUS_SUCCESSFUL: &str = "successful";

/// Outcome of one lifecycle invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub lifecycle: LifecycleKind,
    pub creation: CreationReport,
    /// `None` when the sweep was disabled
    pub sweep: Option<SweepReport>,
}

impl RunReport {
    /// Always `successful`; per-artifact failures do not change it
    pub fn status(&self) -> &'static str {
        STATUS_SUCCESSFUL
    }

    /// Per-artifact failures across creation and the sweep
    pub fn failures(&self) -> usize {
        self.creation.failed + self.sweep.as_ref().map_or(0, |s| s.failed)
    }
}

/// Runs the configured lifecycle against an EC2 gateway
pub struct LifecycleRunner<E> {
    ec2: E,
    config: BackupConfig,
}

impl<E: Ec2Operations> LifecycleRunner<E> {
    pub fn new(ec2: E, config: BackupConfig) -> Self {
        Self { ec2, config }
    }

    pub fn ec2(&self) -> &E {
        &self.ec2
    }

    /// Run creation and then the sweep, as of `now`.
    ///
    /// Only listing failures abort the invocation; per-artifact failures are
    /// reported in the returned [`RunReport`].
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let today = now.date_naive();
        let config = &self.config;
        info!(
            lifecycle = ?config.lifecycle,
            today = %today,
            dry_run = config.dry_run,
            "Starting backup lifecycle"
        );

        let creator_options = CreatorOptions {
            retention: config.retention.retention_policy(),
            wait: config.wait,
            dry_run: config.dry_run,
        };
        let creation = match config.lifecycle {
            LifecycleKind::Image => {
                ImageCreator::new(&self.ec2, creator_options)
                    .run(today)
                    .await?
            }
            LifecycleKind::Snapshot => {
                SnapshotCreator::new(&self.ec2, creator_options)
                    .run(today)
                    .await?
            }
        };
        info!(
            created = creation.created,
            skipped = creation.skipped,
            failed = creation.failed,
            timed_out = creation.timed_out,
            "Creation complete"
        );

        let sweep = if config.skip_sweep {
            info!("Sweep disabled, skipping");
            None
        } else {
            let sweep_options = SweepOptions {
                expiry: config.retention.expiry_policy(),
                dry_run: config.dry_run,
            };
            let report = match config.lifecycle {
                LifecycleKind::Image => {
                    ImageSweeper::new(&self.ec2, sweep_options)
                        .run(today)
                        .await?
                }
                LifecycleKind::Snapshot => {
                    StandaloneSnapshotSweeper::new(&self.ec2, sweep_options)
                        .run(today)
                        .await?
                }
            };
            Some(report)
        };

        Ok(RunReport {
            lifecycle: config.lifecycle,
            creation,
            sweep,
        })
    }
}

/// Run the lifecycle against real AWS using `config`
pub async fn run_lifecycle(config: BackupConfig) -> Result<RunReport> {
    config.validate()?;

    let aws = AwsContext::with_profile(&config.aws.region, config.aws.profile.as_deref()).await;
    info!(region = %aws.region(), "Using AWS region");

    let runner = LifecycleRunner::new(Ec2Client::from_context(&aws), config);
    runner.run(Utc::now()).await
}
