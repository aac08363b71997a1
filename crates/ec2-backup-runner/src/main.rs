//! ec2-backup: retention-based EC2 backup lifecycle
//!
//! Meant to be triggered by a scheduler. Every flag can also be supplied
//! through an `EC2_BACKUP_*` environment variable, so a scheduled
//! invocation needs no arguments at all.

use anyhow::Result;
use clap::Parser;
use ec2_backup::config::{AwsConfig, BackupConfig, LifecycleKind, RetentionConfig};
use ec2_backup::run_lifecycle;
use ec2_backup::wait::WaitPolicy;
use ec2_backup_common::ExpiryRule;
use ec2_backup_common::defaults::{
    DEFAULT_HORIZON_DAYS, DEFAULT_REGION, DEFAULT_RETENTION_DAYS, DEFAULT_WAIT_DELAY_SECS,
    DEFAULT_WAIT_MAX_ATTEMPTS,
};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "ec2-backup")]
#[command(about = "Create and expire EC2 images and snapshots based on instance tags")]
#[command(version)]
struct Args {
    /// JSON configuration file; when given, it replaces the other settings
    /// except --dry-run and --skip-sweep
    #[arg(long, env = "EC2_BACKUP_CONFIG")]
    config: Option<PathBuf>,

    /// AWS region
    #[arg(long, env = "EC2_BACKUP_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// AWS profile to use (overrides AWS_PROFILE env var)
    #[arg(long, env = "EC2_BACKUP_AWS_PROFILE")]
    aws_profile: Option<String>,

    /// Which artifact to create and sweep
    #[arg(long, env = "EC2_BACKUP_LIFECYCLE", value_enum, default_value_t = LifecycleKind::Image)]
    lifecycle: LifecycleKind,

    /// Retention in days for instances without a usable Retention tag
    #[arg(long, env = "EC2_BACKUP_DEFAULT_RETENTION_DAYS", default_value_t = DEFAULT_RETENTION_DAYS)]
    default_retention_days: u32,

    /// Age in days after which the sweep treats an artifact as expired
    #[arg(long, env = "EC2_BACKUP_HORIZON_DAYS", default_value_t = DEFAULT_HORIZON_DAYS)]
    horizon_days: u32,

    /// Expiry rule: "horizon" (artifact age) or "delete-on-tag" (DeleteOn date)
    #[arg(long, env = "EC2_BACKUP_EXPIRY_RULE", default_value_t = ExpiryRule::Horizon)]
    expiry_rule: ExpiryRule,

    /// Seconds between readiness checks
    #[arg(long, env = "EC2_BACKUP_WAIT_DELAY_SECS", default_value_t = DEFAULT_WAIT_DELAY_SECS)]
    wait_delay_secs: u64,

    /// Readiness checks before giving up on an artifact
    #[arg(long, env = "EC2_BACKUP_WAIT_MAX_ATTEMPTS", default_value_t = DEFAULT_WAIT_MAX_ATTEMPTS)]
    wait_max_attempts: u32,

    /// Log what would be created and deleted without changing anything
    #[arg(long, env = "EC2_BACKUP_DRY_RUN")]
    dry_run: bool,

    /// Only create artifacts, do not sweep expired ones
    #[arg(long, env = "EC2_BACKUP_SKIP_SWEEP")]
    skip_sweep: bool,
}

impl Args {
    fn into_config(self) -> Result<BackupConfig> {
        let config = match self.config {
            Some(path) => {
                let mut config = BackupConfig::load(&path)?;
                config.dry_run |= self.dry_run;
                config.skip_sweep |= self.skip_sweep;
                config
            }
            None => {
                let config = BackupConfig {
                    aws: AwsConfig {
                        region: self.region,
                        profile: self.aws_profile,
                    },
                    lifecycle: self.lifecycle,
                    retention: RetentionConfig {
                        default_days: self.default_retention_days,
                        horizon_days: self.horizon_days,
                        expiry_rule: self.expiry_rule,
                    },
                    wait: WaitPolicy::new(self.wait_delay_secs, self.wait_max_attempts),
                    dry_run: self.dry_run,
                    skip_sweep: self.skip_sweep,
                };
                config.validate()?;
                config
            }
        };
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    // Reduce noise from the AWS SDK (show only warnings and errors)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
                .add_directive("aws_config=warn".parse()?)
                .add_directive("aws_sdk_ec2=warn".parse()?)
                .add_directive("aws_smithy_runtime=warn".parse()?),
        )
        .init();

    let config = args.into_config()?;
    if let Some(profile) = &config.aws.profile {
        info!(profile = %profile, "Using AWS profile");
    }

    let report = run_lifecycle(config).await?;
    info!(?report, "Backup lifecycle finished");
    if report.failures() > 0 {
        warn!(
            failures = report.failures(),
            creation_failed = report.creation.failed,
            sweep_failed = report.sweep.as_ref().map_or(0, |s| s.failed),
            "Backup lifecycle finished with failures"
        );
    }

    println!("{}", report.status());
    Ok(())
}
