//! ec2-backup - retention-based EC2 backup lifecycle
//!
//! Creates images or volume snapshots of tagged running instances, stamps
//! them with an expiration date, and sweeps expired artifacts while keeping
//! image-backing snapshots until their image is gone.

pub mod aws;
pub mod config;
pub mod creator;
pub mod error;
pub mod runner;
pub mod sweeper;
pub mod wait;

pub use runner::{LifecycleRunner, RunReport, run_lifecycle};
