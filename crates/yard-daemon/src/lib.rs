//! Yard Daemon library
//!
//! Components of the `yardd` reconciliation daemon:
//! - layered configuration
//! - interval scheduler with heartbeat
//! - startup fixtures for the in-memory store

pub mod config;
pub mod error;
pub mod scheduler;
pub mod seed;

pub use config::{DaemonConfig, LoggingConfig, SchedulerConfig, SeedConfig};
pub use error::{DaemonError, DaemonResult};
pub use scheduler::{Heartbeat, Scheduler};
pub use seed::CatalogSeed;
