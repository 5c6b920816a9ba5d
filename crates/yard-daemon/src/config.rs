//! Configuration for yardd

use serde::{Deserialize, Serialize};
use yard_engine::EngineConfig;

use crate::error::{DaemonError, DaemonResult};

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Reconciliation engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Master data and scan fixtures loaded at startup
    #[serde(default)]
    pub seed: SeedConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between reconciliation runs
    #[serde(default = "default_run_interval")]
    pub run_interval_secs: u64,

    /// Sweep for overdue trucks after every run
    #[serde(default = "default_true")]
    pub late_return_enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            run_interval_secs: default_run_interval(),
            late_return_enabled: true,
        }
    }
}

/// Files loaded into the in-memory store before the first run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedConfig {
    /// JSON catalog of readers, trucks, equipment and kit templates
    #[serde(default)]
    pub catalog_path: Option<String>,

    /// JSON array of scan batches to ingest
    #[serde(default)]
    pub scans_path: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_run_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then `YARD_`
    /// environment variables (`__` between nested keys).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // e.g. YARD_SCHEDULER__RUN_INTERVAL_SECS=30
        builder = builder.add_source(
            config::Environment::with_prefix("YARD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Reject settings the daemon cannot run with.
    ///
    /// Engine settings, including the severity table, are checked here so a
    /// bad table stops startup instead of the first run.
    pub fn validate(&self) -> DaemonResult<()> {
        if self.scheduler.run_interval_secs == 0 {
            return Err(DaemonError::Config(
                "scheduler.run_interval_secs must be at least 1".to_string(),
            ));
        }
        self.engine.validate()?;
        Ok(())
    }
}
