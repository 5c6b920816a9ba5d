//! Engine configuration

use serde::{Deserialize, Serialize};
use yard_types::{AlertRules, SeverityTable, TierSpec};

use crate::error::{EngineError, EngineResult};

/// Configuration of one reconciliation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How far back to pull unprocessed scans
    #[serde(default = "default_lookback_minutes")]
    pub lookback_minutes: u32,

    /// Largest gap between two reads of the same session
    #[serde(default = "default_session_window_secs")]
    pub session_window_secs: u32,

    /// Same-direction crossings closer than this are treated as duplicates
    #[serde(default = "default_duplicate_suppression_minutes")]
    pub duplicate_suppression_minutes: u32,

    /// Age after which another run may take over a claimed scan
    #[serde(default = "default_claim_lease_secs")]
    pub claim_lease_secs: u64,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Close a case outright once every item is back, instead of parking it
    /// in `Recovered` for an operator
    #[serde(default = "default_true")]
    pub auto_close_on_recovery: bool,

    #[serde(default = "SeverityTable::default_specs")]
    pub severity_tiers: Vec<TierSpec>,

    /// Rules stored when the store has none yet
    #[serde(default)]
    pub alert_defaults: AlertRules,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookback_minutes: default_lookback_minutes(),
            session_window_secs: default_session_window_secs(),
            duplicate_suppression_minutes: default_duplicate_suppression_minutes(),
            claim_lease_secs: default_claim_lease_secs(),
            retry: RetryPolicy::default(),
            auto_close_on_recovery: true,
            severity_tiers: SeverityTable::default_specs(),
            alert_defaults: AlertRules::default(),
        }
    }
}

impl EngineConfig {
    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.lookback_minutes))
    }

    pub fn session_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.session_window_secs))
    }

    pub fn duplicate_suppression(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.duplicate_suppression_minutes))
    }

    pub fn claim_lease(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.claim_lease_secs).unwrap_or(i64::MAX))
    }

    /// Parse and validate the configured severity tiers.
    pub fn severity_table(&self) -> EngineResult<SeverityTable> {
        Ok(SeverityTable::from_specs(&self.severity_tiers)?)
    }

    /// Reject settings a run cannot work with, then build the severity
    /// table.
    pub fn validate(&self) -> EngineResult<SeverityTable> {
        if self.session_window_secs == 0 {
            return Err(EngineError::Configuration(
                "session_window_secs must be at least 1".to_string(),
            ));
        }
        if self.lookback_minutes == 0 {
            return Err(EngineError::Configuration(
                "lookback_minutes must be at least 1".to_string(),
            ));
        }
        if self.claim_lease_secs == 0 {
            return Err(EngineError::Configuration(
                "claim_lease_secs must be at least 1".to_string(),
            ));
        }
        self.severity_table()
    }
}

/// Bounded retry of a unit of work after a concurrency conflict.
///
/// Attempt `n` (1-based) that fails is followed by a sleep of
/// `backoff_ms * n` before attempt `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> std::time::Duration {
        std::time::Duration::from_millis(self.backoff_ms.saturating_mul(u64::from(attempt)))
    }

    /// Number of attempts, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_lookback_minutes() -> u32 {
    30
}

fn default_session_window_secs() -> u32 {
    15
}

fn default_duplicate_suppression_minutes() -> u32 {
    120
}

fn default_claim_lease_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    50
}
