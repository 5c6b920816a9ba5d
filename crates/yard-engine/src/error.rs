use thiserror::Error;
use yard_store::StorageError;
use yard_types::{CaseId, CaseStatus, SeverityConfigError};

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the reconciliation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid severity table: {0}")]
    SeverityConfig(#[from] SeverityConfigError),

    /// No configured tier covers a missing-equipment cost.
    #[error("no severity tier covers missing cost of {amount_minor} minor units")]
    SeverityUnmapped { amount_minor: i64 },

    #[error("gave up after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("case not found: {0}")]
    CaseNotFound(CaseId),

    #[error("case {case_id} cannot move from {from} to {to}")]
    InvalidTransition {
        case_id: CaseId,
        from: CaseStatus,
        to: CaseStatus,
    },
}

impl EngineError {
    /// Whether reloading state and recomputing may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Storage(e) if e.is_conflict())
    }
}
