//! Yard Engine - RFID scan reconciliation
//!
//! The engine periodically consumes raw tag reads and turns them into gate
//! crossings, custody changes, missing-equipment cases and alerts.
//!
//! Per run, in order:
//! 1. claim unprocessed scans ([`yard_store::ScanStore::claim_unprocessed`])
//! 2. group them into per-reader sessions ([`session`])
//! 3. bind each session to one truck and its equipment ([`identity`])
//! 4. classify entry or exit and enforce alternation ([`classifier`])
//! 5. compare against the truck's kit ([`kit`]) and update custody ([`ledger`])
//! 6. price the shortfall ([`severity`]) and drive the case ([`case_manager`])
//! 7. raise deduplicated alerts ([`alerts`], [`late_return`])
//!
//! Each session is committed as one [`yard_store::ChangeSet`].

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod alerts;
pub mod case_manager;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod ingest;
pub mod kit;
pub mod late_return;
pub mod ledger;
pub mod report;
pub mod retry;
pub mod session;
pub mod severity;

pub use case_manager::{CaseChange, CaseManager, CaseSummary};
pub use classifier::{CrossingHistory, GateClassifier, RejectReason};
pub use config::{EngineConfig, RetryPolicy};
pub use engine::ReconciliationEngine;
pub use error::{EngineError, EngineResult};
pub use identity::{CatalogIndex, DiscardReason, ResolvedSession};
pub use ingest::{IngestReceipt, ScanIngestor};
pub use kit::{KitLine, KitReport, MissingUnit};
pub use late_return::LateReturnReport;
pub use report::{AcceptedCrossing, RunReport, SessionFailure, SessionOutcome};
pub use session::{ScanSession, SessionBuilder};
pub use severity::SeverityClassifier;
