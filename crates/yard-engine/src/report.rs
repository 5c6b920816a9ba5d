//! Per-run reporting

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use yard_types::{CaseStatus, CrossingId, Direction, RunId, SessionKey, TruckId};

use crate::case_manager::CaseSummary;
use crate::classifier::RejectReason;
use crate::identity::DiscardReason;
use crate::kit::KitReport;
use crate::late_return::LateReturnReport;

/// A session that became a gate crossing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedCrossing {
    pub crossing_id: CrossingId,
    pub truck_id: TruckId,
    pub direction: Direction,
    pub kit: KitReport,
    pub case: Option<CaseSummary>,
    pub alerts_emitted: usize,
    pub assignments_opened: usize,
    pub assignments_closed: usize,
}

/// What happened to one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    Accepted(Box<AcceptedCrossing>),
    Rejected {
        truck_id: Option<TruckId>,
        reason: RejectReason,
    },
    Discarded {
        reason: DiscardReason,
    },
}

/// A session whose unit of work failed; its scans were released.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionFailure {
    pub session_key: SessionKey,
    pub error: String,
}

/// Summary of one reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub scans_claimed: usize,
    pub sessions_built: usize,
    pub crossings_created: usize,
    pub rejected: BTreeMap<RejectReason, usize>,
    pub discarded: BTreeMap<DiscardReason, usize>,
    pub cases_opened: usize,
    pub cases_escalated: usize,
    pub cases_reopened: usize,
    pub cases_recovered: usize,
    pub cases_closed: usize,
    pub items_recovered: usize,
    pub alerts_emitted: usize,
    pub assignments_opened: usize,
    pub assignments_closed: usize,
    pub late_returns: LateReturnReport,
    pub failures: Vec<SessionFailure>,
    /// Sessions held back because an earlier session of their truck failed
    #[serde(default)]
    pub sessions_deferred: usize,
}

impl RunReport {
    pub fn new(run_id: RunId, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: None,
            scans_claimed: 0,
            sessions_built: 0,
            crossings_created: 0,
            rejected: BTreeMap::new(),
            discarded: BTreeMap::new(),
            cases_opened: 0,
            cases_escalated: 0,
            cases_reopened: 0,
            cases_recovered: 0,
            cases_closed: 0,
            items_recovered: 0,
            alerts_emitted: 0,
            assignments_opened: 0,
            assignments_closed: 0,
            late_returns: LateReturnReport::default(),
            failures: Vec::new(),
            sessions_deferred: 0,
        }
    }

    pub fn record(&mut self, outcome: &SessionOutcome) {
        match outcome {
            SessionOutcome::Accepted(accepted) => {
                self.crossings_created += 1;
                self.alerts_emitted += accepted.alerts_emitted;
                self.assignments_opened += accepted.assignments_opened;
                self.assignments_closed += accepted.assignments_closed;
                if let Some(case) = &accepted.case {
                    self.record_case(case);
                }
            }
            SessionOutcome::Rejected { reason, .. } => {
                *self.rejected.entry(*reason).or_default() += 1;
            }
            SessionOutcome::Discarded { reason } => {
                *self.discarded.entry(*reason).or_default() += 1;
            }
        }
    }

    pub fn record_case(&mut self, case: &CaseSummary) {
        self.items_recovered += case.recovered.len();
        if case.previous_status == Some(case.status) {
            return;
        }
        match (case.previous_status, case.status) {
            (None, _) => self.cases_opened += 1,
            (Some(CaseStatus::Recovered), CaseStatus::Open) => self.cases_reopened += 1,
            (_, CaseStatus::Investigation) => self.cases_escalated += 1,
            (_, CaseStatus::Recovered) => self.cases_recovered += 1,
            (_, CaseStatus::Closed) => self.cases_closed += 1,
            _ => {}
        }
    }

    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    pub fn discarded_total(&self) -> usize {
        self.discarded.values().sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.sessions_deferred == 0 && self.late_returns.failed == 0
    }
}
