//! Buffered writes applied in one transaction.

use chrono::{DateTime, Utc};
use yard_types::{
    Alert, AlertId, AlertRules, AssignmentId, EquipmentAssignment, GateCrossing,
    MissingEquipmentCase, RunId, ScanId,
};

/// Write against a missing-equipment case.
#[derive(Debug, Clone)]
pub enum CaseWrite {
    /// Create a case. Fails if the truck already has a non-closed case.
    Insert(MissingEquipmentCase),
    /// Replace a case whose stored version still equals `expected_version`.
    Update {
        case: MissingEquipmentCase,
        expected_version: u64,
    },
}

/// Write against a custody assignment.
#[derive(Debug, Clone)]
pub enum AssignmentWrite {
    /// Open custody. Fails if the pair already has an active assignment.
    Open(EquipmentAssignment),
    /// Close an active assignment still at `expected_version`.
    Close {
        id: AssignmentId,
        expected_version: u64,
        returned_at: DateTime<Utc>,
    },
}

/// Write against an alert.
#[derive(Debug, Clone)]
pub enum AlertWrite {
    /// Insert an alert. Fails if its dedup key is already taken.
    Insert(Alert),
    /// Supersede an unresolved alert in place.
    Refresh {
        id: AlertId,
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// Resolve an alert.
    Resolve { id: AlertId, at: DateTime<Utc> },
}

/// Everything one unit of work wants to persist.
///
/// Nothing is written until the set is handed to
/// [`UnitOfWork::commit`](crate::UnitOfWork::commit), which applies all of it
/// or none of it.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub(crate) crossings: Vec<GateCrossing>,
    pub(crate) cases: Vec<CaseWrite>,
    pub(crate) assignments: Vec<AssignmentWrite>,
    pub(crate) alerts: Vec<AlertWrite>,
    pub(crate) processed: Option<ProcessedScans>,
    pub(crate) alert_rules: Option<AlertRules>,
}

#[derive(Debug, Clone)]
pub(crate) struct ProcessedScans {
    pub run_id: RunId,
    pub scan_ids: Vec<ScanId>,
    pub at: DateTime<Utc>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_crossing(&mut self, crossing: GateCrossing) -> &mut Self {
        self.crossings.push(crossing);
        self
    }

    pub fn insert_case(&mut self, case: MissingEquipmentCase) -> &mut Self {
        self.cases.push(CaseWrite::Insert(case));
        self
    }

    pub fn update_case(&mut self, case: MissingEquipmentCase, expected_version: u64) -> &mut Self {
        self.cases.push(CaseWrite::Update {
            case,
            expected_version,
        });
        self
    }

    pub fn open_assignment(&mut self, assignment: EquipmentAssignment) -> &mut Self {
        self.assignments.push(AssignmentWrite::Open(assignment));
        self
    }

    pub fn close_assignment(
        &mut self,
        id: AssignmentId,
        expected_version: u64,
        returned_at: DateTime<Utc>,
    ) -> &mut Self {
        self.assignments.push(AssignmentWrite::Close {
            id,
            expected_version,
            returned_at,
        });
        self
    }

    pub fn insert_alert(&mut self, alert: Alert) -> &mut Self {
        self.alerts.push(AlertWrite::Insert(alert));
        self
    }

    pub fn refresh_alert(
        &mut self,
        id: AlertId,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> &mut Self {
        self.alerts.push(AlertWrite::Refresh {
            id,
            message: message.into(),
            timestamp,
        });
        self
    }

    pub fn resolve_alert(&mut self, id: AlertId, at: DateTime<Utc>) -> &mut Self {
        self.alerts.push(AlertWrite::Resolve { id, at });
        self
    }

    /// Mark scans as consumed. They must still be claimed by `run_id`.
    pub fn mark_processed(
        &mut self,
        run_id: RunId,
        scan_ids: impl IntoIterator<Item = ScanId>,
        at: DateTime<Utc>,
    ) -> &mut Self {
        match &mut self.processed {
            Some(existing) if existing.run_id == run_id => {
                existing.scan_ids.extend(scan_ids);
                existing.at = at;
            }
            _ => {
                self.processed = Some(ProcessedScans {
                    run_id,
                    scan_ids: scan_ids.into_iter().collect(),
                    at,
                });
            }
        }
        self
    }

    /// Store the alert rules if no rules exist yet.
    pub fn ensure_alert_rules(&mut self, rules: AlertRules) -> &mut Self {
        self.alert_rules = Some(rules);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.crossings.is_empty()
            && self.cases.is_empty()
            && self.assignments.is_empty()
            && self.alerts.is_empty()
            && self.processed.is_none()
            && self.alert_rules.is_none()
    }
}

/// Counts of what a commit applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    pub crossings: usize,
    pub cases: usize,
    pub assignments: usize,
    pub alerts: usize,
    pub scans_processed: usize,
}
