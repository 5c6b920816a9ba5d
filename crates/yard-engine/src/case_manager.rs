//! Missing-equipment case lifecycle
//!
//! One truck has at most one case that is not closed. Every accepted
//! crossing recovers the case items whose EPCs were scanned. An exit with a
//! shortfall opens a case, or adds the new units to the existing one. An
//! entry that still leaves items outstanding moves an open case into
//! investigation. Once every item is back the case is closed, or parked in
//! `Recovered` for an operator when auto-close is off.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use yard_types::{
    CaseId, CaseStatus, Direction, Epc, MissingEquipmentCase, SiteId, Truck,
};

use crate::error::{EngineError, EngineResult};
use crate::identity::CatalogIndex;
use crate::kit::KitReport;
use crate::severity::SeverityClassifier;

/// A case write computed for one crossing.
#[derive(Debug, Clone)]
pub struct CaseChange {
    pub case: MissingEquipmentCase,
    /// Stored version the update applies to; `None` for a new case
    pub expected_version: Option<u64>,
    pub previous_status: Option<CaseStatus>,
    /// EPCs appended by this crossing
    pub added: Vec<Epc>,
    /// EPCs recovered by this crossing
    pub recovered: Vec<Epc>,
}

impl CaseChange {
    pub fn is_new(&self) -> bool {
        self.expected_version.is_none()
    }

    pub fn status_changed(&self) -> bool {
        self.previous_status != Some(self.case.status)
    }

    pub fn summary(&self) -> CaseSummary {
        CaseSummary {
            case_id: self.case.id,
            previous_status: self.previous_status,
            status: self.case.status,
            severity_code: self.case.severity_code.clone(),
            added: self.added.clone(),
            recovered: self.recovered.clone(),
        }
    }
}

/// Reportable view of a [`CaseChange`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSummary {
    pub case_id: CaseId,
    pub previous_status: Option<CaseStatus>,
    pub status: CaseStatus,
    pub severity_code: String,
    pub added: Vec<Epc>,
    pub recovered: Vec<Epc>,
}

/// Drives the case state machine for one truck.
#[derive(Debug, Clone)]
pub struct CaseManager {
    severity: SeverityClassifier,
    auto_close: bool,
}

impl CaseManager {
    pub fn new(severity: SeverityClassifier, auto_close: bool) -> Self {
        Self {
            severity,
            auto_close,
        }
    }

    /// Compute the case write for a crossing, if any.
    ///
    /// `existing` must be the truck's current non-closed case.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        existing: Option<MissingEquipmentCase>,
        direction: Direction,
        scanned: &[Epc],
        kit: &KitReport,
        truck: &Truck,
        site_id: SiteId,
        catalog: &CatalogIndex,
        at: DateTime<Utc>,
    ) -> EngineResult<Option<CaseChange>> {
        let previous_status = existing.as_ref().map(|c| c.status);
        let expected_version = existing.as_ref().map(|c| c.version);
        let mut touched = false;
        let mut added = Vec::new();
        let mut recovered = Vec::new();

        let mut case = existing;
        if let Some(case) = case.as_mut() {
            recovered = case.recover(scanned, at);
            if !recovered.is_empty() {
                case.last_seen_at = at;
                touched = true;
            }
        }

        let mut reprice = false;
        match direction {
            Direction::Exit if kit.has_shortfall() => {
                let case = case.get_or_insert_with(|| new_case(truck, site_id, at));
                if case.status == CaseStatus::Recovered {
                    case.status = CaseStatus::Open;
                }
                for unit in &kit.missing {
                    if case.add_item(unit.equipment_id, unit.epc.clone()) {
                        added.push(unit.epc.clone());
                    }
                }
                case.last_seen_at = at;
                touched = true;
                reprice = !added.is_empty();
            }
            Direction::Entry => {
                if let Some(case) = case.as_mut() {
                    if case.outstanding().next().is_some() {
                        if case.status == CaseStatus::Open {
                            case.status = CaseStatus::Investigation;
                            reprice = true;
                        }
                        case.last_seen_at = at;
                        touched = true;
                    }
                }
            }
            Direction::Exit => {}
        }

        let Some(mut case) = case else {
            return Ok(None);
        };
        if !touched {
            return Ok(None);
        }

        if case.all_recovered() {
            if self.auto_close {
                case.status = CaseStatus::Closed;
                case.closed_at = Some(at);
            } else {
                case.status = CaseStatus::Recovered;
            }
        } else if reprice || !recovered.is_empty() || expected_version.is_none() {
            let cost = SeverityClassifier::outstanding_cost(&case, catalog);
            let tier = self.severity.classify(cost)?;
            case.severity_id = tier.id;
            case.severity_code = tier.code.clone();
        }

        if let Some(from) = previous_status {
            if !from.can_transition_to(case.status) {
                return Err(EngineError::InvalidTransition {
                    case_id: case.id,
                    from,
                    to: case.status,
                });
            }
        }

        Ok(Some(CaseChange {
            case,
            expected_version,
            previous_status,
            added,
            recovered,
        }))
    }

    /// Operator close of a case.
    pub fn close(
        &self,
        mut case: MissingEquipmentCase,
        at: DateTime<Utc>,
    ) -> EngineResult<CaseChange> {
        let from = case.status;
        if from.is_closed() || !from.can_transition_to(CaseStatus::Closed) {
            return Err(EngineError::InvalidTransition {
                case_id: case.id,
                from,
                to: CaseStatus::Closed,
            });
        }
        let expected_version = case.version;
        case.status = CaseStatus::Closed;
        case.closed_at = Some(at);
        Ok(CaseChange {
            case,
            expected_version: Some(expected_version),
            previous_status: Some(from),
            added: Vec::new(),
            recovered: Vec::new(),
        })
    }
}

fn new_case(truck: &Truck, site_id: SiteId, at: DateTime<Utc>) -> MissingEquipmentCase {
    MissingEquipmentCase {
        id: CaseId::generate(),
        truck_id: truck.id,
        driver_id: truck.driver_id,
        site_id,
        status: CaseStatus::Open,
        severity_id: 0,
        severity_code: String::new(),
        opened_at: at,
        last_seen_at: at,
        closed_at: None,
        items: Vec::new(),
        version: 0,
    }
}
