//! Missing-equipment cases
//!
//! A case tracks equipment that left the yard on a truck and did not come
//! back. Items are owned by their case and never shared between cases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::epc::Epc;
use crate::ids::{CaseId, CaseItemId, DriverId, EquipmentId, SiteId, TruckId};

/// Lifecycle status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Shortfall detected at exit
    Open,
    /// Truck returned and items are still outstanding
    Investigation,
    /// Everything came back, awaiting an operator close
    Recovered,
    /// Terminal
    Closed,
}

impl CaseStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, CaseStatus::Closed)
    }

    /// Check whether moving to `to` is a legal lifecycle step.
    ///
    /// Staying in the same non-terminal status is always allowed.
    pub fn can_transition_to(&self, to: CaseStatus) -> bool {
        use CaseStatus::*;
        match (self, to) {
            (Closed, _) => false,
            (from, to) if *from == to => true,
            (Open, Investigation) | (Open, Recovered) | (Open, Closed) => true,
            (Investigation, Recovered) | (Investigation, Closed) => true,
            (Recovered, Open) | (Recovered, Closed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseStatus::Open => write!(f, "open"),
            CaseStatus::Investigation => write!(f, "investigation"),
            CaseStatus::Recovered => write!(f, "recovered"),
            CaseStatus::Closed => write!(f, "closed"),
        }
    }
}

/// One missing unit within a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseItem {
    pub id: CaseItemId,
    pub case_id: CaseId,
    pub equipment_id: EquipmentId,
    pub epc: Epc,
    pub is_recovered: bool,
    pub recovered_at: Option<DateTime<Utc>>,
}

/// A missing-equipment case for one truck.
///
/// `version` is bumped by the store on every committed update and is used
/// for optimistic concurrency checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingEquipmentCase {
    pub id: CaseId,
    pub truck_id: TruckId,
    pub driver_id: Option<DriverId>,
    pub site_id: SiteId,
    pub status: CaseStatus,
    pub severity_id: u32,
    pub severity_code: String,
    pub opened_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<CaseItem>,
    #[serde(default)]
    pub version: u64,
}

impl MissingEquipmentCase {
    pub fn contains_epc(&self, epc: &Epc) -> bool {
        self.items.iter().any(|i| &i.epc == epc)
    }

    /// Append an item unless its EPC is already part of the case.
    ///
    /// Returns whether the item was added.
    pub fn add_item(&mut self, equipment_id: EquipmentId, epc: Epc) -> bool {
        if self.contains_epc(&epc) {
            return false;
        }
        self.items.push(CaseItem {
            id: CaseItemId::generate(),
            case_id: self.id,
            equipment_id,
            epc,
            is_recovered: false,
            recovered_at: None,
        });
        true
    }

    /// Mark every outstanding item whose EPC is in `seen` as recovered.
    ///
    /// Recovery is monotonic: already-recovered items keep their timestamp.
    /// Returns the EPCs recovered by this call.
    pub fn recover<'a, I>(&mut self, seen: I, at: DateTime<Utc>) -> Vec<Epc>
    where
        I: IntoIterator<Item = &'a Epc>,
    {
        let seen: Vec<&Epc> = seen.into_iter().collect();
        let mut recovered = Vec::new();
        for item in self.items.iter_mut().filter(|i| !i.is_recovered) {
            if seen.contains(&&item.epc) {
                item.is_recovered = true;
                item.recovered_at = Some(at);
                recovered.push(item.epc.clone());
            }
        }
        recovered
    }

    pub fn outstanding(&self) -> impl Iterator<Item = &CaseItem> {
        self.items.iter().filter(|i| !i.is_recovered)
    }

    pub fn all_recovered(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|i| i.is_recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case() -> MissingEquipmentCase {
        let now = Utc::now();
        MissingEquipmentCase {
            id: CaseId::generate(),
            truck_id: TruckId::generate(),
            driver_id: None,
            site_id: SiteId::generate(),
            status: CaseStatus::Open,
            severity_id: 1,
            severity_code: "Low".to_string(),
            opened_at: now,
            last_seen_at: now,
            closed_at: None,
            items: Vec::new(),
            version: 0,
        }
    }

    fn epc(s: &str) -> Epc {
        Epc::parse(s).unwrap()
    }

    #[test]
    fn test_status_transitions() {
        use CaseStatus::*;
        assert!(Open.can_transition_to(Investigation));
        assert!(Open.can_transition_to(Closed));
        assert!(Investigation.can_transition_to(Investigation));
        assert!(Recovered.can_transition_to(Open));
        assert!(!Investigation.can_transition_to(Open));
        assert!(!Closed.can_transition_to(Open));
        assert!(!Closed.can_transition_to(Closed));
    }

    #[test]
    fn test_add_item_deduplicates_epc() {
        let mut c = case();
        assert!(c.add_item(EquipmentId::generate(), epc("e1")));
        assert!(!c.add_item(EquipmentId::generate(), epc("E1")));
        assert_eq!(c.items.len(), 1);
    }

    #[test]
    fn test_recovery_is_monotonic() {
        let mut c = case();
        c.add_item(EquipmentId::generate(), epc("E1"));
        c.add_item(EquipmentId::generate(), epc("E2"));

        let first = Utc::now();
        let recovered = c.recover([&epc("E1")], first);
        assert_eq!(recovered, vec![epc("E1")]);
        assert!(!c.all_recovered());

        let later = first + chrono::Duration::minutes(5);
        let recovered = c.recover([&epc("E1"), &epc("E2")], later);
        assert_eq!(recovered, vec![epc("E2")]);
        assert!(c.all_recovered());
        assert_eq!(c.items[0].recovered_at, Some(first));
    }

    #[test]
    fn test_empty_case_is_not_recovered() {
        assert!(!case().all_recovered());
    }
}
