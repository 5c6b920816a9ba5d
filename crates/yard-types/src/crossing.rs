//! Gate crossings

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::epc::Epc;
use crate::ids::{
    CrossingId, CrossingItemId, DriverId, EquipmentId, ReaderId, ScanId, SiteId, TruckId,
};

/// Direction of a crossing through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Entry,
    Exit,
}

impl Direction {
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Entry => Direction::Exit,
            Direction::Exit => Direction::Entry,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Entry => write!(f, "entry"),
            Direction::Exit => write!(f, "exit"),
        }
    }
}

/// Identity of the physical session a crossing was reconciled from.
///
/// Built from the reader and the first scan of the session, so replaying the
/// same scans always yields the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(reader_id: &ReaderId, first_scan: &ScanId) -> Self {
        Self(format!("{}/{}", reader_id.as_uuid(), first_scan.as_uuid()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One reconciled crossing of a truck through a gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateCrossing {
    pub id: CrossingId,
    pub session_key: SessionKey,
    pub truck_id: TruckId,
    pub driver_id: Option<DriverId>,
    pub reader_id: ReaderId,
    pub site_id: SiteId,
    pub event_time: DateTime<Utc>,
    pub direction: Direction,
    /// Review status, owned by downstream review
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<GateCrossingItem>,
}

impl GateCrossing {
    /// UTC calendar day the crossing belongs to.
    pub fn day(&self) -> NaiveDate {
        self.event_time.date_naive()
    }

    pub fn epcs(&self) -> impl Iterator<Item = &Epc> {
        self.items.iter().map(|i| &i.epc)
    }
}

/// One equipment unit recognised within a crossing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateCrossingItem {
    pub id: CrossingItemId,
    pub crossing_id: CrossingId,
    pub equipment_id: EquipmentId,
    pub epc: Epc,
    pub site_id: SiteId,
}
