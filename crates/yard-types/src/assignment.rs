//! Equipment custody

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AssignmentId, EquipmentId, SiteId, TruckId};

/// Custody of one equipment unit by one truck.
///
/// Active while `returned_at` is unset. At most one active assignment may
/// exist per (truck, equipment) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentAssignment {
    pub id: AssignmentId,
    pub truck_id: TruckId,
    pub equipment_id: EquipmentId,
    pub site_id: SiteId,
    pub assigned_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: u64,
}

impl EquipmentAssignment {
    pub fn open(
        truck_id: TruckId,
        equipment_id: EquipmentId,
        site_id: SiteId,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AssignmentId::generate(),
            truck_id,
            equipment_id,
            site_id,
            assigned_at: at,
            returned_at: None,
            version: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }
}
