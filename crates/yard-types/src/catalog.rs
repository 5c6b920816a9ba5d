//! Master data read by the engine
//!
//! Readers, trucks, equipment and kit templates are owned by the
//! management surface; the engine only reads them.

use serde::{Deserialize, Serialize};

use crate::crossing::Direction;
use crate::epc::Epc;
use crate::ids::{DriverId, EquipmentId, EquipmentTypeId, ReaderId, SiteId, TruckId};

/// How a reader decides the direction of a crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderMode {
    /// Every crossing is an entry
    Entry,
    /// Every crossing is an exit
    Exit,
    /// Direction is inferred from the truck's previous crossing
    Bidirectional,
}

impl ReaderMode {
    /// Interpret a configured direction string ("ENTRY", "EXIT", "BOTH").
    ///
    /// Unset or unrecognised values fall back to entry-only.
    pub fn from_direction(direction: Option<&str>) -> Self {
        match direction.map(|d| d.trim().to_ascii_uppercase()).as_deref() {
            Some("EXIT") => ReaderMode::Exit,
            Some("BOTH") | Some("BIDIRECTIONAL") => ReaderMode::Bidirectional,
            _ => ReaderMode::Entry,
        }
    }

    /// The direction this reader always yields, if fixed.
    pub fn fixed_direction(&self) -> Option<Direction> {
        match self {
            ReaderMode::Entry => Some(Direction::Entry),
            ReaderMode::Exit => Some(Direction::Exit),
            ReaderMode::Bidirectional => None,
        }
    }
}

/// A gate reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reader {
    pub id: ReaderId,
    pub name: String,
    pub site_id: SiteId,
    pub mode: ReaderMode,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A truck and the tag mounted on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Truck {
    pub id: TruckId,
    pub number: String,
    pub driver_id: Option<DriverId>,
    pub site_id: SiteId,
    pub tag: Epc,
}

/// One tagged equipment unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equipment {
    pub id: EquipmentId,
    pub name: String,
    pub equipment_type_id: EquipmentTypeId,
    pub tag: Epc,
    /// Replacement value in minor currency units
    #[serde(default)]
    pub cost_minor: i64,
}

/// Expected-contents line for a truck: `required_count` units of a type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KitTemplate {
    pub truck_id: TruckId,
    pub equipment_type_id: EquipmentTypeId,
    pub required_count: u32,
    pub site_id: SiteId,
}

fn default_true() -> bool {
    true
}
