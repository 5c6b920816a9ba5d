//! Identity resolution
//!
//! Master data is loaded once per run into a [`CatalogIndex`] of flat
//! lookup maps keyed by id and by EPC. Sessions are resolved against that
//! index without further store round trips.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use yard_store::YardStore;
use yard_types::{
    Epc, Equipment, EquipmentId, KitTemplate, Reader, ReaderId, Truck, TruckId,
};

use crate::error::EngineResult;
use crate::session::ScanSession;

/// Why a session could not be attributed to a business event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    UnknownReader,
    InactiveReader,
    NoEquipment,
    NoTruck,
    MultipleTrucks,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DiscardReason::UnknownReader => "unknown_reader",
            DiscardReason::InactiveReader => "inactive_reader",
            DiscardReason::NoEquipment => "no_equipment",
            DiscardReason::NoTruck => "no_truck",
            DiscardReason::MultipleTrucks => "multiple_trucks",
        };
        f.write_str(text)
    }
}

/// A session bound to one reader, one truck and the equipment it carried.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub reader: Reader,
    pub truck: Truck,
    /// Recognized units, ordered by EPC
    pub equipment: Vec<Equipment>,
    /// EPCs matching neither equipment nor a truck tag
    pub unknown: Vec<Epc>,
}

impl ResolvedSession {
    pub fn scanned_epcs(&self) -> impl Iterator<Item = &Epc> {
        self.equipment.iter().map(|e| &e.tag)
    }
}

/// Per-run lookup maps over master data.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    readers: HashMap<ReaderId, Reader>,
    trucks: HashMap<TruckId, Truck>,
    trucks_by_tag: HashMap<Epc, TruckId>,
    equipment: HashMap<EquipmentId, Equipment>,
    equipment_by_tag: HashMap<Epc, EquipmentId>,
    templates: HashMap<TruckId, Vec<KitTemplate>>,
}

impl CatalogIndex {
    pub async fn load<S: YardStore + ?Sized>(store: &S) -> EngineResult<Self> {
        Ok(Self::from_parts(
            store.list_readers().await?,
            store.list_trucks().await?,
            store.list_equipment().await?,
            store.list_kit_templates().await?,
        ))
    }

    pub fn from_parts(
        readers: Vec<Reader>,
        trucks: Vec<Truck>,
        equipment: Vec<Equipment>,
        templates: Vec<KitTemplate>,
    ) -> Self {
        let mut index = Self::default();
        for reader in readers {
            index.readers.insert(reader.id, reader);
        }
        for truck in trucks {
            index.trucks_by_tag.insert(truck.tag.clone(), truck.id);
            index.trucks.insert(truck.id, truck);
        }
        for unit in equipment {
            index.equipment_by_tag.insert(unit.tag.clone(), unit.id);
            index.equipment.insert(unit.id, unit);
        }
        for template in templates {
            index.templates.entry(template.truck_id).or_default().push(template);
        }
        index
    }

    pub fn trucks(&self) -> impl Iterator<Item = &Truck> {
        self.trucks.values()
    }

    pub fn equipment(&self, id: &EquipmentId) -> Option<&Equipment> {
        self.equipment.get(id)
    }

    pub fn equipment_by_tag(&self, epc: &Epc) -> Option<&Equipment> {
        self.equipment_by_tag.get(epc).and_then(|id| self.equipment.get(id))
    }

    pub fn kit_for(&self, truck_id: &TruckId) -> &[KitTemplate] {
        self.templates.get(truck_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Bind a session to its reader, truck and equipment.
    pub fn resolve(&self, session: &ScanSession) -> Result<ResolvedSession, DiscardReason> {
        let reader = self
            .readers
            .get(&session.reader_id)
            .ok_or(DiscardReason::UnknownReader)?;
        if !reader.is_active {
            return Err(DiscardReason::InactiveReader);
        }

        let mut equipment = Vec::new();
        let mut trucks: Vec<&Truck> = Vec::new();
        let mut unknown = Vec::new();
        for epc in session.epcs() {
            if let Some(unit) = self.equipment_by_tag(&epc) {
                equipment.push(unit.clone());
            } else if let Some(truck) = self.trucks_by_tag.get(&epc).and_then(|id| self.trucks.get(id)) {
                if !trucks.iter().any(|t| t.id == truck.id) {
                    trucks.push(truck);
                }
            } else {
                unknown.push(epc);
            }
        }

        if equipment.is_empty() {
            return Err(DiscardReason::NoEquipment);
        }
        let truck = match trucks.as_slice() {
            [] => return Err(DiscardReason::NoTruck),
            [truck] => (*truck).clone(),
            _ => return Err(DiscardReason::MultipleTrucks),
        };

        Ok(ResolvedSession {
            reader: reader.clone(),
            truck,
            equipment,
            unknown,
        })
    }
}
