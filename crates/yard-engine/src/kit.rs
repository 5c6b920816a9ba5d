//! Kit reconciliation
//!
//! Expected units on exit are the kit-typed units actually seen at the
//! truck's last entry of the day, not every catalog unit of those types.
//! Whatever of that set is not scanned on the way out is missing.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use yard_types::{Direction, Epc, EquipmentId, EquipmentTypeId, GateCrossing, KitTemplate};

use crate::identity::{CatalogIndex, ResolvedSession};

/// Per-type kit line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitLine {
    pub equipment_type_id: EquipmentTypeId,
    pub required: u32,
    pub scanned: u32,
    pub shortfall: u32,
}

/// A unit expected on the truck but not scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingUnit {
    pub equipment_id: EquipmentId,
    pub epc: Epc,
    pub name: String,
    pub cost_minor: i64,
}

/// Result of comparing a session against the truck's kit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitReport {
    pub lines: Vec<KitLine>,
    /// Units expected to leave, ordered by EPC. Empty on entry.
    pub expected: Vec<Epc>,
    /// Expected units not scanned, ordered by EPC
    pub missing: Vec<MissingUnit>,
    /// Scanned units whose type is not part of the kit
    pub extra: Vec<Epc>,
    /// Session EPCs matching no equipment and no truck
    pub unknown: Vec<Epc>,
}

impl KitReport {
    pub fn has_shortfall(&self) -> bool {
        !self.missing.is_empty()
    }

    pub fn missing_cost_minor(&self) -> i64 {
        self.missing.iter().map(|m| m.cost_minor).sum()
    }
}

pub fn reconcile(
    direction: Direction,
    resolved: &ResolvedSession,
    templates: &[KitTemplate],
    last_entry: Option<&GateCrossing>,
    index: &CatalogIndex,
) -> KitReport {
    let mut required: BTreeMap<EquipmentTypeId, u32> = BTreeMap::new();
    for template in templates.iter().filter(|t| t.required_count > 0) {
        *required.entry(template.equipment_type_id).or_default() += template.required_count;
    }

    let mut scanned_by_type: BTreeMap<EquipmentTypeId, u32> = BTreeMap::new();
    let mut extra = Vec::new();
    for unit in &resolved.equipment {
        if required.contains_key(&unit.equipment_type_id) {
            *scanned_by_type.entry(unit.equipment_type_id).or_default() += 1;
        } else {
            extra.push(unit.tag.clone());
        }
    }

    let lines = required
        .iter()
        .map(|(kind, &required)| {
            let scanned = scanned_by_type.get(kind).copied().unwrap_or(0);
            KitLine {
                equipment_type_id: *kind,
                required,
                scanned,
                shortfall: required.saturating_sub(scanned),
            }
        })
        .collect();

    let mut report = KitReport {
        lines,
        extra,
        unknown: resolved.unknown.clone(),
        ..KitReport::default()
    };

    if direction != Direction::Exit {
        return report;
    }
    let Some(entry) = last_entry else {
        return report;
    };

    let scanned: BTreeSet<&Epc> = resolved.scanned_epcs().collect();
    let mut expected: BTreeMap<Epc, Option<MissingUnit>> = BTreeMap::new();
    for item in &entry.items {
        let Some(unit) = index.equipment(&item.equipment_id) else {
            continue;
        };
        if !required.contains_key(&unit.equipment_type_id) {
            continue;
        }
        let missing = (!scanned.contains(&item.epc)).then(|| MissingUnit {
            equipment_id: unit.id,
            epc: item.epc.clone(),
            name: unit.name.clone(),
            cost_minor: unit.cost_minor,
        });
        expected.insert(item.epc.clone(), missing);
    }

    report.expected = expected.keys().cloned().collect();
    report.missing = expected.into_values().flatten().collect();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use yard_types::{
        CrossingId, CrossingItemId, Equipment, GateCrossingItem, Reader, ReaderId, ReaderMode,
        ScanId, SessionKey, SiteId, Truck, TruckId,
    };

    struct Yard {
        index: CatalogIndex,
        truck: Truck,
        reader: Reader,
        cones: Vec<Equipment>,
        ladder: Equipment,
        templates: Vec<KitTemplate>,
    }

    fn yard() -> Yard {
        let site = SiteId::generate();
        let cone_type = EquipmentTypeId::generate();
        let truck = Truck {
            id: TruckId::generate(),
            number: "TRK-7".to_string(),
            driver_id: None,
            site_id: site,
            tag: Epc::parse("TRUCK7").unwrap(),
        };
        let reader = Reader {
            id: ReaderId::generate(),
            name: "Exit gate".to_string(),
            site_id: site,
            mode: ReaderMode::Exit,
            is_active: true,
        };
        let cones: Vec<Equipment> = (1..=3)
            .map(|n| Equipment {
                id: EquipmentId::generate(),
                name: format!("Cone {n}"),
                equipment_type_id: cone_type,
                tag: Epc::parse(&format!("CONE{n}")).unwrap(),
                cost_minor: 15_000,
            })
            .collect();
        let ladder = Equipment {
            id: EquipmentId::generate(),
            name: "Ladder".to_string(),
            equipment_type_id: EquipmentTypeId::generate(),
            tag: Epc::parse("LADDER").unwrap(),
            cost_minor: 40_000,
        };
        let templates = vec![KitTemplate {
            truck_id: truck.id,
            equipment_type_id: cone_type,
            required_count: 3,
            site_id: site,
        }];
        let mut all = cones.clone();
        all.push(ladder.clone());
        Yard {
            index: CatalogIndex::from_parts(
                vec![reader.clone()],
                vec![truck.clone()],
                all,
                templates.clone(),
            ),
            truck,
            reader,
            cones,
            ladder,
            templates,
        }
    }

    fn entry_with(yard: &Yard, units: &[&Equipment]) -> GateCrossing {
        let id = CrossingId::generate();
        GateCrossing {
            id,
            session_key: SessionKey::new(&yard.reader.id, &ScanId::generate()),
            truck_id: yard.truck.id,
            driver_id: None,
            reader_id: yard.reader.id,
            site_id: yard.reader.site_id,
            event_time: Utc::now(),
            direction: Direction::Entry,
            status: "Completed".to_string(),
            notes: None,
            items: units
                .iter()
                .map(|u| GateCrossingItem {
                    id: CrossingItemId::generate(),
                    crossing_id: id,
                    equipment_id: u.id,
                    epc: u.tag.clone(),
                    site_id: yard.reader.site_id,
                })
                .collect(),
        }
    }

    fn resolved(yard: &Yard, units: &[&Equipment]) -> ResolvedSession {
        ResolvedSession {
            reader: yard.reader.clone(),
            truck: yard.truck.clone(),
            equipment: units.iter().map(|u| (*u).clone()).collect(),
            unknown: vec![Epc::parse("STRAY").unwrap()],
        }
    }

    #[test]
    fn test_exit_shortfall_of_one() {
        let y = yard();
        let entry = entry_with(&y, &[&y.cones[0], &y.cones[1], &y.cones[2], &y.ladder]);
        let session = resolved(&y, &[&y.cones[0], &y.cones[1]]);

        let report = reconcile(Direction::Exit, &session, &y.templates, Some(&entry), &y.index);

        assert_eq!(report.expected.len(), 3);
        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].epc, y.cones[2].tag);
        assert_eq!(report.missing_cost_minor(), 15_000);
        assert_eq!(report.lines[0].shortfall, 1);
        assert_eq!(report.unknown.len(), 1);
    }

    #[test]
    fn test_only_units_seen_at_entry_are_expected() {
        let y = yard();
        let entry = entry_with(&y, &[&y.cones[0]]);
        let session = resolved(&y, &[&y.cones[0]]);

        let report = reconcile(Direction::Exit, &session, &y.templates, Some(&entry), &y.index);
        assert!(!report.has_shortfall());
        // The kit line still shows the type is short against the template.
        assert_eq!(report.lines[0].shortfall, 2);
    }

    #[test]
    fn test_entry_reports_extras_without_missing() {
        let y = yard();
        let session = resolved(&y, &[&y.cones[0], &y.ladder]);
        let report = reconcile(Direction::Entry, &session, &y.templates, None, &y.index);
        assert!(report.expected.is_empty());
        assert!(report.missing.is_empty());
        assert_eq!(report.extra, vec![y.ladder.tag.clone()]);
    }

    #[test]
    fn test_exit_without_entry_expects_nothing() {
        let y = yard();
        let session = resolved(&y, &[&y.cones[0]]);
        let report = reconcile(Direction::Exit, &session, &y.templates, None, &y.index);
        assert!(!report.has_shortfall());
    }
}
