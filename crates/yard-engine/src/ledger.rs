//! Custody bookkeeping: an entry hands scanned units to the truck, an exit
//! returns them.

use chrono::{DateTime, Utc};
use yard_store::{ChangeSet, YardStore};
use yard_types::{Direction, EquipmentAssignment};

use crate::error::EngineResult;
use crate::identity::ResolvedSession;

/// Custody writes for one crossing.
#[derive(Debug, Clone, Default)]
pub struct CustodyPlan {
    pub opened: Vec<EquipmentAssignment>,
    /// `(assignment, version read)` pairs to close
    pub closed: Vec<(EquipmentAssignment, u64)>,
}

impl CustodyPlan {
    pub fn write_into(&self, changes: &mut ChangeSet, at: DateTime<Utc>) {
        for assignment in &self.opened {
            changes.open_assignment(assignment.clone());
        }
        for (assignment, version) in &self.closed {
            changes.close_assignment(assignment.id, *version, at);
        }
    }
}

pub async fn plan<S: YardStore + ?Sized>(
    store: &S,
    direction: Direction,
    resolved: &ResolvedSession,
    at: DateTime<Utc>,
) -> EngineResult<CustodyPlan> {
    let mut plan = CustodyPlan::default();
    for unit in &resolved.equipment {
        let active = store.active_assignment(&resolved.truck.id, &unit.id).await?;
        match (direction, active) {
            (Direction::Entry, None) => plan.opened.push(EquipmentAssignment::open(
                resolved.truck.id,
                unit.id,
                resolved.reader.site_id,
                at,
            )),
            (Direction::Exit, Some(active)) => {
                let version = active.version;
                plan.closed.push((active, version));
            }
            _ => {}
        }
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yard_store::{AssignmentStore, InMemoryYardStore, UnitOfWork};
    use yard_types::{
        Epc, Equipment, EquipmentId, EquipmentTypeId, Reader, ReaderId, ReaderMode, SiteId,
        Truck, TruckId,
    };

    fn resolved() -> ResolvedSession {
        let site = SiteId::generate();
        ResolvedSession {
            reader: Reader {
                id: ReaderId::generate(),
                name: "Gate".to_string(),
                site_id: site,
                mode: ReaderMode::Bidirectional,
                is_active: true,
            },
            truck: Truck {
                id: TruckId::generate(),
                number: "TRK-9".to_string(),
                driver_id: None,
                site_id: site,
                tag: Epc::parse("TRUCK9").unwrap(),
            },
            equipment: vec![Equipment {
                id: EquipmentId::generate(),
                name: "Jack".to_string(),
                equipment_type_id: EquipmentTypeId::generate(),
                tag: Epc::parse("JACK1").unwrap(),
                cost_minor: 12_000,
            }],
            unknown: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_entry_opens_once_and_exit_closes() {
        let store = InMemoryYardStore::new();
        let session = resolved();
        let now = Utc::now();

        let first = plan(&store, Direction::Entry, &session, now).await.unwrap();
        assert_eq!(first.opened.len(), 1);
        let mut changes = ChangeSet::new();
        first.write_into(&mut changes, now);
        store.commit(changes).await.unwrap();

        let second = plan(&store, Direction::Entry, &session, now).await.unwrap();
        assert!(second.opened.is_empty());

        let exit = plan(&store, Direction::Exit, &session, now).await.unwrap();
        assert_eq!(exit.closed.len(), 1);
        let mut changes = ChangeSet::new();
        exit.write_into(&mut changes, now);
        store.commit(changes).await.unwrap();

        let unit = session.equipment[0].id;
        assert!(store.active_assignment(&session.truck.id, &unit).await.unwrap().is_none());
    }
}
