//! In-memory yard store.
//!
//! All tables live behind one lock. A commit applies its change set to a
//! copy of the tables and swaps the copy in only when every write succeeded,
//! which gives the same all-or-nothing behavior as a relational transaction.

use crate::changeset::{AlertWrite, AssignmentWrite, CaseWrite, ChangeSet, CommitReceipt};
use crate::traits::{
    AlertStore, AssignmentStore, CaseStore, CatalogStore, CrossingStore, RulesStore, ScanStore,
    UnitOfWork,
};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use yard_types::{
    Alert, AlertDedupKey, AlertId, AlertRules, AssignmentId, CaseId, Direction, Equipment,
    EquipmentAssignment, EquipmentId, GateCrossing, KitTemplate, MissingEquipmentCase,
    RawScanRecord, Reader, ReaderId, RunId, ScanClaim, ScanId, SessionKey, SiteId, Truck,
    TruckId,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    scans: HashMap<ScanId, RawScanRecord>,
    readers: HashMap<ReaderId, Reader>,
    trucks: HashMap<TruckId, Truck>,
    equipment: HashMap<EquipmentId, Equipment>,
    kit_templates: Vec<KitTemplate>,
    crossings: Vec<GateCrossing>,
    cases: HashMap<CaseId, MissingEquipmentCase>,
    assignments: HashMap<AssignmentId, EquipmentAssignment>,
    alerts: HashMap<AlertId, Alert>,
    alert_rules: Option<AlertRules>,
}

/// Reference backend for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct InMemoryYardStore {
    tables: RwLock<Tables>,
    injected_conflicts: AtomicU32,
}

impl InMemoryYardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits fail with a conflict without applying
    /// anything. Used to exercise retry paths.
    pub fn inject_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    pub fn upsert_reader(&self, reader: Reader) -> StorageResult<()> {
        self.write()?.readers.insert(reader.id, reader);
        Ok(())
    }

    pub fn upsert_truck(&self, truck: Truck) -> StorageResult<()> {
        self.write()?.trucks.insert(truck.id, truck);
        Ok(())
    }

    pub fn upsert_equipment(&self, equipment: Equipment) -> StorageResult<()> {
        self.write()?.equipment.insert(equipment.id, equipment);
        Ok(())
    }

    /// Add a template line, replacing an existing line for the same truck
    /// and equipment type.
    pub fn upsert_kit_template(&self, template: KitTemplate) -> StorageResult<()> {
        let mut tables = self.write()?;
        tables.kit_templates.retain(|t| {
            !(t.truck_id == template.truck_id && t.equipment_type_id == template.equipment_type_id)
        });
        tables.kit_templates.push(template);
        Ok(())
    }

    pub fn set_alert_rules(&self, rules: AlertRules) -> StorageResult<()> {
        self.write()?.alert_rules = Some(rules);
        Ok(())
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StorageError::Backend("yard tables lock poisoned".to_string()))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StorageError::Backend("yard tables lock poisoned".to_string()))
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Tables {
    fn open_case_for(&self, truck_id: &TruckId) -> Option<&MissingEquipmentCase> {
        self.cases
            .values()
            .find(|c| &c.truck_id == truck_id && !c.status.is_closed())
    }

    fn active_assignment_for(
        &self,
        truck_id: &TruckId,
        equipment_id: &EquipmentId,
    ) -> Option<&EquipmentAssignment> {
        self.assignments.values().find(|a| {
            &a.truck_id == truck_id && &a.equipment_id == equipment_id && a.is_active()
        })
    }

    fn alert_by_key(&self, key: &AlertDedupKey) -> Option<&Alert> {
        let permanent = key.is_permanent();
        self.alerts
            .values()
            .filter(|a| &a.dedup_key == key && (permanent || !a.is_resolved))
            .min_by_key(|a| a.timestamp)
    }

    fn apply(&mut self, changes: ChangeSet) -> StorageResult<CommitReceipt> {
        let mut receipt = CommitReceipt::default();

        if let Some(rules) = changes.alert_rules {
            if self.alert_rules.is_none() {
                self.alert_rules = Some(rules);
            }
        }

        if let Some(processed) = changes.processed {
            for scan_id in &processed.scan_ids {
                let scan = self
                    .scans
                    .get_mut(scan_id)
                    .ok_or_else(|| StorageError::NotFound(format!("scan {scan_id}")))?;
                if scan.is_processed() {
                    return Err(StorageError::Conflict(format!(
                        "scan {scan_id} already processed"
                    )));
                }
                if !scan.is_claimed_by(&processed.run_id) {
                    return Err(StorageError::Conflict(format!(
                        "scan {scan_id} no longer claimed by {}",
                        processed.run_id
                    )));
                }
                scan.processed_at = Some(processed.at);
                receipt.scans_processed += 1;
            }
        }

        for crossing in changes.crossings {
            if self
                .crossings
                .iter()
                .any(|c| c.session_key == crossing.session_key)
            {
                return Err(StorageError::Conflict(format!(
                    "session {} already recorded",
                    crossing.session_key
                )));
            }
            if crossing.items.iter().any(|i| i.crossing_id != crossing.id) {
                return Err(StorageError::InvalidInput(format!(
                    "crossing {} has items belonging to another crossing",
                    crossing.id
                )));
            }
            self.crossings.push(crossing);
            receipt.crossings += 1;
        }

        for write in changes.cases {
            match write {
                CaseWrite::Insert(mut case) => {
                    if self.cases.contains_key(&case.id) {
                        return Err(StorageError::Conflict(format!("case {} exists", case.id)));
                    }
                    if !case.status.is_closed() {
                        if let Some(existing) = self.open_case_for(&case.truck_id) {
                            return Err(StorageError::Conflict(format!(
                                "truck {} already has open case {}",
                                case.truck_id, existing.id
                            )));
                        }
                    }
                    ensure_unique_epcs(&case)?;
                    case.version = 0;
                    self.cases.insert(case.id, case);
                }
                CaseWrite::Update {
                    mut case,
                    expected_version,
                } => {
                    let stored = self
                        .cases
                        .get(&case.id)
                        .ok_or_else(|| StorageError::NotFound(format!("case {}", case.id)))?;
                    if stored.version != expected_version {
                        return Err(StorageError::Conflict(format!(
                            "case {} at version {}, expected {}",
                            case.id, stored.version, expected_version
                        )));
                    }
                    if !stored.status.can_transition_to(case.status) {
                        return Err(StorageError::InvariantViolation(format!(
                            "case {} cannot move from {} to {}",
                            case.id, stored.status, case.status
                        )));
                    }
                    if !case.status.is_closed() {
                        if let Some(other) = self
                            .open_case_for(&case.truck_id)
                            .filter(|c| c.id != case.id)
                        {
                            return Err(StorageError::Conflict(format!(
                                "truck {} already has open case {}",
                                case.truck_id, other.id
                            )));
                        }
                    }
                    ensure_unique_epcs(&case)?;
                    case.version = expected_version + 1;
                    self.cases.insert(case.id, case);
                }
            }
            receipt.cases += 1;
        }

        for write in changes.assignments {
            match write {
                AssignmentWrite::Open(mut assignment) => {
                    if let Some(active) =
                        self.active_assignment_for(&assignment.truck_id, &assignment.equipment_id)
                    {
                        return Err(StorageError::Conflict(format!(
                            "equipment {} already assigned to truck {} by {}",
                            assignment.equipment_id, assignment.truck_id, active.id
                        )));
                    }
                    assignment.version = 0;
                    self.assignments.insert(assignment.id, assignment);
                }
                AssignmentWrite::Close {
                    id,
                    expected_version,
                    returned_at,
                } => {
                    let stored = self
                        .assignments
                        .get_mut(&id)
                        .ok_or_else(|| StorageError::NotFound(format!("assignment {id}")))?;
                    if stored.version != expected_version || !stored.is_active() {
                        return Err(StorageError::Conflict(format!(
                            "assignment {id} changed since it was read"
                        )));
                    }
                    stored.returned_at = Some(returned_at);
                    stored.version += 1;
                }
            }
            receipt.assignments += 1;
        }

        for write in changes.alerts {
            match write {
                AlertWrite::Insert(alert) => {
                    if let Some(existing) = self.alert_by_key(&alert.dedup_key) {
                        return Err(StorageError::Conflict(format!(
                            "alert {} already holds key {}",
                            existing.id, alert.dedup_key
                        )));
                    }
                    self.alerts.insert(alert.id, alert);
                }
                AlertWrite::Refresh {
                    id,
                    message,
                    timestamp,
                } => {
                    let alert = self
                        .alerts
                        .get_mut(&id)
                        .ok_or_else(|| StorageError::NotFound(format!("alert {id}")))?;
                    if alert.is_resolved {
                        return Err(StorageError::Conflict(format!("alert {id} resolved")));
                    }
                    alert.message = message;
                    alert.timestamp = timestamp;
                }
                AlertWrite::Resolve { id, at } => {
                    let alert = self
                        .alerts
                        .get_mut(&id)
                        .ok_or_else(|| StorageError::NotFound(format!("alert {id}")))?;
                    if alert.is_resolved {
                        return Err(StorageError::Conflict(format!(
                            "alert {id} already resolved"
                        )));
                    }
                    alert.is_resolved = true;
                    alert.resolved_at = Some(at);
                }
            }
            receipt.alerts += 1;
        }

        Ok(receipt)
    }
}

fn ensure_unique_epcs(case: &MissingEquipmentCase) -> StorageResult<()> {
    let mut seen = HashSet::new();
    for item in &case.items {
        if !seen.insert(&item.epc) {
            return Err(StorageError::InvariantViolation(format!(
                "case {} lists {} twice",
                case.id, item.epc
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl ScanStore for InMemoryYardStore {
    async fn insert_scans(&self, scans: Vec<RawScanRecord>) -> StorageResult<usize> {
        let mut tables = self.write()?;
        let mut inserted = 0;
        for scan in scans {
            if tables.scans.contains_key(&scan.id) {
                continue;
            }
            tables.scans.insert(scan.id, scan);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn claim_unprocessed(
        &self,
        since: DateTime<Utc>,
        run_id: RunId,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> StorageResult<Vec<RawScanRecord>> {
        let mut tables = self.write()?;
        let mut claimed: Vec<RawScanRecord> = tables
            .scans
            .values_mut()
            .filter(|s| s.observed_at >= since && s.is_claimable(now, lease))
            .map(|s| {
                s.claim = Some(ScanClaim {
                    run_id,
                    claimed_at: now,
                });
                s.clone()
            })
            .collect();
        claimed.sort_by(|a, b| {
            a.reader_id
                .cmp(&b.reader_id)
                .then(a.observed_at.cmp(&b.observed_at))
        });
        Ok(claimed)
    }

    async fn release_claims(&self, run_id: RunId, scan_ids: &[ScanId]) -> StorageResult<usize> {
        let mut tables = self.write()?;
        let mut released = 0;
        for scan_id in scan_ids {
            if let Some(scan) = tables.scans.get_mut(scan_id) {
                if !scan.is_processed() && scan.is_claimed_by(&run_id) {
                    scan.claim = None;
                    released += 1;
                }
            }
        }
        Ok(released)
    }

    async fn get_scan(&self, scan_id: &ScanId) -> StorageResult<Option<RawScanRecord>> {
        Ok(self.read()?.scans.get(scan_id).cloned())
    }
}

#[async_trait]
impl CatalogStore for InMemoryYardStore {
    async fn list_readers(&self) -> StorageResult<Vec<Reader>> {
        Ok(self.read()?.readers.values().cloned().collect())
    }

    async fn list_trucks(&self) -> StorageResult<Vec<Truck>> {
        Ok(self.read()?.trucks.values().cloned().collect())
    }

    async fn list_equipment(&self) -> StorageResult<Vec<Equipment>> {
        Ok(self.read()?.equipment.values().cloned().collect())
    }

    async fn list_kit_templates(&self) -> StorageResult<Vec<KitTemplate>> {
        Ok(self.read()?.kit_templates.clone())
    }
}

#[async_trait]
impl CrossingStore for InMemoryYardStore {
    async fn latest_crossing(&self, truck_id: &TruckId) -> StorageResult<Option<GateCrossing>> {
        Ok(self
            .read()?
            .crossings
            .iter()
            .filter(|c| &c.truck_id == truck_id)
            .max_by_key(|c| c.event_time)
            .cloned())
    }

    async fn latest_crossing_on(
        &self,
        truck_id: &TruckId,
        site_id: &SiteId,
        day: NaiveDate,
        direction: Option<Direction>,
    ) -> StorageResult<Option<GateCrossing>> {
        Ok(self
            .read()?
            .crossings
            .iter()
            .filter(|c| &c.truck_id == truck_id && &c.site_id == site_id && c.day() == day)
            .filter(|c| direction.map_or(true, |d| c.direction == d))
            .max_by_key(|c| c.event_time)
            .cloned())
    }

    async fn crossing_by_session(&self, key: &SessionKey) -> StorageResult<Option<GateCrossing>> {
        Ok(self
            .read()?
            .crossings
            .iter()
            .find(|c| &c.session_key == key)
            .cloned())
    }

    async fn list_crossings(&self, truck_id: &TruckId) -> StorageResult<Vec<GateCrossing>> {
        let mut crossings: Vec<GateCrossing> = self
            .read()?
            .crossings
            .iter()
            .filter(|c| &c.truck_id == truck_id)
            .cloned()
            .collect();
        crossings.sort_by_key(|c| c.event_time);
        Ok(crossings)
    }
}

#[async_trait]
impl CaseStore for InMemoryYardStore {
    async fn open_case_for_truck(
        &self,
        truck_id: &TruckId,
    ) -> StorageResult<Option<MissingEquipmentCase>> {
        Ok(self.read()?.open_case_for(truck_id).cloned())
    }

    async fn get_case(&self, case_id: &CaseId) -> StorageResult<Option<MissingEquipmentCase>> {
        Ok(self.read()?.cases.get(case_id).cloned())
    }

    async fn list_cases(&self, truck_id: &TruckId) -> StorageResult<Vec<MissingEquipmentCase>> {
        let mut cases: Vec<MissingEquipmentCase> = self
            .read()?
            .cases
            .values()
            .filter(|c| &c.truck_id == truck_id)
            .cloned()
            .collect();
        cases.sort_by_key(|c| c.opened_at);
        Ok(cases)
    }
}

#[async_trait]
impl AssignmentStore for InMemoryYardStore {
    async fn active_assignment(
        &self,
        truck_id: &TruckId,
        equipment_id: &EquipmentId,
    ) -> StorageResult<Option<EquipmentAssignment>> {
        Ok(self
            .read()?
            .active_assignment_for(truck_id, equipment_id)
            .cloned())
    }

    async fn list_assignments(
        &self,
        truck_id: &TruckId,
    ) -> StorageResult<Vec<EquipmentAssignment>> {
        let mut assignments: Vec<EquipmentAssignment> = self
            .read()?
            .assignments
            .values()
            .filter(|a| &a.truck_id == truck_id)
            .cloned()
            .collect();
        assignments.sort_by_key(|a| a.assigned_at);
        Ok(assignments)
    }
}

#[async_trait]
impl AlertStore for InMemoryYardStore {
    async fn find_alert(&self, key: &AlertDedupKey) -> StorageResult<Option<Alert>> {
        Ok(self.read()?.alert_by_key(key).cloned())
    }

    async fn list_alerts(&self) -> StorageResult<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self.read()?.alerts.values().cloned().collect();
        alerts.sort_by_key(|a| a.timestamp);
        Ok(alerts)
    }
}

#[async_trait]
impl RulesStore for InMemoryYardStore {
    async fn alert_rules(&self) -> StorageResult<Option<AlertRules>> {
        Ok(self.read()?.alert_rules.clone())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryYardStore {
    async fn commit(&self, changes: ChangeSet) -> StorageResult<CommitReceipt> {
        if self.take_injected_conflict() {
            return Err(StorageError::Conflict("injected conflict".to_string()));
        }
        if changes.is_empty() {
            return Ok(CommitReceipt::default());
        }

        let mut tables = self.write()?;
        let mut staged = tables.clone();
        let receipt = staged.apply(changes)?;
        *tables = staged;

        tracing::debug!(
            crossings = receipt.crossings,
            cases = receipt.cases,
            assignments = receipt.assignments,
            alerts = receipt.alerts,
            scans = receipt.scans_processed,
            "committed change set"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yard_types::{CaseStatus, CrossingId, Epc};

    fn scan(reader_id: ReaderId, site_id: SiteId, epc: &str, at: DateTime<Utc>) -> RawScanRecord {
        RawScanRecord {
            id: ScanId::generate(),
            epc: epc.to_string(),
            signal_strength: -60.0,
            reader_id,
            site_id,
            observed_at: at,
            claim: None,
            processed_at: None,
        }
    }

    fn case_for(truck_id: TruckId, epcs: &[&str]) -> MissingEquipmentCase {
        let now = Utc::now();
        let mut case = MissingEquipmentCase {
            id: CaseId::generate(),
            truck_id,
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
        };
        for epc in epcs {
            case.add_item(EquipmentId::generate(), Epc::parse(epc).unwrap());
        }
        case
    }

    fn crossing(truck_id: TruckId, key: SessionKey, at: DateTime<Utc>) -> GateCrossing {
        GateCrossing {
            id: CrossingId::generate(),
            session_key: key,
            truck_id,
            driver_id: None,
            reader_id: ReaderId::generate(),
            site_id: SiteId::generate(),
            event_time: at,
            direction: Direction::Entry,
            status: "Processed".to_string(),
            notes: None,
            items: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_until_lease_expires() {
        let store = InMemoryYardStore::new();
        let now = Utc::now();
        let (reader, site) = (ReaderId::generate(), SiteId::generate());
        store
            .insert_scans(vec![scan(reader, site, "E1", now), scan(reader, site, "E2", now)])
            .await
            .unwrap();

        let lease = Duration::minutes(5);
        let first = RunId::generate();
        let second = RunId::generate();
        let since = now - Duration::minutes(30);

        assert_eq!(store.claim_unprocessed(since, first, now, lease).await.unwrap().len(), 2);
        assert!(store.claim_unprocessed(since, second, now, lease).await.unwrap().is_empty());

        let later = now + Duration::minutes(6);
        assert_eq!(store.claim_unprocessed(since, second, later, lease).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_release_claims_makes_scans_claimable() {
        let store = InMemoryYardStore::new();
        let now = Utc::now();
        let record = scan(ReaderId::generate(), SiteId::generate(), "E1", now);
        let scan_id = record.id;
        store.insert_scans(vec![record]).await.unwrap();

        let run = RunId::generate();
        let since = now - Duration::minutes(1);
        store.claim_unprocessed(since, run, now, Duration::minutes(5)).await.unwrap();
        assert_eq!(store.release_claims(run, &[scan_id]).await.unwrap(), 1);

        let again = store
            .claim_unprocessed(since, RunId::generate(), now, Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(again.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_processed_requires_claim() {
        let store = InMemoryYardStore::new();
        let now = Utc::now();
        let record = scan(ReaderId::generate(), SiteId::generate(), "E1", now);
        let scan_id = record.id;
        store.insert_scans(vec![record]).await.unwrap();

        let mut changes = ChangeSet::new();
        changes.mark_processed(RunId::generate(), [scan_id], now);
        let err = store.commit(changes).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(!store.get_scan(&scan_id).await.unwrap().unwrap().is_processed());
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = InMemoryYardStore::new();
        let truck = TruckId::generate();
        let key = SessionKey::new(&ReaderId::generate(), &ScanId::generate());

        let mut first = ChangeSet::new();
        first.insert_crossing(crossing(truck, key.clone(), Utc::now()));
        store.commit(first).await.unwrap();

        // Second set holds a valid case insert and a duplicate session.
        let mut second = ChangeSet::new();
        second.insert_case(case_for(truck, &["E1"]));
        second.insert_crossing(crossing(truck, key, Utc::now()));
        assert!(store.commit(second).await.unwrap_err().is_conflict());

        assert!(store.open_case_for_truck(&truck).await.unwrap().is_none());
        assert_eq!(store.list_crossings(&truck).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_single_open_case_per_truck() {
        let store = InMemoryYardStore::new();
        let truck = TruckId::generate();

        let mut changes = ChangeSet::new();
        changes.insert_case(case_for(truck, &["E1"]));
        store.commit(changes).await.unwrap();

        let mut changes = ChangeSet::new();
        changes.insert_case(case_for(truck, &["E2"]));
        assert!(store.commit(changes).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_case_update_checks_version_and_transition() {
        let store = InMemoryYardStore::new();
        let truck = TruckId::generate();
        let case = case_for(truck, &["E1"]);
        let mut changes = ChangeSet::new();
        changes.insert_case(case.clone());
        store.commit(changes).await.unwrap();

        let mut escalated = case.clone();
        escalated.status = CaseStatus::Investigation;
        let mut changes = ChangeSet::new();
        changes.update_case(escalated.clone(), 0);
        store.commit(changes).await.unwrap();
        assert_eq!(store.get_case(&case.id).await.unwrap().unwrap().version, 1);

        // Stale writer.
        let mut changes = ChangeSet::new();
        changes.update_case(escalated, 0);
        assert!(store.commit(changes).await.unwrap_err().is_conflict());

        // Investigation cannot go back to Open.
        let mut reopened = store.get_case(&case.id).await.unwrap().unwrap();
        reopened.status = CaseStatus::Open;
        let mut changes = ChangeSet::new();
        changes.update_case(reopened, 1);
        assert!(matches!(
            store.commit(changes).await,
            Err(StorageError::InvariantViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_case_hidden_from_open_lookup() {
        let store = InMemoryYardStore::new();
        let truck = TruckId::generate();
        let mut case = case_for(truck, &["E1"]);
        let mut changes = ChangeSet::new();
        changes.insert_case(case.clone());
        store.commit(changes).await.unwrap();

        case.status = CaseStatus::Closed;
        case.closed_at = Some(Utc::now());
        let mut changes = ChangeSet::new();
        changes.update_case(case, 0);
        store.commit(changes).await.unwrap();

        assert!(store.open_case_for_truck(&truck).await.unwrap().is_none());
        assert_eq!(store.list_cases(&truck).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_single_active_assignment_per_pair() {
        let store = InMemoryYardStore::new();
        let (truck, equipment, site) =
            (TruckId::generate(), EquipmentId::generate(), SiteId::generate());
        let now = Utc::now();

        let mut changes = ChangeSet::new();
        changes.open_assignment(EquipmentAssignment::open(truck, equipment, site, now));
        store.commit(changes).await.unwrap();

        let mut changes = ChangeSet::new();
        changes.open_assignment(EquipmentAssignment::open(truck, equipment, site, now));
        assert!(store.commit(changes).await.unwrap_err().is_conflict());

        let active = store.active_assignment(&truck, &equipment).await.unwrap().unwrap();
        let mut changes = ChangeSet::new();
        changes.close_assignment(active.id, active.version, now);
        store.commit(changes).await.unwrap();
        assert!(store.active_assignment(&truck, &equipment).await.unwrap().is_none());

        let mut changes = ChangeSet::new();
        changes.open_assignment(EquipmentAssignment::open(truck, equipment, site, now));
        store.commit(changes).await.unwrap();
        assert_eq!(store.list_assignments(&truck).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_alert_key_semantics() {
        let store = InMemoryYardStore::new();
        let now = Utc::now();
        let late = AlertDedupKey::LateReturn {
            truck_id: TruckId::generate(),
        };
        let alert = Alert::new(late.clone(), "Warning", "late", None, now);
        let alert_id = alert.id;

        let mut changes = ChangeSet::new();
        changes.insert_alert(alert);
        store.commit(changes).await.unwrap();

        let mut changes = ChangeSet::new();
        changes.insert_alert(Alert::new(late.clone(), "Warning", "late again", None, now));
        assert!(store.commit(changes).await.unwrap_err().is_conflict());

        let mut changes = ChangeSet::new();
        changes.resolve_alert(alert_id, now);
        store.commit(changes).await.unwrap();
        assert!(store.find_alert(&late).await.unwrap().is_none());

        // Resolved late-return keys can be reused; missing-equipment keys cannot.
        let mut changes = ChangeSet::new();
        changes.insert_alert(Alert::new(late, "Warning", "late", None, now));
        store.commit(changes).await.unwrap();

        let missing = AlertDedupKey::MissingEquipment {
            case_id: CaseId::generate(),
            epc: Epc::parse("E1").unwrap(),
        };
        let alert = Alert::new(missing.clone(), "Low", "missing", None, now);
        let alert_id = alert.id;
        let mut changes = ChangeSet::new();
        changes.insert_alert(alert).resolve_alert(alert_id, now);
        store.commit(changes).await.unwrap();
        assert!(store.find_alert(&missing).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_injected_conflicts_apply_nothing() {
        let store = InMemoryYardStore::new();
        store.inject_conflicts(1);

        let mut changes = ChangeSet::new();
        changes.ensure_alert_rules(AlertRules::default());
        assert!(store.commit(changes.clone()).await.unwrap_err().is_conflict());
        assert!(store.alert_rules().await.unwrap().is_none());

        store.commit(changes).await.unwrap();
        assert!(store.alert_rules().await.unwrap().is_some());
    }
}
