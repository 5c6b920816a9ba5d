use crate::changeset::{ChangeSet, CommitReceipt};
use crate::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use yard_types::{
    Alert, AlertDedupKey, AlertRules, CaseId, Direction, Equipment, EquipmentAssignment,
    EquipmentId, GateCrossing, KitTemplate, MissingEquipmentCase, RawScanRecord, Reader, RunId,
    ScanId, SessionKey, SiteId, Truck, TruckId,
};

/// Storage interface for the raw scan queue.
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Append scans. Records whose id already exists are skipped; returns
    /// the number inserted.
    async fn insert_scans(&self, scans: Vec<RawScanRecord>) -> StorageResult<usize>;

    /// Atomically claim every unprocessed scan observed at or after `since`
    /// that is unclaimed or whose claim is older than `lease`.
    ///
    /// Returned records carry the new claim.
    async fn claim_unprocessed(
        &self,
        since: DateTime<Utc>,
        run_id: RunId,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> StorageResult<Vec<RawScanRecord>>;

    /// Drop the claims `run_id` holds on the given scans so a later run can
    /// pick them up again. Returns the number released.
    async fn release_claims(&self, run_id: RunId, scan_ids: &[ScanId]) -> StorageResult<usize>;

    async fn get_scan(&self, scan_id: &ScanId) -> StorageResult<Option<RawScanRecord>>;
}

/// Read-only access to master data.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_readers(&self) -> StorageResult<Vec<Reader>>;
    async fn list_trucks(&self) -> StorageResult<Vec<Truck>>;
    async fn list_equipment(&self) -> StorageResult<Vec<Equipment>>;
    async fn list_kit_templates(&self) -> StorageResult<Vec<KitTemplate>>;
}

/// Lookups over gate crossings.
#[async_trait]
pub trait CrossingStore: Send + Sync {
    /// The truck's most recent crossing at any site on any day.
    async fn latest_crossing(&self, truck_id: &TruckId) -> StorageResult<Option<GateCrossing>>;

    /// The truck's most recent crossing at `site_id` on the UTC date `day`,
    /// optionally restricted to one direction.
    async fn latest_crossing_on(
        &self,
        truck_id: &TruckId,
        site_id: &SiteId,
        day: NaiveDate,
        direction: Option<Direction>,
    ) -> StorageResult<Option<GateCrossing>>;

    async fn crossing_by_session(&self, key: &SessionKey) -> StorageResult<Option<GateCrossing>>;

    /// All crossings of a truck, oldest first.
    async fn list_crossings(&self, truck_id: &TruckId) -> StorageResult<Vec<GateCrossing>>;
}

/// Lookups over missing-equipment cases.
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// The truck's single non-closed case, if any.
    async fn open_case_for_truck(
        &self,
        truck_id: &TruckId,
    ) -> StorageResult<Option<MissingEquipmentCase>>;

    async fn get_case(&self, case_id: &CaseId) -> StorageResult<Option<MissingEquipmentCase>>;

    /// All cases of a truck, oldest first.
    async fn list_cases(&self, truck_id: &TruckId) -> StorageResult<Vec<MissingEquipmentCase>>;
}

/// Lookups over custody assignments.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn active_assignment(
        &self,
        truck_id: &TruckId,
        equipment_id: &EquipmentId,
    ) -> StorageResult<Option<EquipmentAssignment>>;

    async fn list_assignments(&self, truck_id: &TruckId)
        -> StorageResult<Vec<EquipmentAssignment>>;
}

/// Lookups over alerts.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// The alert holding `key`.
    ///
    /// Permanent keys match resolved alerts too; other keys only match
    /// unresolved alerts.
    async fn find_alert(&self, key: &AlertDedupKey) -> StorageResult<Option<Alert>>;

    /// All alerts, oldest first.
    async fn list_alerts(&self) -> StorageResult<Vec<Alert>>;
}

/// Access to the alert rules singleton.
#[async_trait]
pub trait RulesStore: Send + Sync {
    async fn alert_rules(&self) -> StorageResult<Option<AlertRules>>;
}

/// Transactional write path.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Apply every write in `changes` or none of them.
    ///
    /// Fails with [`StorageError::Conflict`](crate::StorageError::Conflict)
    /// when a precondition no longer holds.
    async fn commit(&self, changes: ChangeSet) -> StorageResult<CommitReceipt>;
}

/// Unified storage bundle used by the reconciliation engine.
pub trait YardStore:
    ScanStore
    + CatalogStore
    + CrossingStore
    + CaseStore
    + AssignmentStore
    + AlertStore
    + RulesStore
    + UnitOfWork
    + Send
    + Sync
{
}

impl<T> YardStore for T where
    T: ScanStore
        + CatalogStore
        + CrossingStore
        + CaseStore
        + AssignmentStore
        + AlertStore
        + RulesStore
        + UnitOfWork
        + Send
        + Sync
{
}
