//! Reconciliation run orchestration
//!
//! One run claims the unprocessed scans of the lookback window, builds
//! sessions, and turns each session into at most one gate crossing with its
//! kit, custody, case and alert effects. Every session is one unit of work:
//! its effects and the processed mark of its scans are committed together,
//! and a conflict reloads state and recomputes. A session whose unit of work
//! fails releases its scans for the next run, and so do the later sessions
//! of the same truck in that run.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use yard_store::{ChangeSet, YardStore};
use yard_types::{
    AlertRules, CaseId, Direction, Epc, MissingEquipmentCase, RunId, Truck, TruckId,
};

use crate::alerts;
use crate::case_manager::CaseManager;
use crate::classifier::{build_crossing, CrossingHistory, GateClassifier, RejectReason};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::identity::CatalogIndex;
use crate::kit;
use crate::late_return::{self, LateReturnReport};
use crate::ledger;
use crate::report::{AcceptedCrossing, RunReport, SessionFailure, SessionOutcome};
use crate::retry::with_retry;
use crate::session::{ScanSession, SessionBuilder};
use crate::severity::SeverityClassifier;

/// The scan reconciliation engine.
pub struct ReconciliationEngine<S: YardStore> {
    store: Arc<S>,
    config: EngineConfig,
    sessions: SessionBuilder,
    classifier: GateClassifier,
    cases: CaseManager,
}

impl<S: YardStore> ReconciliationEngine<S> {
    /// Build an engine. Fails on unusable settings or a severity table
    /// that does not load.
    pub fn new(store: Arc<S>, config: EngineConfig) -> EngineResult<Self> {
        let table = config.validate()?;
        Ok(Self {
            sessions: SessionBuilder::new(config.session_window()),
            classifier: GateClassifier::new(config.duplicate_suppression()),
            cases: CaseManager::new(SeverityClassifier::new(table), config.auto_close_on_recovery),
            store,
            config,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Stored alert rules, created from the configured defaults when absent.
    pub async fn alert_rules(&self) -> EngineResult<AlertRules> {
        if let Some(rules) = self.store.alert_rules().await? {
            return Ok(rules);
        }
        let mut changes = ChangeSet::new();
        changes.ensure_alert_rules(self.config.alert_defaults.clone());
        self.store.commit(changes).await?;
        tracing::info!("Alert rules created from defaults");
        Ok(self
            .store
            .alert_rules()
            .await?
            .unwrap_or_else(|| self.config.alert_defaults.clone()))
    }

    /// Reconcile pending scans, then sweep for late returns.
    pub async fn run_once(&self, now: DateTime<Utc>) -> EngineResult<RunReport> {
        self.run(now, true).await
    }

    /// Reconcile pending scans only.
    pub async fn reconcile_scans(&self, now: DateTime<Utc>) -> EngineResult<RunReport> {
        self.run(now, false).await
    }

    /// Run the late-return sweep on its own.
    pub async fn sweep_late_returns(&self, now: DateTime<Utc>) -> EngineResult<LateReturnReport> {
        let rules = self.alert_rules().await?;
        let trucks = self.store.list_trucks().await?;
        Ok(late_return::sweep(self.store.as_ref(), &trucks, &rules, &self.config.retry, now).await)
    }

    /// Operator close of a case.
    pub async fn close_case(
        &self,
        case_id: CaseId,
        now: DateTime<Utc>,
    ) -> EngineResult<MissingEquipmentCase> {
        with_retry(&self.config.retry, "close_case", |_| async move {
            let case = self
                .store
                .get_case(&case_id)
                .await?
                .ok_or(EngineError::CaseNotFound(case_id))?;
            let change = self.cases.close(case, now)?;
            let expected = change.expected_version.unwrap_or_default();

            let mut changes = ChangeSet::new();
            changes.update_case(change.case.clone(), expected);
            self.store.commit(changes).await?;

            tracing::info!(case_id = %case_id, truck_id = %change.case.truck_id, "Case closed by operator");
            let mut closed = change.case;
            closed.version = expected + 1;
            Ok(closed)
        })
        .await
    }

    #[tracing::instrument(skip(self), fields(run_id = tracing::field::Empty))]
    async fn run(&self, now: DateTime<Utc>, late_returns: bool) -> EngineResult<RunReport> {
        let run_id = RunId::generate();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let mut report = RunReport::new(run_id, now);

        let claimed = self
            .store
            .claim_unprocessed(now - self.config.lookback(), run_id, now, self.config.claim_lease())
            .await?;
        report.scans_claimed = claimed.len();

        let prepared = async {
            let rules = self.alert_rules().await?;
            let catalog = CatalogIndex::load(self.store.as_ref()).await?;
            Ok::<_, EngineError>((rules, catalog))
        }
        .await;
        let (rules, catalog) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                let ids: Vec<_> = claimed.iter().map(|s| s.id).collect();
                if let Err(release) = self.store.release_claims(run_id, &ids).await {
                    tracing::error!(error = %release, "Failed to release claims");
                }
                return Err(e);
            }
        };

        let sessions = self.sessions.build(claimed);
        report.sessions_built = sessions.len();

        // Trucks whose unit of work failed this run. Their later sessions
        // wait for the next run.
        let mut blocked: HashSet<TruckId> = HashSet::new();

        for session in &sessions {
            let truck_id = catalog.resolve(session).ok().map(|r| r.truck.id);
            if let Some(truck_id) = truck_id.filter(|id| blocked.contains(id)) {
                tracing::warn!(
                    session = %session.key(),
                    truck_id = %truck_id,
                    "Session deferred behind a failed session of the same truck"
                );
                self.release_session(run_id, session).await;
                report.sessions_deferred += 1;
                continue;
            }

            let result = with_retry(&self.config.retry, "session", |_| {
                self.process_session(run_id, session, &catalog, &rules, now)
            })
            .await;

            match result {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    let key = session.key();
                    tracing::error!(
                        session = %key,
                        reader_id = %session.reader_id,
                        error = %e,
                        "Session deferred to next run"
                    );
                    self.release_session(run_id, session).await;
                    if let Some(truck_id) = truck_id {
                        blocked.insert(truck_id);
                    }
                    report.failures.push(SessionFailure {
                        session_key: key,
                        error: e.to_string(),
                    });
                }
            }
        }

        if late_returns {
            let trucks: Vec<Truck> = catalog.trucks().cloned().collect();
            report.late_returns =
                late_return::sweep(self.store.as_ref(), &trucks, &rules, &self.config.retry, now)
                    .await;
        }

        report.finished_at = Some(Utc::now());
        tracing::info!(
            scans = report.scans_claimed,
            sessions = report.sessions_built,
            crossings = report.crossings_created,
            rejected = report.rejected_total(),
            discarded = report.discarded_total(),
            cases_opened = report.cases_opened,
            cases_closed = report.cases_closed,
            alerts = report.alerts_emitted + report.late_returns.raised,
            failures = report.failures.len(),
            deferred = report.sessions_deferred,
            "Reconciliation run complete"
        );
        Ok(report)
    }

    async fn release_session(&self, run_id: RunId, session: &ScanSession) {
        if let Err(e) = self.store.release_claims(run_id, &session.scan_ids()).await {
            tracing::error!(session = %session.key(), error = %e, "Failed to release claims");
        }
    }

    /// One attempt at the unit of work of a session.
    async fn process_session(
        &self,
        run_id: RunId,
        session: &ScanSession,
        catalog: &CatalogIndex,
        rules: &AlertRules,
        now: DateTime<Utc>,
    ) -> EngineResult<SessionOutcome> {
        let store = self.store.as_ref();
        let key = session.key();
        let mut changes = ChangeSet::new();
        changes.mark_processed(run_id, session.scan_ids(), now);

        if store.crossing_by_session(&key).await?.is_some() {
            store.commit(changes).await?;
            tracing::info!(session = %key, "Session already recorded");
            return Ok(SessionOutcome::Rejected {
                truck_id: None,
                reason: RejectReason::DuplicateSession,
            });
        }

        let resolved = match catalog.resolve(session) {
            Ok(resolved) => resolved,
            Err(reason) => {
                store.commit(changes).await?;
                tracing::warn!(
                    session = %key,
                    reader_id = %session.reader_id,
                    reason = %reason,
                    epcs = session.epcs().len(),
                    "Session discarded"
                );
                return Ok(SessionOutcome::Discarded { reason });
            }
        };
        let truck = &resolved.truck;
        let site_id = resolved.reader.site_id;
        let day = session.end.date_naive();

        let history = CrossingHistory {
            latest: store.latest_crossing(&truck.id).await?,
            latest_today: store.latest_crossing_on(&truck.id, &site_id, day, None).await?,
            last_entry_today: store
                .latest_crossing_on(&truck.id, &site_id, day, Some(Direction::Entry))
                .await?,
        };

        let direction = match self.classifier.classify(resolved.reader.mode, session.end, &history) {
            Ok(direction) => direction,
            Err(reason) => {
                store.commit(changes).await?;
                tracing::info!(
                    session = %key,
                    truck_id = %truck.id,
                    reason = %reason,
                    "Crossing rejected"
                );
                return Ok(SessionOutcome::Rejected {
                    truck_id: Some(truck.id),
                    reason,
                });
            }
        };

        let crossing = build_crossing(session, &resolved, direction);
        let kit = kit::reconcile(
            direction,
            &resolved,
            catalog.kit_for(&truck.id),
            history.last_entry_today.as_ref(),
            catalog,
        );

        let custody = ledger::plan(store, direction, &resolved, session.end).await?;
        custody.write_into(&mut changes, session.end);

        let scanned: Vec<Epc> = resolved.scanned_epcs().cloned().collect();
        let existing = store.open_case_for_truck(&truck.id).await?;
        let case_change = self.cases.apply(
            existing,
            direction,
            &scanned,
            &kit,
            truck,
            site_id,
            catalog,
            session.end,
        )?;

        let mut alerts_emitted = 0;
        if let Some(change) = &case_change {
            if direction == Direction::Exit && kit.has_shortfall() {
                let alerts =
                    alerts::plan_missing_equipment(store, rules, &change.case, truck, &kit, now)
                        .await?;
                alerts_emitted = alerts.len();
                for alert in alerts {
                    changes.insert_alert(alert);
                }
            }
            match change.expected_version {
                None => changes.insert_case(change.case.clone()),
                Some(version) => changes.update_case(change.case.clone(), version),
            };
        }

        let crossing_id = crossing.id;
        changes.insert_crossing(crossing);
        store.commit(changes).await?;

        tracing::info!(
            session = %key,
            truck_id = %truck.id,
            truck = %truck.number,
            reader_id = %resolved.reader.id,
            direction = %direction,
            items = scanned.len(),
            missing = kit.missing.len(),
            extra = kit.extra.len(),
            unknown = kit.unknown.len(),
            "Gate crossing recorded"
        );
        if let Some(change) = &case_change {
            if change.status_changed() || !change.added.is_empty() {
                tracing::info!(
                    case_id = %change.case.id,
                    truck_id = %truck.id,
                    from = ?change.previous_status,
                    to = %change.case.status,
                    severity = %change.case.severity_code,
                    added = change.added.len(),
                    recovered = change.recovered.len(),
                    "Case updated"
                );
            }
        }
        if alerts_emitted > 0 {
            tracing::info!(truck_id = %truck.id, alerts = alerts_emitted, "Missing-equipment alerts raised");
        }

        Ok(SessionOutcome::Accepted(Box::new(AcceptedCrossing {
            crossing_id,
            truck_id: truck.id,
            direction,
            case: case_change.as_ref().map(|c| c.summary()),
            kit,
            alerts_emitted,
            assignments_opened: custody.opened.len(),
            assignments_closed: custody.closed.len(),
        })))
    }
}
