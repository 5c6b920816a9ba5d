//! Late-return sweep
//!
//! A truck whose latest crossing is an exit older than the overdue window
//! gets one unresolved late-return alert. While that alert is open, later
//! sweeps refresh it in place. Once the truck's latest crossing is an entry
//! the alert is resolved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use yard_store::{ChangeSet, YardStore};
use yard_types::{Alert, AlertDedupKey, AlertRules, Direction, GateCrossing, Truck};

use crate::config::RetryPolicy;
use crate::error::EngineResult;
use crate::retry::with_retry;

pub const LATE_RETURN_SEVERITY: &str = "Warning";

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LateReturnReport {
    pub raised: usize,
    pub refreshed: usize,
    pub resolved: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LateReturnAction {
    Raised,
    Refreshed,
    Resolved,
}

fn overdue_message(truck: &Truck, exit: &GateCrossing, now: DateTime<Utc>) -> String {
    let minutes = (now - exit.event_time).num_minutes();
    format!(
        "Truck {} has not returned {} minutes after exit at {}",
        truck.number,
        minutes,
        exit.event_time.format("%Y-%m-%d %H:%M UTC")
    )
}

/// Sweep every truck once.
pub async fn sweep<S: YardStore + ?Sized>(
    store: &S,
    trucks: &[Truck],
    rules: &AlertRules,
    retry: &RetryPolicy,
    now: DateTime<Utc>,
) -> LateReturnReport {
    let mut report = LateReturnReport::default();
    for truck in trucks {
        let outcome = with_retry(retry, "late_return", |_| sweep_truck(store, truck, rules, now)).await;
        match outcome {
            Ok(Some(LateReturnAction::Raised)) => {
                tracing::info!(truck_id = %truck.id, truck = %truck.number, "Late-return alert raised");
                report.raised += 1;
            }
            Ok(Some(LateReturnAction::Refreshed)) => report.refreshed += 1,
            Ok(Some(LateReturnAction::Resolved)) => {
                tracing::info!(truck_id = %truck.id, "Late-return alert resolved");
                report.resolved += 1;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(truck_id = %truck.id, error = %e, "Late-return check failed");
                report.failed += 1;
            }
        }
    }
    report
}

async fn sweep_truck<S: YardStore + ?Sized>(
    store: &S,
    truck: &Truck,
    rules: &AlertRules,
    now: DateTime<Utc>,
) -> EngineResult<Option<LateReturnAction>> {
    let Some(latest) = store.latest_crossing(&truck.id).await? else {
        return Ok(None);
    };
    let key = AlertDedupKey::LateReturn { truck_id: truck.id };
    let open_alert = store.find_alert(&key).await?;
    let overdue = chrono::Duration::minutes(i64::from(rules.overdue_minutes));

    let mut changes = ChangeSet::new();
    let action = match (latest.direction, open_alert) {
        (Direction::Exit, existing) if now - latest.event_time > overdue => {
            let message = overdue_message(truck, &latest, now);
            match existing {
                Some(alert) => {
                    changes.refresh_alert(alert.id, message, now);
                    LateReturnAction::Refreshed
                }
                None => {
                    changes.insert_alert(Alert::new(
                        key,
                        LATE_RETURN_SEVERITY,
                        message,
                        Some(latest.site_id),
                        now,
                    ));
                    LateReturnAction::Raised
                }
            }
        }
        // The truck came back and left again between sweeps.
        (Direction::Exit, Some(alert)) if alert.timestamp < latest.event_time => {
            changes.resolve_alert(alert.id, now);
            LateReturnAction::Resolved
        }
        (Direction::Entry, Some(alert)) => {
            changes.resolve_alert(alert.id, now);
            LateReturnAction::Resolved
        }
        _ => return Ok(None),
    };

    store.commit(changes).await?;
    Ok(Some(action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use yard_store::{AlertStore, InMemoryYardStore, UnitOfWork};
    use yard_types::{CrossingId, Epc, ReaderId, ScanId, SessionKey, SiteId, TruckId};

    fn truck() -> Truck {
        Truck {
            id: TruckId::generate(),
            number: "TRK-12".to_string(),
            driver_id: None,
            site_id: SiteId::generate(),
            tag: Epc::parse("TRUCK12").unwrap(),
        }
    }

    async fn record(store: &InMemoryYardStore, truck: &Truck, direction: Direction, at: DateTime<Utc>) {
        let mut changes = ChangeSet::new();
        changes.insert_crossing(GateCrossing {
            id: CrossingId::generate(),
            session_key: SessionKey::new(&ReaderId::generate(), &ScanId::generate()),
            truck_id: truck.id,
            driver_id: None,
            reader_id: ReaderId::generate(),
            site_id: truck.site_id,
            event_time: at,
            direction,
            status: "Completed".to_string(),
            notes: None,
            items: Vec::new(),
        });
        store.commit(changes).await.unwrap();
    }

    #[tokio::test]
    async fn test_overdue_raised_refreshed_then_resolved() {
        let store = InMemoryYardStore::new();
        let truck = truck();
        let rules = AlertRules::default();
        let retry = RetryPolicy::default();
        let now = Utc::now();

        record(&store, &truck, Direction::Exit, now - Duration::minutes(90)).await;

        let first = sweep(&store, &[truck.clone()], &rules, &retry, now).await;
        assert_eq!(first.raised, 1);

        let second = sweep(&store, &[truck.clone()], &rules, &retry, now + Duration::minutes(5)).await;
        assert_eq!(second.refreshed, 1);
        assert_eq!(store.list_alerts().await.unwrap().len(), 1);

        record(&store, &truck, Direction::Entry, now + Duration::minutes(10)).await;
        let third = sweep(&store, &[truck.clone()], &rules, &retry, now + Duration::minutes(11)).await;
        assert_eq!(third.resolved, 1);

        let alerts = store.list_alerts().await.unwrap();
        assert!(alerts[0].is_resolved);
        assert!(alerts[0].resolved_at.is_some());
    }

    #[tokio::test]
    async fn test_recent_exit_not_overdue() {
        let store = InMemoryYardStore::new();
        let truck = truck();
        let now = Utc::now();
        record(&store, &truck, Direction::Exit, now - Duration::minutes(30)).await;

        let report =
            sweep(&store, &[truck], &AlertRules::default(), &RetryPolicy::default(), now).await;
        assert_eq!(report, LateReturnReport::default());
    }
}
