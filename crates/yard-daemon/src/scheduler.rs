//! Interval scheduler and heartbeat

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Notify, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};
use yard_engine::{ReconciliationEngine, RunReport};
use yard_store::YardStore;

use crate::config::SchedulerConfig;
use crate::error::DaemonResult;

/// Last-run state, for spotting a stuck or failing daemon.
#[derive(Debug, Clone, Serialize)]
pub struct Heartbeat {
    pub last_run_at: DateTime<Utc>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_report: Option<RunReport>,
    pub last_error: Option<String>,
}

/// Drives the engine on a fixed interval.
pub struct Scheduler<S: YardStore> {
    config: SchedulerConfig,
    engine: Arc<ReconciliationEngine<S>>,
    running: Arc<RwLock<bool>>,
    shutdown: Notify,
    heartbeat: Arc<RwLock<Option<Heartbeat>>>,
}

impl<S: YardStore + 'static> Scheduler<S> {
    pub fn new(config: SchedulerConfig, engine: Arc<ReconciliationEngine<S>>) -> Arc<Self> {
        Arc::new(Self {
            config,
            engine,
            running: Arc::new(RwLock::new(false)),
            shutdown: Notify::new(),
            heartbeat: Arc::new(RwLock::new(None)),
        })
    }

    /// Run the loop until [`Scheduler::stop`] is called.
    pub async fn start(self: Arc<Self>) {
        {
            let mut running = self.running.write().await;
            *running = true;
        }

        tracing::info!(
            interval_secs = self.config.run_interval_secs,
            late_returns = self.config.late_return_enabled,
            "Scheduler started"
        );

        let mut ticker = interval(Duration::from_secs(self.config.run_interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "Reconciliation run failed");
                    }
                }
                _ = self.shutdown.notified() => break,
            }

            let running = self.running.read().await;
            if !*running {
                break;
            }
        }

        tracing::info!("Scheduler stopped");
    }

    /// Stop the loop after the current run.
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        self.shutdown.notify_one();
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// One pass at the current time.
    pub async fn tick(&self) -> DaemonResult<RunReport> {
        self.tick_at(Utc::now()).await
    }

    /// One pass at `now`, recorded in the heartbeat.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> DaemonResult<RunReport> {
        let result = if self.config.late_return_enabled {
            self.engine.run_once(now).await
        } else {
            self.engine.reconcile_scans(now).await
        };

        let mut heartbeat = self.heartbeat.write().await;
        let previous = heartbeat.take();
        let failures = previous.as_ref().map_or(0, |h| h.consecutive_failures);
        let last_success_at = previous.as_ref().and_then(|h| h.last_success_at);

        match result {
            Ok(report) => {
                if !report.is_clean() {
                    tracing::warn!(
                        run_id = %report.run_id,
                        failed_sessions = report.failures.len(),
                        deferred_sessions = report.sessions_deferred,
                        failed_late_returns = report.late_returns.failed,
                        "Run finished with deferred work"
                    );
                }
                *heartbeat = Some(Heartbeat {
                    last_run_at: now,
                    last_success_at: Some(now),
                    consecutive_failures: 0,
                    last_report: Some(report.clone()),
                    last_error: None,
                });
                Ok(report)
            }
            Err(e) => {
                *heartbeat = Some(Heartbeat {
                    last_run_at: now,
                    last_success_at,
                    consecutive_failures: failures + 1,
                    last_report: previous.and_then(|h| h.last_report),
                    last_error: Some(e.to_string()),
                });
                Err(e.into())
            }
        }
    }

    pub async fn heartbeat(&self) -> Option<Heartbeat> {
        self.heartbeat.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use yard_engine::EngineConfig;
    use yard_store::InMemoryYardStore;

    fn scheduler(config: SchedulerConfig) -> Arc<Scheduler<InMemoryYardStore>> {
        let store = Arc::new(InMemoryYardStore::new());
        let engine = ReconciliationEngine::new(store, EngineConfig::default()).unwrap();
        Scheduler::new(config, Arc::new(engine))
    }

    #[tokio::test]
    async fn test_tick_records_heartbeat() {
        let scheduler = scheduler(SchedulerConfig::default());
        assert!(scheduler.heartbeat().await.is_none());

        let now = Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap();
        let report = scheduler.tick_at(now).await.unwrap();
        assert!(report.is_clean());

        let heartbeat = scheduler.heartbeat().await.unwrap();
        assert_eq!(heartbeat.last_run_at, now);
        assert_eq!(heartbeat.last_success_at, Some(now));
        assert_eq!(heartbeat.consecutive_failures, 0);
        assert_eq!(heartbeat.last_report.unwrap().run_id, report.run_id);
    }

    #[tokio::test]
    async fn test_loop_stops_on_request() {
        let scheduler = scheduler(SchedulerConfig {
            run_interval_secs: 3600,
            late_return_enabled: false,
        });

        let handle = tokio::spawn(scheduler.clone().start());
        // The first tick fires immediately.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(scheduler.is_running().await);

        scheduler.stop().await;
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert!(!scheduler.is_running().await);
        assert!(scheduler.heartbeat().await.is_some());
    }
}
