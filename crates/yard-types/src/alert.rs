//! Alerts and alerting rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::epc::Epc;
use crate::ids::{AlertId, CaseId, SiteId, TruckId};

/// Component that raised an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertSource {
    MissingEquipment,
    LateReturn,
}

impl fmt::Display for AlertSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSource::MissingEquipment => write!(f, "MissingEquipment"),
            AlertSource::LateReturn => write!(f, "LateReturn"),
        }
    }
}

/// Structured deduplication key of an alert.
///
/// Missing-equipment alerts are unique per (case, EPC) for all time.
/// Late-return alerts are unique per truck among unresolved alerts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AlertDedupKey {
    MissingEquipment { case_id: CaseId, epc: Epc },
    LateReturn { truck_id: TruckId },
}

impl AlertDedupKey {
    pub fn source(&self) -> AlertSource {
        match self {
            AlertDedupKey::MissingEquipment { .. } => AlertSource::MissingEquipment,
            AlertDedupKey::LateReturn { .. } => AlertSource::LateReturn,
        }
    }

    /// Whether the key stays reserved after the alert is resolved.
    pub fn is_permanent(&self) -> bool {
        matches!(self, AlertDedupKey::MissingEquipment { .. })
    }
}

impl fmt::Display for AlertDedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertDedupKey::MissingEquipment { case_id, epc } => {
                write!(f, "MissingEquipment/{}/{}", case_id.as_uuid(), epc)
            }
            AlertDedupKey::LateReturn { truck_id } => {
                write!(f, "LateReturn/{}", truck_id.as_uuid())
            }
        }
    }
}

/// A notification record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub severity: String,
    pub source: AlertSource,
    pub dedup_key: AlertDedupKey,
    pub site_id: Option<SiteId>,
    pub is_resolved: bool,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn new(
        dedup_key: AlertDedupKey,
        severity: impl Into<String>,
        message: impl Into<String>,
        site_id: Option<SiteId>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AlertId::generate(),
            timestamp: at,
            message: message.into(),
            severity: severity.into(),
            source: dedup_key.source(),
            dedup_key,
            site_id,
            is_resolved: false,
            resolved_at: None,
        }
    }
}

/// Singleton alerting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRules {
    /// Minimum number of missing units in one crossing before alerting
    #[serde(default = "default_missing_item_threshold")]
    pub missing_item_threshold: u32,

    /// Minutes after an exit before a truck counts as overdue
    #[serde(default = "default_overdue_minutes")]
    pub overdue_minutes: u32,

    #[serde(default = "default_true")]
    pub notify_email: bool,

    #[serde(default = "default_true")]
    pub notify_sms: bool,

    #[serde(default)]
    pub notify_push: bool,
}

impl Default for AlertRules {
    fn default() -> Self {
        Self {
            missing_item_threshold: default_missing_item_threshold(),
            overdue_minutes: default_overdue_minutes(),
            notify_email: true,
            notify_sms: true,
            notify_push: false,
        }
    }
}

fn default_missing_item_threshold() -> u32 {
    1
}

fn default_overdue_minutes() -> u32 {
    60
}

fn default_true() -> bool {
    true
}
