//! Missing-equipment alerts
//!
//! One alert per (case, EPC), ever. Existence is checked through the
//! structured dedup key, and the store enforces the same key on commit.

use chrono::{DateTime, Utc};
use yard_store::YardStore;
use yard_types::{Alert, AlertDedupKey, AlertRules, MissingEquipmentCase, Truck};

use crate::error::EngineResult;
use crate::kit::KitReport;

pub fn missing_equipment_message(
    case: &MissingEquipmentCase,
    truck: &Truck,
    equipment_name: &str,
    epc: &str,
) -> String {
    format!(
        "Case {}: Truck {} missing equipment {} (EPC: {})",
        case.id.as_uuid(),
        truck.number,
        equipment_name,
        epc
    )
}

/// Alerts to raise for the shortfall of one crossing.
///
/// Nothing is raised when the shortfall is below the configured threshold.
pub async fn plan_missing_equipment<S: YardStore + ?Sized>(
    store: &S,
    rules: &AlertRules,
    case: &MissingEquipmentCase,
    truck: &Truck,
    kit: &KitReport,
    at: DateTime<Utc>,
) -> EngineResult<Vec<Alert>> {
    let missing = u32::try_from(kit.missing.len()).unwrap_or(u32::MAX);
    if missing == 0 || missing < rules.missing_item_threshold {
        return Ok(Vec::new());
    }

    let mut alerts = Vec::new();
    for unit in kit.missing.iter().filter(|u| case.contains_epc(&u.epc)) {
        let key = AlertDedupKey::MissingEquipment {
            case_id: case.id,
            epc: unit.epc.clone(),
        };
        if store.find_alert(&key).await?.is_some() {
            continue;
        }
        let message = missing_equipment_message(case, truck, &unit.name, unit.epc.as_str());
        alerts.push(Alert::new(
            key,
            case.severity_code.clone(),
            message,
            Some(case.site_id),
            at,
        ));
    }
    Ok(alerts)
}
