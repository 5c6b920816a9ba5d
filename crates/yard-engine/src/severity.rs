//! Severity of outstanding missing equipment

use yard_types::{MissingEquipmentCase, SeverityTable, SeverityTier};

use crate::error::{EngineError, EngineResult};
use crate::identity::CatalogIndex;

/// Maps missing-equipment cost to a severity tier.
#[derive(Debug, Clone)]
pub struct SeverityClassifier {
    table: SeverityTable,
}

impl SeverityClassifier {
    pub fn new(table: SeverityTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &SeverityTable {
        &self.table
    }

    /// Tier for a cost in minor units. A cost no tier covers is a
    /// configuration defect and is reported, never defaulted.
    pub fn classify(&self, amount_minor: i64) -> EngineResult<&SeverityTier> {
        self.table
            .classify(amount_minor)
            .ok_or(EngineError::SeverityUnmapped { amount_minor })
    }

    /// Cost of a case's unrecovered items, priced from the catalog.
    pub fn outstanding_cost(case: &MissingEquipmentCase, catalog: &CatalogIndex) -> i64 {
        case.outstanding()
            .filter_map(|item| catalog.equipment(&item.equipment_id))
            .map(|unit| unit.cost_minor)
            .sum()
    }
}
