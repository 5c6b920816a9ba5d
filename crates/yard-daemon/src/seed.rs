//! Startup fixtures for the in-memory store
//!
//! Master data is owned by the management surface. Without it the daemon
//! runs against an in-memory store, so the catalog and any backlog of scans
//! are loaded from JSON files at startup.

use std::path::Path;

use serde::{Deserialize, Serialize};
use yard_engine::ScanIngestor;
use yard_store::{InMemoryYardStore, YardStore};
use yard_types::{AlertRules, Equipment, KitTemplate, Reader, ScanBatch, Truck};

use crate::error::{DaemonError, DaemonResult};

/// Master data loaded into the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub readers: Vec<Reader>,
    #[serde(default)]
    pub trucks: Vec<Truck>,
    #[serde(default)]
    pub equipment: Vec<Equipment>,
    #[serde(default)]
    pub kit_templates: Vec<KitTemplate>,
    /// Replaces the configured alert defaults when present
    #[serde(default)]
    pub alert_rules: Option<AlertRules>,
}

impl CatalogSeed {
    pub fn from_file(path: &str) -> DaemonResult<Self> {
        read_json(path)
    }

    pub fn apply(&self, store: &InMemoryYardStore) -> DaemonResult<()> {
        for reader in &self.readers {
            store.upsert_reader(reader.clone())?;
        }
        for truck in &self.trucks {
            store.upsert_truck(truck.clone())?;
        }
        for unit in &self.equipment {
            store.upsert_equipment(unit.clone())?;
        }
        for template in &self.kit_templates {
            store.upsert_kit_template(template.clone())?;
        }
        if let Some(rules) = &self.alert_rules {
            store.set_alert_rules(rules.clone())?;
        }

        tracing::info!(
            readers = self.readers.len(),
            trucks = self.trucks.len(),
            equipment = self.equipment.len(),
            kit_templates = self.kit_templates.len(),
            "Catalog loaded"
        );
        Ok(())
    }
}

/// Ingest every batch of a JSON scan file. Returns the number of new scans.
pub async fn ingest_scans<S: YardStore>(
    ingestor: &ScanIngestor<S>,
    path: &str,
) -> DaemonResult<usize> {
    let batches: Vec<ScanBatch> = read_json(path)?;
    let mut accepted = 0;
    for batch in batches {
        accepted += ingestor.ingest(batch).await?.accepted;
    }
    tracing::info!(path, accepted, "Scan backlog ingested");
    Ok(accepted)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> DaemonResult<T> {
    let raw = std::fs::read_to_string(Path::new(path)).map_err(|source| DaemonError::Io {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| DaemonError::Json {
        path: path.to_string(),
        source,
    })
}
