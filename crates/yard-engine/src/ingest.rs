//! Scan ingestion

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use yard_store::YardStore;
use yard_types::{Epc, RawScanRecord, ScanBatch, ScanId};

use crate::error::EngineResult;

/// Outcome of ingesting one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReceipt {
    pub accepted: usize,
    /// Events with a blank EPC
    pub rejected: usize,
    /// Events whose scan id was already stored
    pub duplicates: usize,
}

/// Turns reader batches into queued raw scan records.
pub struct ScanIngestor<S: YardStore> {
    store: Arc<S>,
}

impl<S: YardStore> ScanIngestor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn ingest(&self, batch: ScanBatch) -> EngineResult<IngestReceipt> {
        let mut receipt = IngestReceipt::default();
        let mut records = Vec::with_capacity(batch.events.len());

        for event in batch.events {
            let Some(epc) = Epc::parse(&event.epc) else {
                receipt.rejected += 1;
                continue;
            };
            records.push(RawScanRecord {
                id: event.scan_id.unwrap_or_else(ScanId::generate),
                epc: epc.as_str().to_string(),
                signal_strength: event.signal_strength,
                reader_id: batch.reader_id,
                site_id: batch.site_id,
                observed_at: event.timestamp,
                claim: None,
                processed_at: None,
            });
        }

        let offered = records.len();
        receipt.accepted = self.store.insert_scans(records).await?;
        receipt.duplicates = offered - receipt.accepted;

        tracing::debug!(
            reader_id = %batch.reader_id,
            accepted = receipt.accepted,
            rejected = receipt.rejected,
            duplicates = receipt.duplicates,
            "ingested scan batch"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use yard_store::{InMemoryYardStore, ScanStore};
    use yard_types::{ReaderId, ScanEvent, SiteId};

    fn event(scan_id: Option<ScanId>, epc: &str) -> ScanEvent {
        ScanEvent {
            scan_id,
            epc: epc.to_string(),
            signal_strength: -48.5,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_blank_epcs_rejected_and_ids_generated() {
        let store = Arc::new(InMemoryYardStore::new());
        let ingestor = ScanIngestor::new(store.clone());
        let known = ScanId::generate();

        let receipt = ingestor
            .ingest(ScanBatch {
                reader_id: ReaderId::generate(),
                site_id: SiteId::generate(),
                events: vec![event(Some(known), " e1 "), event(None, "E2"), event(None, "   ")],
            })
            .await
            .unwrap();

        assert_eq!(receipt.accepted, 2);
        assert_eq!(receipt.rejected, 1);
        let stored = store.get_scan(&known).await.unwrap().unwrap();
        assert_eq!(stored.epc, "E1");
    }

    #[tokio::test]
    async fn test_replayed_batch_is_idempotent() {
        let store = Arc::new(InMemoryYardStore::new());
        let ingestor = ScanIngestor::new(store);
        let batch = ScanBatch {
            reader_id: ReaderId::generate(),
            site_id: SiteId::generate(),
            events: vec![event(Some(ScanId::generate()), "E1")],
        };

        ingestor.ingest(batch.clone()).await.unwrap();
        let again = ingestor.ingest(batch).await.unwrap();
        assert_eq!(again.accepted, 0);
        assert_eq!(again.duplicates, 1);
    }
}
