//! Raw scan records and ingestion batches

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ReaderId, RunId, ScanId, SiteId};

/// A decoded tag read as persisted by ingestion.
///
/// Immutable once written except for `claim` and `processed_at`. The
/// engine claims a record before computing anything from it and sets
/// `processed_at` exactly once, in the same commit that applies the effects
/// of the session the record belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawScanRecord {
    pub id: ScanId,
    /// EPC exactly as reported by the reader
    pub epc: String,
    pub signal_strength: f64,
    pub reader_id: ReaderId,
    pub site_id: SiteId,
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub claim: Option<ScanClaim>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}

impl RawScanRecord {
    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }

    /// Whether the record can be claimed by a run at `now`.
    pub fn is_claimable(&self, now: DateTime<Utc>, lease: chrono::Duration) -> bool {
        if self.processed_at.is_some() {
            return false;
        }
        match &self.claim {
            None => true,
            Some(claim) => now - claim.claimed_at > lease,
        }
    }

    pub fn is_claimed_by(&self, run_id: &RunId) -> bool {
        self.claim.as_ref().map_or(false, |c| &c.run_id == run_id)
    }
}

/// Lease taken by a run on an unprocessed scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanClaim {
    pub run_id: RunId,
    pub claimed_at: DateTime<Utc>,
}

/// One read inside an ingestion batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEvent {
    #[serde(default)]
    pub scan_id: Option<ScanId>,
    pub epc: String,
    #[serde(default)]
    pub signal_strength: f64,
    pub timestamp: DateTime<Utc>,
}

/// A batch of reads uploaded by one reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanBatch {
    pub reader_id: ReaderId,
    pub site_id: SiteId,
    #[serde(default)]
    pub events: Vec<ScanEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record() -> RawScanRecord {
        RawScanRecord {
            id: ScanId::generate(),
            epc: "E1".to_string(),
            signal_strength: -52.0,
            reader_id: ReaderId::generate(),
            site_id: SiteId::generate(),
            observed_at: Utc::now(),
            claim: None,
            processed_at: None,
        }
    }

    #[test]
    fn test_claimable_until_processed() {
        let now = Utc::now();
        let mut scan = record();
        assert!(scan.is_claimable(now, Duration::minutes(5)));

        scan.processed_at = Some(now);
        assert!(!scan.is_claimable(now, Duration::minutes(5)));
    }

    #[test]
    fn test_claim_lease_expires() {
        let now = Utc::now();
        let run_id = RunId::generate();
        let mut scan = record();
        scan.claim = Some(ScanClaim {
            run_id,
            claimed_at: now - Duration::minutes(2),
        });

        assert!(scan.is_claimed_by(&run_id));
        assert!(!scan.is_claimable(now, Duration::minutes(5)));
        assert!(scan.is_claimable(now, Duration::minutes(1)));
    }

    #[test]
    fn test_batch_defaults() {
        let json = r#"{
            "reader_id": "6f1c1b0e-8d0e-4f5e-9f51-1f0c9d3c2a11",
            "site_id": "2b1d4c57-3a5e-4f0a-8d7c-0e6b5a4c3d21",
            "events": [{"epc": "E1", "timestamp": "2026-01-05T08:00:00Z"}]
        }"#;
        let batch: ScanBatch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.events.len(), 1);
        assert!(batch.events[0].scan_id.is_none());
        assert_eq!(batch.events[0].signal_strength, 0.0);
    }
}
