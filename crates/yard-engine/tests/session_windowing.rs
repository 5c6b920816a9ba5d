//! Property tests: session building partitions reads by reader and gap.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use yard_engine::SessionBuilder;
use yard_types::{RawScanRecord, ReaderId, ScanId, SiteId};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Reads as (reader index, offset in seconds).
fn arb_reads() -> impl Strategy<Value = Vec<(usize, i64)>> {
    prop::collection::vec((0usize..3, 0i64..600), 1..60)
}

fn materialize(reads: &[(usize, i64)]) -> (Vec<ReaderId>, Vec<RawScanRecord>) {
    let readers: Vec<ReaderId> = (0..3).map(|_| ReaderId::generate()).collect();
    let site = SiteId::generate();
    let base = Utc.with_ymd_and_hms(2026, 4, 1, 6, 0, 0).unwrap();
    let records = reads
        .iter()
        .map(|(reader, offset)| RawScanRecord {
            id: ScanId::generate(),
            epc: format!("TAG{offset}"),
            signal_strength: -60.0,
            reader_id: readers[*reader],
            site_id: site,
            observed_at: base + Duration::seconds(*offset),
            claim: None,
            processed_at: None,
        })
        .collect();
    (readers, records)
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Every read lands in exactly one session.
    #[test]
    fn every_read_in_exactly_one_session(reads in arb_reads(), window in 1i64..60) {
        let (_, records) = materialize(&reads);
        let mut ids: Vec<ScanId> = records.iter().map(|r| r.id).collect();
        let sessions = SessionBuilder::new(Duration::seconds(window)).build(records);

        let mut seen: Vec<ScanId> = sessions.iter().flat_map(|s| s.scan_ids()).collect();
        ids.sort();
        seen.sort();
        prop_assert_eq!(ids, seen);
    }

    /// Reads inside a session are never further apart than the window, and
    /// consecutive sessions of one reader are separated by more than it.
    #[test]
    fn gaps_respect_window(reads in arb_reads(), window in 1i64..60) {
        let window = Duration::seconds(window);
        let (readers, records) = materialize(&reads);
        let sessions = SessionBuilder::new(window).build(records);

        for session in &sessions {
            prop_assert!(session.scans.iter().all(|r| r.reader_id == session.reader_id));
            for pair in session.scans.windows(2) {
                prop_assert!(pair[1].observed_at - pair[0].observed_at <= window);
            }
            prop_assert_eq!(session.start, session.scans[0].observed_at);
            prop_assert_eq!(session.end, session.scans[session.scans.len() - 1].observed_at);
        }

        for reader in readers {
            let mine: Vec<_> = sessions.iter().filter(|s| s.reader_id == reader).collect();
            for pair in mine.windows(2) {
                prop_assert!(pair[1].start - pair[0].end > window);
            }
        }
    }

    /// Sessions come out in ascending end-time order.
    #[test]
    fn sessions_ordered_by_end(reads in arb_reads(), window in 1i64..60) {
        let (_, records) = materialize(&reads);
        let sessions = SessionBuilder::new(Duration::seconds(window)).build(records);
        for pair in sessions.windows(2) {
            prop_assert!(pair[0].end <= pair[1].end);
        }
    }
}
