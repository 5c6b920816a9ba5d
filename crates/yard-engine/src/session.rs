//! Session building
//!
//! A reader sees the same truck many times while it passes the gate. Reads
//! from one reader are grouped into a session as long as each read follows
//! the previous one within the session window; a longer gap starts a new
//! session. Sessions never span readers.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use yard_types::{Epc, RawScanRecord, ReaderId, ScanId, SessionKey, SiteId};

/// Reads of one reader forming a single physical crossing.
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub reader_id: ReaderId,
    pub site_id: SiteId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Member reads, ordered by observation time
    pub scans: Vec<RawScanRecord>,
}

impl ScanSession {
    /// Stable identity of the session: its reader and first read.
    pub fn key(&self) -> SessionKey {
        // Built sessions always hold at least one read.
        let first = self
            .scans
            .first()
            .map(|s| s.id)
            .unwrap_or_else(|| ScanId::from_uuid(Default::default()));
        SessionKey::new(&self.reader_id, &first)
    }

    pub fn scan_ids(&self) -> Vec<ScanId> {
        self.scans.iter().map(|s| s.id).collect()
    }

    /// Distinct normalized EPCs of the session.
    pub fn epcs(&self) -> BTreeSet<Epc> {
        self.scans.iter().filter_map(|s| Epc::parse(&s.epc)).collect()
    }
}

/// Groups raw reads into sessions.
#[derive(Debug, Clone, Copy)]
pub struct SessionBuilder {
    window: Duration,
}

impl SessionBuilder {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Build sessions from `scans`, returned in ascending end-time order.
    pub fn build(&self, scans: Vec<RawScanRecord>) -> Vec<ScanSession> {
        let mut by_reader: BTreeMap<ReaderId, Vec<RawScanRecord>> = BTreeMap::new();
        for scan in scans {
            by_reader.entry(scan.reader_id).or_default().push(scan);
        }

        let mut sessions = Vec::new();
        for (reader_id, mut reads) in by_reader {
            reads.sort_by(|a, b| a.observed_at.cmp(&b.observed_at).then(a.id.cmp(&b.id)));

            let mut current: Option<ScanSession> = None;
            for scan in reads {
                match current.as_mut() {
                    Some(session) if scan.observed_at - session.end <= self.window => {
                        session.end = scan.observed_at;
                        session.scans.push(scan);
                    }
                    _ => {
                        if let Some(done) = current.take() {
                            sessions.push(done);
                        }
                        current = Some(ScanSession {
                            reader_id,
                            site_id: scan.site_id,
                            start: scan.observed_at,
                            end: scan.observed_at,
                            scans: vec![scan],
                        });
                    }
                }
            }
            sessions.extend(current);
        }

        sessions.sort_by(|a, b| a.end.cmp(&b.end).then(a.reader_id.cmp(&b.reader_id)));
        sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(reader_id: ReaderId, epc: &str, at: DateTime<Utc>) -> RawScanRecord {
        RawScanRecord {
            id: ScanId::generate(),
            epc: epc.to_string(),
            signal_strength: -55.0,
            reader_id,
            site_id: SiteId::generate(),
            observed_at: at,
            claim: None,
            processed_at: None,
        }
    }

    #[test]
    fn test_gap_within_window_merges() {
        let reader = ReaderId::generate();
        let t0 = Utc::now();
        let builder = SessionBuilder::new(Duration::seconds(10));

        let sessions = builder.build(vec![
            scan(reader, "E1", t0),
            scan(reader, "E2", t0 + Duration::seconds(5)),
        ]);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].scans.len(), 2);
        assert_eq!(sessions[0].end - sessions[0].start, Duration::seconds(5));
    }

    #[test]
    fn test_gap_beyond_window_splits() {
        let reader = ReaderId::generate();
        let t0 = Utc::now();
        let builder = SessionBuilder::new(Duration::seconds(10));

        let sessions = builder.build(vec![
            scan(reader, "E1", t0 + Duration::seconds(15)),
            scan(reader, "E2", t0),
        ]);
        assert_eq!(sessions.len(), 2);
        assert!(sessions[0].end < sessions[1].start);
    }

    #[test]
    fn test_single_scan_is_a_session() {
        let sessions = SessionBuilder::new(Duration::seconds(10))
            .build(vec![scan(ReaderId::generate(), "E1", Utc::now())]);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].start, sessions[0].end);
    }

    #[test]
    fn test_sessions_never_span_readers() {
        let t0 = Utc::now();
        let (a, b) = (ReaderId::generate(), ReaderId::generate());
        let sessions = SessionBuilder::new(Duration::seconds(10)).build(vec![
            scan(a, "E1", t0),
            scan(b, "E1", t0 + Duration::seconds(1)),
        ]);
        assert_eq!(sessions.len(), 2);
        assert!(sessions.iter().all(|s| s.scans.iter().all(|r| r.reader_id == s.reader_id)));
    }

    #[test]
    fn test_epcs_are_distinct_and_normalized() {
        let reader = ReaderId::generate();
        let t0 = Utc::now();
        let sessions = SessionBuilder::new(Duration::seconds(10)).build(vec![
            scan(reader, "e1", t0),
            scan(reader, " E1 ", t0),
            scan(reader, "E2", t0),
        ]);
        let epcs: Vec<String> = sessions[0].epcs().iter().map(|e| e.to_string()).collect();
        assert_eq!(epcs, vec!["E1", "E2"]);
    }

    #[test]
    fn test_key_uses_first_read() {
        let reader = ReaderId::generate();
        let t0 = Utc::now();
        let first = scan(reader, "E1", t0);
        let key = SessionKey::new(&reader, &first.id);
        let sessions = SessionBuilder::new(Duration::seconds(10))
            .build(vec![scan(reader, "E2", t0 + Duration::seconds(2)), first]);
        assert_eq!(sessions[0].key(), key);
    }
}
