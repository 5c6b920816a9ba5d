//! Entry / exit classification
//!
//! Direction comes from the reader when it is fixed to one direction. A
//! bidirectional reader toggles against the truck's last crossing of the day
//! at the same site, and the first crossing of a day is an entry.
//!
//! Before a crossing is accepted the following must hold:
//! - it is later than every crossing already recorded for the truck
//! - an entry does not follow an entry of the same day
//! - an exit follows an entry of the same day and not another exit
//! - it is not the same direction as the truck's last crossing within the
//!   duplicate-suppression window, whatever the day

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use yard_types::{
    CrossingId, CrossingItemId, Direction, GateCrossing, GateCrossingItem, ReaderMode,
};

use crate::identity::ResolvedSession;
use crate::session::ScanSession;

/// Status stamped on crossings written by the engine.
pub const CROSSING_STATUS_COMPLETED: &str = "Completed";

/// Why a resolved session did not become a crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The session was already recorded by an earlier run
    DuplicateSession,
    /// Not later than the truck's latest crossing
    Stale,
    AlreadyInside,
    NoEntryToday,
    AlreadyExited,
    /// Same direction as the previous crossing, too soon after it
    DuplicateWithinWindow,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::DuplicateSession => "duplicate_session",
            RejectReason::Stale => "stale",
            RejectReason::AlreadyInside => "already_inside",
            RejectReason::NoEntryToday => "no_entry_today",
            RejectReason::AlreadyExited => "already_exited",
            RejectReason::DuplicateWithinWindow => "duplicate_within_window",
        };
        f.write_str(text)
    }
}

/// The truck's crossing history relevant to one session.
#[derive(Debug, Clone, Default)]
pub struct CrossingHistory {
    /// Latest crossing at any site on any day
    pub latest: Option<GateCrossing>,
    /// Latest crossing at the reader's site on the session's day
    pub latest_today: Option<GateCrossing>,
    /// Latest entry at the reader's site on the session's day
    pub last_entry_today: Option<GateCrossing>,
}

/// Decides the direction of a session and enforces alternation.
#[derive(Debug, Clone, Copy)]
pub struct GateClassifier {
    suppression: Duration,
}

impl GateClassifier {
    pub fn new(suppression: Duration) -> Self {
        Self { suppression }
    }

    pub fn classify(
        &self,
        mode: ReaderMode,
        event_time: DateTime<Utc>,
        history: &CrossingHistory,
    ) -> Result<Direction, RejectReason> {
        if let Some(latest) = &history.latest {
            if event_time <= latest.event_time {
                return Err(RejectReason::Stale);
            }
        }

        let direction = mode.fixed_direction().unwrap_or_else(|| {
            history
                .latest_today
                .as_ref()
                .map_or(Direction::Entry, |c| c.direction.opposite())
        });

        let last_today = history.latest_today.as_ref().map(|c| c.direction);
        match direction {
            Direction::Entry if last_today == Some(Direction::Entry) => {
                return Err(RejectReason::AlreadyInside);
            }
            Direction::Exit if history.last_entry_today.is_none() => {
                return Err(RejectReason::NoEntryToday);
            }
            Direction::Exit if last_today == Some(Direction::Exit) => {
                return Err(RejectReason::AlreadyExited);
            }
            _ => {}
        }

        if let Some(latest) = &history.latest {
            if latest.direction == direction && event_time - latest.event_time < self.suppression {
                return Err(RejectReason::DuplicateWithinWindow);
            }
        }

        Ok(direction)
    }
}

/// Build the crossing record of an accepted session.
///
/// The event time is the end of the session, and there is one item per
/// recognized equipment unit.
pub fn build_crossing(
    session: &ScanSession,
    resolved: &ResolvedSession,
    direction: Direction,
) -> GateCrossing {
    let id = CrossingId::generate();
    let items = resolved
        .equipment
        .iter()
        .map(|unit| GateCrossingItem {
            id: CrossingItemId::generate(),
            crossing_id: id,
            equipment_id: unit.id,
            epc: unit.tag.clone(),
            site_id: resolved.reader.site_id,
        })
        .collect();

    GateCrossing {
        id,
        session_key: session.key(),
        truck_id: resolved.truck.id,
        driver_id: resolved.truck.driver_id,
        reader_id: resolved.reader.id,
        site_id: resolved.reader.site_id,
        event_time: session.end,
        direction,
        status: CROSSING_STATUS_COMPLETED.to_string(),
        notes: None,
        items,
    }
}
