use crate::domain::{BorrowLocateEvent, BorrowLocateProfile};
use crate::engine::cursor::TimeOrderedCursor;
use crate::error::ReplayError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Borrow/locate profiles replayed over time; the latest profile per symbol
/// with `effective_at <= now` is active.
#[derive(Debug, Clone, Default)]
pub struct BorrowLocateTimeline {
    cursor: TimeOrderedCursor<BorrowLocateProfile>,
    /// Keyed by uppercase symbol.
    active: HashMap<String, BorrowLocateProfile>,
}

impl BorrowLocateTimeline {
    pub fn new(profiles: Vec<BorrowLocateProfile>) -> Result<Self, ReplayError> {
        Ok(Self {
            cursor: TimeOrderedCursor::new("borrow/locate", profiles)?,
            active: HashMap::new(),
        })
    }

    /// Activate every profile due at `timestamp`, returning one event per activation.
    pub fn apply(&mut self, timestamp: DateTime<Utc>) -> Vec<BorrowLocateEvent> {
        let mut events = Vec::new();
        for profile in self.cursor.advance(timestamp) {
            events.push(BorrowLocateEvent {
                timestamp: profile.effective_at,
                symbol: profile.symbol.clone(),
                borrow_rate_bps: profile.borrow_rate_bps,
                locate_available: profile.locate_available,
                locate_fee_per_share: profile.locate_fee_per_share,
                source: profile.source.clone(),
            });
            self.active
                .insert(profile.symbol.to_ascii_uppercase(), profile.clone());
        }
        events
    }

    /// Active profile for `symbol`, or the permissive default when none has activated.
    pub fn profile(&self, symbol: &str) -> BorrowLocateProfile {
        self.active
            .get(&symbol.to_ascii_uppercase())
            .cloned()
            .unwrap_or_else(|| BorrowLocateProfile::default_for(symbol))
    }
}
