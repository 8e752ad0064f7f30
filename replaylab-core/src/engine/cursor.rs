//! Forward-only cursor over a time-sorted feed.

use crate::domain::Timestamped;
use crate::error::ReplayError;
use chrono::{DateTime, Utc};

/// Owns an ascending feed and the index of the first entry not yet yielded.
///
/// `advance` hands out each entry exactly once and never rewinds, so an entry
/// whose effective timestamp has passed is applied once no matter how many
/// later steps go by.
#[derive(Debug, Clone)]
pub struct TimeOrderedCursor<T> {
    entries: Vec<T>,
    position: usize,
}

impl<T: Timestamped> TimeOrderedCursor<T> {
    /// Fails if the feed is not sorted by effective timestamp.
    pub fn new(feed: &'static str, entries: Vec<T>) -> Result<Self, ReplayError> {
        for (index, pair) in entries.windows(2).enumerate() {
            let (previous, at) = (pair[0].effective_at(), pair[1].effective_at());
            if at < previous {
                return Err(ReplayError::UnsortedFeed {
                    feed,
                    index: index + 1,
                    at,
                    previous,
                });
            }
        }
        Ok(Self {
            entries,
            position: 0,
        })
    }

    /// Yield every not-yet-yielded entry with `effective_at <= timestamp`.
    pub fn advance(&mut self, timestamp: DateTime<Utc>) -> &[T] {
        let start = self.position;
        while self.position < self.entries.len()
            && self.entries[self.position].effective_at() <= timestamp
        {
            self.position += 1;
        }
        &self.entries[start..self.position]
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.entries.len() - self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.position == self.entries.len()
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }
}

impl<T> Default for TimeOrderedCursor<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            position: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DelistEvent;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap()
    }

    fn delist(offset_days: i64) -> DelistEvent {
        DelistEvent {
            effective_at: t0() + Duration::days(offset_days),
            symbol: "ABC".into(),
            is_terminal: false,
            source: "test".into(),
        }
    }

    #[test]
    fn advance_yields_each_entry_once() {
        let feed = vec![delist(0), delist(1), delist(1), delist(5)];
        let mut cursor = TimeOrderedCursor::new("delists", feed).unwrap();
        assert_eq!(cursor.advance(t0() - Duration::hours(1)).len(), 0);
        assert_eq!(cursor.advance(t0()).len(), 1);
        assert_eq!(cursor.advance(t0() + Duration::days(2)).len(), 2);
        assert_eq!(cursor.advance(t0() + Duration::days(2)).len(), 0);
        assert_eq!(cursor.remaining(), 1);
        assert_eq!(cursor.advance(t0() + Duration::days(10)).len(), 1);
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn earlier_timestamp_does_not_rewind() {
        let mut cursor = TimeOrderedCursor::new("delists", vec![delist(0), delist(3)]).unwrap();
        cursor.advance(t0() + Duration::days(4));
        assert!(cursor.advance(t0()).is_empty());
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn unsorted_feed_is_rejected() {
        let err = TimeOrderedCursor::new("delists", vec![delist(2), delist(1)]).unwrap_err();
        assert!(matches!(err, ReplayError::UnsortedFeed { index: 1, .. }));
    }
}
