use crate::error::ReplayError;
use chrono::{DateTime, Utc};

/// Monotonic replay clock. Stepping any timeline backwards would replay or
/// skip reference events, so regression is a hard error.
#[derive(Debug, Clone, Default)]
pub struct ReplayClock {
    now: Option<DateTime<Utc>>,
}

impl ReplayClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until the first step.
    pub fn now(&self) -> Option<DateTime<Utc>> {
        self.now
    }

    /// Move to `timestamp`. Equal timestamps are allowed.
    pub fn advance_to(&mut self, timestamp: DateTime<Utc>) -> Result<(), ReplayError> {
        if let Some(current) = self.now {
            if timestamp < current {
                return Err(ReplayError::ClockRegression {
                    current,
                    requested: timestamp,
                });
            }
        }
        self.now = Some(timestamp);
        Ok(())
    }
}
