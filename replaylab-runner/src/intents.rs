//! Pre-recorded intents replayed on their timestamps.

use replaylab_core::domain::{MarketSlice, OrderIntent, PortfolioSnapshot};
use replaylab_core::IntentSource;

/// Releases each intent on the first slice at or after its timestamp.
///
/// Intents must be sorted by timestamp (the loader guarantees it). An intent
/// without a timestamp is released on the first slice.
#[derive(Debug, Clone, Default)]
pub struct ScheduledIntents {
    intents: Vec<OrderIntent>,
    position: usize,
}

impl ScheduledIntents {
    pub fn new(intents: Vec<OrderIntent>) -> Self {
        Self {
            intents,
            position: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.intents.len() - self.position
    }
}

impl IntentSource for ScheduledIntents {
    fn intents(&mut self, slice: &MarketSlice, _: Option<&PortfolioSnapshot>) -> Vec<OrderIntent> {
        let start = self.position;
        while self.position < self.intents.len()
            && self.intents[self.position]
                .timestamp
                .map_or(true, |t| t <= slice.timestamp)
        {
            self.position += 1;
        }
        self.intents[start..self.position].to_vec()
    }

    fn name(&self) -> &str {
        "scheduled"
    }
}
