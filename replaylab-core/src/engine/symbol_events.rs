//! Ticker renames and delistings.

use crate::domain::{DelistEvent, SymbolEvent, SymbolEventKind, SymbolMapping};
use crate::engine::cursor::TimeOrderedCursor;
use crate::error::ReplayError;
use chrono::{DateTime, Utc};
use tracing::info;

/// What changed on the symbol timeline during one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolStep {
    /// Canonical symbol after applying due renames.
    pub symbol: String,
    pub events: Vec<SymbolEvent>,
    /// Delists for the current symbol that became due, for the simulator.
    pub due_delists: Vec<DelistEvent>,
}

/// Tracks the replayed instrument's canonical symbol through renames and
/// surfaces its delists. Entries for other symbols are consumed and ignored.
#[derive(Debug, Clone)]
pub struct SymbolEventsTimeline {
    current: String,
    mappings: TimeOrderedCursor<SymbolMapping>,
    delists: TimeOrderedCursor<DelistEvent>,
}

impl SymbolEventsTimeline {
    pub fn new(
        initial_symbol: &str,
        mappings: Vec<SymbolMapping>,
        delists: Vec<DelistEvent>,
    ) -> Result<Self, ReplayError> {
        Ok(Self {
            current: initial_symbol.trim().to_ascii_uppercase(),
            mappings: TimeOrderedCursor::new("symbol mappings", mappings)?,
            delists: TimeOrderedCursor::new("delists", delists)?,
        })
    }

    pub fn current_symbol(&self) -> &str {
        &self.current
    }

    /// Renames are applied before delists, so a delist keyed to the new
    /// ticker is picked up in the same step as the rename.
    pub fn apply(&mut self, timestamp: DateTime<Utc>) -> SymbolStep {
        let mut events = Vec::new();
        for mapping in self.mappings.advance(timestamp) {
            if !mapping.from_symbol.eq_ignore_ascii_case(&self.current) {
                continue;
            }
            let prior = std::mem::replace(&mut self.current, mapping.to_symbol.to_ascii_uppercase());
            info!(from = %prior, to = %self.current, "symbol renamed");
            events.push(SymbolEvent {
                timestamp: mapping.effective_at,
                kind: SymbolEventKind::SymbolMapping,
                symbol: self.current.clone(),
                mapped_from: Some(prior),
                is_terminal: false,
                source: mapping.source.clone(),
            });
        }

        let mut due_delists = Vec::new();
        for delist in self.delists.advance(timestamp) {
            if !delist.symbol.eq_ignore_ascii_case(&self.current) {
                continue;
            }
            events.push(SymbolEvent {
                timestamp: delist.effective_at,
                kind: SymbolEventKind::Delist,
                symbol: delist.symbol.clone(),
                mapped_from: None,
                is_terminal: delist.is_terminal,
                source: delist.source.clone(),
            });
            due_delists.push(delist.clone());
        }

        SymbolStep {
            symbol: self.current.clone(),
            events,
            due_delists,
        }
    }
}
