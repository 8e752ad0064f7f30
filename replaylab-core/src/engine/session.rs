//! Replay session: the clock, both reference timelines and the simulator,
//! stepped together once per slice.

use crate::domain::{
    BorrowLocateEvent, BorrowLocateProfile, CorporateAction, DelistEvent, MarketSlice,
    OrderIntent, PortfolioSnapshot, SymbolEvent, SymbolMapping,
};
use crate::engine::borrow::BorrowLocateTimeline;
use crate::engine::clock::ReplayClock;
use crate::engine::config::SimulatorConfig;
use crate::engine::simulator::{ExecutionSimulator, SliceResult};
use crate::engine::symbol_events::SymbolEventsTimeline;
use crate::error::ReplayError;
use crate::source::IntentSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Reference feeds for one run, each sorted by effective timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFeeds {
    #[serde(default)]
    pub corporate_actions: Vec<CorporateAction>,
    #[serde(default)]
    pub borrow_profiles: Vec<BorrowLocateProfile>,
    #[serde(default)]
    pub symbol_mappings: Vec<SymbolMapping>,
    #[serde(default)]
    pub delists: Vec<DelistEvent>,
}

/// One slice's worth of output: timeline telemetry plus the simulator's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStep {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub borrow_events: Vec<BorrowLocateEvent>,
    pub symbol_events: Vec<SymbolEvent>,
    pub result: SliceResult,
}

pub struct ReplaySession {
    clock: ReplayClock,
    simulator: ExecutionSimulator,
    borrow: BorrowLocateTimeline,
    symbols: SymbolEventsTimeline,
    last_portfolio: Option<PortfolioSnapshot>,
    steps: usize,
}

impl ReplaySession {
    /// Validates the config and every feed before any step runs.
    pub fn new(
        symbol: &str,
        config: SimulatorConfig,
        feeds: ReferenceFeeds,
    ) -> Result<Self, ReplayError> {
        let simulator = ExecutionSimulator::new(config, feeds.corporate_actions)?;
        let borrow = BorrowLocateTimeline::new(feeds.borrow_profiles)?;
        let symbols = SymbolEventsTimeline::new(symbol, feeds.symbol_mappings, feeds.delists)?;
        info!(symbol = %symbols.current_symbol(), "replay session ready");
        Ok(Self {
            clock: ReplayClock::new(),
            simulator,
            borrow,
            symbols,
            last_portfolio: None,
            steps: 0,
        })
    }

    pub fn simulator(&self) -> &ExecutionSimulator {
        &self.simulator
    }

    pub fn current_symbol(&self) -> &str {
        self.symbols.current_symbol()
    }

    pub fn now(&self) -> Option<DateTime<Utc>> {
        self.clock.now()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn last_portfolio(&self) -> Option<&PortfolioSnapshot> {
        self.last_portfolio.as_ref()
    }

    /// Advance the clock to the slice, apply both timelines, then run the
    /// simulator. Fails only if the slice is earlier than the previous one.
    pub fn step(
        &mut self,
        slice: &MarketSlice,
        intents: &[OrderIntent],
    ) -> Result<SessionStep, ReplayError> {
        let ts = slice.timestamp;
        self.clock.advance_to(ts)?;

        let borrow_events = self.borrow.apply(ts);
        let symbol_step = self.symbols.apply(ts);
        let profile = self.borrow.profile(&symbol_step.symbol);

        let result = self.simulator.process_slice(
            slice,
            &symbol_step.symbol,
            intents,
            &symbol_step.due_delists,
            &profile,
        );
        self.last_portfolio = Some(result.portfolio.clone());
        self.steps += 1;

        Ok(SessionStep {
            timestamp: ts,
            symbol: symbol_step.symbol,
            borrow_events,
            symbol_events: symbol_step.events,
            result,
        })
    }

    /// Step every slice in order, asking `source` for intents each time.
    pub fn run(
        &mut self,
        slices: &[MarketSlice],
        source: &mut dyn IntentSource,
    ) -> Result<Vec<SessionStep>, ReplayError> {
        let mut steps = Vec::with_capacity(slices.len());
        for slice in slices {
            let intents = source.intents(slice, self.last_portfolio.as_ref());
            steps.push(self.step(slice, &intents)?);
        }
        info!(
            steps = steps.len(),
            source = source.name(),
            symbol = %self.current_symbol(),
            "replay finished"
        );
        Ok(steps)
    }
}
