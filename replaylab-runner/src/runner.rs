//! Replay runner: wires loaded feeds, a session and an intent source together.
//!
//! Entry points:
//! - `run_replay()`: loads every feed the config names, then replays. Used by the CLI.
//! - `run_replay_from_data()`: replays pre-loaded data with any intent source.
//! - `run_batch()`: independent configs in parallel, results in input order.

use rayon::prelude::*;
use replaylab_core::domain::{
    BorrowLocateEvent, CashRejection, CashSettlement, CorporateActionApplied, DelistApplied,
    FinancingApplied, Fill, LocateRejection, MarginEvent, MarginRejection, Order,
    OrderActivation, OrderCancellation, OrderTrigger, PortfolioSnapshot, SymbolEvent,
};
use replaylab_core::engine::{ReplaySession, SessionStep, SimulatorConfig};
use replaylab_core::{IntentSource, ReplayError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, RunConfig};
use crate::data_loader::{load_run_data, LoadError, LoadedData};
use crate::intents::ScheduledIntents;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("replay error: {0}")]
    Replay(#[from] ReplayError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Counters over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub slices: usize,
    pub orders: usize,
    pub fills: usize,
    pub partial_fills: usize,
    pub locate_rejections: usize,
    pub margin_rejections: usize,
    pub cash_rejections: usize,
    /// Fills from margin calls and terminal delists.
    pub forced_liquidations: usize,
    pub cancellations: usize,
    pub corporate_actions: usize,
    pub settlements: usize,
    pub total_commission: Decimal,
    /// Net cash from borrow charges and locate fees (non-positive).
    pub total_financing: Decimal,
}

impl ReplaySummary {
    pub fn rejections(&self) -> usize {
        self.locate_rejections + self.margin_rejections + self.cash_rejections
    }
}

/// Complete output of one replay: every row from every step, in step order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub dataset_hash: String,
    pub symbol: String,
    /// Symbol in force after the last step (differs from `symbol` after a rename).
    pub final_symbol: String,
    pub intent_source: String,
    pub config: SimulatorConfig,
    pub summary: ReplaySummary,
    pub final_portfolio: Option<PortfolioSnapshot>,
    pub orders: Vec<Order>,
    pub fills: Vec<Fill>,
    pub portfolio: Vec<PortfolioSnapshot>,
    pub corporate_actions: Vec<CorporateActionApplied>,
    pub delists: Vec<DelistApplied>,
    pub financing: Vec<FinancingApplied>,
    pub locate_rejections: Vec<LocateRejection>,
    pub margin_rejections: Vec<MarginRejection>,
    pub cash_rejections: Vec<CashRejection>,
    pub margin_events: Vec<MarginEvent>,
    pub cash_settlements: Vec<CashSettlement>,
    pub activations: Vec<OrderActivation>,
    pub triggers: Vec<OrderTrigger>,
    pub cancellations: Vec<OrderCancellation>,
    pub borrow_events: Vec<BorrowLocateEvent>,
    pub symbol_events: Vec<SymbolEvent>,
}

impl ReplayReport {
    fn new(run_id: String, dataset_hash: String, config: &RunConfig, source: &str) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            run_id,
            dataset_hash,
            symbol: config.symbol.clone(),
            final_symbol: config.symbol.clone(),
            intent_source: source.to_string(),
            config: config.simulator.clone(),
            summary: ReplaySummary::default(),
            final_portfolio: None,
            orders: Vec::new(),
            fills: Vec::new(),
            portfolio: Vec::new(),
            corporate_actions: Vec::new(),
            delists: Vec::new(),
            financing: Vec::new(),
            locate_rejections: Vec::new(),
            margin_rejections: Vec::new(),
            cash_rejections: Vec::new(),
            margin_events: Vec::new(),
            cash_settlements: Vec::new(),
            activations: Vec::new(),
            triggers: Vec::new(),
            cancellations: Vec::new(),
            borrow_events: Vec::new(),
            symbol_events: Vec::new(),
        }
    }

    fn absorb(&mut self, step: SessionStep) {
        let r = step.result;
        self.final_symbol = step.symbol;
        self.borrow_events.extend(step.borrow_events);
        self.symbol_events.extend(step.symbol_events);
        self.orders.extend(r.orders);
        self.fills.extend(r.fills);
        self.corporate_actions.extend(r.corporate_actions);
        self.delists.extend(r.delists);
        self.financing.extend(r.financing);
        self.locate_rejections.extend(r.locate_rejections);
        self.margin_rejections.extend(r.margin_rejections);
        self.cash_rejections.extend(r.cash_rejections);
        self.margin_events.extend(r.margin_events);
        self.cash_settlements.extend(r.cash_settlements);
        self.activations.extend(r.activations);
        self.triggers.extend(r.triggers);
        self.cancellations.extend(r.cancellations);
        self.final_portfolio = Some(r.portfolio.clone());
        self.portfolio.push(r.portfolio);
    }

    fn summarize(&mut self) {
        self.summary = ReplaySummary {
            slices: self.portfolio.len(),
            orders: self.orders.len(),
            fills: self.fills.len(),
            partial_fills: self.fills.iter().filter(|f| f.is_partial).count(),
            locate_rejections: self.locate_rejections.len(),
            margin_rejections: self.margin_rejections.len(),
            cash_rejections: self.cash_rejections.len(),
            forced_liquidations: self.margin_events.len()
                + self
                    .delists
                    .iter()
                    .filter(|d| d.is_terminal && d.position_before != d.position_after)
                    .count(),
            cancellations: self.cancellations.len(),
            corporate_actions: self.corporate_actions.len(),
            settlements: self.cash_settlements.len(),
            total_commission: self.fills.iter().map(|f| f.commission).sum(),
            total_financing: self.financing.iter().map(|f| f.cash_delta).sum(),
        };
    }
}

/// Load data for `config` and replay its scheduled intents.
pub fn run_replay(config: &RunConfig) -> Result<ReplayReport, RunError> {
    config.validate()?;
    let data = load_run_data(config)?;
    let mut source = ScheduledIntents::new(data.intents.clone());
    run_replay_from_data(config, &data, &mut source)
}

/// Replay pre-loaded data. `data.intents` is ignored; `source` supplies intents.
pub fn run_replay_from_data(
    config: &RunConfig,
    data: &LoadedData,
    source: &mut dyn IntentSource,
) -> Result<ReplayReport, RunError> {
    let run_id = config.run_id(&data.dataset_hash)?;
    let mut session =
        ReplaySession::new(&config.symbol, config.simulator.clone(), data.feeds.clone())?;
    let mut report = ReplayReport::new(run_id, data.dataset_hash.clone(), config, source.name());

    for slice in &data.slices {
        let intents = source.intents(slice, session.last_portfolio());
        let step = session.step(slice, &intents)?;
        report.absorb(step);
    }
    report.summarize();

    info!(
        run_id = %report.run_id,
        symbol = %report.symbol,
        slices = report.summary.slices,
        fills = report.summary.fills,
        rejections = report.summary.rejections(),
        "replay complete"
    );
    Ok(report)
}

/// Replay independent configs in parallel. Output order matches input order.
pub fn run_batch(configs: &[RunConfig]) -> Vec<Result<ReplayReport, RunError>> {
    configs.par_iter().map(run_replay).collect()
}
