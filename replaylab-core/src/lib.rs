//! ReplayLab Core: deterministic replay execution and ledger engine.
//!
//! This crate turns `(market slice, order intents, due reference events)` into
//! `(fills, rejections, ledger deltas, portfolio snapshot)`, one timestep at a time:
//! - Domain types (bars, slices, intents, orders, fills, reference data, telemetry rows)
//! - Forward-only cursors over sorted reference feeds
//! - Execution ledger with exact decimal cash, settlement and average-cost accounting
//! - Locate, settled-cash and margin guards
//! - Resting-order book with stops, brackets and OCO groups
//! - The per-slice simulator and the replay session that drives it
//!
//! Identical inputs produce identical outputs; nothing in a run is shared or
//! concurrent.

pub mod domain;
pub mod engine;
pub mod error;
pub mod source;

pub use error::{ConfigError, ReplayError};
pub use source::{IntentSource, NoIntents};
