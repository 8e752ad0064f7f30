//! Replay engine: reference-data timelines, the execution ledger and the
//! per-slice simulator.
//!
//! A [`ReplaySession`] steps one slice at a time:
//!
//! 1. The replay clock advances (regression is fatal)
//! 2. Borrow/locate profiles and symbol events due at the timestamp activate
//! 3. The [`ExecutionSimulator`] runs its fixed per-slice sequence

pub mod borrow;
pub mod clock;
pub mod config;
pub mod corporate_actions;
pub mod cursor;
pub mod fees;
pub mod fill_price;
pub mod guards;
pub mod ledger;
pub mod order_book;
pub mod session;
pub mod settlement;
pub mod simulator;
pub mod symbol_events;

pub use borrow::BorrowLocateTimeline;
pub use clock::ReplayClock;
pub use config::SimulatorConfig;
pub use corporate_actions::{normalize_bars, CorporateActionsLedger, NormalizationMode};
pub use cursor::TimeOrderedCursor;
pub use fees::FeeSchedule;
pub use ledger::ExecutionLedger;
pub use order_book::{OrderBook, RestingOrder};
pub use session::{ReferenceFeeds, ReplaySession, SessionStep};
pub use settlement::{PendingSettlement, SettlementLedger};
pub use simulator::{ExecutionSimulator, SliceResult};
pub use symbol_events::{SymbolEventsTimeline, SymbolStep};
