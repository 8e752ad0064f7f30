//! Domain types for ReplayLab

pub mod bar;
pub mod fill;
pub mod ids;
pub mod order;
pub mod portfolio;
pub mod reference;
pub mod rows;

pub use bar::{Bar, MarketSlice, TopTick};
pub use fill::Fill;
pub use ids::{OrderId, OrderIdGen};
pub use order::{Order, OrderIntent, OrderSide, OrderType, ParseOrderError, TimeInForce};
pub use portfolio::PortfolioSnapshot;
pub use reference::{
    BorrowLocateProfile, CorporateAction, CorporateActionKind, DelistEvent, SymbolMapping,
    Timestamped,
};
pub use rows::{
    ActivationReason, BorrowLocateEvent, CancelReason, CashRejection, CashSettlement,
    CorporateActionApplied, DelistApplied, FinancingApplied, FinancingKind, LocateRejection,
    MarginEvent, MarginEventKind, MarginRejection, OrderActivation, OrderCancellation,
    OrderTrigger, RejectionReason, SymbolEvent, SymbolEventKind,
};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Symbol type alias
pub type Symbol = String;

/// Tolerance used for every ledger threshold comparison.
pub const EPSILON: Decimal = dec!(0.000000001);

/// Sign of a decimal as -1, 0 or 1.
pub fn signum(value: Decimal) -> i32 {
    if value > Decimal::ZERO {
        1
    } else if value < Decimal::ZERO {
        -1
    } else {
        0
    }
}
