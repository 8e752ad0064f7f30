//! Telemetry rows emitted by the simulator and timelines.
//!
//! Every row is append-only and scoped to the step that produced it.

use crate::domain::ids::OrderId;
use crate::domain::order::{OrderSide, OrderType, TimeInForce};
use crate::domain::reference::CorporateActionKind;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an order was dropped without mutating the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    LocateUnavailable,
    InsufficientSettledCash,
    InitialMarginBreach,
}

impl RejectionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionReason::LocateUnavailable => "LOCATE_UNAVAILABLE",
            RejectionReason::InsufficientSettledCash => "INSUFFICIENT_SETTLED_CASH",
            RejectionReason::InitialMarginBreach => "INITIAL_MARGIN_BREACH",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelReason {
    /// Past `expire_at`, or a DAY order that outlived its trading date.
    Expired,
    OcoSiblingFilled,
    /// Bracket child whose parent left the book without filling.
    ParentCancelled,
}

impl CancelReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CancelReason::Expired => "EXPIRED",
            CancelReason::OcoSiblingFilled => "OCO_SIBLING_FILLED",
            CancelReason::ParentCancelled => "PARENT_CANCELLED",
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivationReason {
    ParentFilled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinancingKind {
    Borrow,
    LocateFee,
}

impl FinancingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FinancingKind::Borrow => "BORROW",
            FinancingKind::LocateFee => "LOCATE_FEE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarginEventKind {
    MaintenanceMarginLiquidation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymbolEventKind {
    SymbolMapping,
    Delist,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorporateActionApplied {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub kind: CorporateActionKind,
    pub split_ratio: Decimal,
    pub cash_amount: Decimal,
    /// Zero for actions on other symbols and for dividends outside total-return mode.
    pub cash_delta: Decimal,
    pub position_quantity: Decimal,
    pub average_price: Decimal,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelistApplied {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub is_terminal: bool,
    pub position_before: Decimal,
    pub position_after: Decimal,
    pub fill_price: Decimal,
    pub cash_after: Decimal,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancingApplied {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub kind: FinancingKind,
    pub position_quantity: Decimal,
    pub market_price: Decimal,
    pub rate_bps: Decimal,
    /// Shares the charge was computed on.
    pub quantity_applied: Decimal,
    /// Signed; charges are negative.
    pub cash_delta: Decimal,
    pub cash_after: Decimal,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocateRejection {
    pub timestamp: DateTime<Utc>,
    pub order_id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub reason: RejectionReason,
    pub locate_available: bool,
    pub locate_fee_per_share: Decimal,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginRejection {
    pub timestamp: DateTime<Utc>,
    pub order_id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub fill_price: Decimal,
    pub projected_equity: Decimal,
    pub projected_initial_margin: Decimal,
    pub reason: RejectionReason,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashRejection {
    pub timestamp: DateTime<Utc>,
    pub order_id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub required_settled_cash: Decimal,
    pub available_settled_cash: Decimal,
    pub reason: RejectionReason,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginEvent {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub kind: MarginEventKind,
    pub equity: Decimal,
    pub maintenance_requirement: Decimal,
    /// Position before the forced liquidation.
    pub position_quantity: Decimal,
    pub market_price: Decimal,
    pub cash_after: Decimal,
    pub source: String,
}

/// A pending settlement that matured this step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashSettlement {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub amount: Decimal,
    pub settled_cash: Decimal,
    /// Still pending after this item: the queue plus items later in the
    /// same maturing batch that have not been credited yet.
    pub unsettled_cash: Decimal,
    pub settle_date: DateTime<Utc>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderActivation {
    pub timestamp: DateTime<Utc>,
    pub order_id: OrderId,
    pub parent_order_id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub reason: ActivationReason,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTrigger {
    pub timestamp: DateTime<Utc>,
    pub order_id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub stop_price: Decimal,
    pub limit_price: Option<Decimal>,
    pub submitted_at: DateTime<Utc>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancellation {
    pub timestamp: DateTime<Utc>,
    pub order_id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    /// Unfilled remainder at cancellation.
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub submitted_at: DateTime<Utc>,
    pub expire_at: Option<DateTime<Utc>>,
    pub reason: CancelReason,
    pub source: String,
}

/// A borrow/locate profile that became active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowLocateEvent {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub borrow_rate_bps: Decimal,
    pub locate_available: bool,
    pub locate_fee_per_share: Decimal,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: SymbolEventKind,
    pub symbol: String,
    pub mapped_from: Option<String>,
    pub is_terminal: bool,
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_serialize_as_wire_codes() {
        let json = serde_json::to_string(&RejectionReason::InsufficientSettledCash).unwrap();
        assert_eq!(json, "\"INSUFFICIENT_SETTLED_CASH\"");
        let json = serde_json::to_string(&CancelReason::OcoSiblingFilled).unwrap();
        assert_eq!(json, "\"OCO_SIBLING_FILLED\"");
        let json = serde_json::to_string(&MarginEventKind::MaintenanceMarginLiquidation).unwrap();
        assert_eq!(json, "\"MAINTENANCE_MARGIN_LIQUIDATION\"");
        let json = serde_json::to_string(&FinancingKind::LocateFee).unwrap();
        assert_eq!(json, "\"LOCATE_FEE\"");
    }

    #[test]
    fn display_matches_serialized_code() {
        assert_eq!(RejectionReason::LocateUnavailable.to_string(), "LOCATE_UNAVAILABLE");
        assert_eq!(CancelReason::Expired.to_string(), "EXPIRED");
    }
}
