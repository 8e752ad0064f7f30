use crate::domain::ids::OrderId;
use crate::domain::order::{OrderSide, OrderType};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fill record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub timestamp: DateTime<Utc>,
    pub order_id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub requested_quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub is_partial: bool,
    pub submitted_at: DateTime<Utc>,
    pub order_type: OrderType,
    pub price: Decimal,
    /// Base commission plus regulatory and exchange fees.
    pub commission: Decimal,
    pub realized_pnl_delta: Decimal,
    pub source: String,
}

impl Fill {
    pub fn signed_quantity(&self) -> Decimal {
        self.side.sign() * self.quantity
    }

    pub fn notional(&self) -> Decimal {
        self.quantity * self.price
    }
}
