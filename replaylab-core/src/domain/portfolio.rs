use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// End-of-step view of the ledger, marked to the step's mark price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub position_quantity: Decimal,
    pub average_price: Decimal,
    pub market_price: Decimal,
    pub cash: Decimal,
    pub settled_cash: Decimal,
    /// Sum of pending settlements not yet matured.
    pub unsettled_cash: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub equity: Decimal,
}

impl PortfolioSnapshot {
    pub fn is_flat(&self) -> bool {
        self.position_quantity.is_zero()
    }

    pub fn total_pnl(&self) -> Decimal {
        self.realized_pnl + self.unrealized_pnl
    }
}
