//! Per-fill commission and regulatory fee schedule.

use crate::domain::OrderSide;
use rust_decimal::Decimal;

/// All rates are non-negative; the simulator clamps config values on construction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeeSchedule {
    pub commission_per_unit: Decimal,
    /// SEC fee per dollar of sale proceeds.
    pub sec_fee_rate_per_dollar: Decimal,
    /// FINRA trading activity fee per share sold.
    pub taf_fee_per_share: Decimal,
    /// Cap on TAF per fill. Zero means uncapped.
    pub taf_fee_cap_per_order: Decimal,
    pub exchange_fee_per_share: Decimal,
}

impl FeeSchedule {
    pub fn commission_only(commission_per_unit: Decimal) -> Self {
        Self {
            commission_per_unit,
            ..Self::default()
        }
    }

    pub fn base_commission(&self, quantity: Decimal) -> Decimal {
        quantity * self.commission_per_unit
    }

    /// Everything charged on one fill: commission, SEC fee and TAF (sells only),
    /// exchange fee.
    pub fn total(&self, side: OrderSide, quantity: Decimal, price: Decimal) -> Decimal {
        let exchange = quantity * self.exchange_fee_per_share;
        let regulatory = match side {
            OrderSide::Buy => Decimal::ZERO,
            OrderSide::Sell => {
                let sec = quantity * price * self.sec_fee_rate_per_dollar;
                let taf = quantity * self.taf_fee_per_share;
                let taf = if self.taf_fee_cap_per_order > Decimal::ZERO {
                    taf.min(self.taf_fee_cap_per_order)
                } else {
                    taf
                };
                sec + taf
            }
        };
        self.base_commission(quantity) + regulatory + exchange
    }
}
