//! Fill price resolution and stop triggering against one slice.

use crate::domain::{Bar, OrderSide, OrderType};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const BPS: Decimal = dec!(10000);

/// Price an executable order would fill at on this slice, or `None` if it
/// cannot trade here.
///
/// Limits fill at the limit when the bar's low (buys) or high (sells) reaches
/// it; without a bar the mark is compared directly. Markets fill at the mark
/// moved against the taker by `slippage_bps`. Stop types must be converted
/// with [`OrderType::after_trigger`] first; an untriggered stop never resolves.
pub fn resolve_fill_price(
    order_type: OrderType,
    side: OrderSide,
    limit_price: Option<Decimal>,
    bar: Option<&Bar>,
    mark: Decimal,
    slippage_bps: Decimal,
) -> Option<Decimal> {
    match order_type {
        OrderType::Limit => {
            let limit = limit_price.filter(|l| *l > Decimal::ZERO)?;
            let marketable = match (bar, side) {
                (Some(bar), OrderSide::Buy) => bar.low <= limit,
                (Some(bar), OrderSide::Sell) => bar.high >= limit,
                (None, _) if mark <= Decimal::ZERO => false,
                (None, OrderSide::Buy) => mark <= limit,
                (None, OrderSide::Sell) => mark >= limit,
            };
            marketable.then_some(limit)
        }
        OrderType::Market => {
            if mark <= Decimal::ZERO {
                return None;
            }
            Some(mark * (Decimal::ONE + side.sign() * slippage_bps / BPS))
        }
        OrderType::Stop | OrderType::StopLimit => None,
    }
}

/// Buy stops trigger when price trades up through the stop, sell stops when it
/// trades down through it.
pub fn stop_triggered(side: OrderSide, stop_price: Decimal, bar: Option<&Bar>, mark: Decimal) -> bool {
    if stop_price <= Decimal::ZERO {
        return false;
    }
    match (bar, side) {
        (Some(bar), OrderSide::Buy) => bar.high >= stop_price,
        (Some(bar), OrderSide::Sell) => bar.low <= stop_price,
        (None, _) if mark <= Decimal::ZERO => false,
        (None, OrderSide::Buy) => mark >= stop_price,
        (None, OrderSide::Sell) => mark <= stop_price,
    }
}
