//! Pre-trade validators and the maintenance-margin monitor.
//!
//! All checks are pure: they read the ledger and return a verdict. The
//! simulator decides what to mutate.

use crate::domain::{BorrowLocateProfile, OrderSide, EPSILON};
use crate::engine::ledger::ExecutionLedger;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocateVerdict {
    /// Order does not push short exposure further.
    NotRequired,
    Granted {
        incremental_short: Decimal,
        fee: Decimal,
    },
    Unavailable,
}

/// Shares by which a fill pushes short exposure beyond where it already is.
pub fn incremental_short(position: Decimal, side: OrderSide, quantity: Decimal) -> Decimal {
    let projected = position + side.sign() * quantity;
    let current_short = (-position).max(Decimal::ZERO);
    let projected_short = (-projected).max(Decimal::ZERO);
    (projected_short - current_short).max(Decimal::ZERO)
}

/// Sells that increase net short need a locate; the fee covers only the increment.
pub fn check_locate(
    position: Decimal,
    side: OrderSide,
    quantity: Decimal,
    profile: &BorrowLocateProfile,
) -> LocateVerdict {
    if side == OrderSide::Buy {
        return LocateVerdict::NotRequired;
    }
    let increment = incremental_short(position, side, quantity);
    if increment <= Decimal::ZERO {
        return LocateVerdict::NotRequired;
    }
    if !profile.locate_available {
        return LocateVerdict::Unavailable;
    }
    LocateVerdict::Granted {
        incremental_short: increment,
        fee: increment * profile.locate_fee_per_share.max(Decimal::ZERO),
    }
}

/// Settled cash a buy needs: notional plus base commission.
pub fn settled_cash_required(quantity: Decimal, price: Decimal, commission_per_unit: Decimal) -> Decimal {
    quantity * (price + commission_per_unit)
}

/// Returns the requirement when a buy cannot be funded from settled cash.
pub fn check_settled_cash(
    settled_cash: Decimal,
    side: OrderSide,
    quantity: Decimal,
    price: Decimal,
    commission_per_unit: Decimal,
) -> Option<Decimal> {
    if side != OrderSide::Buy {
        return None;
    }
    let required = settled_cash_required(quantity, price, commission_per_unit);
    if settled_cash + EPSILON < required {
        Some(required)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginProjection {
    pub equity: Decimal,
    pub initial_margin: Decimal,
}

/// Project the fill (marked at its own price) and compare equity to initial margin.
/// `costs` is everything the fill would debit besides notional.
pub fn check_initial_margin(
    ledger: &ExecutionLedger,
    side: OrderSide,
    quantity: Decimal,
    price: Decimal,
    costs: Decimal,
    initial_margin_rate: Decimal,
) -> Result<MarginProjection, MarginProjection> {
    let projected = ledger.project_fill(side, quantity, price, costs);
    let projection = MarginProjection {
        equity: projected.cash + projected.position * price,
        initial_margin: (projected.position * price).abs() * initial_margin_rate,
    };
    if initial_margin_rate > Decimal::ZERO && projection.equity + EPSILON < projection.initial_margin {
        Err(projection)
    } else {
        Ok(projection)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaintenanceBreach {
    pub equity: Decimal,
    pub requirement: Decimal,
}

/// `Some` when an open position's equity has fallen below the maintenance requirement.
pub fn maintenance_breach(
    ledger: &ExecutionLedger,
    mark: Decimal,
    maintenance_rate: Decimal,
) -> Option<MaintenanceBreach> {
    if maintenance_rate <= Decimal::ZERO || ledger.is_flat() || mark <= Decimal::ZERO {
        return None;
    }
    let equity = ledger.equity(mark);
    let requirement = (ledger.position() * mark).abs() * maintenance_rate;
    (equity + EPSILON < requirement).then_some(MaintenanceBreach { equity, requirement })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn profile(available: bool, fee: Decimal) -> BorrowLocateProfile {
        BorrowLocateProfile {
            locate_available: available,
            locate_fee_per_share: fee,
            ..BorrowLocateProfile::default_for("ABC")
        }
    }

    #[test]
    fn locate_fee_covers_only_the_increment() {
        let verdict = check_locate(dec!(-100), OrderSide::Sell, dec!(50), &profile(true, dec!(0.02)));
        assert_eq!(
            verdict,
            LocateVerdict::Granted {
                incremental_short: dec!(50),
                fee: dec!(1.00)
            }
        );
    }

    #[test]
    fn covering_or_selling_long_needs_no_locate() {
        let p = profile(false, dec!(0.02));
        assert_eq!(check_locate(dec!(-100), OrderSide::Buy, dec!(50), &p), LocateVerdict::NotRequired);
        assert_eq!(check_locate(dec!(100), OrderSide::Sell, dec!(100), &p), LocateVerdict::NotRequired);
    }

    #[test]
    fn selling_through_flat_counts_only_the_short_leg() {
        assert_eq!(incremental_short(dec!(30), OrderSide::Sell, dec!(50)), dec!(20));
        let verdict = check_locate(dec!(30), OrderSide::Sell, dec!(50), &profile(false, Decimal::ZERO));
        assert_eq!(verdict, LocateVerdict::Unavailable);
    }

    #[test]
    fn settled_cash_uses_epsilon() {
        assert_eq!(check_settled_cash(dec!(1010), OrderSide::Buy, dec!(10), dec!(100), dec!(1)), None);
        assert_eq!(
            check_settled_cash(dec!(1009.99), OrderSide::Buy, dec!(10), dec!(100), dec!(1)),
            Some(dec!(1010))
        );
        assert_eq!(check_settled_cash(Decimal::ZERO, OrderSide::Sell, dec!(10), dec!(100), dec!(1)), None);
    }

    #[test]
    fn initial_margin_rejects_overleveraged_buy() {
        let ledger = ExecutionLedger::new(dec!(1000));
        // 50 @ 100: equity 1000 against 5000 × 0.5
        let err = check_initial_margin(&ledger, OrderSide::Buy, dec!(50), dec!(100), Decimal::ZERO, dec!(0.5))
            .unwrap_err();
        assert_eq!(err.equity, dec!(1000));
        assert_eq!(err.initial_margin, dec!(2500));
        assert!(check_initial_margin(&ledger, OrderSide::Buy, dec!(20), dec!(100), Decimal::ZERO, dec!(0.5)).is_ok());
        assert!(check_initial_margin(&ledger, OrderSide::Buy, dec!(50), dec!(100), Decimal::ZERO, Decimal::ZERO).is_ok());
    }

    #[test]
    fn maintenance_breach_on_short_squeeze() {
        let mut ledger = ExecutionLedger::new(dec!(1000));
        ledger.apply_fill(OrderSide::Sell, dec!(100), dec!(10), Decimal::ZERO);
        // Cash 2000. At 16 equity is 400, exactly the requirement.
        assert!(maintenance_breach(&ledger, dec!(16), dec!(0.25)).is_none());
        let breach = maintenance_breach(&ledger, dec!(17), dec!(0.25)).unwrap();
        assert_eq!(breach.equity, dec!(300));
        assert_eq!(breach.requirement, dec!(425));
        assert!(maintenance_breach(&ledger, dec!(17), Decimal::ZERO).is_none());
    }
}
