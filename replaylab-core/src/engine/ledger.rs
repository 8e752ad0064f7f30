//! Execution ledger: cash, settled cash, signed position, average cost, realized P&L.
//!
//! The ledger is the only place these five numbers change. Every mutation keeps
//! two invariants: a flat position carries a zero average price, and settled
//! cash never exceeds cash.

use crate::domain::{signum, OrderSide};
use rust_decimal::Decimal;

/// Position and cash after a hypothetical fill, used by the margin projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub cash: Decimal,
    pub position: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionLedger {
    cash: Decimal,
    settled_cash: Decimal,
    position: Decimal,
    average_price: Decimal,
    realized_pnl: Decimal,
}

impl ExecutionLedger {
    pub fn new(initial_cash: Decimal) -> Self {
        Self {
            cash: initial_cash,
            settled_cash: initial_cash,
            position: Decimal::ZERO,
            average_price: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn settled_cash(&self) -> Decimal {
        self.settled_cash
    }

    /// Signed: positive long, negative short.
    pub fn position(&self) -> Decimal {
        self.position
    }

    pub fn average_price(&self) -> Decimal {
        self.average_price
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_zero()
    }

    pub fn equity(&self, mark: Decimal) -> Decimal {
        self.cash + self.position * mark
    }

    /// Zero when flat or without a usable mark.
    pub fn unrealized_pnl(&self, mark: Decimal) -> Decimal {
        if self.is_flat() || mark <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (mark - self.average_price) * self.position
    }

    /// Shares currently short, zero when long or flat.
    pub fn short_quantity(&self) -> Decimal {
        (-self.position).max(Decimal::ZERO)
    }

    /// Apply a fill and return the realized P&L delta.
    ///
    /// Only the closing portion of a reducing or flipping fill realizes P&L.
    /// Extending (or opening) blends the average cost; flipping resets it to
    /// the fill price; closing to exactly flat resets it to zero.
    pub fn apply_fill(
        &mut self,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
        fees: Decimal,
    ) -> Decimal {
        let signed = side.sign() * quantity;
        let previous = self.position;
        let next = previous + signed;

        let mut realized_delta = Decimal::ZERO;
        let reducing = !previous.is_zero() && signum(previous) != signum(signed);
        if reducing {
            let closing = previous.abs().min(signed.abs());
            realized_delta =
                (price - self.average_price) * closing * Decimal::from(signum(previous));
            self.realized_pnl += realized_delta;
        }

        self.cash -= signed * price + fees;

        if next.is_zero() {
            self.average_price = Decimal::ZERO;
        } else if !reducing {
            self.average_price =
                (previous.abs() * self.average_price + signed.abs() * price) / next.abs();
        } else if signum(next) != signum(previous) {
            self.average_price = price;
        }

        self.position = next;
        realized_delta
    }

    /// Where cash and position would land if a fill went through.
    pub fn project_fill(
        &self,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
        costs: Decimal,
    ) -> Projection {
        let signed = side.sign() * quantity;
        Projection {
            cash: self.cash - signed * price - costs,
            position: self.position + signed,
        }
    }

    /// Scale the position by `ratio` and the cost basis by its inverse.
    pub fn apply_split(&mut self, ratio: Decimal) {
        if ratio <= Decimal::ZERO {
            return;
        }
        self.position *= ratio;
        if self.average_price > Decimal::ZERO {
            self.average_price /= ratio;
        }
    }

    /// Cash flow outside of trading (dividends, borrow, locate fees).
    /// These settle immediately, so cash and settled cash move together.
    pub fn adjust_cash(&mut self, delta: Decimal) {
        self.cash += delta;
        self.settled_cash += delta;
    }

    pub fn debit_settled(&mut self, amount: Decimal) {
        self.settled_cash -= amount;
    }

    pub fn credit_settled(&mut self, amount: Decimal) {
        self.settled_cash += amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn buy_from_flat_sets_average_and_debits_cash() {
        let mut ledger = ExecutionLedger::new(dec!(100000));
        let realized = ledger.apply_fill(OrderSide::Buy, dec!(10), dec!(100), dec!(10));
        assert_eq!(realized, Decimal::ZERO);
        assert_eq!(ledger.cash(), dec!(98990));
        assert_eq!(ledger.position(), dec!(10));
        assert_eq!(ledger.average_price(), dec!(100));
    }

    #[test]
    fn extending_blends_average_cost() {
        let mut ledger = ExecutionLedger::new(dec!(100000));
        ledger.apply_fill(OrderSide::Buy, dec!(10), dec!(100), Decimal::ZERO);
        ledger.apply_fill(OrderSide::Buy, dec!(30), dec!(120), Decimal::ZERO);
        assert_eq!(ledger.position(), dec!(40));
        assert_eq!(ledger.average_price(), dec!(115));
    }

    #[test]
    fn closing_realizes_pnl_and_resets_average() {
        let mut ledger = ExecutionLedger::new(dec!(100000));
        ledger.apply_fill(OrderSide::Buy, dec!(10), dec!(100), Decimal::ZERO);
        let realized = ledger.apply_fill(OrderSide::Sell, dec!(10), dec!(110), Decimal::ZERO);
        assert_eq!(realized, dec!(100));
        assert!(ledger.is_flat());
        assert_eq!(ledger.average_price(), Decimal::ZERO);
        assert_eq!(ledger.realized_pnl(), dec!(100));
    }

    #[test]
    fn partial_close_keeps_average() {
        let mut ledger = ExecutionLedger::new(dec!(100000));
        ledger.apply_fill(OrderSide::Sell, dec!(100), dec!(50), Decimal::ZERO);
        let realized = ledger.apply_fill(OrderSide::Buy, dec!(40), dec!(45), Decimal::ZERO);
        assert_eq!(realized, dec!(200));
        assert_eq!(ledger.position(), dec!(-60));
        assert_eq!(ledger.average_price(), dec!(50));
    }

    #[test]
    fn flip_realizes_closing_portion_and_reprices() {
        let mut ledger = ExecutionLedger::new(dec!(100000));
        ledger.apply_fill(OrderSide::Buy, dec!(10), dec!(100), Decimal::ZERO);
        let realized = ledger.apply_fill(OrderSide::Sell, dec!(25), dec!(90), Decimal::ZERO);
        assert_eq!(realized, dec!(-100));
        assert_eq!(ledger.position(), dec!(-15));
        assert_eq!(ledger.average_price(), dec!(90));
    }

    #[test]
    fn split_scales_position_and_basis() {
        let mut ledger = ExecutionLedger::new(dec!(100000));
        ledger.apply_fill(OrderSide::Buy, dec!(10), dec!(100), Decimal::ZERO);
        ledger.apply_split(dec!(2));
        assert_eq!(ledger.position(), dec!(20));
        assert_eq!(ledger.average_price(), dec!(50));
    }

    #[test]
    fn non_trade_flows_move_settled_cash_too() {
        let mut ledger = ExecutionLedger::new(dec!(1000));
        ledger.adjust_cash(dec!(-12.5));
        assert_eq!(ledger.cash(), dec!(987.5));
        assert_eq!(ledger.settled_cash(), dec!(987.5));
    }

    #[test]
    fn unrealized_is_zero_without_mark() {
        let mut ledger = ExecutionLedger::new(dec!(1000));
        ledger.apply_fill(OrderSide::Buy, dec!(1), dec!(10), Decimal::ZERO);
        assert_eq!(ledger.unrealized_pnl(Decimal::ZERO), Decimal::ZERO);
        assert_eq!(ledger.unrealized_pnl(dec!(12)), dec!(2));
    }
}
