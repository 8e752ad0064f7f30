//! Pending T+N settlement queue.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct PendingSettlement {
    pub settle_date: DateTime<Utc>,
    pub symbol: String,
    pub amount: Decimal,
    pub source: String,
}

/// Sale proceeds waiting to become settled cash.
#[derive(Debug, Clone, Default)]
pub struct SettlementLedger {
    pending: Vec<PendingSettlement>,
}

impl SettlementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `amount` to mature `lag_days` calendar days after `trade_date`.
    pub fn enqueue(
        &mut self,
        trade_date: DateTime<Utc>,
        lag_days: u32,
        symbol: &str,
        amount: Decimal,
        source: &str,
    ) -> DateTime<Utc> {
        let settle_date = trade_date + Duration::days(i64::from(lag_days));
        self.pending.push(PendingSettlement {
            settle_date,
            symbol: symbol.to_string(),
            amount,
            source: source.to_string(),
        });
        settle_date
    }

    /// Remove and return every item with `settle_date <= timestamp`,
    /// ordered by settle date (stable for equal dates).
    pub fn mature(&mut self, timestamp: DateTime<Utc>) -> Vec<PendingSettlement> {
        let (mut due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| p.settle_date <= timestamp);
        self.pending = waiting;
        due.sort_by_key(|p| p.settle_date);
        due
    }

    /// Total amount still pending.
    pub fn unsettled(&self) -> Decimal {
        self.pending.iter().map(|p| p.amount).sum()
    }

    pub fn pending(&self) -> &[PendingSettlement] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn matures_on_settle_date_in_date_order() {
        let t = Utc.with_ymd_and_hms(2024, 3, 4, 20, 0, 0).unwrap();
        let mut ledger = SettlementLedger::new();
        ledger.enqueue(t, 2, "ABC", dec!(500), "trade");
        ledger.enqueue(t, 1, "ABC", dec!(100), "trade");
        assert_eq!(ledger.unsettled(), dec!(600));

        assert!(ledger.mature(t + Duration::hours(23)).is_empty());

        let due = ledger.mature(t + Duration::days(2));
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].amount, dec!(100));
        assert_eq!(due[1].amount, dec!(500));
        assert!(ledger.is_empty());
        assert_eq!(ledger.unsettled(), Decimal::ZERO);
    }
}
