//! Bars and slices: the market data a single replay timestep carries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV bar for the replayed symbol at one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    /// Basic OHLC sanity check: high >= low, high >= open/close, positive prices.
    pub fn is_sane(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > Decimal::ZERO
            && self.close > Decimal::ZERO
            && self.volume >= Decimal::ZERO
    }
}

/// Top-of-book trade tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopTick {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub price: Decimal,
    #[serde(default)]
    pub size: Decimal,
}

/// One discrete replay timestep: a timestamp plus whatever market data is
/// coincident with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSlice {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub bar: Option<Bar>,
    #[serde(default)]
    pub tick: Option<TopTick>,
}

impl MarketSlice {
    pub fn from_bar(bar: Bar) -> Self {
        Self {
            timestamp: bar.timestamp,
            bar: Some(bar),
            tick: None,
        }
    }

    pub fn from_tick(tick: TopTick) -> Self {
        Self {
            timestamp: tick.timestamp,
            bar: None,
            tick: Some(tick),
        }
    }

    /// Mark price for the step: bar close, else the last trade tick, else zero.
    pub fn mark_price(&self) -> Decimal {
        match (&self.bar, &self.tick) {
            (Some(bar), _) => bar.close,
            (None, Some(tick)) => tick.price,
            (None, None) => Decimal::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn sample_bar() -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap(),
            symbol: "SPY".into(),
            open: dec!(100),
            high: dec!(105),
            low: dec!(98),
            close: dec!(103),
            volume: dec!(50000),
        }
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_insane_high_low() {
        let mut bar = sample_bar();
        bar.high = dec!(97);
        assert!(!bar.is_sane());
    }

    #[test]
    fn mark_prefers_bar_close_over_tick() {
        let bar = sample_bar();
        let tick = TopTick {
            timestamp: bar.timestamp,
            symbol: "SPY".into(),
            price: dec!(104.5),
            size: dec!(100),
        };
        let slice = MarketSlice {
            timestamp: bar.timestamp,
            bar: Some(bar),
            tick: Some(tick.clone()),
        };
        assert_eq!(slice.mark_price(), dec!(103));

        let tick_only = MarketSlice::from_tick(tick);
        assert_eq!(tick_only.mark_price(), dec!(104.5));
    }

    #[test]
    fn empty_slice_has_zero_mark() {
        let slice = MarketSlice {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap(),
            bar: None,
            tick: None,
        };
        assert_eq!(slice.mark_price(), Decimal::ZERO);
    }
}
