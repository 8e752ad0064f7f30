//! Corporate actions: ledger-side application and bar back-adjustment.

use crate::domain::{
    Bar, CorporateAction, CorporateActionApplied, CorporateActionKind, Timestamped,
};
use crate::engine::cursor::TimeOrderedCursor;
use crate::engine::ledger::ExecutionLedger;
use crate::error::ReplayError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// How replayed prices relate to corporate actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NormalizationMode {
    /// Prices as traded. Dividends are not credited.
    #[default]
    Raw,
    /// Bars back-adjusted for splits.
    SplitAdjusted,
    /// Split-adjusted bars, and dividends are credited to cash.
    TotalReturn,
}

impl NormalizationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            NormalizationMode::Raw => "raw",
            NormalizationMode::SplitAdjusted => "split-adjusted",
            NormalizationMode::TotalReturn => "total-return",
        }
    }
}

impl FromStr for NormalizationMode {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(NormalizationMode::Raw),
            "split-adjusted" | "splitadjusted" => Ok(NormalizationMode::SplitAdjusted),
            "total-return" | "totalreturn" => Ok(NormalizationMode::TotalReturn),
            _ => Err(ReplayError::UnknownNormalizationMode(s.to_string())),
        }
    }
}

impl TryFrom<String> for NormalizationMode {
    type Error = ReplayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NormalizationMode> for String {
    fn from(mode: NormalizationMode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for NormalizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applies due splits and dividends to the ledger, each exactly once.
#[derive(Debug, Clone)]
pub struct CorporateActionsLedger {
    cursor: TimeOrderedCursor<CorporateAction>,
    mode: NormalizationMode,
}

impl CorporateActionsLedger {
    /// Fails on an unsorted feed or a split with a non-positive ratio.
    pub fn new(actions: Vec<CorporateAction>, mode: NormalizationMode) -> Result<Self, ReplayError> {
        if let Some(bad) = actions
            .iter()
            .find(|a| a.kind == CorporateActionKind::Split && a.split_ratio <= Decimal::ZERO)
        {
            return Err(ReplayError::InvalidSplitRatio {
                symbol: bad.symbol.clone(),
                effective_at: bad.effective_at,
                ratio: bad.split_ratio,
            });
        }
        Ok(Self {
            cursor: TimeOrderedCursor::new("corporate actions", actions)?,
            mode,
        })
    }

    pub fn mode(&self) -> NormalizationMode {
        self.mode
    }

    /// Apply every action due at `timestamp`. Actions for other symbols are
    /// consumed and recorded with no ledger effect.
    pub fn apply(
        &mut self,
        timestamp: DateTime<Utc>,
        symbol: &str,
        ledger: &mut ExecutionLedger,
    ) -> Vec<CorporateActionApplied> {
        let mode = self.mode;
        let mut applied = Vec::new();
        for action in self.cursor.advance(timestamp) {
            let mut cash_delta = Decimal::ZERO;
            if action.symbol.eq_ignore_ascii_case(symbol) {
                match action.kind {
                    CorporateActionKind::Split => ledger.apply_split(action.split_ratio),
                    CorporateActionKind::Dividend
                        if action.cash_amount > Decimal::ZERO
                            && mode == NormalizationMode::TotalReturn =>
                    {
                        cash_delta = ledger.position() * action.cash_amount;
                        ledger.adjust_cash(cash_delta);
                    }
                    CorporateActionKind::Dividend => {}
                }
                debug!(
                    symbol = %action.symbol,
                    kind = %action.kind,
                    position = %ledger.position(),
                    cash_delta = %cash_delta,
                    "corporate action applied"
                );
            }
            applied.push(CorporateActionApplied {
                timestamp: action.effective_at(),
                symbol: action.symbol.clone(),
                kind: action.kind,
                split_ratio: action.split_ratio,
                cash_amount: action.cash_amount,
                cash_delta,
                position_quantity: ledger.position(),
                average_price: ledger.average_price(),
                source: action.source.clone(),
            });
        }
        applied
    }

    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }
}

/// Back-adjust bars for splits.
///
/// Under `SplitAdjusted` and `TotalReturn`, each bar is divided by the product
/// of the ratios of same-symbol splits effective strictly after it, and its
/// volume multiplied by the same factor, so the series is continuous across
/// splits. `Raw` returns the bars unchanged. Output is sorted by timestamp
/// (stable) with uppercase symbols.
pub fn normalize_bars(
    bars: &[Bar],
    actions: &[CorporateAction],
    mode: NormalizationMode,
) -> Vec<Bar> {
    let mut ordered: Vec<Bar> = bars.to_vec();
    if mode == NormalizationMode::Raw {
        return ordered;
    }
    ordered.sort_by_key(|b| b.timestamp);

    let mut splits: HashMap<String, Vec<&CorporateAction>> = HashMap::new();
    for action in actions
        .iter()
        .filter(|a| a.kind == CorporateActionKind::Split && a.split_ratio > Decimal::ZERO)
    {
        splits
            .entry(action.symbol.to_ascii_uppercase())
            .or_default()
            .push(action);
    }
    for list in splits.values_mut() {
        list.sort_by_key(|a| a.effective_at);
    }

    // Walk newest to oldest, folding in each split once the walk passes it.
    let mut factors: HashMap<String, (usize, Decimal)> = splits
        .iter()
        .map(|(symbol, list)| (symbol.clone(), (list.len(), Decimal::ONE)))
        .collect();

    for bar in ordered.iter_mut().rev() {
        bar.symbol = bar.symbol.to_ascii_uppercase();
        let (Some(list), Some((next, factor))) =
            (splits.get(&bar.symbol), factors.get_mut(&bar.symbol))
        else {
            continue;
        };
        while *next > 0 && list[*next - 1].effective_at > bar.timestamp {
            *factor *= list[*next - 1].split_ratio;
            *next -= 1;
        }
        if *factor != Decimal::ONE {
            bar.open /= *factor;
            bar.high /= *factor;
            bar.low /= *factor;
            bar.close /= *factor;
            bar.volume *= *factor;
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderSide;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 20, 0, 0).unwrap() + Duration::days(n)
    }

    fn bar(n: i64, close: Decimal) -> Bar {
        Bar {
            timestamp: day(n),
            symbol: "abc".into(),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1000),
        }
    }

    #[test]
    fn mode_parsing_accepts_aliases() {
        assert_eq!("RAW".parse::<NormalizationMode>().unwrap(), NormalizationMode::Raw);
        assert_eq!(
            "splitadjusted".parse::<NormalizationMode>().unwrap(),
            NormalizationMode::SplitAdjusted
        );
        assert_eq!(
            " Total-Return ".parse::<NormalizationMode>().unwrap(),
            NormalizationMode::TotalReturn
        );
        assert!(matches!(
            "adjusted".parse::<NormalizationMode>(),
            Err(ReplayError::UnknownNormalizationMode(_))
        ));
    }

    #[test]
    fn split_applies_once() {
        let mut ledger = ExecutionLedger::new(dec!(10000));
        ledger.apply_fill(OrderSide::Buy, dec!(10), dec!(100), Decimal::ZERO);
        let mut actions = CorporateActionsLedger::new(
            vec![CorporateAction::split(day(1), "ABC", dec!(2))],
            NormalizationMode::Raw,
        )
        .unwrap();

        assert!(actions.apply(day(0), "ABC", &mut ledger).is_empty());
        let rows = actions.apply(day(1), "ABC", &mut ledger);
        assert_eq!(rows.len(), 1);
        assert_eq!(ledger.position(), dec!(20));
        assert_eq!(ledger.average_price(), dec!(50));

        assert!(actions.apply(day(2), "ABC", &mut ledger).is_empty());
        assert_eq!(ledger.position(), dec!(20));
    }

    #[test]
    fn other_symbol_is_recorded_without_effect() {
        let mut ledger = ExecutionLedger::new(dec!(10000));
        ledger.apply_fill(OrderSide::Buy, dec!(10), dec!(100), Decimal::ZERO);
        let mut actions = CorporateActionsLedger::new(
            vec![CorporateAction::dividend(day(1), "XYZ", dec!(1))],
            NormalizationMode::TotalReturn,
        )
        .unwrap();
        let rows = actions.apply(day(1), "ABC", &mut ledger);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cash_delta, Decimal::ZERO);
        assert_eq!(ledger.cash(), dec!(9000));
    }

    #[test]
    fn dividend_credits_only_under_total_return() {
        for (mode, expected) in [
            (NormalizationMode::Raw, dec!(9000)),
            (NormalizationMode::SplitAdjusted, dec!(9000)),
            (NormalizationMode::TotalReturn, dec!(9005)),
        ] {
            let mut ledger = ExecutionLedger::new(dec!(10000));
            ledger.apply_fill(OrderSide::Buy, dec!(10), dec!(100), Decimal::ZERO);
            let mut actions = CorporateActionsLedger::new(
                vec![CorporateAction::dividend(day(1), "ABC", dec!(0.5))],
                mode,
            )
            .unwrap();
            actions.apply(day(1), "ABC", &mut ledger);
            assert_eq!(ledger.cash(), expected, "mode {mode}");
        }
    }

    #[test]
    fn non_positive_split_ratio_is_fatal() {
        let err = CorporateActionsLedger::new(
            vec![CorporateAction::split(day(1), "ABC", Decimal::ZERO)],
            NormalizationMode::Raw,
        )
        .unwrap_err();
        assert!(matches!(err, ReplayError::InvalidSplitRatio { .. }));
    }

    #[test]
    fn bars_before_split_are_back_adjusted() {
        let bars = vec![bar(0, dec!(200)), bar(1, dec!(202)), bar(2, dec!(101))];
        let actions = vec![CorporateAction::split(day(2), "ABC", dec!(2))];
        let out = normalize_bars(&bars, &actions, NormalizationMode::SplitAdjusted);
        assert_eq!(out[0].close, dec!(100));
        assert_eq!(out[0].volume, dec!(2000));
        assert_eq!(out[1].close, dec!(101));
        assert_eq!(out[2].close, dec!(101));
        assert_eq!(out[2].volume, dec!(1000));
        assert_eq!(out[2].symbol, "ABC");
    }

    #[test]
    fn raw_mode_leaves_bars_untouched() {
        let bars = vec![bar(0, dec!(200))];
        let actions = vec![CorporateAction::split(day(2), "ABC", dec!(2))];
        let out = normalize_bars(&bars, &actions, NormalizationMode::Raw);
        assert_eq!(out, bars);
    }
}
