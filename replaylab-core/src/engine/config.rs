//! Simulator configuration. Fixed at construction for the whole run.

use crate::engine::corporate_actions::NormalizationMode;
use crate::engine::fees::FeeSchedule;
use crate::error::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub initial_cash: Decimal,
    pub commission_per_unit: Decimal,
    /// Market orders fill this many basis points through the mark.
    pub slippage_bps: Decimal,
    /// Zero disables the initial margin check.
    pub initial_margin_rate: Decimal,
    /// Zero disables forced maintenance liquidation.
    pub maintenance_margin_rate: Decimal,
    /// Calendar days until sale proceeds settle. Zero settles immediately.
    pub settlement_lag_days: u32,
    pub enforce_settled_cash: bool,
    pub normalization: NormalizationMode,
    pub sec_fee_rate_per_dollar: Decimal,
    pub taf_fee_per_share: Decimal,
    pub taf_fee_cap_per_order: Decimal,
    pub exchange_fee_per_share: Decimal,
    /// Fraction of bar volume the run may take per slice, in [0, 1].
    pub max_fill_participation_rate: Decimal,
    /// Process resting orders by submission time instead of book order.
    pub enforce_queue_priority: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_cash: dec!(100000),
            commission_per_unit: Decimal::ZERO,
            slippage_bps: Decimal::ZERO,
            initial_margin_rate: Decimal::ZERO,
            maintenance_margin_rate: Decimal::ZERO,
            settlement_lag_days: 0,
            enforce_settled_cash: false,
            normalization: NormalizationMode::Raw,
            sec_fee_rate_per_dollar: Decimal::ZERO,
            taf_fee_per_share: Decimal::ZERO,
            taf_fee_cap_per_order: Decimal::ZERO,
            exchange_fee_per_share: Decimal::ZERO,
            max_fill_participation_rate: Decimal::ONE,
            enforce_queue_priority: false,
        }
    }
}

impl SimulatorConfig {
    pub fn new(initial_cash: Decimal) -> Self {
        Self {
            initial_cash,
            ..Self::default()
        }
    }

    pub fn with_commission(mut self, per_unit: Decimal) -> Self {
        self.commission_per_unit = per_unit;
        self
    }

    pub fn with_slippage_bps(mut self, bps: Decimal) -> Self {
        self.slippage_bps = bps;
        self
    }

    pub fn with_margin(mut self, initial: Decimal, maintenance: Decimal) -> Self {
        self.initial_margin_rate = initial;
        self.maintenance_margin_rate = maintenance;
        self
    }

    pub fn with_settlement(mut self, lag_days: u32, enforce_settled_cash: bool) -> Self {
        self.settlement_lag_days = lag_days;
        self.enforce_settled_cash = enforce_settled_cash;
        self
    }

    pub fn with_normalization(mut self, mode: NormalizationMode) -> Self {
        self.normalization = mode;
        self
    }

    pub fn with_fees(mut self, fees: FeeSchedule) -> Self {
        self.commission_per_unit = fees.commission_per_unit;
        self.sec_fee_rate_per_dollar = fees.sec_fee_rate_per_dollar;
        self.taf_fee_per_share = fees.taf_fee_per_share;
        self.taf_fee_cap_per_order = fees.taf_fee_cap_per_order;
        self.exchange_fee_per_share = fees.exchange_fee_per_share;
        self
    }

    pub fn with_participation_rate(mut self, rate: Decimal) -> Self {
        self.max_fill_participation_rate = rate;
        self
    }

    pub fn with_queue_priority(mut self, enforce: bool) -> Self {
        self.enforce_queue_priority = enforce;
        self
    }

    /// Reject configs no run can start from. Out-of-range rates are clamped
    /// by [`SimulatorConfig::clamped`] instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_cash < Decimal::ZERO {
            return Err(ConfigError::NegativeInitialCash(self.initial_cash));
        }
        Ok(())
    }

    /// Negative rates and fees become zero; participation is clamped to [0, 1].
    pub fn clamped(mut self) -> Self {
        let floor = |v: Decimal| v.max(Decimal::ZERO);
        self.commission_per_unit = floor(self.commission_per_unit);
        self.slippage_bps = floor(self.slippage_bps);
        self.initial_margin_rate = floor(self.initial_margin_rate);
        self.maintenance_margin_rate = floor(self.maintenance_margin_rate);
        self.sec_fee_rate_per_dollar = floor(self.sec_fee_rate_per_dollar);
        self.taf_fee_per_share = floor(self.taf_fee_per_share);
        self.taf_fee_cap_per_order = floor(self.taf_fee_cap_per_order);
        self.exchange_fee_per_share = floor(self.exchange_fee_per_share);
        self.max_fill_participation_rate = self
            .max_fill_participation_rate
            .clamp(Decimal::ZERO, Decimal::ONE);
        self
    }

    pub fn fees(&self) -> FeeSchedule {
        FeeSchedule {
            commission_per_unit: self.commission_per_unit,
            sec_fee_rate_per_dollar: self.sec_fee_rate_per_dollar,
            taf_fee_per_share: self.taf_fee_per_share,
            taf_fee_cap_per_order: self.taf_fee_cap_per_order,
            exchange_fee_per_share: self.exchange_fee_per_share,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SimulatorConfig::default().validate().is_ok());
    }

    #[test]
    fn negative_cash_is_invalid() {
        let err = SimulatorConfig::new(dec!(-1)).validate().unwrap_err();
        assert_eq!(err, ConfigError::NegativeInitialCash(dec!(-1)));
    }

    #[test]
    fn margin_rates_are_independent() {
        let cfg = SimulatorConfig::default().with_margin(dec!(0.25), dec!(0.30));
        assert!(cfg.validate().is_ok());
        let cfg = SimulatorConfig::default()
            .with_margin(dec!(-0.5), dec!(-0.1))
            .clamped();
        assert_eq!(cfg.initial_margin_rate, Decimal::ZERO);
        assert_eq!(cfg.maintenance_margin_rate, Decimal::ZERO);
    }

    #[test]
    fn clamping_floors_rates_and_bounds_participation() {
        let cfg = SimulatorConfig::default()
            .with_commission(dec!(-0.01))
            .with_slippage_bps(dec!(-3))
            .with_participation_rate(dec!(1.7))
            .clamped();
        assert_eq!(cfg.commission_per_unit, Decimal::ZERO);
        assert_eq!(cfg.slippage_bps, Decimal::ZERO);
        assert_eq!(cfg.max_fill_participation_rate, Decimal::ONE);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let cfg: SimulatorConfig =
            serde_json::from_str(r#"{"commission_per_unit":"1","normalization":"total-return"}"#)
                .unwrap();
        assert_eq!(cfg.commission_per_unit, Decimal::ONE);
        assert_eq!(cfg.normalization, NormalizationMode::TotalReturn);
        assert_eq!(cfg.initial_cash, dec!(100000));
    }
}
