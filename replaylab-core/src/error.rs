//! Fatal setup errors. Business outcomes (rejections, skips) are rows, never errors.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("replay clock moved backwards: {requested} is before {current}")]
    ClockRegression {
        current: DateTime<Utc>,
        requested: DateTime<Utc>,
    },

    #[error("{feed} feed is not sorted: entry {index} at {at} precedes {previous}")]
    UnsortedFeed {
        feed: &'static str,
        index: usize,
        at: DateTime<Utc>,
        previous: DateTime<Utc>,
    },

    #[error("unknown price normalization mode '{0}' (expected raw, split-adjusted or total-return)")]
    UnknownNormalizationMode(String),

    #[error("split for {symbol} at {effective_at} has non-positive ratio {ratio}")]
    InvalidSplitRatio {
        symbol: String,
        effective_at: DateTime<Utc>,
        ratio: Decimal,
    },

    #[error("invalid simulator config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("initial cash must be non-negative, got {0}")]
    NegativeInitialCash(Decimal),
}
