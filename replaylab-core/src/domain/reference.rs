//! Reference-data entries replayed alongside market data.
//!
//! Every feed is an ascending array of entries keyed by an effective
//! timestamp. Entries are loaded once per run and never mutated.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Anything that becomes due at an effective timestamp.
pub trait Timestamped {
    fn effective_at(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CorporateActionKind {
    Split,
    Dividend,
}

impl CorporateActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CorporateActionKind::Split => "SPLIT",
            CorporateActionKind::Dividend => "DIVIDEND",
        }
    }
}

impl FromStr for CorporateActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SPLIT" => Ok(CorporateActionKind::Split),
            "DIVIDEND" => Ok(CorporateActionKind::Dividend),
            _ => Err(format!("unknown corporate action type '{s}'")),
        }
    }
}

impl TryFrom<String> for CorporateActionKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CorporateActionKind> for String {
    fn from(kind: CorporateActionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for CorporateActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split or cash dividend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorporateAction {
    /// Missing timestamps deserialize to the epoch and are dropped by loaders.
    #[serde(default)]
    pub effective_at: DateTime<Utc>,
    #[serde(default)]
    pub symbol: String,
    pub kind: CorporateActionKind,
    /// New shares per old share. Only meaningful for splits.
    #[serde(default)]
    pub split_ratio: Decimal,
    /// Cash per share. Only meaningful for dividends.
    #[serde(default)]
    pub cash_amount: Decimal,
    #[serde(default)]
    pub source: String,
}

impl CorporateAction {
    pub fn split(effective_at: DateTime<Utc>, symbol: &str, ratio: Decimal) -> Self {
        Self {
            effective_at,
            symbol: symbol.to_string(),
            kind: CorporateActionKind::Split,
            split_ratio: ratio,
            cash_amount: Decimal::ZERO,
            source: "external".to_string(),
        }
    }

    pub fn dividend(effective_at: DateTime<Utc>, symbol: &str, cash_amount: Decimal) -> Self {
        Self {
            effective_at,
            symbol: symbol.to_string(),
            kind: CorporateActionKind::Dividend,
            split_ratio: Decimal::ZERO,
            cash_amount,
            source: "external".to_string(),
        }
    }
}

impl Timestamped for CorporateAction {
    fn effective_at(&self) -> DateTime<Utc> {
        self.effective_at
    }
}

/// Borrow cost and locate availability for one symbol, effective from a timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowLocateProfile {
    #[serde(default)]
    pub effective_at: DateTime<Utc>,
    #[serde(default)]
    pub symbol: String,
    /// Annualized borrow rate in basis points.
    #[serde(default)]
    pub borrow_rate_bps: Decimal,
    #[serde(default = "default_locate_available")]
    pub locate_available: bool,
    #[serde(default)]
    pub locate_fee_per_share: Decimal,
    #[serde(default)]
    pub source: String,
}

fn default_locate_available() -> bool {
    true
}

impl BorrowLocateProfile {
    /// Profile in force when no entry has become active for a symbol:
    /// free to borrow, locates always available.
    pub fn default_for(symbol: &str) -> Self {
        Self {
            effective_at: DateTime::<Utc>::MIN_UTC,
            symbol: symbol.to_ascii_uppercase(),
            borrow_rate_bps: Decimal::ZERO,
            locate_available: true,
            locate_fee_per_share: Decimal::ZERO,
            source: "default".to_string(),
        }
    }
}

impl Timestamped for BorrowLocateProfile {
    fn effective_at(&self) -> DateTime<Utc> {
        self.effective_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelistEvent {
    #[serde(default)]
    pub effective_at: DateTime<Utc>,
    #[serde(default)]
    pub symbol: String,
    /// Terminal delists force the position flat.
    #[serde(default)]
    pub is_terminal: bool,
    #[serde(default)]
    pub source: String,
}

impl Timestamped for DelistEvent {
    fn effective_at(&self) -> DateTime<Utc> {
        self.effective_at
    }
}

/// Ticker rename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolMapping {
    #[serde(default)]
    pub effective_at: DateTime<Utc>,
    #[serde(default)]
    pub from_symbol: String,
    #[serde(default)]
    pub to_symbol: String,
    #[serde(default)]
    pub source: String,
}

impl Timestamped for SymbolMapping {
    fn effective_at(&self) -> DateTime<Utc> {
        self.effective_at
    }
}
