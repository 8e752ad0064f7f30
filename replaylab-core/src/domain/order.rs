//! Order intents (strategy input) and normalized orders (what the simulator books).

use super::ids::{OrderId, OrderIdGen};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unrecognized side / order type / time-in-force strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseOrderError {
    #[error("unknown order side '{0}' (expected BUY or SELL)")]
    Side(String),
    #[error("unknown order type '{0}' (expected MKT, LMT, STP or STP LMT)")]
    OrderType(String),
    #[error("unknown time in force '{0}' (expected IOC, DAY or GTC)")]
    TimeInForce(String),
}

/// Strip separators and uppercase, so `stop_limit`, `Stop Limit` and `STPLMT` compare equal.
fn canonical(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '_' | ' ' | '-'))
        .collect::<String>()
        .to_ascii_uppercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// BUY = +1, SELL = -1.
    pub fn sign(self) -> Decimal {
        match self {
            OrderSide::Buy => Decimal::ONE,
            OrderSide::Sell => Decimal::NEGATIVE_ONE,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl FromStr for OrderSide {
    type Err = ParseOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonical(s).as_str() {
            "BUY" => Ok(OrderSide::Buy),
            "SELL" => Ok(OrderSide::Sell),
            _ => Err(ParseOrderError::Side(s.to_string())),
        }
    }
}

impl TryFrom<String> for OrderSide {
    type Error = ParseOrderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderSide> for String {
    fn from(side: OrderSide) -> Self {
        side.as_str().to_string()
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type. Stop variants rest until their stop price is crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl OrderType {
    pub fn is_stop(self) -> bool {
        matches!(self, OrderType::Stop | OrderType::StopLimit)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderType::Market => "MKT",
            OrderType::Limit => "LMT",
            OrderType::Stop => "STP",
            OrderType::StopLimit => "STP LMT",
        }
    }

    /// What a triggered stop executes as.
    pub fn after_trigger(self) -> Self {
        match self {
            OrderType::Stop => OrderType::Market,
            OrderType::StopLimit => OrderType::Limit,
            other => other,
        }
    }
}

impl FromStr for OrderType {
    type Err = ParseOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonical(s).as_str() {
            "" | "MKT" | "MARKET" => Ok(OrderType::Market),
            "LMT" | "LIMIT" => Ok(OrderType::Limit),
            "STP" | "STOP" | "STOPMARKET" => Ok(OrderType::Stop),
            "STPLMT" | "STOPLIMIT" => Ok(OrderType::StopLimit),
            _ => Err(ParseOrderError::OrderType(s.to_string())),
        }
    }
}

impl TryFrom<String> for OrderType {
    type Error = ParseOrderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderType> for String {
    fn from(order_type: OrderType) -> Self {
        order_type.as_str().to_string()
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long an unfilled order stays on the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeInForce {
    /// Trades on the slice it was submitted in or not at all.
    #[default]
    Ioc,
    /// Rests until the UTC date changes.
    Day,
    /// Rests until filled or explicitly expired.
    Gtc,
}

impl TimeInForce {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeInForce::Ioc => "IOC",
            TimeInForce::Day => "DAY",
            TimeInForce::Gtc => "GTC",
        }
    }
}

impl FromStr for TimeInForce {
    type Err = ParseOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonical(s).as_str() {
            "" | "IOC" => Ok(TimeInForce::Ioc),
            "DAY" => Ok(TimeInForce::Day),
            "GTC" => Ok(TimeInForce::Gtc),
            _ => Err(ParseOrderError::TimeInForce(s.to_string())),
        }
    }
}

impl TryFrom<String> for TimeInForce {
    type Error = ParseOrderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeInForce> for String {
    fn from(tif: TimeInForce) -> Self {
        tif.as_str().to_string()
    }
}

/// An order proposed by the strategy layer. Immutable; consumed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    /// Defaults to the slice timestamp when absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    #[serde(default)]
    pub stop_price: Option<Decimal>,
    #[serde(default)]
    pub time_in_force: TimeInForce,
    #[serde(default)]
    pub expire_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub parent_order_id: Option<String>,
    #[serde(default)]
    pub oco_group: Option<String>,
}

impl OrderIntent {
    pub fn market(symbol: &str, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            timestamp: None,
            symbol: symbol.to_string(),
            side,
            quantity,
            order_type: OrderType::Market,
            limit_price: None,
            stop_price: None,
            time_in_force: TimeInForce::Ioc,
            expire_at: None,
            source: String::new(),
            order_id: None,
            parent_order_id: None,
            oco_group: None,
        }
    }

    pub fn limit(symbol: &str, side: OrderSide, quantity: Decimal, limit_price: Decimal) -> Self {
        Self {
            order_type: OrderType::Limit,
            limit_price: Some(limit_price),
            ..Self::market(symbol, side, quantity)
        }
    }

    pub fn stop(symbol: &str, side: OrderSide, quantity: Decimal, stop_price: Decimal) -> Self {
        Self {
            order_type: OrderType::Stop,
            stop_price: Some(stop_price),
            ..Self::market(symbol, side, quantity)
        }
    }

    pub fn stop_limit(
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
    ) -> Self {
        Self {
            order_type: OrderType::StopLimit,
            stop_price: Some(stop_price),
            limit_price: Some(limit_price),
            ..Self::market(symbol, side, quantity)
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }

    pub fn with_expiry(mut self, expire_at: DateTime<Utc>) -> Self {
        self.expire_at = Some(expire_at);
        self
    }

    pub fn with_id(mut self, order_id: &str) -> Self {
        self.order_id = Some(order_id.to_string());
        self
    }

    pub fn with_parent(mut self, parent_order_id: &str) -> Self {
        self.parent_order_id = Some(parent_order_id.to_string());
        self
    }

    pub fn with_oco_group(mut self, group: &str) -> Self {
        self.oco_group = Some(group.to_string());
        self
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// A normalized order as accepted onto the simulator's book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub expire_at: Option<DateTime<Utc>>,
    pub source: String,
    pub parent_order_id: Option<OrderId>,
    pub oco_group: Option<String>,
}

impl Order {
    /// Normalize an intent: default timestamp and source, uppercase symbol,
    /// resolve the order ID, trim linkage fields.
    pub fn from_intent(
        intent: &OrderIntent,
        slice_timestamp: DateTime<Utc>,
        ids: &mut OrderIdGen,
    ) -> Self {
        let source = non_blank(Some(&intent.source)).unwrap_or_else(|| "strategy".to_string());
        Self {
            order_id: ids.resolve(intent.order_id.as_deref()),
            timestamp: intent.timestamp.unwrap_or(slice_timestamp),
            symbol: intent.symbol.trim().to_ascii_uppercase(),
            side: intent.side,
            quantity: intent.quantity,
            order_type: intent.order_type,
            limit_price: intent.limit_price,
            stop_price: intent.stop_price,
            time_in_force: intent.time_in_force,
            expire_at: intent.expire_at,
            source,
            parent_order_id: non_blank(intent.parent_order_id.as_deref()).map(OrderId::new),
            oco_group: non_blank(intent.oco_group.as_deref()),
        }
    }

    /// Synthetic market order used for forced liquidations.
    pub fn forced(
        timestamp: DateTime<Utc>,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        source: &str,
        ids: &mut OrderIdGen,
    ) -> Self {
        Self {
            order_id: ids.next_id(),
            timestamp,
            symbol: symbol.to_string(),
            side,
            quantity,
            order_type: OrderType::Market,
            limit_price: None,
            stop_price: None,
            time_in_force: TimeInForce::Ioc,
            expire_at: None,
            source: source.to_string(),
            parent_order_id: None,
            oco_group: None,
        }
    }

    pub fn signed_quantity(&self) -> Decimal {
        self.side.sign() * self.quantity
    }
}
