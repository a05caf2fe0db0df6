//! Shared types for the BTC5M trader.
//!
//! These types form the data model used across all modules: the
//! discovered market window, order-book snapshots, fill estimates,
//! order requests/acknowledgements and the domain error enum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

// ---------------------------------------------------------------------------
// Market window
// ---------------------------------------------------------------------------

/// One tradable instance of the recurring 5-minute Bitcoin market.
///
/// Fetched fresh on every invocation and never cached: once the closing
/// timestamp passes the window is stale and must be re-discovered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketWindow {
    pub title: String,
    /// CLOB token id of the YES outcome.
    pub yes_token: String,
    /// CLOB token id of the NO outcome.
    pub no_token: String,
    /// Closing time, if the listing carried a parseable timestamp.
    pub end_time: Option<DateTime<Utc>>,
    /// "HH:MM:SS UTC", or "unknown" when the timestamp was unparseable.
    pub end_label: String,
    pub seconds_remaining: i64,
    /// Liquidity estimate reported by the listings API (USDC).
    pub liquidity: f64,
}

impl MarketWindow {
    /// Token id for the outcome being bought.
    pub fn token_for(&self, side: Side) -> &str {
        match side {
            Side::Yes => &self.yes_token,
            Side::No => &self.no_token,
        }
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Outcome to buy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Yes,
    No,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// Direction of an order on the CLOB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Order time-in-force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderKind {
    /// Good-till-cancelled limit order; rests on the book.
    Gtc,
    /// Fill-or-kill market order; fills entirely or not at all.
    Fok,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Gtc => write!(f, "GTC"),
            OrderKind::Fok => write!(f, "FOK"),
        }
    }
}

/// Parse an order kind (case-insensitive).
impl std::str::FromStr for OrderKind {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GTC" => Ok(OrderKind::Gtc),
            "FOK" => Ok(OrderKind::Fok),
            _ => Err(TraderError::InvalidOrder(format!(
                "Unknown order type: {s} (expected GTC or FOK)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Order book
// ---------------------------------------------------------------------------

/// A single (price, size) rung of the ladder.
///
/// The CLOB sends both fields as strings; numbers are accepted too.
/// Missing or unparseable values become `0.0` and are later skipped
/// as malformed by the book walker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    #[serde(default, deserialize_with = "de_lenient_f64")]
    pub price: f64,
    #[serde(default, deserialize_with = "de_lenient_f64")]
    pub size: f64,
}

impl BookLevel {
    pub fn new(price: f64, size: f64) -> Self {
        Self { price, size }
    }

    /// Price × size in USDC.
    pub fn notional(&self) -> f64 {
        self.price * self.size
    }

    /// Positive price and positive size.
    pub fn is_valid(&self) -> bool {
        self.price > 0.0 && self.size > 0.0
    }
}

/// Order-book snapshot for one token. Read once per pricing decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    #[serde(default)]
    pub asks: Vec<BookLevel>,
    #[serde(default)]
    pub bids: Vec<BookLevel>,
}

// ---------------------------------------------------------------------------
// Fill estimate
// ---------------------------------------------------------------------------

/// Non-fatal findings attached to a fill estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FillWarning {
    /// Slippage above the block threshold. Execution refuses unless forced.
    SlippageBlocked { slippage_pct: f64, limit_pct: f64 },
    /// Slippage above the warn threshold.
    HighSlippage { slippage_pct: f64 },
    /// Visible depth could not absorb the requested notional.
    InsufficientLiquidity { max_fillable: f64 },
}

impl fmt::Display for FillWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillWarning::SlippageBlocked { slippage_pct, limit_pct } => write!(
                f,
                "BLOCKED: slippage {slippage_pct}% exceeds limit {limit_pct}%. Use --force to override."
            ),
            FillWarning::HighSlippage { slippage_pct } => {
                write!(f, "High slippage: {slippage_pct}%. Consider smaller size.")
            }
            FillWarning::InsufficientLiquidity { max_fillable } => {
                write!(f, "Insufficient liquidity. Max fillable: ${max_fillable:.2}")
            }
        }
    }
}

/// Achievable fill for a notional against a book snapshot, plus the
/// policy verdict. Pure derivation, no identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEstimate {
    pub best_ask: Option<f64>,
    pub best_bid: Option<f64>,
    /// Total visible ask notional (USDC), 2 dp.
    pub ask_depth: f64,
    /// Shares obtainable, 4 dp.
    pub shares: f64,
    /// USDC spent, 4 dp.
    pub cost: f64,
    /// Cost / shares, 4 dp. `None` when nothing fills.
    pub avg_price: Option<f64>,
    /// Deviation of the average fill from the best ask, 2 dp.
    pub slippage_pct: f64,
    pub warnings: Vec<FillWarning>,
    pub blocked: bool,
}

impl FillEstimate {
    pub fn has_insufficient_liquidity(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, FillWarning::InsufficientLiquidity { .. }))
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// How much to trade: shares for limit orders, USDC for market orders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderQuantity {
    Size(f64),
    Amount(f64),
}

/// Parameters handed to the order gateway. Signing happens downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub token_id: String,
    pub side: OrderSide,
    pub order_type: OrderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(flatten)]
    pub quantity: OrderQuantity,
    pub signature_type: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funder: Option<String>,
}

/// Immediate placement feedback from the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawOrderAck")]
pub struct OrderAck {
    pub order_id: Option<String>,
    pub status: String,
    pub error_msg: Option<String>,
}

impl OrderAck {
    /// Statuses that mean the order reached the book or filled.
    pub const ACCEPTED_STATUSES: &'static [&'static str] = &["MATCHED", "LIVE"];

    pub fn is_accepted(&self) -> bool {
        Self::ACCEPTED_STATUSES.contains(&self.status.as_str())
    }

    pub fn order_id_or_na(&self) -> &str {
        self.order_id.as_deref().unwrap_or("N/A")
    }
}

/// Wire shape: `{orderID | id, status, errorMsg?}`.
#[derive(Debug, Deserialize)]
struct RawOrderAck {
    #[serde(default, rename = "orderID")]
    order_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, rename = "errorMsg")]
    error_msg: Option<String>,
}

impl From<RawOrderAck> for OrderAck {
    fn from(raw: RawOrderAck) -> Self {
        let non_empty = |s: Option<String>| s.filter(|v| !v.is_empty());
        Self {
            order_id: non_empty(raw.order_id).or_else(|| non_empty(raw.id)),
            status: non_empty(raw.status).unwrap_or_else(|| "UNKNOWN".to_string()),
            error_msg: non_empty(raw.error_msg),
        }
    }
}

/// An order resting on the book, as listed by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub side: String,
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub price: String,
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub original_size: String,
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub size_matched: String,
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub status: String,
}

impl fmt::Display for OpenOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short_id: String = self.id.chars().take(12).collect();
        let or_q = |s: &str| if s.is_empty() { "?".to_string() } else { s.to_string() };
        write!(
            f,
            "{short_id}... | {} {}/{} shares @ ${} | {}",
            or_q(&self.side),
            or_q(&self.size_matched),
            or_q(&self.original_size),
            or_q(&self.price),
            or_q(&self.status),
        )
    }
}

// ---------------------------------------------------------------------------
// Lenient JSON helpers
// ---------------------------------------------------------------------------

/// Read a JSON number or numeric string as `f64`.
pub fn value_as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn de_lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    Ok(value_as_f64(&v).filter(|x| x.is_finite()).unwrap_or(0.0))
}

fn de_lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    Ok(match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for BTC5M.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("Transport error{}: {message}", http_status_suffix(.status))]
    Transport { message: String, status: Option<u16> },

    #[error("No active Bitcoin 5-Min market found. Market may be between windows.")]
    NoActiveMarket,

    #[error("Malformed market: {0}")]
    MalformedMarket(String),

    #[error("Market closes in {remaining}s, under {minimum}s minimum. Refusing to trade.")]
    WindowTooShort { remaining: i64, minimum: i64 },

    #[error("Trade blocked: slippage {slippage_pct}% exceeds limit {limit_pct}%. Use --force to override.")]
    SlippageBlocked { slippage_pct: f64, limit_pct: f64 },

    #[error("Order rejected (status {status}){}{}", order_suffix(.order_id), detail_suffix(.message))]
    OrderRejected {
        status: String,
        /// Set when the gateway assigned an id; the order may still be on the book.
        order_id: Option<String>,
        message: Option<String>,
    },

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn http_status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

fn order_suffix(order_id: &Option<String>) -> String {
    order_id.as_deref().map(|id| format!(" for order {id}")).unwrap_or_default()
}

fn detail_suffix(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
}

impl TraderError {
    /// Build a transport error from a `reqwest` failure.
    pub fn transport(err: reqwest::Error) -> Self {
        TraderError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
