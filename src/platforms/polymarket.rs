//! Polymarket read-side integration.
//!
//! Uses the Gamma API to discover the live 5-minute Bitcoin window and the
//! CLOB API to read its order book. Both are unauthenticated.
//!
//! Gamma API: https://gamma-api.polymarket.com
//! CLOB API: https://clob.polymarket.com

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::types::{value_as_f64, MarketWindow, OrderBookSnapshot, TraderError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";
const CLOB_API_URL: &str = "https://clob.polymarket.com";
const USER_AGENT: &str = "poly-btc5m/1.0";
const HTTP_TIMEOUT_SECS: u64 = 10;

/// Gamma tag id under which the short-dated crypto markets are listed.
const CRYPTO_TAG_ID: u32 = 100381;
const LISTING_LIMIT: u32 = 50;

/// Lower-case phrase identifying the 5-minute Bitcoin market family.
pub const MARKET_FAMILY_PHRASE: &str = "bitcoin price 5";

/// Reported when a window has no parseable end timestamp.
pub const UNKNOWN_REMAINING_SECS: i64 = 999;

// ---------------------------------------------------------------------------
// Gamma API response types (market discovery)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GammaMarket {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "endDate")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub end_date_iso: Option<String>,
    /// A JSON list, or a string holding a JSON-encoded list.
    #[serde(default, rename = "clobTokenIds")]
    pub clob_token_ids: Option<Value>,
    /// Fallback source of token ids: `[{"clobTokenId": ...}, ...]`.
    #[serde(default)]
    pub outcomes: Option<Value>,
    #[serde(default, rename = "liquidityClob")]
    pub liquidity_clob: Option<Value>,
    #[serde(default)]
    pub liquidity: Option<Value>,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|v| !v.is_empty())
}

fn value_as_id(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

impl GammaMarket {
    /// Question text, falling back to the title.
    pub fn display_title(&self) -> &str {
        non_empty(&self.question)
            .or_else(|| non_empty(&self.title))
            .unwrap_or("")
    }

    /// Whether this listing belongs to the 5-minute Bitcoin family.
    pub fn is_btc_5m(&self) -> bool {
        self.display_title().to_lowercase().contains(MARKET_FAMILY_PHRASE)
    }

    fn raw_end(&self) -> Option<&str> {
        non_empty(&self.end_date).or_else(|| non_empty(&self.end_date_iso))
    }

    /// Parsed closing time, `None` if absent or unparseable.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.raw_end().and_then(parse_end_timestamp)
    }

    /// Outcome token ids, `clobTokenIds` first, per-outcome fields second.
    pub fn token_ids(&self) -> Vec<String> {
        let structured = match &self.clob_token_ids {
            Some(Value::Array(items)) => items.iter().map(value_as_id).collect(),
            Some(Value::String(encoded)) => match serde_json::from_str::<Vec<Value>>(encoded) {
                Ok(items) => items.iter().map(value_as_id).collect(),
                Err(e) => {
                    debug!(error = %e, "clobTokenIds is not a JSON list");
                    Vec::new()
                }
            },
            _ => Vec::new(),
        };

        if structured.len() >= 2 {
            return structured;
        }

        match &self.outcomes {
            Some(Value::Array(items)) => items
                .iter()
                .map(|o| o.get("clobTokenId").map(value_as_id).unwrap_or_default())
                .collect(),
            _ => structured,
        }
    }

    /// First of `liquidityClob`, `liquidity` that parses as a number, else zero.
    /// A reported zero is kept.
    pub fn liquidity_estimate(&self) -> f64 {
        [&self.liquidity_clob, &self.liquidity]
            .into_iter()
            .find_map(|v| v.as_ref().and_then(value_as_f64))
            .unwrap_or(0.0)
    }
}

/// Parse an ISO-8601 end timestamp. A trailing `Z` is accepted; offset-less
/// values are taken as UTC.
pub fn parse_end_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

// ---------------------------------------------------------------------------
// Window selection
// ---------------------------------------------------------------------------

/// Pick the soonest-closing 5-minute Bitcoin listing and build its window.
///
/// Listings with an unparseable end timestamp sort after every parseable
/// one; ties keep listing order.
pub fn select_window(markets: &[GammaMarket], now: DateTime<Utc>) -> Result<MarketWindow, TraderError> {
    let chosen = markets
        .iter()
        .filter(|m| m.is_btc_5m())
        .min_by_key(|m| {
            let end = m.end_time();
            (end.is_none(), end)
        })
        .ok_or(TraderError::NoActiveMarket)?;

    let ids = chosen.token_ids();
    if ids.len() < 2 || ids[0].is_empty() || ids[1].is_empty() {
        return Err(TraderError::MalformedMarket(format!(
            "Could not extract tokenIDs from market data ({})",
            chosen.display_title()
        )));
    }

    let (end_time, end_label, seconds_remaining) = match chosen.end_time() {
        Some(end) => {
            let secs = (end - now).num_seconds().max(0);
            (Some(end), end.format("%H:%M:%S UTC").to_string(), secs)
        }
        None => {
            warn!(title = chosen.display_title(), "Window end time unparseable");
            (None, "unknown".to_string(), UNKNOWN_REMAINING_SECS)
        }
    };

    Ok(MarketWindow {
        title: chosen.display_title().to_string(),
        yes_token: ids[0].clone(),
        no_token: ids[1].clone(),
        end_time,
        end_label,
        seconds_remaining,
        liquidity: chosen.liquidity_estimate(),
    })
}

/// Split an API reply into payload or error envelope (`{"error": ...}`).
pub fn check_envelope(value: Value) -> Result<Value, TraderError> {
    match value.get("error") {
        Some(err) if !err.is_null() && err != &Value::Bool(false) => {
            let message = match err {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let status = value
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok());
            Err(TraderError::Transport { message, status })
        }
        _ => Ok(value),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct PolymarketClient {
    http: Client,
    gamma_url: String,
    clob_url: String,
}

impl PolymarketClient {
    pub fn new() -> Result<Self> {
        Self::with_endpoints(GAMMA_API_URL, CLOB_API_URL)
    }

    /// Client against alternate Gamma/CLOB hosts.
    pub fn with_endpoints(gamma_url: &str, clob_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build Polymarket HTTP client")?;

        Ok(Self {
            http,
            gamma_url: gamma_url.trim_end_matches('/').to_string(),
            clob_url: clob_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, TraderError> {
        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(TraderError::transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TraderError::Transport {
                message: format!("GET {url} failed: {body}"),
                status: Some(status.as_u16()),
            });
        }

        let value: Value = resp.json().await.map_err(TraderError::transport)?;
        check_envelope(value)
    }

    /// Fetch active, non-closed listings under the crypto tag.
    pub async fn fetch_listings(&self) -> Result<Vec<GammaMarket>, TraderError> {
        let url = format!("{}/markets", self.gamma_url);
        debug!("Fetching BTC 5-min listings from Gamma API");

        let value = self
            .get_json(
                &url,
                &[
                    ("active", "true".to_string()),
                    ("closed", "false".to_string()),
                    ("tag_id", CRYPTO_TAG_ID.to_string()),
                    ("limit", LISTING_LIMIT.to_string()),
                ],
            )
            .await?;

        let markets: Vec<GammaMarket> = serde_json::from_value(value).map_err(|e| TraderError::Transport {
            message: format!("Unexpected Gamma listings payload: {e}"),
            status: None,
        })?;

        info!(count = markets.len(), "Fetched Gamma listings");
        Ok(markets)
    }

    /// Discover the currently tradable window.
    pub async fn discover_window(&self) -> Result<MarketWindow, TraderError> {
        let markets = self.fetch_listings().await?;
        let window = select_window(&markets, Utc::now())?;
        info!(
            title = %window.title,
            seconds_remaining = window.seconds_remaining,
            end = %window.end_label,
            "Active window discovered"
        );
        Ok(window)
    }

    /// Read the order book for one outcome token.
    pub async fn fetch_book(&self, token_id: &str) -> Result<OrderBookSnapshot, TraderError> {
        let url = format!("{}/book", self.clob_url);
        let value = self.get_json(&url, &[("token_id", token_id.to_string())]).await?;

        let book: OrderBookSnapshot = serde_json::from_value(value).map_err(|e| TraderError::Transport {
            message: format!("Unexpected CLOB book payload: {e}"),
            status: None,
        })?;

        debug!(
            token_id,
            asks = book.asks.len(),
            bids = book.bids.len(),
            "Order book fetched"
        );
        Ok(book)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
