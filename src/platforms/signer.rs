//! Order gateway backed by an external signing service.
//!
//! The service holds the wallet key, performs EIP-712 order signing and
//! CLOB L2 authentication, and exposes a small JSON API:
//!
//! - `POST   {base}/order`       → `{orderID | id, status, errorMsg?}`
//! - `GET    {base}/orders`      → `[OpenOrder, ...]`
//! - `DELETE {base}/order/{id}`  → `{canceled: [...], not_canceled: {id: reason}}`
//!
//! Env: `POLY_SIGNER_URL` (required), `POLY_SIGNER_TOKEN` (optional bearer).

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::polymarket::check_envelope;
use super::OrderGateway;
use crate::types::{OpenOrder, OrderAck, OrderRequest, TraderError};

const GATEWAY_NAME: &str = "signer";
const HTTP_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = "poly-btc5m/1.0";

pub const SIGNER_URL_ENV: &str = "POLY_SIGNER_URL";
pub const SIGNER_TOKEN_ENV: &str = "POLY_SIGNER_TOKEN";

#[derive(Debug, Deserialize)]
struct CancelResponse {
    #[serde(default)]
    canceled: Vec<String>,
    #[serde(default)]
    not_canceled: HashMap<String, Value>,
}

pub struct SignerGateway {
    http: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl SignerGateway {
    pub fn new(base_url: &str, token: Option<SecretString>) -> Result<Self, TraderError> {
        if base_url.trim().is_empty() {
            return Err(TraderError::Config(format!("{SIGNER_URL_ENV} is empty")));
        }

        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TraderError::Config(format!("Failed to build signer HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Build from `POLY_SIGNER_URL` / `POLY_SIGNER_TOKEN`.
    pub fn from_env() -> Result<Self, TraderError> {
        let url = std::env::var(SIGNER_URL_ENV).map_err(|_| {
            TraderError::Config(format!(
                "{SIGNER_URL_ENV} not set. Point it at the order-signing service holding the wallet key."
            ))
        })?;
        let token = std::env::var(SIGNER_TOKEN_ENV)
            .ok()
            .filter(|t| !t.is_empty())
            .map(SecretString::new);
        Self::new(&url, token)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token.expose_secret()),
            None => req,
        }
    }

    async fn send_json(&self, req: RequestBuilder, what: &str) -> Result<Value, TraderError> {
        let resp = self.authed(req).send().await.map_err(TraderError::transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TraderError::Transport {
                message: format!("Signer {what} failed: {body}"),
                status: Some(status.as_u16()),
            });
        }

        let value: Value = resp.json().await.map_err(TraderError::transport)?;
        check_envelope(value)
    }
}

/// Decode a cancel reply and interpret it for `order_id`.
fn parse_cancel_reply(order_id: &str, value: Value) -> Result<(), TraderError> {
    let resp: CancelResponse = serde_json::from_value(value).map_err(|e| TraderError::Transport {
        message: format!("Unexpected cancel reply: {e}"),
        status: None,
    })?;
    cancel_outcome(order_id, resp)
}

/// Interpret a cancel reply for `order_id`.
fn cancel_outcome(order_id: &str, resp: CancelResponse) -> Result<(), TraderError> {
    if let Some(reason) = resp.not_canceled.get(order_id) {
        let reason = match reason {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(TraderError::OrderRejected {
            status: "NOT_CANCELED".to_string(),
            order_id: Some(order_id.to_string()),
            message: Some(reason),
        });
    }
    if !resp.canceled.is_empty() && !resp.canceled.iter().any(|id| id == order_id) {
        warn!(order_id, canceled = ?resp.canceled, "Cancel acknowledged other order ids");
    }
    Ok(())
}

#[async_trait]
impl OrderGateway for SignerGateway {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, TraderError> {
        let url = format!("{}/order", self.base_url);
        debug!(token_id = %request.token_id, kind = %request.order_type, "Submitting order to signer");

        let value = self
            .send_json(self.http.post(&url).json(request), "order submission")
            .await?;

        let ack: OrderAck = serde_json::from_value(value).map_err(|e| TraderError::Transport {
            message: format!("Unexpected order reply: {e}"),
            status: None,
        })?;

        info!(
            order_id = ack.order_id_or_na(),
            status = %ack.status,
            "Signer accepted order request"
        );
        Ok(ack)
    }

    async fn open_orders(&self) -> Result<Vec<OpenOrder>, TraderError> {
        let url = format!("{}/orders", self.base_url);
        let value = self.send_json(self.http.get(&url), "order listing").await?;

        serde_json::from_value(value).map_err(|e| TraderError::Transport {
            message: format!("Unexpected order listing: {e}"),
            status: None,
        })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), TraderError> {
        let url = format!("{}/order/{}", self.base_url, order_id);
        let value = self.send_json(self.http.delete(&url), "cancel").await?;

        parse_cancel_reply(order_id, value)?;
        info!(order_id, "Order cancelled");
        Ok(())
    }

    fn name(&self) -> &str {
        GATEWAY_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
