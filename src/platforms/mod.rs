//! Platform integrations.
//!
//! - `polymarket` — Gamma listings and CLOB order books (read-only, no auth)
//! - `signer` — order placement through an external signing service
//!
//! Order placement is abstracted behind `OrderGateway` so the dispatcher
//! never deals with wallet keys, EIP-712 signing, or API credentials.

pub mod polymarket;
pub mod signer;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::types::{OpenOrder, OrderAck, OrderRequest, TraderError};

/// Abstraction over whatever signs and submits CLOB orders.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Sign and submit one order. Returns the immediate placement feedback.
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, TraderError>;

    /// List the account's open orders.
    async fn open_orders(&self) -> Result<Vec<OpenOrder>, TraderError>;

    /// Cancel an order by id.
    async fn cancel_order(&self, order_id: &str) -> Result<(), TraderError>;

    /// Gateway name for logging.
    fn name(&self) -> &str;
}
