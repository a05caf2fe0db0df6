//! Execution dispatcher.
//!
//! Turns a priced ticket into an `OrderRequest` and hands it to the order
//! gateway, or stops at a dry-run record. The dispatcher never signs
//! anything itself.

use tracing::{info, warn};

use crate::platforms::signer::SIGNER_URL_ENV;
use crate::platforms::OrderGateway;
use crate::strategy::risk::round_dp;
use crate::types::{
    FillEstimate, FillWarning, MarketWindow, OpenOrder, OrderAck, OrderKind, OrderQuantity, OrderRequest, OrderSide, Side,
    TraderError,
};

/// What the operator asked to trade.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTicket {
    pub side: Side,
    pub kind: OrderKind,
    /// USDC to spend.
    pub notional: f64,
    /// Limit price, required for GTC.
    pub limit_price: Option<f64>,
}

/// Result of `Executor::execute`.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// Nothing was sent.
    DryRun { order_id: String },
    /// Gateway reported MATCHED or LIVE.
    Placed(OrderAck),
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct Executor {
    gateway: Option<Box<dyn OrderGateway>>,
    dry_run: bool,
    sig_type: u8,
    funder: Option<String>,
}

impl Executor {
    pub fn new(gateway: Option<Box<dyn OrderGateway>>, dry_run: bool, sig_type: u8) -> Self {
        Self {
            gateway,
            dry_run,
            sig_type,
            funder: None,
        }
    }

    /// Proxy wallet address that funds the order, if any.
    pub fn with_funder(mut self, funder: Option<String>) -> Self {
        self.funder = funder.filter(|f| !f.is_empty());
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn gateway_name(&self) -> Option<&str> {
        self.gateway.as_deref().map(|g| g.name())
    }

    fn gateway(&self) -> Result<&dyn OrderGateway, TraderError> {
        self.gateway.as_deref().ok_or_else(|| {
            TraderError::Config(format!(
                "{SIGNER_URL_ENV} not set. Point it at the order-signing service holding the wallet key."
            ))
        })
    }

    /// Build the order request for `ticket` against `window`.
    ///
    /// Refuses a blocked estimate unless `force` is set. The order always
    /// buys the token of the chosen outcome.
    pub fn prepare(
        &self,
        window: &MarketWindow,
        estimate: &FillEstimate,
        ticket: &OrderTicket,
        force: bool,
    ) -> Result<OrderRequest, TraderError> {
        if estimate.blocked && !force {
            return Err(TraderError::SlippageBlocked {
                slippage_pct: estimate.slippage_pct,
                limit_pct: blocked_limit(estimate).unwrap_or(estimate.slippage_pct),
            });
        }
        if !ticket.notional.is_finite() || ticket.notional <= 0.0 {
            return Err(TraderError::InvalidOrder(format!(
                "Size must be a positive USDC amount, got {}",
                ticket.notional
            )));
        }

        let (price, quantity) = match ticket.kind {
            OrderKind::Gtc => {
                let price = ticket
                    .limit_price
                    .ok_or_else(|| TraderError::InvalidOrder("GTC orders require --price".to_string()))?;
                if !(price > 0.0 && price < 1.0) {
                    return Err(TraderError::InvalidOrder(format!(
                        "Price must be between 0 and 1, got {price}"
                    )));
                }
                let shares = round_dp(ticket.notional / price, 2);
                if shares <= 0.0 {
                    return Err(TraderError::InvalidOrder(format!(
                        "Size ${:.2} buys no shares at ${price}",
                        ticket.notional
                    )));
                }
                (Some(price), OrderQuantity::Size(shares))
            }
            OrderKind::Fok => (None, OrderQuantity::Amount(ticket.notional)),
        };

        if force && estimate.blocked {
            warn!(slippage_pct = estimate.slippage_pct, "Slippage block overridden by --force");
        }

        Ok(OrderRequest {
            token_id: window.token_for(ticket.side).to_string(),
            side: OrderSide::Buy,
            order_type: ticket.kind,
            price,
            quantity,
            signature_type: self.sig_type,
            funder: self.funder.clone(),
        })
    }

    /// Send `request`, or record a dry run.
    pub async fn execute(&self, request: &OrderRequest) -> Result<ExecutionOutcome, TraderError> {
        if self.dry_run {
            let order_id = format!("dry-run-{}", uuid::Uuid::new_v4());
            info!(
                token_id = %request.token_id,
                kind = %request.order_type,
                quantity = ?request.quantity,
                price = ?request.price,
                "[DRY RUN] Would place order"
            );
            return Ok(ExecutionOutcome::DryRun { order_id });
        }

        let ack = self.gateway()?.place_order(request).await?;
        if !ack.is_accepted() {
            warn!(
                order_id = ack.order_id_or_na(),
                status = %ack.status,
                error = ?ack.error_msg,
                "Order not accepted"
            );
            return Err(TraderError::OrderRejected {
                status: ack.status,
                order_id: ack.order_id,
                message: ack.error_msg,
            });
        }

        info!(order_id = ack.order_id_or_na(), status = %ack.status, "Order placed");
        Ok(ExecutionOutcome::Placed(ack))
    }

    pub async fn open_orders(&self) -> Result<Vec<OpenOrder>, TraderError> {
        self.gateway()?.open_orders().await
    }

    pub async fn cancel(&self, order_id: &str) -> Result<(), TraderError> {
        let order_id = order_id.trim();
        if order_id.is_empty() {
            return Err(TraderError::InvalidOrder("Order id is empty".to_string()));
        }
        self.gateway()?.cancel_order(order_id).await
    }
}

fn blocked_limit(estimate: &FillEstimate) -> Option<f64> {
    estimate.warnings.iter().find_map(|w| match w {
        FillWarning::SlippageBlocked { limit_pct, .. } => Some(*limit_pct),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
