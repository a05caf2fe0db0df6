//! Mock order gateway for integration testing.
//!
//! Records every request it receives and answers with a configurable
//! status, all in-memory with no external dependencies.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use btc5m::platforms::OrderGateway;
use btc5m::types::{OpenOrder, OrderAck, OrderRequest, TraderError};

/// A deterministic stand-in for the signing service.
#[derive(Clone)]
pub struct MockGateway {
    status: Arc<Mutex<String>>,
    placed: Arc<Mutex<Vec<OrderRequest>>>,
    open: Arc<Mutex<Vec<OpenOrder>>>,
    cancelled: Arc<Mutex<Vec<String>>>,
    /// If set, all operations will return this transport error.
    force_error: Arc<Mutex<Option<String>>>,
}

impl MockGateway {
    /// Gateway that answers every placement with `status`.
    pub fn new(status: &str) -> Self {
        Self {
            status: Arc::new(Mutex::new(status.to_string())),
            placed: Arc::new(Mutex::new(Vec::new())),
            open: Arc::new(Mutex::new(Vec::new())),
            cancelled: Arc::new(Mutex::new(Vec::new())),
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Force all subsequent operations to fail.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn placed(&self) -> Vec<OrderRequest> {
        self.placed.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    fn check_error(&self) -> Result<(), TraderError> {
        match self.force_error.lock().unwrap().as_ref() {
            Some(msg) => Err(TraderError::Transport {
                message: msg.clone(),
                status: Some(503),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl OrderGateway for MockGateway {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, TraderError> {
        self.check_error()?;

        let mut placed = self.placed.lock().unwrap();
        placed.push(request.clone());
        let order_id = format!("0xmock{:04}", placed.len());

        let status = self.status.lock().unwrap().clone();
        if status == "LIVE" {
            self.open.lock().unwrap().push(OpenOrder {
                id: order_id.clone(),
                side: "BUY".into(),
                price: request.price.map(|p| p.to_string()).unwrap_or_default(),
                original_size: String::new(),
                size_matched: "0".into(),
                status: status.clone(),
            });
        }

        Ok(OrderAck {
            order_id: Some(order_id),
            status,
            error_msg: None,
        })
    }

    async fn open_orders(&self) -> Result<Vec<OpenOrder>, TraderError> {
        self.check_error()?;
        Ok(self.open.lock().unwrap().clone())
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), TraderError> {
        self.check_error()?;
        let mut open = self.open.lock().unwrap();
        let before = open.len();
        open.retain(|o| o.id != order_id);
        if open.len() == before {
            return Err(TraderError::OrderRejected {
                status: "NOT_CANCELED".into(),
                order_id: Some(order_id.to_string()),
                message: Some("order not found".into()),
            });
        }
        self.cancelled.lock().unwrap().push(order_id.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
