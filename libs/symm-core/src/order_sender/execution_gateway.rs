use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eyre::Result;

use crate::core::bits::{Amount, ClientOrderId, ExchangeOrderId, Side, Symbol};

/// Limit order to be placed on exchange
#[derive(Clone, Debug, PartialEq)]
pub struct OrderRequest {
    pub client_order_id: ClientOrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub price: Amount,
    pub quantity: Amount,
    pub created_timestamp: DateTime<Utc>,
}

/// Asynchronous reports from exchange about working orders
#[derive(Clone, Debug, PartialEq)]
pub enum ExecutionReport {
    Fill {
        exchange_order_id: ExchangeOrderId,
        symbol: Symbol,
        side: Side,
        price: Amount,
        quantity: Amount,
        timestamp: DateTime<Utc>,
    },
}

/// Allows sending orders and cancels to exchange
///
/// Fills are not returned from these calls, they arrive later as
/// [`ExecutionReport`] on a channel.
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Place order, and return exchange assigned id once acknowledged
    async fn submit_order(&self, order: &OrderRequest) -> Result<ExchangeOrderId>;

    /// Request cancel, `Some` only when exchange acknowledged the cancel
    async fn cancel_order(&self, exchange_order_id: &ExchangeOrderId)
        -> Result<Option<ExchangeOrderId>>;
}

pub mod test_util {
    use std::{
        collections::HashSet,
        sync::atomic::{AtomicBool, AtomicU64, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use eyre::{eyre, Result};
    use parking_lot::RwLock;

    use crate::core::bits::{ExchangeOrderId, Symbol};

    use super::{ExecutionGateway, OrderRequest};

    /// Records requests, and acknowledges them unless told otherwise
    pub struct MockExecutionGateway {
        pub submitted: RwLock<Vec<(ExchangeOrderId, OrderRequest)>>,
        pub cancelled: RwLock<Vec<ExchangeOrderId>>,
        pub acknowledge_cancels: AtomicBool,
        pub reject_symbols: RwLock<HashSet<Symbol>>,
        pub latency: Option<Duration>,
        last_id: AtomicU64,
    }

    impl Default for MockExecutionGateway {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockExecutionGateway {
        pub fn new() -> Self {
            Self {
                submitted: RwLock::new(Vec::new()),
                cancelled: RwLock::new(Vec::new()),
                acknowledge_cancels: AtomicBool::new(true),
                reject_symbols: RwLock::new(HashSet::new()),
                latency: None,
                last_id: AtomicU64::new(0),
            }
        }

        pub fn new_with_latency(latency: Duration) -> Self {
            Self {
                latency: Some(latency),
                ..Self::new()
            }
        }

        pub fn set_acknowledge_cancels(&self, value: bool) {
            self.acknowledge_cancels.store(value, Ordering::Relaxed);
        }

        pub fn reject_symbol(&self, symbol: &Symbol) {
            self.reject_symbols.write().insert(symbol.clone());
        }

        pub fn get_submitted(&self) -> Vec<(ExchangeOrderId, OrderRequest)> {
            self.submitted.read().clone()
        }

        pub fn get_cancelled(&self) -> Vec<ExchangeOrderId> {
            self.cancelled.read().clone()
        }

        async fn simulate_latency(&self) {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
        }
    }

    #[async_trait]
    impl ExecutionGateway for MockExecutionGateway {
        async fn submit_order(&self, order: &OrderRequest) -> Result<ExchangeOrderId> {
            self.simulate_latency().await;

            if self.reject_symbols.read().contains(&order.symbol) {
                return Err(eyre!("Order rejected: {}", order.symbol));
            }

            let exchange_order_id = ExchangeOrderId::from(format!(
                "E-{}",
                self.last_id.fetch_add(1, Ordering::Relaxed) + 1
            ));

            self.submitted
                .write()
                .push((exchange_order_id.clone(), order.clone()));

            Ok(exchange_order_id)
        }

        async fn cancel_order(
            &self,
            exchange_order_id: &ExchangeOrderId,
        ) -> Result<Option<ExchangeOrderId>> {
            self.simulate_latency().await;

            if !self.acknowledge_cancels.load(Ordering::Relaxed) {
                return Ok(None);
            }

            self.cancelled.write().push(exchange_order_id.clone());
            Ok(Some(exchange_order_id.clone()))
        }
    }
}
