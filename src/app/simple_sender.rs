use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use eyre::{eyre, OptionExt, Result};
use parking_lot::RwLock;
use safe_math::safe;
use symm_core::{
    core::{
        bits::{Amount, ExchangeOrderId, Side, Symbol},
        decimal_ext::{floor_to_scale, DecimalExt, AMOUNT_SCALE},
        functional::{IntoObservableSingle, PublishSingle, SingleObserver},
    },
    order_sender::execution_gateway::{ExecutionGateway, ExecutionReport, OrderRequest},
};
use tokio::time::sleep;

#[derive(Clone, Debug, PartialEq)]
pub struct OpenOrder {
    pub symbol: Symbol,
    pub side: Side,
    pub price: Amount,
    pub remaining_quantity: Amount,
}

/// Simulated exchange
///
/// Acknowledges every order, fills configured portion of it straight away at
/// order price, and keeps the rest open until cancelled.
pub struct SimpleSender {
    observer: SingleObserver<ExecutionReport>,
    open_orders: RwLock<HashMap<ExchangeOrderId, OpenOrder>>,
    fill_ratio: Amount,
    latency: Option<Duration>,
    last_id: AtomicU64,
}

impl SimpleSender {
    pub fn new(fill_ratio: Amount, latency: Option<Duration>) -> Self {
        Self {
            observer: SingleObserver::new(),
            open_orders: RwLock::new(HashMap::new()),
            fill_ratio,
            latency,
            last_id: AtomicU64::new(0),
        }
    }

    pub fn get_open_orders(&self) -> HashMap<ExchangeOrderId, OpenOrder> {
        self.open_orders.read().clone()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            sleep(latency).await;
        }
    }

    fn fill_immediately(
        &self,
        exchange_order_id: &ExchangeOrderId,
        order: &OrderRequest,
    ) -> Result<()> {
        let quantity = floor_to_scale(
            safe!(order.quantity * self.fill_ratio).ok_or_eyre("Math error")?,
            AMOUNT_SCALE,
        );

        if quantity <= Amount::ZERO {
            return Ok(());
        }

        {
            let mut open_orders = self.open_orders.write();
            let open_order = open_orders
                .get_mut(exchange_order_id)
                .ok_or_eyre("Open order not found")?;

            open_order.remaining_quantity =
                safe!(open_order.remaining_quantity - quantity).ok_or_eyre("Math error")?;

            if open_order.remaining_quantity <= Amount::ZERO {
                open_orders.remove(exchange_order_id);
            }
        }

        tracing::debug!(
            %exchange_order_id,
            symbol = %order.symbol,
            %quantity,
            price = %order.price,
            "Simulated fill"
        );

        self.observer.publish_single(ExecutionReport::Fill {
            exchange_order_id: exchange_order_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            price: order.price,
            quantity,
            timestamp: Utc::now(),
        });

        Ok(())
    }
}

#[async_trait]
impl ExecutionGateway for SimpleSender {
    async fn submit_order(&self, order: &OrderRequest) -> Result<ExchangeOrderId> {
        self.simulate_latency().await;

        if order.quantity <= Amount::ZERO || order.price <= Amount::ZERO {
            return Err(eyre!(
                "Invalid order {}: {} {} at {}",
                order.client_order_id,
                order.quantity,
                order.symbol,
                order.price
            ));
        }

        let exchange_order_id = ExchangeOrderId::from(format!(
            "X-{}",
            self.last_id.fetch_add(1, Ordering::Relaxed) + 1
        ));

        self.open_orders.write().insert(
            exchange_order_id.clone(),
            OpenOrder {
                symbol: order.symbol.clone(),
                side: order.side,
                price: order.price,
                remaining_quantity: order.quantity,
            },
        );

        tracing::info!(
            %exchange_order_id,
            client_order_id = %order.client_order_id,
            symbol = %order.symbol,
            side = %order.side,
            price = %order.price,
            quantity = %order.quantity,
            "Simulated order acknowledged"
        );

        self.fill_immediately(&exchange_order_id, order)?;

        Ok(exchange_order_id)
    }

    async fn cancel_order(
        &self,
        exchange_order_id: &ExchangeOrderId,
    ) -> Result<Option<ExchangeOrderId>> {
        self.simulate_latency().await;

        match self.open_orders.write().remove(exchange_order_id) {
            Some(_) => Ok(Some(exchange_order_id.clone())),
            None => {
                tracing::debug!(%exchange_order_id, "Cancel for order not open");
                Ok(None)
            }
        }
    }
}

impl IntoObservableSingle<ExecutionReport> for SimpleSender {
    fn get_single_observer_mut(&mut self) -> &mut SingleObserver<ExecutionReport> {
        &mut self.observer
    }
}
