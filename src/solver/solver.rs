use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use parking_lot::RwLock;
use safe_math::safe;

use symm_core::{
    core::{
        bits::{Amount, ClientOrderId, ExchangeOrderId, Side, Symbol},
        decimal_ext::{round_to_scale, DecimalExt},
        functional::{IntoObservableSingle, PublishSingle, SingleObserver},
    },
    market_data::{
        market_data_gateway::MarketDataGateway, order_book::book_pricer::OrderPricer,
    },
    order_sender::execution_gateway::{ExecutionGateway, ExecutionReport, OrderRequest},
};

use crate::{
    error::{SolverError, SolverResult},
    index::{index_definition::IndexId, index_manager::IndexManager},
};

use super::{
    agg_order::{AggOrderId, AggOrderStatus, AggregatedOrder},
    agg_order_book::AggregatedOrderBook,
    intent::{CreateIntentDto, Intent, IntentId, IntentLeg},
    intent_ledger::IntentLedger,
};

pub trait OrderIdProvider {
    fn next_client_order_id(&mut self) -> ClientOrderId;
}

#[derive(Clone, Debug, PartialEq)]
pub enum SolverEvent {
    IntentActivated {
        intent_id: IntentId,
        index_id: IndexId,
        legs: Vec<(Symbol, Amount)>,
        timestamp: DateTime<Utc>,
    },
    IntentFulfilled {
        intent_id: IntentId,
        filled_price: Option<Amount>,
        fill_loss: Amount,
        timestamp: DateTime<Utc>,
    },
    OrderSubmitted {
        order_id: AggOrderId,
        exchange_order_id: ExchangeOrderId,
        symbol: Symbol,
        side: Side,
        price: Amount,
        quantity: Amount,
        timestamp: DateTime<Utc>,
    },
    OrderReplaced {
        order_id: AggOrderId,
        replacement_id: AggOrderId,
        symbol: Symbol,
        side: Side,
        residual_quantity: Amount,
        price: Amount,
        timestamp: DateTime<Utc>,
    },
    OrderFulfilled {
        order_id: AggOrderId,
        symbol: Symbol,
        side: Side,
        timestamp: DateTime<Utc>,
    },
    OrderCancelled {
        order_id: AggOrderId,
        symbol: Symbol,
        side: Side,
        timestamp: DateTime<Utc>,
    },
}

/// What happened during one tick
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub index_prices: HashMap<IndexId, Amount>,

    /// Pending intents whose limit was satisfied by index price
    pub eligible: Vec<IntentId>,

    /// Cancelled intents taken out of orders not yet submitted
    pub detached: Vec<IntentId>,

    /// Intents folded into aggregated orders and activated
    pub folded: Vec<IntentId>,

    /// Eligible intents waiting for active order on same asset to complete
    pub deferred: Vec<IntentId>,

    /// Orders acknowledged by exchange
    pub submitted: Vec<AggOrderId>,

    /// Orders cancelled due to drift, and their replacements
    pub replaced: Vec<(AggOrderId, AggOrderId)>,

    /// Orders that failed to price, submit, or reconcile
    pub failed_orders: Vec<AggOrderId>,

    /// Tick was not run, because other tick was in progress
    pub skipped: bool,
}

/// Periodic matching of intents into aggregated exchange orders
///
/// On every tick the solver:
/// 1. prices all indexes from one market snapshot,
/// 2. picks pending intents whose limit is satisfied,
/// 3. re-quotes active orders that market drifted away from,
/// 4. folds picked intents into per (asset, side) orders,
/// 5. prices and sends orders that are not yet on exchange.
pub struct Solver {
    observer: SingleObserver<SolverEvent>,
    index_manager: Arc<IndexManager>,
    intent_ledger: Arc<IntentLedger>,
    market_data: Arc<dyn MarketDataGateway>,
    order_pricer: Arc<dyn OrderPricer>,
    execution_gateway: Arc<dyn ExecutionGateway>,
    order_ids: Arc<RwLock<dyn OrderIdProvider + Send + Sync>>,
    agg_orders: RwLock<AggregatedOrderBook>,
    tick_guard: tokio::sync::Mutex<()>,
    drift_threshold: Amount,
    quantity_scale: u32,
    price_scale: u32,
}

impl Solver {
    pub fn new(
        index_manager: Arc<IndexManager>,
        intent_ledger: Arc<IntentLedger>,
        market_data: Arc<dyn MarketDataGateway>,
        order_pricer: Arc<dyn OrderPricer>,
        execution_gateway: Arc<dyn ExecutionGateway>,
        order_ids: Arc<RwLock<dyn OrderIdProvider + Send + Sync>>,
        drift_threshold: Amount,
        quantity_scale: u32,
        price_scale: u32,
    ) -> Self {
        Self {
            observer: SingleObserver::new(),
            index_manager,
            intent_ledger,
            market_data,
            order_pricer,
            execution_gateway,
            order_ids,
            agg_orders: RwLock::new(AggregatedOrderBook::new()),
            tick_guard: tokio::sync::Mutex::new(()),
            drift_threshold,
            quantity_scale,
            price_scale,
        }
    }

    pub fn get_index_manager(&self) -> &Arc<IndexManager> {
        &self.index_manager
    }

    pub fn get_intent_ledger(&self) -> &Arc<IntentLedger> {
        &self.intent_ledger
    }

    /// Submit new intent
    ///
    /// Amount too small to give every asset a non-zero quantity is rejected.
    pub async fn create_intent(&self, dto: CreateIntentDto) -> SolverResult<IntentId> {
        if Amount::ZERO < dto.amount {
            self.make_leg_quantities(dto.index_id, dto.amount)?;
        }
        self.intent_ledger.submit(dto, &self.index_manager).await
    }

    pub fn cancel_intent(&self, intent_id: IntentId) -> SolverResult<()> {
        self.intent_ledger.cancel(intent_id)
    }

    pub fn get_intent(&self, intent_id: IntentId) -> SolverResult<Intent> {
        self.intent_ledger.get_intent(intent_id)
    }

    pub async fn get_index_price(&self, index_id: IndexId) -> SolverResult<Amount> {
        self.index_manager.get_index_price(index_id).await
    }

    pub fn get_agg_order(&self, order_id: AggOrderId) -> SolverResult<AggregatedOrder> {
        self.agg_orders.read().get_order(order_id).cloned()
    }

    pub fn get_agg_orders(&self) -> Vec<AggregatedOrder> {
        self.agg_orders
            .read()
            .get_orders()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn get_working_order(&self, symbol: &Symbol, side: Side) -> Option<AggregatedOrder> {
        self.agg_orders
            .read()
            .get_working_order(symbol, side)
            .cloned()
    }

    /// Core matching function
    ///
    /// Failure to price any index aborts the tick before anything changes.
    /// Failures of individual orders are logged, reported, and retried on
    /// next tick.
    pub async fn tick(&self) -> SolverResult<TickReport> {
        let Ok(_tick_guard) = self.tick_guard.try_lock() else {
            tracing::debug!("Tick already in progress");
            return Ok(TickReport {
                skipped: true,
                ..Default::default()
            });
        };

        let index_prices = self.index_manager.get_index_prices().await?;

        let eligible_intents = self
            .intent_ledger
            .pending_snapshot()
            .into_iter()
            .filter(|intent| {
                index_prices
                    .get(&intent.index_id)
                    .is_some_and(|index_price| intent.is_eligible(*index_price))
            })
            .collect_vec();

        let mut report = TickReport {
            eligible: eligible_intents.iter().map(|intent| intent.id).collect(),
            index_prices,
            ..Default::default()
        };

        self.detach_cancelled_intents(&mut report);
        self.process_unfilled_agg_orders(&mut report).await;
        self.fold_intents(eligible_intents, &mut report);
        self.submit_pending_orders(&mut report).await;

        tracing::info!(
            index_prices = %report
                .index_prices
                .iter()
                .sorted_by_key(|(index_id, _)| **index_id)
                .map(|(index_id, price)| format!("{}: {}", index_id, price))
                .join(", "),
            eligible = report.eligible.len(),
            folded = report.folded.len(),
            deferred = report.deferred.len(),
            submitted = report.submitted.len(),
            replaced = report.replaced.len(),
            failed = report.failed_orders.len(),
            "Tick complete"
        );

        Ok(report)
    }

    fn detach_cancelled_intents(&self, report: &mut TickReport) {
        let candidates = {
            let agg_orders = self.agg_orders.read();
            agg_orders
                .pending_order_ids()
                .into_iter()
                .filter_map(|order_id| agg_orders.get_order(order_id).ok())
                .flat_map(|order| order.intent_ids())
                .collect::<HashSet<_>>()
        };

        let cancelled = candidates
            .into_iter()
            .filter(|intent_id| self.intent_ledger.is_cancelled(*intent_id))
            .collect::<HashSet<_>>();

        if cancelled.is_empty() {
            return;
        }

        let detached = self.agg_orders.write().detach_intents(&cancelled);
        for (order_id, intent_id) in &detached {
            tracing::info!(%order_id, %intent_id, "Cancelled intent detached");
        }

        report.detached = detached
            .into_iter()
            .map(|(_, intent_id)| intent_id)
            .unique()
            .sorted()
            .collect();
    }

    /// Re-quote active orders that market price drifted away from
    pub async fn process_unfilled_agg_orders(&self, report: &mut TickReport) {
        let order_ids = self.agg_orders.read().active_unfilled_order_ids();

        for order_id in order_ids {
            match self.reconcile_order(order_id).await {
                Ok(Some(replacement_id)) => report.replaced.push((order_id, replacement_id)),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(%order_id, "Failed to reconcile order: {}", err);
                    report.failed_orders.push(order_id);
                }
            }
        }
    }

    /// Cancel and replace order if drift threshold was crossed
    ///
    /// Order is replaced only once exchange acknowledged the cancel, otherwise
    /// it is left untouched and checked again on next tick.
    async fn reconcile_order(&self, order_id: AggOrderId) -> SolverResult<Option<AggOrderId>> {
        let order = self.get_agg_order(order_id)?;

        let Some(market_price) = self.get_market_price(&order.symbol).await? else {
            tracing::debug!(%order_id, symbol = %order.symbol, "No market price, skipping");
            return Ok(None);
        };

        if !order.is_drift_triggered(market_price, self.drift_threshold) {
            return Ok(None);
        }

        let residual = order.remaining_quantity();
        let price = self.quote_price(&order.symbol, residual, order.side).await?;

        let exchange_order_id = order.exchange_order_id.clone().ok_or_else(|| {
            SolverError::InvalidState(format!("Active order {} has no exchange id", order_id))
        })?;

        tracing::info!(
            %order_id,
            %exchange_order_id,
            symbol = %order.symbol,
            side = %order.side,
            agg_price = ?order.agg_price,
            %market_price,
            %residual,
            new_price = %price,
            "Drift detected, cancelling"
        );

        let acknowledged = self
            .execution_gateway
            .cancel_order(&exchange_order_id)
            .await
            .map_err(|err| SolverError::ExecutionGatewayError(format!("{:?}", err)))?;

        if acknowledged.is_none() {
            tracing::info!(%order_id, %exchange_order_id, "Cancel not acknowledged");
            return Ok(None);
        }

        let replacement_id = self.agg_orders.write().replace(order_id, price)?;

        self.observer.publish_single(SolverEvent::OrderReplaced {
            order_id,
            replacement_id,
            symbol: order.symbol.clone(),
            side: order.side,
            residual_quantity: residual,
            price,
            timestamp: Utc::now(),
        });

        Ok(Some(replacement_id))
    }

    fn make_leg_quantities(
        &self,
        index_id: IndexId,
        amount: Amount,
    ) -> SolverResult<Vec<(Symbol, Amount)>> {
        let definition = self.index_manager.get_index_data(index_id)?;

        definition
            .assets
            .iter()
            .map(|asset| {
                let quantity = safe!(amount * asset.coefficient).ok_or_else(|| {
                    SolverError::MathOverflow(format!("Leg {} of {}", asset.symbol, index_id))
                })?;
                let quantity = round_to_scale(quantity, self.quantity_scale);
                if quantity <= Amount::ZERO {
                    return Err(SolverError::ValidationError(format!(
                        "Amount {} too small for {} leg of {}",
                        amount, asset.symbol, index_id
                    )));
                }
                Ok((asset.symbol.clone(), quantity))
            })
            .collect()
    }

    fn make_legs(&self, intent: &Intent) -> SolverResult<HashMap<Symbol, IntentLeg>> {
        Ok(self
            .make_leg_quantities(intent.index_id, intent.amount)?
            .into_iter()
            .map(|(symbol, quantity)| (symbol, IntentLeg::new(quantity)))
            .collect())
    }

    /// Fold eligible intents into aggregated orders in queue order
    fn fold_intents(&self, eligible_intents: Vec<Intent>, report: &mut TickReport) {
        for intent in eligible_intents {
            let legs = match self.make_legs(&intent) {
                Ok(legs) => legs,
                Err(err) => {
                    tracing::warn!(intent_id = %intent.id, "Cannot fold intent: {}", err);
                    continue;
                }
            };

            match self.fold_intent(&intent, legs) {
                Ok(Some(legs)) => {
                    tracing::info!(
                        intent_id = %intent.id,
                        legs = %legs.iter().map(|(s, q)| format!("{}: {}", s, q)).join(", "),
                        "Intent folded"
                    );
                    report.folded.push(intent.id);
                    self.observer.publish_single(SolverEvent::IntentActivated {
                        intent_id: intent.id,
                        index_id: intent.index_id,
                        legs,
                        timestamp: Utc::now(),
                    });
                }
                Ok(None) => {
                    tracing::debug!(intent_id = %intent.id, "Intent deferred");
                    report.deferred.push(intent.id);
                }
                Err(err) => {
                    tracing::warn!(intent_id = %intent.id, "Cannot fold intent: {}", err);
                }
            }
        }
    }

    /// Activate intent and add its legs to pending orders
    ///
    /// Returns `None` when some leg would need to extend an active order.
    fn fold_intent(
        &self,
        intent: &Intent,
        legs: HashMap<Symbol, IntentLeg>,
    ) -> SolverResult<Option<Vec<(Symbol, Amount)>>> {
        let mut agg_orders = self.agg_orders.write();

        if legs
            .keys()
            .any(|symbol| agg_orders.has_active(symbol, intent.side))
        {
            return Ok(None);
        }

        let quantities = legs
            .iter()
            .map(|(symbol, leg)| (symbol.clone(), leg.quantity))
            .sorted()
            .collect_vec();

        // Intent may have been cancelled after snapshot was taken
        self.intent_ledger.activate(intent.id, legs)?;

        for (symbol, quantity) in &quantities {
            agg_orders.fold(intent.index_id, symbol, intent.side, intent.id, *quantity)?;
        }

        Ok(Some(quantities))
    }

    /// Price and send every order not yet on exchange
    async fn submit_pending_orders(&self, report: &mut TickReport) {
        let order_ids = self.agg_orders.read().pending_order_ids();

        for order_id in order_ids {
            match self.submit_order(order_id).await {
                Ok(true) => report.submitted.push(order_id),
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(%order_id, "Failed to submit order: {}", err);
                    report.failed_orders.push(order_id);
                }
            }
        }
    }

    async fn submit_order(&self, order_id: AggOrderId) -> SolverResult<bool> {
        let order = self.get_agg_order(order_id)?;

        if self.get_market_price(&order.symbol).await?.is_none() {
            tracing::debug!(%order_id, symbol = %order.symbol, "No market price, skipping");
            return Ok(false);
        }

        let quantity = round_to_scale(order.agg_quantity, self.quantity_scale);
        if quantity <= Amount::ZERO {
            return Err(SolverError::InvalidState(format!(
                "Order {} has no quantity to submit",
                order_id
            )));
        }

        let price = self.quote_price(&order.symbol, quantity, order.side).await?;
        self.agg_orders.write().set_order_price(order_id, price)?;

        let client_order_id = self.order_ids.write().next_client_order_id();
        let request = OrderRequest {
            client_order_id: client_order_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            price,
            quantity,
            created_timestamp: Utc::now(),
        };

        let exchange_order_id = self
            .execution_gateway
            .submit_order(&request)
            .await
            .map_err(|err| SolverError::ExecutionGatewayError(format!("{:?}", err)))?;

        self.agg_orders
            .write()
            .activate(order_id, exchange_order_id.clone(), client_order_id)?;

        tracing::info!(
            %order_id,
            %exchange_order_id,
            symbol = %order.symbol,
            side = %order.side,
            %price,
            %quantity,
            intents = %order.intent_ids().iter().join(", "),
            "Order submitted"
        );

        self.observer.publish_single(SolverEvent::OrderSubmitted {
            order_id,
            exchange_order_id,
            symbol: order.symbol,
            side: order.side,
            price,
            quantity,
            timestamp: Utc::now(),
        });

        Ok(true)
    }

    async fn get_market_price(&self, symbol: &Symbol) -> SolverResult<Option<Amount>> {
        self.market_data
            .get_price(symbol)
            .await
            .map_err(|err| SolverError::PriceUnavailable(format!("{}: {:?}", symbol, err)))
    }

    async fn quote_price(&self, symbol: &Symbol, quantity: Amount, side: Side) -> SolverResult<Amount> {
        let price = self
            .order_pricer
            .calculate_order_price(symbol, quantity, side)
            .await
            .map_err(|err| {
                SolverError::PriceUnavailable(format!(
                    "Quote for {} {} {}: {:?}",
                    side, quantity, symbol, err
                ))
            })?;

        Ok(round_to_scale(price, self.price_scale))
    }

    /// Apply fill reported by exchange to order and its intents
    pub fn handle_execution_report(&self, report: ExecutionReport) {
        match report {
            ExecutionReport::Fill {
                exchange_order_id,
                symbol,
                side,
                price,
                quantity,
                timestamp,
            } => {
                let result = self
                    .agg_orders
                    .write()
                    .apply_fill(&exchange_order_id, quantity);

                let fill = match result {
                    Ok(Some(fill)) => fill,
                    Ok(None) => {
                        tracing::warn!(%exchange_order_id, %symbol, "Fill for unknown order");
                        return;
                    }
                    Err(err) => {
                        tracing::warn!(%exchange_order_id, %symbol, "Fill ignored: {}", err);
                        return;
                    }
                };

                if fill.symbol != symbol || fill.side != side {
                    tracing::warn!(
                        order_id = %fill.order_id,
                        %exchange_order_id,
                        "Fill reported for {} {} but order is {} {}",
                        side,
                        symbol,
                        fill.side,
                        fill.symbol
                    );
                }

                tracing::info!(
                    order_id = %fill.order_id,
                    %exchange_order_id,
                    %price,
                    quantity = %fill.applied_quantity,
                    %timestamp,
                    "Fill applied"
                );

                for (intent_id, allocated) in &fill.allocations {
                    match self
                        .intent_ledger
                        .apply_leg_fill(*intent_id, &fill.symbol, *allocated, price)
                    {
                        Ok(true) => self.notify_intent_fulfilled(*intent_id),
                        Ok(false) => {}
                        Err(err) => {
                            tracing::warn!(%intent_id, "Leg fill not applied: {}", err);
                        }
                    }
                }

                if fill.fulfilled {
                    tracing::info!(order_id = %fill.order_id, "Order fulfilled");
                    self.observer.publish_single(SolverEvent::OrderFulfilled {
                        order_id: fill.order_id,
                        symbol: fill.symbol,
                        side: fill.side,
                        timestamp: Utc::now(),
                    });
                }
            }
        }
    }

    fn notify_intent_fulfilled(&self, intent_id: IntentId) {
        match self.intent_ledger.get_intent(intent_id) {
            Ok(intent) => {
                tracing::info!(
                    %intent_id,
                    filled_amount = %intent.filled_amount,
                    filled_price = ?intent.filled_price,
                    fill_loss = %intent.fill_loss,
                    "Intent fulfilled"
                );
                self.observer.publish_single(SolverEvent::IntentFulfilled {
                    intent_id,
                    filled_price: intent.filled_price,
                    fill_loss: intent.fill_loss,
                    timestamp: Utc::now(),
                });
            }
            Err(err) => tracing::warn!(%intent_id, "Fulfilled intent not found: {}", err),
        }
    }

    /// Cancel aggregated order without replacement
    ///
    /// Order on exchange is cancelled only once exchange acknowledged it.
    /// Waits for any tick in progress to finish.
    pub async fn cancel_agg_order(&self, order_id: AggOrderId) -> SolverResult<()> {
        let _tick_guard = self.tick_guard.lock().await;
        let order = self.get_agg_order(order_id)?;

        match order.status {
            AggOrderStatus::Pending => {}
            AggOrderStatus::Active => {
                let exchange_order_id = order.exchange_order_id.clone().ok_or_else(|| {
                    SolverError::InvalidState(format!("Active order {} has no exchange id", order_id))
                })?;

                let acknowledged = self
                    .execution_gateway
                    .cancel_order(&exchange_order_id)
                    .await
                    .map_err(|err| SolverError::ExecutionGatewayError(format!("{:?}", err)))?;

                if acknowledged.is_none() {
                    return Err(SolverError::ExecutionGatewayError(format!(
                        "Cancel of {} not acknowledged",
                        exchange_order_id
                    )));
                }
            }
            status => {
                return Err(SolverError::InvalidState(format!(
                    "Cannot cancel {} in status {:?}",
                    order_id, status
                )));
            }
        }

        self.agg_orders.write().cancel_order(order_id)?;

        tracing::info!(%order_id, symbol = %order.symbol, side = %order.side, "Order cancelled");
        self.observer.publish_single(SolverEvent::OrderCancelled {
            order_id,
            symbol: order.symbol,
            side: order.side,
            timestamp: Utc::now(),
        });

        Ok(())
    }
}

impl IntoObservableSingle<SolverEvent> for Solver {
    fn get_single_observer_mut(&mut self) -> &mut SingleObserver<SolverEvent> {
        &mut self.observer
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use crossbeam::channel::{unbounded, Receiver};
    use parking_lot::RwLock;
    use rust_decimal::dec;
    use symm_core::{
        assert_decimal_approx_eq,
        core::{
            bits::{Amount, ClientOrderId, ExchangeOrderId, Side},
            functional::IntoObservableSingle,
            test_util::{
                get_mock_asset_name_1, get_mock_asset_name_2, get_mock_tolerance,
                get_mock_user_1, get_mock_user_2,
            },
        },
        market_data::{
            market_data_gateway::StaticMarketData,
            order_book::book_pricer::test_util::MockOrderPricer,
        },
        order_sender::execution_gateway::{test_util::MockExecutionGateway, ExecutionReport},
    };
    use test_case::test_case;

    use crate::{
        error::SolverError,
        index::{
            index_definition::{IndexAsset, IndexId},
            index_manager::IndexManager,
        },
        solver::{
            agg_order::AggOrderStatus,
            intent::{CreateIntentDto, IntentStatus},
            intent_ledger::IntentLedger,
        },
    };

    use super::{OrderIdProvider, Solver, SolverEvent};

    struct MockOrderIds {
        last_id: u64,
    }

    impl OrderIdProvider for MockOrderIds {
        fn next_client_order_id(&mut self) -> ClientOrderId {
            self.last_id += 1;
            ClientOrderId::from(format!("C-{}", self.last_id))
        }
    }

    struct MockSolver {
        solver: Solver,
        market_data: Arc<StaticMarketData>,
        order_pricer: Arc<MockOrderPricer>,
        execution_gateway: Arc<MockExecutionGateway>,
        index_id: IndexId,
        events: Receiver<SolverEvent>,
    }

    impl MockSolver {
        fn set_price(&self, symbol: &str, price: Amount) {
            self.market_data.set_price(&symbol.into(), price);
            self.order_pricer.set_base_price(&symbol.into(), price);
        }

        fn buy(&self, amount: Amount, limit_price: Amount) -> CreateIntentDto {
            self.dto(Side::Buy, amount, limit_price)
        }

        fn dto(&self, side: Side, amount: Amount, limit_price: Amount) -> CreateIntentDto {
            CreateIntentDto {
                index_id: self.index_id,
                user_id: get_mock_user_1(),
                side,
                amount,
                limit_price,
            }
        }

        fn fill(&self, exchange_order_id: &ExchangeOrderId, quantity: Amount, price: Amount) {
            let order = self
                .solver
                .get_agg_orders()
                .into_iter()
                .find(|o| o.exchange_order_id.as_ref() == Some(exchange_order_id))
                .unwrap();
            self.solver.handle_execution_report(ExecutionReport::Fill {
                exchange_order_id: exchange_order_id.clone(),
                symbol: order.symbol,
                side: order.side,
                price,
                quantity,
                timestamp: chrono::Utc::now(),
            });
        }

        fn events(&self) -> Vec<SolverEvent> {
            self.events.try_iter().collect()
        }
    }

    /// Index of 0.001 BTC and 0.01 ETH, at BTC 60000 and ETH 3000 it is 90
    fn get_mock_solver(execution_gateway: MockExecutionGateway) -> MockSolver {
        get_mock_solver_with_assets(
            execution_gateway,
            &[
                ("BTC", dec!(0.001), dec!(60000)),
                ("ETH", dec!(0.01), dec!(3000)),
            ],
        )
    }

    fn get_mock_solver_with_assets(
        execution_gateway: MockExecutionGateway,
        assets: &[(&str, Amount, Amount)],
    ) -> MockSolver {
        let market_data = Arc::new(StaticMarketData::new());
        let order_pricer = Arc::new(MockOrderPricer::new(dec!(0)));
        let execution_gateway = Arc::new(execution_gateway);

        for (symbol, _, price) in assets {
            market_data.set_price(&(*symbol).into(), *price);
            order_pricer.set_base_price(&(*symbol).into(), *price);
        }

        let index_manager = Arc::new(IndexManager::new(market_data.clone()));
        let index_id = index_manager
            .create_index(
                assets
                    .iter()
                    .map(|(symbol, coefficient, _)| IndexAsset::new((*symbol).into(), *coefficient)),
            )
            .unwrap();

        let mut solver = Solver::new(
            index_manager,
            Arc::new(IntentLedger::new()),
            market_data.clone(),
            order_pricer.clone(),
            execution_gateway.clone(),
            Arc::new(RwLock::new(MockOrderIds { last_id: 0 })),
            dec!(0.001),
            8,
            8,
        );

        let (tx, events) = unbounded();
        solver.get_single_observer_mut().set_observer_from(tx);

        MockSolver {
            solver,
            market_data,
            order_pricer,
            execution_gateway,
            index_id,
            events,
        }
    }

    #[tokio::test]
    async fn test_single_intent_is_folded_and_submitted() {
        let mock = get_mock_solver(MockExecutionGateway::new());
        let btc = get_mock_asset_name_1();
        let eth = get_mock_asset_name_2();

        assert_eq!(mock.solver.get_index_price(mock.index_id).await, Ok(dec!(90)));

        let intent_id = mock
            .solver
            .create_intent(mock.buy(dec!(10), dec!(95)))
            .await
            .unwrap();

        let report = mock.solver.tick().await.unwrap();
        assert_eq!(report.index_prices[&mock.index_id], dec!(90));
        assert_eq!(report.eligible, vec![intent_id]);
        assert_eq!(report.folded, vec![intent_id]);
        assert_eq!(report.submitted.len(), 2);
        assert!(report.failed_orders.is_empty());

        let btc_order = mock.solver.get_working_order(&btc, Side::Buy).unwrap();
        let eth_order = mock.solver.get_working_order(&eth, Side::Buy).unwrap();
        assert_eq!(btc_order.agg_quantity, dec!(0.01));
        assert_eq!(eth_order.agg_quantity, dec!(0.1));
        assert_eq!(btc_order.status, AggOrderStatus::Active);
        assert_eq!(btc_order.agg_price, Some(dec!(60000)));
        assert_eq!(btc_order.intent_ids(), vec![intent_id]);

        let intent = mock.solver.get_intent(intent_id).unwrap();
        assert_eq!(intent.status, IntentStatus::Active);
        assert_eq!(intent.legs[&btc].quantity, dec!(0.01));
        assert_eq!(mock.solver.get_intent_ledger().queue_len(), 0);

        let submitted = mock.execution_gateway.get_submitted();
        assert_eq!(submitted.len(), 2);
        assert!(submitted
            .iter()
            .any(|(_, r)| r.symbol == eth && r.quantity == dec!(0.1) && r.price == dec!(3000)));

        let events = mock.events();
        assert!(matches!(
            events.first(),
            Some(SolverEvent::IntentActivated { intent_id: id, .. }) if *id == intent_id
        ));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, SolverEvent::OrderSubmitted { .. }))
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_intents_in_same_tick_share_orders() {
        let mock = get_mock_solver(MockExecutionGateway::new());
        let btc = get_mock_asset_name_1();
        let eth = get_mock_asset_name_2();

        let first = mock
            .solver
            .create_intent(mock.buy(dec!(10), dec!(95)))
            .await
            .unwrap();
        let second = mock
            .solver
            .create_intent(mock.buy(dec!(5), dec!(92)))
            .await
            .unwrap();

        let report = mock.solver.tick().await.unwrap();

        // Queue order is by notional: 5 x 92 goes before 10 x 95
        assert_eq!(report.folded, vec![second, first]);

        let btc_order = mock.solver.get_working_order(&btc, Side::Buy).unwrap();
        let eth_order = mock.solver.get_working_order(&eth, Side::Buy).unwrap();
        assert_eq!(btc_order.agg_quantity, dec!(0.015));
        assert_eq!(eth_order.agg_quantity, dec!(0.15));
        assert_eq!(btc_order.intent_ids(), vec![first, second]);
    }

    #[tokio::test]
    async fn test_ineligible_intents_stay_pending() {
        let mock = get_mock_solver(MockExecutionGateway::new());

        let buy = mock
            .solver
            .create_intent(mock.buy(dec!(10), dec!(89.99)))
            .await
            .unwrap();
        let sell = mock
            .solver
            .create_intent(mock.dto(Side::Sell, dec!(10), dec!(90.01)))
            .await
            .unwrap();
        let sell_eligible = mock
            .solver
            .create_intent(mock.dto(Side::Sell, dec!(1), dec!(90)))
            .await
            .unwrap();

        let report = mock.solver.tick().await.unwrap();
        assert_eq!(report.eligible, vec![sell_eligible]);
        assert_eq!(mock.solver.get_intent(buy).unwrap().status, IntentStatus::Pending);
        assert_eq!(mock.solver.get_intent(sell).unwrap().status, IntentStatus::Pending);

        let btc_sell = mock
            .solver
            .get_working_order(&get_mock_asset_name_1(), Side::Sell)
            .unwrap();
        assert_eq!(btc_sell.agg_quantity, dec!(0.001));
    }

    #[tokio::test]
    async fn test_unknown_index_creates_nothing() {
        let mock = get_mock_solver(MockExecutionGateway::new());
        let mut dto = mock.buy(dec!(10), dec!(95));
        dto.index_id = IndexId::from(404);

        assert_eq!(
            mock.solver.create_intent(dto).await,
            Err(SolverError::IndexNotFound(IndexId::from(404)))
        );
        assert!(mock.solver.get_intent_ledger().is_empty());
    }

    #[tokio::test]
    async fn test_drift_cancels_and_replaces_residual() {
        let mock = get_mock_solver_with_assets(
            MockExecutionGateway::new(),
            &[("BTC", dec!(1), dec!(90))],
        );
        let btc = get_mock_asset_name_1();

        let intent_id = mock
            .solver
            .create_intent(mock.buy(dec!(1), dec!(95)))
            .await
            .unwrap();
        mock.solver.tick().await.unwrap();

        let order = mock.solver.get_working_order(&btc, Side::Buy).unwrap();
        assert_eq!(order.agg_price, Some(dec!(90)));
        let exchange_order_id = order.exchange_order_id.clone().unwrap();
        mock.fill(&exchange_order_id, dec!(0.4), dec!(90));

        // Within threshold nothing happens
        mock.set_price("BTC", dec!(90.08));
        let report = mock.solver.tick().await.unwrap();
        assert!(report.replaced.is_empty());

        mock.set_price("BTC", dec!(90.1));
        mock.events();
        let report = mock.solver.tick().await.unwrap();
        assert_eq!(report.replaced.len(), 1);

        let (old_id, new_id) = report.replaced[0];
        assert_eq!(old_id, order.id);
        assert_eq!(report.submitted, vec![new_id]);
        assert_eq!(mock.execution_gateway.get_cancelled(), vec![exchange_order_id]);

        let old = mock.solver.get_agg_order(old_id).unwrap();
        let new = mock.solver.get_agg_order(new_id).unwrap();
        assert_eq!(old.status, AggOrderStatus::Cancelled);
        assert_eq!(new.status, AggOrderStatus::Active);
        assert_eq!(new.agg_quantity, dec!(0.6));
        assert_eq!(new.agg_price, Some(dec!(90.1)));
        assert_eq!(new.intent_ids(), vec![intent_id]);
        assert_eq!(old.filled_quantity + new.agg_quantity, old.agg_quantity);

        assert!(mock.events().iter().any(|e| matches!(
            e,
            SolverEvent::OrderReplaced { order_id, replacement_id, .. }
                if *order_id == old_id && *replacement_id == new_id
        )));

        // Late fill for the cancelled order is ignored
        mock.solver.handle_execution_report(ExecutionReport::Fill {
            exchange_order_id: old.exchange_order_id.clone().unwrap(),
            symbol: btc.clone(),
            side: Side::Buy,
            price: dec!(90),
            quantity: dec!(0.1),
            timestamp: chrono::Utc::now(),
        });
        assert_eq!(
            mock.solver.get_agg_order(old_id).unwrap().filled_quantity,
            dec!(0.4)
        );

        // Filling the replacement completes the intent
        mock.fill(&new.exchange_order_id.clone().unwrap(), dec!(0.6), dec!(90.1));
        let intent = mock.solver.get_intent(intent_id).unwrap();
        assert_eq!(intent.status, IntentStatus::Fulfilled);
        assert_eq!(intent.filled_amount, dec!(1));
        assert_eq!(intent.filled_price, Some(dec!(90.06)));
    }

    #[tokio::test]
    async fn test_sell_drift_triggers_when_market_falls() {
        let mock = get_mock_solver_with_assets(
            MockExecutionGateway::new(),
            &[("BTC", dec!(1), dec!(90))],
        );

        mock.solver
            .create_intent(mock.dto(Side::Sell, dec!(1), dec!(85)))
            .await
            .unwrap();
        mock.solver.tick().await.unwrap();

        mock.set_price("BTC", dec!(89.92));
        assert!(mock.solver.tick().await.unwrap().replaced.is_empty());

        mock.set_price("BTC", dec!(89.91));
        assert_eq!(mock.solver.tick().await.unwrap().replaced.len(), 1);
    }

    #[tokio::test]
    async fn test_unacknowledged_cancel_leaves_order_untouched() {
        let mock = get_mock_solver(MockExecutionGateway::new());
        let btc = get_mock_asset_name_1();

        mock.solver
            .create_intent(mock.buy(dec!(10), dec!(95)))
            .await
            .unwrap();
        mock.solver.tick().await.unwrap();
        let order = mock.solver.get_working_order(&btc, Side::Buy).unwrap();

        mock.execution_gateway.set_acknowledge_cancels(false);
        mock.set_price("BTC", dec!(61000));

        let report = mock.solver.tick().await.unwrap();
        assert!(report.replaced.is_empty());
        assert!(report.failed_orders.is_empty());

        let unchanged = mock.solver.get_agg_order(order.id).unwrap();
        assert_eq!(unchanged.status, AggOrderStatus::Active);
        assert_eq!(unchanged.agg_price, Some(dec!(60000)));
        assert_eq!(mock.solver.get_agg_orders().len(), 2);

        // Retried on next tick once exchange acknowledges
        mock.execution_gateway.set_acknowledge_cancels(true);
        let report = mock.solver.tick().await.unwrap();
        assert_eq!(report.replaced.len(), 1);
        assert_eq!(report.replaced[0].0, order.id);
    }

    #[tokio::test]
    async fn test_price_failure_aborts_tick() {
        let mock = get_mock_solver(MockExecutionGateway::new());

        let intent_id = mock
            .solver
            .create_intent(mock.buy(dec!(10), dec!(95)))
            .await
            .unwrap();
        mock.market_data.remove_price(&get_mock_asset_name_2());

        assert!(matches!(
            mock.solver.tick().await,
            Err(SolverError::PriceUnavailable(_))
        ));
        assert_eq!(
            mock.solver.get_intent(intent_id).unwrap().status,
            IntentStatus::Pending
        );
        assert_eq!(mock.solver.get_intent_ledger().queue_len(), 1);
        assert!(mock.solver.get_agg_orders().is_empty());
        assert!(mock.execution_gateway.get_submitted().is_empty());
    }

    #[tokio::test]
    async fn test_bucket_failures_are_isolated() {
        let mock = get_mock_solver(MockExecutionGateway::new());
        let btc = get_mock_asset_name_1();
        let eth = get_mock_asset_name_2();
        mock.execution_gateway.reject_symbol(&eth);

        mock.solver
            .create_intent(mock.buy(dec!(10), dec!(95)))
            .await
            .unwrap();
        let report = mock.solver.tick().await.unwrap();

        let btc_order = mock.solver.get_working_order(&btc, Side::Buy).unwrap();
        let eth_order = mock.solver.get_working_order(&eth, Side::Buy).unwrap();
        assert_eq!(report.submitted, vec![btc_order.id]);
        assert_eq!(report.failed_orders, vec![eth_order.id]);
        assert_eq!(btc_order.status, AggOrderStatus::Active);
        assert_eq!(eth_order.status, AggOrderStatus::Pending);

        // Pending order is retried on next tick
        mock.execution_gateway.reject_symbols.write().clear();
        let report = mock.solver.tick().await.unwrap();
        assert_eq!(report.submitted, vec![eth_order.id]);
    }

    #[tokio::test]
    async fn test_active_order_defers_new_intents() {
        let mock = get_mock_solver(MockExecutionGateway::new());
        let btc = get_mock_asset_name_1();

        mock.solver
            .create_intent(mock.buy(dec!(10), dec!(95)))
            .await
            .unwrap();
        mock.solver.tick().await.unwrap();

        let late = mock
            .solver
            .create_intent(mock.buy(dec!(2), dec!(95)))
            .await
            .unwrap();
        let report = mock.solver.tick().await.unwrap();
        assert_eq!(report.deferred, vec![late]);
        assert_eq!(mock.solver.get_intent(late).unwrap().status, IntentStatus::Pending);

        // Once orders are filled, intent is folded into new orders
        for order in mock.solver.get_agg_orders() {
            mock.fill(
                &order.exchange_order_id.clone().unwrap(),
                order.agg_quantity,
                order.agg_price.unwrap(),
            );
        }

        let report = mock.solver.tick().await.unwrap();
        assert_eq!(report.folded, vec![late]);
        let btc_order = mock.solver.get_working_order(&btc, Side::Buy).unwrap();
        assert_eq!(btc_order.agg_quantity, dec!(0.002));
        assert_eq!(btc_order.intent_ids(), vec![late]);
    }

    #[tokio::test]
    async fn test_fills_fulfil_intents_pro_rata() {
        let mock = get_mock_solver(MockExecutionGateway::new());

        let first = mock
            .solver
            .create_intent(mock.buy(dec!(10), dec!(95)))
            .await
            .unwrap();
        let second = mock
            .solver
            .create_intent(mock.buy(dec!(5), dec!(95)))
            .await
            .unwrap();
        mock.solver.tick().await.unwrap();
        mock.events();

        let orders = mock.solver.get_agg_orders();
        let btc_order = orders.iter().find(|o| o.symbol == get_mock_asset_name_1()).unwrap();
        let eth_order = orders.iter().find(|o| o.symbol == get_mock_asset_name_2()).unwrap();
        let btc_exchange_id = btc_order.exchange_order_id.clone().unwrap();
        let eth_exchange_id = eth_order.exchange_order_id.clone().unwrap();

        mock.fill(&btc_exchange_id, dec!(0.015), dec!(60000));
        mock.fill(&eth_exchange_id, dec!(0.075), dec!(3000));

        let intent = mock.solver.get_intent(first).unwrap();
        assert_eq!(intent.status, IntentStatus::Active);
        assert_eq!(intent.legs[&get_mock_asset_name_2()].filled_quantity, dec!(0.05));
        assert_eq!(intent.filled_amount, dec!(5));

        mock.fill(&eth_exchange_id, dec!(0.075), dec!(3000));
        assert_eq!(mock.solver.get_intent(first).unwrap().status, IntentStatus::Fulfilled);
        let second_intent = mock.solver.get_intent(second).unwrap();
        assert_eq!(second_intent.status, IntentStatus::Fulfilled);
        assert_decimal_approx_eq!(
            second_intent.filled_price.unwrap(),
            dec!(90),
            get_mock_tolerance()
        );
        assert_eq!(
            mock.solver.get_agg_order(eth_order.id).unwrap().status,
            AggOrderStatus::Fulfilled
        );

        let events = mock.events();
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, SolverEvent::IntentFulfilled { fill_loss, .. } if fill_loss.is_zero()))
                .count(),
            2
        );
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, SolverEvent::OrderFulfilled { .. }))
                .count(),
            2
        );

        // Fill for order we never sent is ignored
        mock.solver.handle_execution_report(ExecutionReport::Fill {
            exchange_order_id: ExchangeOrderId::from("E-999"),
            symbol: get_mock_asset_name_1(),
            side: Side::Buy,
            price: dec!(60000),
            quantity: dec!(1),
            timestamp: chrono::Utc::now(),
        });
        assert!(mock.events().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_intent_is_detached_from_pending_order() {
        let mock = get_mock_solver(MockExecutionGateway::new());
        let eth = get_mock_asset_name_2();

        // No liquidity for ETH keeps its order pending
        mock.order_pricer.remove_base_price(&eth);

        let first = mock
            .solver
            .create_intent(mock.buy(dec!(10), dec!(95)))
            .await
            .unwrap();
        let second = mock
            .solver
            .create_intent(mock.buy(dec!(5), dec!(95)))
            .await
            .unwrap();
        let report = mock.solver.tick().await.unwrap();
        assert_eq!(report.failed_orders.len(), 1);

        let eth_order = mock.solver.get_working_order(&eth, Side::Buy).unwrap();
        assert_eq!(eth_order.agg_quantity, dec!(0.15));

        mock.solver.cancel_intent(second).unwrap();
        let report = mock.solver.tick().await.unwrap();
        assert_eq!(report.detached, vec![second]);

        let eth_order = mock.solver.get_agg_order(eth_order.id).unwrap();
        assert_eq!(eth_order.agg_quantity, dec!(0.1));
        assert_eq!(eth_order.intent_ids(), vec![first]);

        mock.solver.cancel_intent(first).unwrap();
        mock.solver.tick().await.unwrap();
        assert_eq!(
            mock.solver.get_agg_order(eth_order.id).unwrap().status,
            AggOrderStatus::Cancelled
        );
        assert!(mock.solver.get_working_order(&eth, Side::Buy).is_none());
    }

    #[tokio::test]
    async fn test_cancel_agg_order() {
        let mock = get_mock_solver(MockExecutionGateway::new());
        let btc = get_mock_asset_name_1();

        mock.solver
            .create_intent(mock.buy(dec!(10), dec!(95)))
            .await
            .unwrap();
        mock.solver.tick().await.unwrap();
        let order = mock.solver.get_working_order(&btc, Side::Buy).unwrap();

        mock.execution_gateway.set_acknowledge_cancels(false);
        assert!(matches!(
            mock.solver.cancel_agg_order(order.id).await,
            Err(SolverError::ExecutionGatewayError(_))
        ));
        assert_eq!(
            mock.solver.get_agg_order(order.id).unwrap().status,
            AggOrderStatus::Active
        );

        mock.execution_gateway.set_acknowledge_cancels(true);
        mock.solver.cancel_agg_order(order.id).await.unwrap();
        assert_eq!(
            mock.solver.get_agg_order(order.id).unwrap().status,
            AggOrderStatus::Cancelled
        );
        assert!(mock.solver.get_working_order(&btc, Side::Buy).is_none());

        assert!(matches!(
            mock.solver.cancel_agg_order(order.id).await,
            Err(SolverError::InvalidState(_))
        ));
        assert!(matches!(
            mock.solver.cancel_agg_order(crate::solver::agg_order::AggOrderId::from(99)).await,
            Err(SolverError::AggOrderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fold_order_does_not_change_quantities() {
        let amounts = [dec!(3.33333333), dec!(1.23456789), dec!(7.77777777), dec!(0.5)];

        let mut quantities = Vec::new();
        for permutation in [[0, 1, 2, 3], [3, 2, 1, 0], [1, 3, 0, 2]] {
            let mock = get_mock_solver(MockExecutionGateway::new());
            for i in permutation {
                mock.solver
                    .create_intent(mock.buy(amounts[i], dec!(100)))
                    .await
                    .unwrap();
            }
            mock.solver.tick().await.unwrap();

            let btc_order = mock
                .solver
                .get_working_order(&get_mock_asset_name_1(), Side::Buy)
                .unwrap();
            quantities.push(btc_order.agg_quantity);
        }

        // Σ round8(amount × 0.001)
        let expected = dec!(0.00333333) + dec!(0.00123457) + dec!(0.00777778) + dec!(0.0005);
        assert!(quantities.iter().all(|q| *q == expected));
    }

    #[tokio::test]
    async fn test_concurrent_submissions_during_tick() {
        let mock = get_mock_solver(MockExecutionGateway::new_with_latency(
            Duration::from_millis(5),
        ));

        mock.solver
            .create_intent(mock.buy(dec!(10), dec!(95)))
            .await
            .unwrap();

        let submissions = async {
            let mut intent_ids = Vec::new();
            for i in 0..20 {
                let user_id = if i % 2 == 0 {
                    get_mock_user_1()
                } else {
                    get_mock_user_2()
                };
                let dto = CreateIntentDto {
                    user_id,
                    ..mock.buy(Amount::from(i + 1), dec!(80))
                };
                intent_ids.push(mock.solver.create_intent(dto).await.unwrap());
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            intent_ids
        };

        let (report, intent_ids) = tokio::join!(mock.solver.tick(), submissions);
        assert_eq!(report.unwrap().submitted.len(), 2);

        let ledger = mock.solver.get_intent_ledger();
        assert_eq!(ledger.len(), 21);
        assert_eq!(ledger.queue_len(), 20);
        for intent_id in intent_ids {
            assert_eq!(
                mock.solver.get_intent(intent_id).unwrap().status,
                IntentStatus::Pending
            );
        }
    }

    #[tokio::test]
    async fn test_overlapping_tick_is_skipped() {
        let mock = get_mock_solver(MockExecutionGateway::new_with_latency(
            Duration::from_millis(10),
        ));

        mock.solver
            .create_intent(mock.buy(dec!(10), dec!(95)))
            .await
            .unwrap();

        let (first, second) = tokio::join!(mock.solver.tick(), mock.solver.tick());
        let first = first.unwrap();
        let second = second.unwrap();

        assert!(first.skipped != second.skipped);
        assert_eq!(mock.execution_gateway.get_submitted().len(), 2);
    }

    #[test_case(dec!(0.000001), false ; "rounds to zero")]
    #[test_case(dec!(0.000004), false ; "rounds down to zero")]
    #[test_case(dec!(0.000005), false ; "midpoint rounds to even zero")]
    #[test_case(dec!(0.000006), true ; "rounds up to minimum")]
    #[tokio::test]
    async fn test_minimum_leg_quantity(amount: Amount, accepted: bool) {
        let mock = get_mock_solver(MockExecutionGateway::new());

        let result = mock.solver.create_intent(mock.buy(amount, dec!(95))).await;
        assert_eq!(result.is_ok(), accepted);
        if !accepted {
            assert!(matches!(result, Err(SolverError::ValidationError(_))));
            assert_eq!(mock.solver.get_intent_ledger().len(), 0);
        }
    }

    #[tokio::test]
    async fn test_tiny_intent_does_not_block_slot() {
        let mock = get_mock_solver(MockExecutionGateway::new());
        let btc = get_mock_asset_name_1();

        assert!(matches!(
            mock.solver
                .create_intent(mock.buy(dec!(0.000001), dec!(95)))
                .await,
            Err(SolverError::ValidationError(_))
        ));

        // Ledger alone does not know the quantity scale
        let tiny_id = mock
            .solver
            .get_intent_ledger()
            .submit(mock.buy(dec!(0.000001), dec!(95)), mock.solver.get_index_manager())
            .await
            .unwrap();

        let intent_id = mock
            .solver
            .create_intent(mock.buy(dec!(10), dec!(95)))
            .await
            .unwrap();
        let report = mock.solver.tick().await.unwrap();
        assert_eq!(report.folded, vec![intent_id]);
        assert_eq!(
            mock.solver.get_intent(tiny_id).unwrap().status,
            IntentStatus::Pending
        );

        let btc_order = mock.solver.get_working_order(&btc, Side::Buy).unwrap();
        assert_eq!(btc_order.agg_quantity, dec!(0.01));
        assert_eq!(btc_order.status, AggOrderStatus::Active);
        assert!(mock
            .execution_gateway
            .get_submitted()
            .iter()
            .all(|(_, request)| Amount::ZERO < request.quantity));
    }

    #[tokio::test]
    async fn test_cancel_agg_order_waits_for_tick() {
        let mock = get_mock_solver(MockExecutionGateway::new_with_latency(
            Duration::from_millis(20),
        ));
        let btc = get_mock_asset_name_1();

        // First submission fails, leaving order pending
        mock.execution_gateway.reject_symbol(&btc);
        mock.solver
            .create_intent(mock.buy(dec!(10), dec!(95)))
            .await
            .unwrap();
        mock.solver.tick().await.unwrap();

        let btc_order = mock.solver.get_working_order(&btc, Side::Buy).unwrap();
        assert_eq!(btc_order.status, AggOrderStatus::Pending);
        mock.execution_gateway.reject_symbols.write().clear();

        let (report, cancelled) = tokio::join!(
            mock.solver.tick(),
            mock.solver.cancel_agg_order(btc_order.id)
        );
        assert_eq!(report.unwrap().submitted, vec![btc_order.id]);
        cancelled.unwrap();

        // Order reached exchange before cancel, so exchange cancel was sent
        let order = mock.solver.get_agg_order(btc_order.id).unwrap();
        assert_eq!(order.status, AggOrderStatus::Cancelled);
        let exchange_order_id = order.exchange_order_id.unwrap();
        assert_eq!(mock.execution_gateway.get_cancelled(), vec![exchange_order_id]);
    }
}
