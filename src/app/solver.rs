use std::{sync::Arc, time::Duration};

use crossbeam::channel::{unbounded, Receiver};
use derive_builder::Builder;
use eyre::{OptionExt, Result};
use parking_lot::RwLock;
use rust_decimal::dec;
use symm_core::{
    core::{
        async_loop::AsyncLoop,
        bits::Amount,
        decimal_ext::AMOUNT_SCALE,
        functional::IntoObservableSingle,
    },
    market_data::{market_data_gateway::MarketDataGateway, order_book::book_pricer::OrderPricer},
    order_sender::execution_gateway::{ExecutionGateway, ExecutionReport},
};
use tokio::{
    select,
    sync::{mpsc::UnboundedReceiver, oneshot},
    time::{interval, MissedTickBehavior},
};

use super::config::ConfigBuildError;
use crate::{
    index::index_manager::IndexManager,
    solver::{
        intent_ledger::IntentLedger,
        solver::{OrderIdProvider, Solver, SolverEvent},
    },
};

#[derive(Builder)]
#[builder(
    pattern = "owned",
    build_fn(name = "try_build", error = "ConfigBuildError")
)]
pub struct SolverConfig {
    #[builder(setter(into))]
    pub with_market_data: Arc<dyn MarketDataGateway>,

    #[builder(setter(into))]
    pub with_order_pricer: Arc<dyn OrderPricer>,

    #[builder(setter(into))]
    pub with_execution_gateway: Arc<dyn ExecutionGateway>,

    #[builder(setter(into))]
    pub with_order_ids: Arc<RwLock<dyn OrderIdProvider + Send + Sync>>,

    #[builder(setter(into, strip_option), default)]
    pub drift_threshold: Option<Amount>,

    #[builder(setter(into, strip_option), default)]
    pub quantity_scale: Option<u32>,

    #[builder(setter(into, strip_option), default)]
    pub price_scale: Option<u32>,

    #[builder(setter(skip))]
    solver: Option<Arc<Solver>>,

    #[builder(setter(skip))]
    solver_events: Option<Receiver<SolverEvent>>,
}

impl SolverConfig {
    #[must_use]
    pub fn builder() -> SolverConfigBuilder {
        SolverConfigBuilder::default()
    }

    pub fn try_get_solver_cloned(&self) -> Result<Arc<Solver>> {
        self.solver.clone().ok_or_eyre("Failed to get solver")
    }

    /// Receiver of solver events, can be taken only once
    pub fn take_solver_events(&mut self) -> Result<Receiver<SolverEvent>> {
        self.solver_events
            .take()
            .ok_or_eyre("Solver events already taken")
    }
}

impl SolverConfigBuilder {
    pub fn build(self) -> Result<SolverConfig, ConfigBuildError> {
        let mut config = self.try_build()?;

        let index_manager = Arc::new(IndexManager::new(config.with_market_data.clone()));

        let mut solver = Solver::new(
            index_manager,
            Arc::new(IntentLedger::new()),
            config.with_market_data.clone(),
            config.with_order_pricer.clone(),
            config.with_execution_gateway.clone(),
            config.with_order_ids.clone(),
            config.drift_threshold.unwrap_or(dec!(0.001)),
            config.quantity_scale.unwrap_or(AMOUNT_SCALE),
            config.price_scale.unwrap_or(AMOUNT_SCALE),
        );

        let (event_tx, event_rx) = unbounded();
        solver.get_single_observer_mut().set_observer_from(event_tx);

        config.solver.replace(Arc::new(solver));
        config.solver_events.replace(event_rx);

        Ok(config)
    }
}

/// Drives the solver: ticks on interval, and applies execution reports
/// between ticks
pub struct SolverLoop {
    solver: Arc<Solver>,
    tick_interval: Duration,
    solver_loop: AsyncLoop<UnboundedReceiver<ExecutionReport>>,
    finished: Option<oneshot::Receiver<()>>,
}

impl SolverLoop {
    pub fn new(solver: Arc<Solver>, tick_interval: Duration) -> Self {
        Self {
            solver,
            tick_interval,
            solver_loop: AsyncLoop::new(),
            finished: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.solver_loop.is_running()
    }

    /// Start the loop, optionally finishing on its own after `max_ticks`
    pub fn start(
        &mut self,
        mut execution_reports: UnboundedReceiver<ExecutionReport>,
        max_ticks: Option<u64>,
    ) {
        let solver = self.solver.clone();
        let tick_interval = self.tick_interval;
        let (finished_tx, finished_rx) = oneshot::channel();
        self.finished.replace(finished_rx);

        self.solver_loop.start(move |cancel_token| async move {
            tracing::info!(?tick_interval, ?max_ticks, "Solver loop started");

            let mut tick_timer = interval(tick_interval);
            tick_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut ticks_done = 0u64;

            loop {
                select! {
                    _ = cancel_token.cancelled() => {
                        break;
                    },
                    _ = tick_timer.tick() => {
                        if let Err(err) = solver.tick().await {
                            tracing::warn!("Tick aborted: {}", err);
                        }
                        ticks_done += 1;
                        if max_ticks.is_some_and(|max_ticks| max_ticks <= ticks_done) {
                            break;
                        }
                    },
                    Some(report) = execution_reports.recv() => {
                        solver.handle_execution_report(report);
                    }
                }
            }

            // Reports for orders sent by the last tick
            while let Ok(report) = execution_reports.try_recv() {
                solver.handle_execution_report(report);
            }

            if finished_tx.send(()).is_err() {
                tracing::debug!("Nobody waiting for solver loop");
            }

            tracing::info!(ticks_done, "Solver loop exited");
            execution_reports
        });
    }

    /// Wait until loop finished on its own, or forever if it never will
    pub async fn wait_finished(&mut self) {
        match self.finished.take() {
            Some(finished) => {
                if finished.await.is_err() {
                    tracing::debug!("Solver loop dropped without finishing");
                }
            }
            None => std::future::pending::<()>().await,
        }
    }

    pub async fn stop(&mut self) -> Result<UnboundedReceiver<ExecutionReport>> {
        self.solver_loop.stop().await
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use parking_lot::RwLock;
    use rust_decimal::dec;
    use symm_core::{
        core::{
            bits::Side,
            functional::IntoObservableSingle,
            test_util::{get_mock_asset_name_1, get_mock_asset_name_2, get_mock_user_1},
        },
        market_data::{
            market_data_gateway::{MarketDataGateway, StaticMarketData},
            order_book::book_pricer::{test_util::MockOrderPricer, OrderPricer},
        },
        order_sender::execution_gateway::{test_util::MockExecutionGateway, ExecutionGateway},
    };
    use tokio::sync::mpsc::unbounded_channel;

    use crate::{
        app::{order_ids::TimestampOrderIds, simple_sender::SimpleSender},
        index::index_definition::IndexAsset,
        solver::{
            intent::{CreateIntentDto, IntentStatus},
            solver::{OrderIdProvider, SolverEvent},
        },
    };

    use super::{SolverConfig, SolverLoop};

    fn get_order_ids() -> Arc<RwLock<dyn OrderIdProvider + Send + Sync>> {
        Arc::new(RwLock::new(TimestampOrderIds::new()))
    }

    fn get_mock_market() -> (Arc<StaticMarketData>, Arc<MockOrderPricer>) {
        let market_data = Arc::new(StaticMarketData::new());
        let order_pricer = Arc::new(MockOrderPricer::new(dec!(0)));
        for (symbol, price) in [
            (get_mock_asset_name_1(), dec!(60000)),
            (get_mock_asset_name_2(), dec!(3000)),
        ] {
            market_data.set_price(&symbol, price);
            order_pricer.set_base_price(&symbol, price);
        }
        (market_data, order_pricer)
    }

    #[tokio::test]
    async fn test_solver_config() {
        let (market_data, order_pricer) = get_mock_market();

        let mut config = SolverConfig::builder()
            .with_market_data(market_data as Arc<dyn MarketDataGateway>)
            .with_order_pricer(order_pricer as Arc<dyn OrderPricer>)
            .with_execution_gateway(Arc::new(MockExecutionGateway::new()) as Arc<dyn ExecutionGateway>)
            .with_order_ids(get_order_ids())
            .build()
            .unwrap();

        let solver = config.try_get_solver_cloned().unwrap();
        let events = config.take_solver_events().unwrap();
        assert!(config.take_solver_events().is_err());

        let index_id = solver
            .get_index_manager()
            .create_index([
                IndexAsset::new(get_mock_asset_name_1(), dec!(0.001)),
                IndexAsset::new(get_mock_asset_name_2(), dec!(0.01)),
            ])
            .unwrap();

        solver
            .create_intent(CreateIntentDto {
                index_id,
                user_id: get_mock_user_1(),
                side: Side::Buy,
                amount: dec!(10),
                limit_price: dec!(95),
            })
            .await
            .unwrap();

        solver.tick().await.unwrap();
        assert!(events
            .try_iter()
            .any(|event| matches!(event, SolverEvent::OrderSubmitted { .. })));
    }

    #[tokio::test]
    async fn test_solver_loop_fulfils_intent() {
        let (market_data, order_pricer) = get_mock_market();

        let (report_tx, report_rx) = unbounded_channel();
        let mut sender = SimpleSender::new(dec!(1), None);
        sender.get_single_observer_mut().set_observer_from(report_tx);

        let config = SolverConfig::builder()
            .with_market_data(market_data as Arc<dyn MarketDataGateway>)
            .with_order_pricer(order_pricer as Arc<dyn OrderPricer>)
            .with_execution_gateway(Arc::new(sender) as Arc<dyn ExecutionGateway>)
            .with_order_ids(get_order_ids())
            .drift_threshold(dec!(0.002))
            .build()
            .unwrap();
        let solver = config.try_get_solver_cloned().unwrap();

        let index_id = solver
            .get_index_manager()
            .create_index([
                IndexAsset::new(get_mock_asset_name_1(), dec!(0.001)),
                IndexAsset::new(get_mock_asset_name_2(), dec!(0.01)),
            ])
            .unwrap();

        let intent_id = solver
            .create_intent(CreateIntentDto {
                index_id,
                user_id: get_mock_user_1(),
                side: Side::Buy,
                amount: dec!(10),
                limit_price: dec!(95),
            })
            .await
            .unwrap();

        let mut solver_loop = SolverLoop::new(solver.clone(), Duration::from_millis(5));
        solver_loop.start(report_rx, Some(2));
        assert!(solver_loop.is_running());

        tokio::time::timeout(Duration::from_secs(5), solver_loop.wait_finished())
            .await
            .unwrap();
        solver_loop.stop().await.unwrap();

        let intent = solver.get_intent(intent_id).unwrap();
        assert_eq!(intent.status, IntentStatus::Fulfilled);
        assert_eq!(intent.filled_price, Some(dec!(90)));
    }

    #[tokio::test]
    async fn test_solver_loop_stops_on_cancel() {
        let (market_data, order_pricer) = get_mock_market();

        let config = SolverConfig::builder()
            .with_market_data(market_data as Arc<dyn MarketDataGateway>)
            .with_order_pricer(order_pricer as Arc<dyn OrderPricer>)
            .with_execution_gateway(Arc::new(MockExecutionGateway::new()) as Arc<dyn ExecutionGateway>)
            .with_order_ids(get_order_ids())
            .build()
            .unwrap();

        let (_report_tx, report_rx) = unbounded_channel();
        let mut solver_loop =
            SolverLoop::new(config.try_get_solver_cloned().unwrap(), Duration::from_secs(60));
        solver_loop.start(report_rx, None);

        tokio::time::sleep(Duration::from_millis(10)).await;
        solver_loop.stop().await.unwrap();
        assert!(!solver_loop.is_running());

        // Cancelled loop still reports finished
        tokio::time::timeout(Duration::from_secs(1), solver_loop.wait_finished())
            .await
            .unwrap();
    }
}
