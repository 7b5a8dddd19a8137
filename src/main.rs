use std::{sync::Arc, thread, time::Duration};

use clap::Parser;
use crossbeam::{channel::unbounded, select};
use eyre::Result;
use futures_util::future::join_all;
use index_solver::{
    app::{
        config_loader::ConfigLoader, market_data::MarketDataConfig, order_ids::OrderIdConfig,
        simple_sender::SimpleSender,
        solver::{SolverConfig, SolverLoop},
    },
    cli::{Cli, Commands},
    index::index_definition::IndexAsset,
    solver::intent::CreateIntentDto,
};
use symm_core::{
    core::{functional::IntoObservableSingle, logging::log_init},
    market_data::{market_data_gateway::MarketDataGateway, order_book::book_pricer::OrderPricer},
    order_sender::execution_gateway::ExecutionGateway,
};
use tokio::sync::{mpsc::unbounded_channel, oneshot};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::new(&cli).load_config()?;

    log_init(
        config.logging.level.clone(),
        config.logging.file_path.clone(),
        !config.logging.disable_terminal,
    );

    let market_data_config = MarketDataConfig::builder()
        .prices(config.simulation.prices.clone())
        .book_levels(config.simulation.book_levels)
        .level_quantity(config.simulation.level_quantity)
        .level_step(config.simulation.level_step)
        .build()?;

    let (report_tx, report_rx) = unbounded_channel();
    let latency =
        (0 < config.simulation.latency_ms).then(|| Duration::from_millis(config.simulation.latency_ms));
    let mut sender = SimpleSender::new(config.simulation.fill_ratio, latency);
    sender.get_single_observer_mut().set_observer_from(report_tx);

    let order_id_config = OrderIdConfig::builder().build()?;

    let mut solver_config = SolverConfig::builder()
        .with_market_data(
            market_data_config.try_get_market_data_cloned()? as Arc<dyn MarketDataGateway>
        )
        .with_order_pricer(market_data_config.try_get_order_pricer_cloned()? as Arc<dyn OrderPricer>)
        .with_execution_gateway(Arc::new(sender) as Arc<dyn ExecutionGateway>)
        .with_order_ids(order_id_config.expect_order_id_provider_cloned()?)
        .drift_threshold(config.solver.drift_threshold)
        .quantity_scale(config.solver.quantity_scale)
        .price_scale(config.solver.price_scale)
        .build()?;

    let solver = solver_config.try_get_solver_cloned()?;
    let solver_events = solver_config.take_solver_events()?;

    let index_id = solver.get_index_manager().create_index(
        config
            .index
            .assets
            .iter()
            .map(|asset| IndexAsset::new(asset.symbol.clone(), asset.coefficient)),
    )?;
    let index_definition = solver.get_index_manager().get_index_data(index_id)?;

    match cli.command {
        Commands::Price {} => {
            let price = solver.get_index_price(index_id).await?;
            println!("{} = {}", index_definition, price);
        }
        Commands::Run { ticks } => {
            tracing::info!(%index_definition, "Index created");

            let (stop_tx, stop_rx) = unbounded::<()>();
            let (stopped_tx, stopped_rx) = oneshot::channel();

            thread::spawn(move || {
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(solver_events) -> res => match res {
                            Ok(event) => tracing::info!(?event, "Solver event"),
                            Err(_) => break,
                        },
                    }
                }
                if stopped_tx.send(()).is_err() {
                    tracing::warn!("Failed to notify event logger stopped");
                }
            });

            let submitted = join_all(config.demo_intents.iter().map(|intent| {
                solver.create_intent(CreateIntentDto {
                    index_id,
                    user_id: intent.user_id.clone(),
                    side: intent.side,
                    amount: intent.amount,
                    limit_price: intent.limit_price,
                })
            }))
            .await;

            let intent_ids = submitted
                .into_iter()
                .filter_map(|result| match result {
                    Ok(intent_id) => Some(intent_id),
                    Err(err) => {
                        tracing::warn!("Failed to submit demo intent: {}", err);
                        None
                    }
                })
                .collect::<Vec<_>>();

            let mut solver_loop = SolverLoop::new(solver.clone(), config.solver.tick_interval());
            solver_loop.start(report_rx, ticks);

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl-C received, stopping");
                }
                _ = solver_loop.wait_finished() => {}
            }

            solver_loop.stop().await?;

            for intent_id in intent_ids {
                let intent = solver.get_intent(intent_id)?;
                tracing::info!(
                    %intent_id,
                    status = ?intent.status,
                    filled_amount = %intent.filled_amount,
                    filled_price = ?intent.filled_price,
                    fill_loss = %intent.fill_loss,
                    "Intent summary"
                );
            }

            if stop_tx.send(()).is_err() {
                tracing::warn!("Event logger already stopped");
            }
            if stopped_rx.await.is_err() {
                tracing::warn!("Event logger exited unexpectedly");
            }
        }
    }

    Ok(())
}
