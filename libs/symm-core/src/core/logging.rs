use std::sync::{Once, OnceLock};

use tracing_appender::rolling::{self, Builder};
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, Layer as _};

static INIT_LOG: Once = Once::new();
static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Install global tracing subscriber.
///
/// When `log_path` is given, logs are also written to a daily rolling file in
/// that directory. Terminal output can be switched off for headless runs.
pub fn log_init(filter: String, log_path: Option<String>, terminal: bool) {
    INIT_LOG.call_once(|| {
        let file_layer = log_path.as_deref().and_then(|log_directory| {
            let file_appender = match Builder::new()
                .rotation(rolling::Rotation::DAILY)
                .filename_prefix("index-solver")
                .filename_suffix("log")
                .build(log_directory)
            {
                Ok(appender) => appender,
                Err(err) => {
                    eprintln!("Failed to build rolling file appender: {:?}", err);
                    return None;
                }
            };
            let (non_blocking_file_writer, guard) = tracing_appender::non_blocking(file_appender);

            // Guard must live for the program lifetime or buffered lines are lost
            if LOG_GUARD.set(guard).is_err() {
                eprintln!("Log guard already set");
            }

            Some(
                Layer::new()
                    .with_writer(non_blocking_file_writer)
                    .with_ansi(false),
            )
        });

        let terminal_layer = Layer::new()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_filter(tracing_subscriber::filter::filter_fn(move |_| terminal));

        // RUST_LOG takes precedence over configured filter
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| filter.into());

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(terminal_layer)
            .init();
    });
}

/// Default initialize tracing log.
///
/// Must also import [`symm_core::core::logging::log_init`] function.
///
/// ## Using
/// ```rust
/// use symm_core::{core::logging::log_init, init_log};
///
/// init_log!();
/// tracing::info!("New intent from: {}", "Bob");
/// tracing::warn!("Cannot find intent: {}", "I-42");
/// ```
///
/// # Configuring
/// Standard `RUST_LOG` environment variable can be used to configure, e.g.:
///
/// ```bash
/// export RUST_LOG="index_solver=debug"
/// ```
#[macro_export]
macro_rules! init_log {
    () => {
        log_init(format!("{}=info", env!("CARGO_CRATE_NAME")), None, true);
    };
    ($log_path:expr) => {
        log_init(format!("{}=info", env!("CARGO_CRATE_NAME")), $log_path, true);
    };
}
