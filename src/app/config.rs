//! # Configuration Module
//!
//! JSON configuration of the solver application. Every field has a default,
//! so a configuration file only needs to name what it changes.
//!
//! ## Example
//!
//! ```json
//! {
//!   "solver": { "tick_interval_ms": 1000, "drift_threshold": "0.001" },
//!   "index": {
//!     "assets": [
//!       { "symbol": "BTC", "coefficient": "0.001" },
//!       { "symbol": "ETH", "coefficient": "0.01" }
//!     ]
//!   },
//!   "simulation": { "prices": { "BTC": "60000", "ETH": "3000" } },
//!   "demo_intents": [
//!     { "user_id": "alice", "side": "buy", "amount": "10", "limit_price": "95" }
//!   ]
//! }
//! ```

use std::{collections::HashMap, time::Duration};

use derive_builder::UninitializedFieldError;
use eyre::Report;
use itertools::Itertools;
use rust_decimal::dec;
use serde::{Deserialize, Serialize};
use symm_core::core::bits::{Amount, Side, Symbol, UserId};
use thiserror::Error;

use crate::cli::Cli;

/// Configuration build errors
#[derive(Debug, Error)]
pub enum ConfigBuildError {
    /// A required configuration field is missing or uninitialized
    #[error("Configuration missing or invalid `{0}`")]
    UninitializedField(&'static str),
    /// General configuration error with context
    #[error("Configuration error `{0}`")]
    Other(String),
    /// File system or parsing error when loading configuration files
    #[error("Configuration file error: {0}")]
    FileError(String),
    /// Configuration validation error with specific validation failure details
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
    /// Environment variable parsing or access error
    #[error("Environment variable error: {0}")]
    EnvError(String),
}

impl From<UninitializedFieldError> for ConfigBuildError {
    fn from(err: UninitializedFieldError) -> Self {
        ConfigBuildError::UninitializedField(err.field_name())
    }
}

impl From<Report> for ConfigBuildError {
    fn from(report: Report) -> Self {
        ConfigBuildError::Other(format!("{:?}", report))
    }
}

impl From<std::io::Error> for ConfigBuildError {
    fn from(err: std::io::Error) -> Self {
        ConfigBuildError::FileError(format!("IO error: {:?}", err))
    }
}

impl From<serde_json::Error> for ConfigBuildError {
    fn from(err: serde_json::Error) -> Self {
        ConfigBuildError::FileError(format!("JSON parsing error: {}", err))
    }
}

/// Root of the application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default)]
    pub solver: SolverSettings,

    /// Index served by the application
    #[serde(default)]
    pub index: IndexSettings,

    /// Simulated market and exchange
    #[serde(default)]
    pub simulation: SimulationSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    /// Intents submitted once on start
    #[serde(default)]
    pub demo_intents: Vec<DemoIntentSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Solver tick interval in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Relative price move that triggers cancel and replace
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: Amount,

    /// Decimal places of order quantities
    #[serde(default = "default_scale")]
    pub quantity_scale: u32,

    /// Decimal places of order prices
    #[serde(default = "default_scale")]
    pub price_scale: u32,
}

impl SolverSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexAssetSettings {
    pub symbol: Symbol,
    pub coefficient: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    #[serde(default = "default_index_assets")]
    pub assets: Vec<IndexAssetSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Market price of each asset
    #[serde(default = "default_prices")]
    pub prices: HashMap<Symbol, Amount>,

    /// Number of levels on each side of synthesized book
    #[serde(default = "default_book_levels")]
    pub book_levels: usize,

    /// Quantity available at every level
    #[serde(default = "default_level_quantity")]
    pub level_quantity: Amount,

    /// Relative price distance between levels
    #[serde(default = "default_level_step")]
    pub level_step: Amount,

    /// Portion of each order filled right after it is acknowledged
    #[serde(default = "default_fill_ratio")]
    pub fill_ratio: Amount,

    /// Simulated round-trip to exchange in milliseconds
    #[serde(default)]
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file path (optional)
    pub file_path: Option<String>,
    /// Disable terminal logging
    #[serde(default)]
    pub disable_terminal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoIntentSettings {
    pub user_id: UserId,
    pub side: Side,
    pub amount: Amount,
    pub limit_price: Amount,
}

fn default_tick_interval_ms() -> u64 {
    10_000
}

fn default_drift_threshold() -> Amount {
    dec!(0.001)
}

fn default_scale() -> u32 {
    8
}

fn default_index_assets() -> Vec<IndexAssetSettings> {
    vec![
        IndexAssetSettings {
            symbol: Symbol::from("BTC"),
            coefficient: dec!(0.001),
        },
        IndexAssetSettings {
            symbol: Symbol::from("ETH"),
            coefficient: dec!(0.01),
        },
    ]
}

fn default_prices() -> HashMap<Symbol, Amount> {
    HashMap::from([
        (Symbol::from("BTC"), dec!(60000)),
        (Symbol::from("ETH"), dec!(3000)),
    ])
}

fn default_book_levels() -> usize {
    5
}

fn default_level_quantity() -> Amount {
    dec!(1)
}

fn default_level_step() -> Amount {
    dec!(0.0005)
}

fn default_fill_ratio() -> Amount {
    dec!(1)
}

fn default_log_level() -> String {
    String::from("info")
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            drift_threshold: default_drift_threshold(),
            quantity_scale: default_scale(),
            price_scale: default_scale(),
        }
    }
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            assets: default_index_assets(),
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            prices: default_prices(),
            book_levels: default_book_levels(),
            level_quantity: default_level_quantity(),
            level_step: default_level_step(),
            fill_ratio: default_fill_ratio(),
            latency_ms: 0,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_path: None,
            disable_terminal: false,
        }
    }
}

impl ApplicationConfig {
    /// Apply CLI overrides to configuration
    pub fn apply_cli_overrides(&mut self, cli: &CliOverrides) {
        if let Some(log_path) = &cli.log_path {
            self.logging.file_path = Some(log_path.clone());
        }
        if let Some(term_log_off) = cli.term_log_off {
            self.logging.disable_terminal = term_log_off;
        }
        if let Some(tick_interval_ms) = cli.tick_interval_ms {
            self.solver.tick_interval_ms = tick_interval_ms;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigBuildError> {
        self.validate_solver_settings()?;
        self.validate_index_settings()?;
        self.validate_simulation_settings()?;
        self.validate_logging_settings()?;

        for intent in &self.demo_intents {
            if intent.amount <= Amount::ZERO || intent.limit_price <= Amount::ZERO {
                return Err(ConfigBuildError::ValidationError(format!(
                    "demo intent of {} must have positive amount and limit price",
                    intent.user_id
                )));
            }
        }

        Ok(())
    }

    fn validate_solver_settings(&self) -> Result<(), ConfigBuildError> {
        let solver = &self.solver;

        if solver.tick_interval_ms == 0 {
            return Err(ConfigBuildError::ValidationError(String::from(
                "solver.tick_interval_ms must be positive",
            )));
        }

        if solver.drift_threshold <= Amount::ZERO || Amount::ONE <= solver.drift_threshold {
            return Err(ConfigBuildError::ValidationError(format!(
                "solver.drift_threshold must be between 0 and 1, got {}",
                solver.drift_threshold
            )));
        }

        if 28 < solver.quantity_scale || 28 < solver.price_scale {
            return Err(ConfigBuildError::ValidationError(String::from(
                "solver scales must not exceed 28",
            )));
        }

        Ok(())
    }

    fn validate_index_settings(&self) -> Result<(), ConfigBuildError> {
        if self.index.assets.is_empty() {
            return Err(ConfigBuildError::ValidationError(String::from(
                "index.assets cannot be empty",
            )));
        }

        if let Some(asset) = self
            .index
            .assets
            .iter()
            .find(|asset| asset.coefficient <= Amount::ZERO)
        {
            return Err(ConfigBuildError::ValidationError(format!(
                "index asset {} must have positive coefficient",
                asset.symbol
            )));
        }

        let unpriced = self
            .index
            .assets
            .iter()
            .filter(|asset| !self.simulation.prices.contains_key(&asset.symbol))
            .map(|asset| &asset.symbol)
            .join(", ");

        if !unpriced.is_empty() {
            return Err(ConfigBuildError::ValidationError(format!(
                "simulation.prices missing for: {}",
                unpriced
            )));
        }

        Ok(())
    }

    fn validate_simulation_settings(&self) -> Result<(), ConfigBuildError> {
        let simulation = &self.simulation;

        if let Some((symbol, _)) = simulation
            .prices
            .iter()
            .find(|(_, price)| **price <= Amount::ZERO)
        {
            return Err(ConfigBuildError::ValidationError(format!(
                "simulation price of {} must be positive",
                symbol
            )));
        }

        if simulation.book_levels == 0 {
            return Err(ConfigBuildError::ValidationError(String::from(
                "simulation.book_levels must be greater than 0",
            )));
        }

        if simulation.level_quantity <= Amount::ZERO {
            return Err(ConfigBuildError::ValidationError(String::from(
                "simulation.level_quantity must be positive",
            )));
        }

        if simulation.level_step <= Amount::ZERO || Amount::ONE <= simulation.level_step {
            return Err(ConfigBuildError::ValidationError(String::from(
                "simulation.level_step must be between 0 and 1",
            )));
        }

        if simulation.fill_ratio < Amount::ZERO || Amount::ONE < simulation.fill_ratio {
            return Err(ConfigBuildError::ValidationError(String::from(
                "simulation.fill_ratio must be between 0 and 1",
            )));
        }

        Ok(())
    }

    fn validate_logging_settings(&self) -> Result<(), ConfigBuildError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigBuildError::ValidationError(format!(
                "Invalid log level '{}'. Valid levels: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            )));
        }
        Ok(())
    }
}

/// CLI overrides structure for command-line arguments
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub log_path: Option<String>,
    pub term_log_off: Option<bool>,
    pub tick_interval_ms: Option<u64>,
}

impl CliOverrides {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            log_path: cli.log_path.clone(),
            term_log_off: if cli.term_log_off { Some(true) } else { None },
            tick_interval_ms: cli.tick_interval_ms,
        }
    }
}
