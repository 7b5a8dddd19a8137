use std::{env, fs, path::Path, str::FromStr};

use eyre::{eyre, Result};

use crate::{
    app::config::{ApplicationConfig, CliOverrides, ConfigBuildError},
    cli::Cli,
};

/// Configuration loader that handles loading from files and applying CLI overrides
pub struct ConfigLoader {
    config_path: String,
    explicit_path: bool,
    cli_overrides: CliOverrides,
}

impl ConfigLoader {
    /// Default configuration file path
    const DEFAULT_CONFIG_PATH: &'static str = "configs/config.json";

    pub fn new(cli: &Cli) -> Self {
        Self {
            config_path: cli
                .config_path
                .clone()
                .unwrap_or_else(|| String::from(Self::DEFAULT_CONFIG_PATH)),
            explicit_path: cli.config_path.is_some(),
            cli_overrides: CliOverrides::from_cli(cli),
        }
    }

    pub fn new_with_path(config_path: &str, cli_overrides: CliOverrides) -> Self {
        Self {
            config_path: String::from(config_path),
            explicit_path: true,
            cli_overrides,
        }
    }

    /// Load configuration with precedence: defaults, file, environment, CLI
    pub fn load_config(&self) -> Result<ApplicationConfig> {
        tracing::info!(config_path = %self.config_path, "Loading application configuration");

        let mut config = self.load_config_from_file()?;
        self.apply_environment_variables(&mut config)?;
        config.apply_cli_overrides(&self.cli_overrides);

        config
            .validate()
            .map_err(|err| eyre!("Failed to validate configuration: {}", err))?;

        tracing::info!("Application configuration loaded successfully");
        Ok(config)
    }

    fn load_config_from_file(&self) -> Result<ApplicationConfig> {
        if !Path::new(&self.config_path).exists() {
            if self.explicit_path {
                return Err(eyre!(
                    "Failed to load configuration: file not found: {}",
                    self.config_path
                ));
            }
            tracing::info!(
                config_path = %self.config_path,
                "Configuration file not found, using defaults"
            );
            return Ok(ApplicationConfig::default());
        }

        let config_content = fs::read_to_string(&self.config_path)
            .map_err(|e| eyre!("Failed to read configuration file: {:?}", e))?;

        let config: ApplicationConfig = serde_json::from_str(&config_content)
            .map_err(|e| eyre!("Failed to parse configuration JSON: {:?}", e))?;

        tracing::debug!(
            config_path = %self.config_path,
            "Configuration loaded from file"
        );

        Ok(config)
    }

    fn apply_environment_variables(
        &self,
        config: &mut ApplicationConfig,
    ) -> Result<(), ConfigBuildError> {
        if let Ok(val) = env::var("INDEX_SOLVER_LOG_LEVEL") {
            tracing::debug!(env_var = "INDEX_SOLVER_LOG_LEVEL", value = %val, "Overriding log level");
            config.logging.level = val;
        }
        if let Ok(val) = env::var("INDEX_SOLVER_LOG_FILE") {
            config.logging.file_path = Some(val);
        }
        if let Ok(val) = env::var("INDEX_SOLVER_TICK_INTERVAL_MS") {
            config.solver.tick_interval_ms = parse_env_value("INDEX_SOLVER_TICK_INTERVAL_MS", &val)?;
        }
        Ok(())
    }
}

fn parse_env_value<T>(name: &str, value: &str) -> Result<T, ConfigBuildError>
where
    T: FromStr,
    T::Err: std::fmt::Debug,
{
    value
        .trim()
        .parse()
        .map_err(|err| ConfigBuildError::EnvError(format!("Failed to parse {}: {:?}", name, err)))
}
