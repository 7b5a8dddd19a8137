use std::sync::Arc;

use derive_builder::Builder;
use parking_lot::RwLock;
use symm_core::core::bits::ClientOrderId;

use super::config::ConfigBuildError;
use crate::{app::order_ids::util::make_timestamp_id, solver::solver::OrderIdProvider};

pub mod util {
    use chrono::Utc;

    /// Id made of prefix, current time in milliseconds, and sequence number
    pub fn make_timestamp_id<T>(prefix: &str, sequence: u64) -> T
    where
        T: From<String>,
    {
        T::from(format!(
            "{}{}-{}",
            prefix,
            Utc::now().timestamp_millis(),
            sequence
        ))
    }
}

/// Client order ids unique within process, even within same millisecond
pub struct TimestampOrderIds {
    last_sequence: u64,
}

impl TimestampOrderIds {
    pub fn new() -> Self {
        Self { last_sequence: 0 }
    }
}

impl Default for TimestampOrderIds {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderIdProvider for TimestampOrderIds {
    fn next_client_order_id(&mut self) -> ClientOrderId {
        self.last_sequence += 1;
        make_timestamp_id("C-", self.last_sequence)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub enum OrderIdProviderKind {
    #[default]
    Timestamp,
}

#[derive(Builder)]
#[builder(
    pattern = "owned",
    build_fn(name = "try_build", error = "ConfigBuildError")
)]
pub struct OrderIdConfig {
    #[builder(setter(into, strip_option), default)]
    pub provider_kind: OrderIdProviderKind,

    #[builder(setter(skip))]
    pub(crate) order_id_provider: Option<Arc<RwLock<dyn OrderIdProvider + Send + Sync>>>,
}

impl OrderIdConfig {
    #[must_use]
    pub fn builder() -> OrderIdConfigBuilder {
        OrderIdConfigBuilder::default()
    }

    pub fn expect_order_id_provider_cloned(
        &self,
    ) -> Result<Arc<RwLock<dyn OrderIdProvider + Send + Sync>>, ConfigBuildError> {
        self.order_id_provider
            .clone()
            .ok_or(ConfigBuildError::UninitializedField("order_id_provider"))
    }
}

impl OrderIdConfigBuilder {
    pub fn build(self) -> Result<OrderIdConfig, ConfigBuildError> {
        let mut config = self.try_build()?;

        config
            .order_id_provider
            .replace(match config.provider_kind {
                OrderIdProviderKind::Timestamp => Arc::new(RwLock::new(TimestampOrderIds::new())),
            });

        Ok(config)
    }
}
