use std::{collections::HashMap, sync::Arc};

use itertools::Itertools;
use parking_lot::RwLock;

use symm_core::{
    core::{
        bits::{Amount, Symbol},
        id_macros::IdSequence,
    },
    market_data::market_data_gateway::MarketDataGateway,
};

use crate::error::{SolverError, SolverResult};

use super::index_definition::{IndexAsset, IndexDefinition, IndexId};

/// Manages indexes, create, remove, and compute their price
pub struct IndexManager {
    market_data: Arc<dyn MarketDataGateway>,
    indexes: RwLock<HashMap<IndexId, Arc<IndexDefinition>>>,
    index_ids: IdSequence,
}

impl IndexManager {
    pub fn new(market_data: Arc<dyn MarketDataGateway>) -> Self {
        Self {
            market_data,
            indexes: RwLock::new(HashMap::new()),
            index_ids: IdSequence::new(),
        }
    }

    pub fn create_index<I>(&self, assets: I) -> SolverResult<IndexId>
    where
        I: IntoIterator<Item = IndexAsset>,
    {
        let index_id = self.index_ids.next_id();
        let definition = Arc::new(IndexDefinition::try_new(index_id, assets)?);

        tracing::info!(%index_id, %definition, "Index created");

        self.indexes.write().insert(index_id, definition);
        Ok(index_id)
    }

    pub fn get_index_data(&self, index_id: IndexId) -> SolverResult<Arc<IndexDefinition>> {
        self.indexes
            .read()
            .get(&index_id)
            .cloned()
            .ok_or(SolverError::IndexNotFound(index_id))
    }

    pub fn get_index_ids(&self) -> Vec<IndexId> {
        self.indexes.read().keys().copied().sorted().collect()
    }

    pub fn remove_index(&self, index_id: IndexId) -> SolverResult<()> {
        self.indexes
            .write()
            .remove(&index_id)
            .ok_or(SolverError::IndexNotFound(index_id))?;

        tracing::info!(%index_id, "Index removed");
        Ok(())
    }

    async fn get_price_snapshot(&self) -> SolverResult<HashMap<Symbol, Amount>> {
        self.market_data
            .get_prices()
            .await
            .map_err(|err| SolverError::PriceUnavailable(format!("Market data: {:?}", err)))
    }

    /// Current price of the index computed from one market snapshot
    pub async fn get_index_price(&self, index_id: IndexId) -> SolverResult<Amount> {
        let definition = self.get_index_data(index_id)?;
        let prices = self.get_price_snapshot().await?;
        definition.get_current_price(&prices)
    }

    /// Current prices of all indexes, all computed from same market snapshot
    ///
    /// Fails as a whole when any index cannot be priced.
    pub async fn get_index_prices(&self) -> SolverResult<HashMap<IndexId, Amount>> {
        let definitions = self.indexes.read().values().cloned().collect_vec();
        let prices = self.get_price_snapshot().await?;

        definitions
            .into_iter()
            .map(|definition| {
                definition
                    .get_current_price(&prices)
                    .map(|price| (definition.index_id, price))
            })
            .collect()
    }
}
