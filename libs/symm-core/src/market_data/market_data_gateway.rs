use std::collections::HashMap;

use async_trait::async_trait;
use eyre::Result;
use parking_lot::RwLock;

use crate::core::bits::{Amount, Symbol};

/// Source of last traded (or mid) prices for tradable assets
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// One consistent snapshot of all known prices
    async fn get_prices(&self) -> Result<HashMap<Symbol, Amount>>;

    /// Price of single asset, `None` if market has no price for it
    async fn get_price(&self, symbol: &Symbol) -> Result<Option<Amount>>;
}

/// In-memory price table, updated by whoever owns market data feed
#[derive(Default)]
pub struct StaticMarketData {
    prices: RwLock<HashMap<Symbol, Amount>>,
}

impl StaticMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_prices(prices: HashMap<Symbol, Amount>) -> Self {
        Self {
            prices: RwLock::new(prices),
        }
    }

    pub fn set_prices(&self, prices: impl IntoIterator<Item = (Symbol, Amount)>) {
        self.prices.write().extend(prices);
    }

    pub fn set_price(&self, symbol: &Symbol, price: Amount) {
        self.prices.write().insert(symbol.clone(), price);
    }

    pub fn remove_price(&self, symbol: &Symbol) -> Option<Amount> {
        self.prices.write().remove(symbol)
    }
}

#[async_trait]
impl MarketDataGateway for StaticMarketData {
    async fn get_prices(&self) -> Result<HashMap<Symbol, Amount>> {
        Ok(self.prices.read().clone())
    }

    async fn get_price(&self, symbol: &Symbol) -> Result<Option<Amount>> {
        Ok(self.prices.read().get(symbol).cloned())
    }
}
