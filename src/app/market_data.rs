use std::{collections::HashMap, sync::Arc};

use derive_builder::Builder;
use eyre::{eyre, OptionExt, Result};
use rust_decimal::dec;
use safe_math::safe;
use symm_core::{
    core::{
        bits::{Amount, PricePointEntry, Symbol},
        decimal_ext::{round_to_scale, DecimalExt, AMOUNT_SCALE},
    },
    market_data::{
        market_data_gateway::StaticMarketData, order_book::book_pricer::BookPricer,
    },
};

use super::config::ConfigBuildError;

/// Simulated market: static prices, and order books synthesized around them
#[derive(Builder)]
#[builder(
    pattern = "owned",
    build_fn(name = "try_build", error = "ConfigBuildError")
)]
pub struct MarketDataConfig {
    #[builder(setter(into), default)]
    pub prices: HashMap<Symbol, Amount>,

    #[builder(setter(into, strip_option), default)]
    pub book_levels: Option<usize>,

    #[builder(setter(into, strip_option), default)]
    pub level_quantity: Option<Amount>,

    #[builder(setter(into, strip_option), default)]
    pub level_step: Option<Amount>,

    #[builder(setter(skip))]
    market_data: Option<Arc<StaticMarketData>>,

    #[builder(setter(skip))]
    order_pricer: Option<Arc<BookPricer>>,
}

impl MarketDataConfig {
    #[must_use]
    pub fn builder() -> MarketDataConfigBuilder {
        MarketDataConfigBuilder::default()
    }

    pub fn try_get_market_data_cloned(&self) -> Result<Arc<StaticMarketData>> {
        self.market_data
            .clone()
            .ok_or_eyre("Failed to get market data")
    }

    pub fn try_get_order_pricer_cloned(&self) -> Result<Arc<BookPricer>> {
        self.order_pricer
            .clone()
            .ok_or_eyre("Failed to get order pricer")
    }

    /// Set market price and rebuild order book around it
    pub fn set_price(&self, symbol: &Symbol, price: Amount) -> Result<()> {
        let market_data = self.try_get_market_data_cloned()?;
        let order_pricer = self.try_get_order_pricer_cloned()?;

        let (bids, asks) = self.make_book(price)?;
        order_pricer.set_order_book(symbol, &bids, &asks)?;
        market_data.set_price(symbol, price);
        Ok(())
    }

    /// Levels spaced by relative step on both sides of the price
    fn make_book(&self, price: Amount) -> Result<(Vec<PricePointEntry>, Vec<PricePointEntry>)> {
        let levels = self.book_levels.unwrap_or(5);
        let quantity = self.level_quantity.unwrap_or(dec!(1));
        let step = self.level_step.unwrap_or(dec!(0.0005));

        let mut bids = Vec::with_capacity(levels);
        let mut asks = Vec::with_capacity(levels);

        for level in 1..=levels {
            let distance = safe!(step * Amount::from(level)).ok_or_eyre("Math error")?;
            let bid = safe!(price * (Amount::ONE - distance)).ok_or_eyre("Math error")?;
            let ask = safe!(price * (Amount::ONE + distance)).ok_or_eyre("Math error")?;

            if bid <= Amount::ZERO {
                break;
            }

            bids.push(PricePointEntry::new(round_to_scale(bid, AMOUNT_SCALE), quantity));
            asks.push(PricePointEntry::new(round_to_scale(ask, AMOUNT_SCALE), quantity));
        }

        if bids.is_empty() {
            return Err(eyre!("Level step too large for price {}", price));
        }

        Ok((bids, asks))
    }
}

impl MarketDataConfigBuilder {
    pub fn build(self) -> Result<MarketDataConfig, ConfigBuildError> {
        let mut config = self.try_build()?;

        config.market_data.replace(Arc::new(StaticMarketData::new()));
        config.order_pricer.replace(Arc::new(BookPricer::new()));

        let prices = config
            .prices
            .iter()
            .map(|(symbol, price)| (symbol.clone(), *price))
            .collect::<Vec<_>>();

        for (symbol, price) in prices {
            config.set_price(&symbol, price)?;
        }

        Ok(config)
    }
}
