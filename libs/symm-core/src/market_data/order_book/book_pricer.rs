use std::collections::HashMap;

use async_trait::async_trait;
use eyre::{eyre, Result};
use parking_lot::RwLock;

use crate::{
    core::bits::{Amount, PricePointEntry, Side, Symbol},
    market_data::order_book::order_book::PricePointBook,
};

/// Liquidity based order pricing
///
/// Quote must be monotonic in quantity: larger buy never quotes lower, and
/// larger sell never quotes higher.
#[async_trait]
pub trait OrderPricer: Send + Sync {
    async fn calculate_order_price(
        &self,
        symbol: &Symbol,
        quantity: Amount,
        side: Side,
    ) -> Result<Amount>;
}

/// Prices orders by walking order book depth per symbol
#[derive(Default)]
pub struct BookPricer {
    order_books: RwLock<HashMap<Symbol, PricePointBook>>,
}

impl BookPricer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_order_book(
        &self,
        symbol: &Symbol,
        bids: &[PricePointEntry],
        asks: &[PricePointEntry],
    ) -> Result<()> {
        let book = PricePointBook::new_with_entries(bids, asks)?;
        self.order_books.write().insert(symbol.clone(), book);
        Ok(())
    }

    pub fn get_best_price(&self, symbol: &Symbol, side: Side) -> Option<Amount> {
        self.order_books
            .read()
            .get(symbol)
            .and_then(|book| book.get_best_price(side))
    }
}

#[async_trait]
impl OrderPricer for BookPricer {
    async fn calculate_order_price(
        &self,
        symbol: &Symbol,
        quantity: Amount,
        side: Side,
    ) -> Result<Amount> {
        let order_books = self.order_books.read();
        let book = order_books
            .get(symbol)
            .ok_or_else(|| eyre!("No order book for {}", symbol))?;

        book.get_fill_price(side, quantity)
    }
}

pub mod test_util {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use eyre::{eyre, Result};
    use parking_lot::RwLock;

    use crate::core::bits::{Amount, Side, Symbol};

    use super::OrderPricer;

    /// Quotes `base ± slope × quantity`, buy above and sell below base
    #[derive(Default)]
    pub struct MockOrderPricer {
        base_prices: RwLock<HashMap<Symbol, Amount>>,
        slope: Amount,
    }

    impl MockOrderPricer {
        pub fn new(slope: Amount) -> Self {
            Self {
                base_prices: RwLock::new(HashMap::new()),
                slope,
            }
        }

        pub fn set_base_price(&self, symbol: &Symbol, price: Amount) {
            self.base_prices.write().insert(symbol.clone(), price);
        }

        pub fn remove_base_price(&self, symbol: &Symbol) {
            self.base_prices.write().remove(symbol);
        }
    }

    #[async_trait]
    impl OrderPricer for MockOrderPricer {
        async fn calculate_order_price(
            &self,
            symbol: &Symbol,
            quantity: Amount,
            side: Side,
        ) -> Result<Amount> {
            let base = self
                .base_prices
                .read()
                .get(symbol)
                .cloned()
                .ok_or_else(|| eyre!("No liquidity for {}", symbol))?;

            let impact = self
                .slope
                .checked_mul(quantity)
                .ok_or_else(|| eyre!("Math overflow"))?;

            match side {
                Side::Buy => Ok(base + impact),
                Side::Sell => Ok(base - impact),
            }
        }
    }
}
