use eyre::{eyre, Result};
use itertools::Itertools;

use crate::core::bits::{Amount, PricePointEntry, Side};

/// Price level order book allowing to inspect market depth
///
/// Bids are kept in descending price order, asks in ascending, so that the
/// first level on either side is always the top of book.
#[derive(Clone, Debug, Default)]
pub struct PricePointBook {
    bids: Vec<PricePointEntry>,
    asks: Vec<PricePointEntry>,
}

impl PricePointBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_entries(bids: &[PricePointEntry], asks: &[PricePointEntry]) -> Result<Self> {
        let mut book = Self::new();
        book.update(bids, asks)?;
        Ok(book)
    }

    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }

    /// Replace book contents with snapshot of levels
    ///
    /// Levels with zero quantity are dropped. Negative prices or quantities
    /// are rejected and book is left unchanged.
    pub fn update(&mut self, bids: &[PricePointEntry], asks: &[PricePointEntry]) -> Result<()> {
        if let Some(bad) = bids
            .iter()
            .chain(asks.iter())
            .find(|entry| entry.price <= Amount::ZERO || entry.quantity < Amount::ZERO)
        {
            return Err(eyre!(
                "Invalid price level: {} @ {}",
                bad.quantity,
                bad.price
            ));
        }

        self.bids = bids
            .iter()
            .filter(|entry| entry.quantity > Amount::ZERO)
            .cloned()
            .sorted_by(|a, b| b.price.cmp(&a.price))
            .collect();

        self.asks = asks
            .iter()
            .filter(|entry| entry.quantity > Amount::ZERO)
            .cloned()
            .sorted_by(|a, b| a.price.cmp(&b.price))
            .collect();

        Ok(())
    }

    fn levels_to_take(&self, side: Side) -> &[PricePointEntry] {
        match side {
            // buy order takes liquidity from asks, and sell from bids
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        }
    }

    pub fn get_best_price(&self, side: Side) -> Option<Amount> {
        self.levels_to_take(side).first().map(|entry| entry.price)
    }

    /// Total quantity available on the side the order would take from
    pub fn get_depth(&self, side: Side) -> Amount {
        self.levels_to_take(side)
            .iter()
            .map(|entry| entry.quantity)
            .sum()
    }

    /// Price of the worst level touched when filling `quantity`
    ///
    /// Walks levels from top of book until quantity is covered. Larger
    /// quantity never gives better price.
    pub fn get_fill_price(&self, side: Side, quantity: Amount) -> Result<Amount> {
        if quantity <= Amount::ZERO {
            return Err(eyre!("Quantity must be positive: {}", quantity));
        }

        let mut remaining = quantity;
        for level in self.levels_to_take(side) {
            remaining -= level.quantity;
            if remaining <= Amount::ZERO {
                return Ok(level.price);
            }
        }

        Err(eyre!(
            "Insufficient liquidity to {} {}: missing {}",
            side,
            quantity,
            remaining
        ))
    }
}
