use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
};

use itertools::Itertools;
use rust_decimal::dec;
use safe_math::safe;
use serde::{Deserialize, Serialize};

use symm_core::{
    core::{
        bits::{Amount, Symbol},
        decimal_ext::DecimalExt,
    },
    numeric_id,
};

use crate::error::{SolverError, SolverResult};

numeric_id!(IndexId, "X-");

/// Price the index is quoted at when it is created
pub const INITIAL_REFERENCE_PRICE: Amount = dec!(100);

/// A constituent of the index with its per-share coefficient.
///
/// One unit of the index holds `coefficient` units of the asset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexAsset {
    pub symbol: Symbol,
    pub coefficient: Amount,
}

impl IndexAsset {
    pub fn new(symbol: Symbol, coefficient: Amount) -> Self {
        Self {
            symbol,
            coefficient,
        }
    }
}

/// The definition of the Index.
///
/// The struct is intended to be used for Read-Only purpose, coefficients
/// never change once index is created.
#[derive(Clone, Debug)]
pub struct IndexDefinition {
    pub index_id: IndexId,
    pub initial_reference_price: Amount,
    pub assets: Vec<IndexAsset>,
}

impl IndexDefinition {
    /// Validate assets and create definition
    ///
    /// Assets must be non-empty, have positive coefficients, and no symbol may
    /// appear twice.
    pub fn try_new<I>(index_id: IndexId, assets: I) -> SolverResult<Self>
    where
        I: IntoIterator<Item = IndexAsset>,
    {
        let assets = assets.into_iter().collect_vec();

        if assets.is_empty() {
            return Err(SolverError::ValidationError(
                "Index must have at least one asset".into(),
            ));
        }

        let non_positive = assets
            .iter()
            .filter(|a| a.coefficient <= Amount::ZERO)
            .map(|a| a.symbol.as_ref())
            .join(", ");
        if !non_positive.is_empty() {
            return Err(SolverError::ValidationError(format!(
                "Coefficient must be positive for assets: {}",
                non_positive
            )));
        }

        let mut seen = HashSet::new();
        let duplicates = assets
            .iter()
            .filter(|a| !seen.insert(a.symbol.clone()))
            .map(|a| a.symbol.as_ref())
            .unique()
            .join(", ");
        if !duplicates.is_empty() {
            return Err(SolverError::ValidationError(format!(
                "Duplicate assets: {}",
                duplicates
            )));
        }

        Ok(Self {
            index_id,
            initial_reference_price: INITIAL_REFERENCE_PRICE,
            assets,
        })
    }

    pub fn coefficient(&self, symbol: &Symbol) -> Option<Amount> {
        self.assets
            .iter()
            .find(|a| &a.symbol == symbol)
            .map(|a| a.coefficient)
    }

    /// Exact Σ(price × coefficient) from one price snapshot
    pub fn get_current_price(&self, individual_prices: &HashMap<Symbol, Amount>) -> SolverResult<Amount> {
        let unpriced_assets = self
            .assets
            .iter()
            .filter(|a| !individual_prices.contains_key(&a.symbol))
            .map(|a| a.symbol.as_ref())
            .join(", ");

        if !unpriced_assets.is_empty() {
            return Err(SolverError::PriceUnavailable(format!(
                "Unknown price of the assets: {}",
                unpriced_assets
            )));
        }

        self.assets
            .iter()
            .try_fold(Amount::ZERO, |total, a| {
                let price = individual_prices.get(&a.symbol).copied();
                safe!(total + price * a.coefficient)
            })
            .ok_or_else(|| {
                SolverError::MathOverflow(format!("Index price of {}", self.index_id))
            })
    }
}

/// Developer friendly representation of IndexDefinition.
///
/// Should not be used for anything else than logging.
impl Display for IndexDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "IndexDefinition {}[{}]",
            self.index_id,
            self.assets
                .iter()
                .map(|a| format!("{}: {}", a.symbol, a.coefficient))
                .join(", ")
        )
    }
}
