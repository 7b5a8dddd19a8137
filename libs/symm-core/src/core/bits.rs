use std::{fmt::Display, str::FromStr};

use eyre::{eyre, Report};
use serde::{Deserialize, Serialize};

use crate::string_id;

pub type Symbol = string_cache::DefaultAtom; // asset or market name
pub type Amount = rust_decimal::Decimal; // price, quantity, value, or rate

string_id!(UserId);
string_id!(ClientOrderId);
string_id!(ExchangeOrderId);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricePointEntry {
    pub price: Amount,
    pub quantity: Amount,
}

impl PricePointEntry {
    pub fn new(price: Amount, quantity: Amount) -> Self {
        Self { price, quantity }
    }
}

#[derive(Hash, Eq, PartialEq, Clone, Copy, Serialize, Deserialize, Debug)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite_side(&self) -> Side {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Tell whether `price` is at or better than `limit` for this side.
    ///
    /// Buyer accepts anything not above the limit, seller anything not below.
    pub fn is_within_limit(&self, price: Amount, limit: Amount) -> bool {
        match self {
            Self::Buy => price <= limit,
            Self::Sell => price >= limit,
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for Side {
    type Err = Report;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "buy" | "Buy" | "BUY" | "bid" | "Bid" | "BID" | "B" | "b" => Ok(Side::Buy),
            "sell" | "Sell" | "SELL" | "ask" | "Ask" | "ASK" | "S" | "s" | "A" | "a" => {
                Ok(Side::Sell)
            }
            _ => Err(eyre!("Invalid side: {}", value)),
        }
    }
}
