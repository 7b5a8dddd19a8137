use std::collections::HashMap;

use chrono::{DateTime, Utc};
use safe_math::safe;
use serde::{Deserialize, Serialize};

use symm_core::{
    core::{
        bits::{Amount, Side, Symbol, UserId},
        decimal_ext::{round_to_scale, DecimalExt, AMOUNT_SCALE},
    },
    numeric_id,
};

use crate::{
    error::{SolverError, SolverResult},
    index::index_definition::IndexId,
};

numeric_id!(IntentId, "I-");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
    /// Waiting in the queue for index price to reach the limit
    Pending,

    /// Folded into aggregated orders
    Active,

    /// All legs filled
    Fulfilled,

    /// Cancelled by the user
    Cancelled,
}

impl IntentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Fulfilled | Self::Cancelled)
    }
}

/// Request to buy or sell an index, as received from the user
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateIntentDto {
    pub index_id: IndexId,
    pub user_id: UserId,
    pub side: Side,

    /// Quantity of index units
    pub amount: Amount,

    /// Worst acceptable index price
    pub limit_price: Amount,
}

/// Exposure to single constituent asset held by an active intent
#[derive(Clone, Debug, PartialEq)]
pub struct IntentLeg {
    /// Quantity of the asset the intent needs
    pub quantity: Amount,

    /// Quantity confirmed as filled
    pub filled_quantity: Amount,

    /// Σ(fill price × fill quantity)
    pub filled_cost: Amount,
}

impl IntentLeg {
    pub fn new(quantity: Amount) -> Self {
        Self {
            quantity,
            filled_quantity: Amount::ZERO,
            filled_cost: Amount::ZERO,
        }
    }

    pub fn remaining_quantity(&self) -> Amount {
        (self.quantity - self.filled_quantity).max(Amount::ZERO)
    }

    pub fn is_filled(&self) -> bool {
        self.filled_quantity >= self.quantity
    }

    pub fn average_price(&self) -> Option<Amount> {
        if self.filled_quantity.is_zero() {
            None
        } else {
            safe!(self.filled_cost / self.filled_quantity)
        }
    }
}

/// User's request to trade index at limit price, and its fill progress
#[derive(Clone, Debug)]
pub struct Intent {
    pub id: IntentId,
    pub user_id: UserId,
    pub index_id: IndexId,
    pub side: Side,

    /// Quantity of index units
    pub amount: Amount,

    /// Worst acceptable index price
    pub limit_price: Amount,

    pub status: IntentStatus,

    /// Index units fully backed by fills across all legs
    pub filled_amount: Amount,

    /// Index price achieved by fills, known once every leg has some fill
    pub filled_price: Option<Amount>,

    /// Adverse slippage against limit price, in quote currency
    pub fill_loss: Amount,

    /// Per-asset exposure, set when intent is folded
    pub legs: HashMap<Symbol, IntentLeg>,

    pub created_at: DateTime<Utc>,
}

impl Intent {
    pub fn new(id: IntentId, dto: CreateIntentDto, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: dto.user_id,
            index_id: dto.index_id,
            side: dto.side,
            amount: dto.amount,
            limit_price: dto.limit_price,
            status: IntentStatus::Pending,
            filled_amount: Amount::ZERO,
            filled_price: None,
            fill_loss: Amount::ZERO,
            legs: HashMap::new(),
            created_at,
        }
    }

    /// Value of the intent at its limit, used to order the pending queue
    pub fn notional(&self) -> Option<Amount> {
        safe!(self.amount * self.limit_price)
    }

    pub fn is_eligible(&self, index_price: Amount) -> bool {
        self.status == IntentStatus::Pending
            && self.side.is_within_limit(index_price, self.limit_price)
    }

    pub fn activate(&mut self, legs: HashMap<Symbol, IntentLeg>) -> SolverResult<()> {
        if self.status != IntentStatus::Pending {
            return Err(SolverError::InvalidState(format!(
                "Cannot activate {} in status {:?}",
                self.id, self.status
            )));
        }
        self.legs = legs;
        self.status = IntentStatus::Active;
        Ok(())
    }

    pub fn cancel(&mut self) -> SolverResult<()> {
        match self.status {
            IntentStatus::Pending | IntentStatus::Active => {
                self.status = IntentStatus::Cancelled;
                Ok(())
            }
            status => Err(SolverError::InvalidState(format!(
                "Cannot cancel {} in status {:?}",
                self.id, status
            ))),
        }
    }

    /// Record fill of one leg, and return whether intent became fulfilled
    pub fn apply_leg_fill(
        &mut self,
        symbol: &Symbol,
        quantity: Amount,
        price: Amount,
    ) -> SolverResult<bool> {
        if self.status != IntentStatus::Active {
            return Err(SolverError::InvalidState(format!(
                "Cannot fill {} in status {:?}",
                self.id, self.status
            )));
        }

        let id = self.id;
        let leg = self.legs.get_mut(symbol).ok_or_else(|| {
            SolverError::InvalidState(format!("No leg {} in {}", symbol, id))
        })?;

        let quantity = quantity.min(leg.remaining_quantity());
        if quantity <= Amount::ZERO {
            return Ok(false);
        }

        leg.filled_quantity = safe!(leg.filled_quantity + quantity)
            .ok_or_else(|| SolverError::MathOverflow(format!("Filled quantity of {}", id)))?;
        leg.filled_cost = safe!(leg.filled_cost + quantity * price)
            .ok_or_else(|| SolverError::MathOverflow(format!("Filled cost of {}", id)))?;

        self.update_fill_stats()?;

        if self.legs.values().all(IntentLeg::is_filled) {
            self.status = IntentStatus::Fulfilled;
            return Ok(true);
        }
        Ok(false)
    }

    fn update_fill_stats(&mut self) -> SolverResult<()> {
        let overflow = || SolverError::MathOverflow(format!("Fill stats of {}", self.id));

        let fraction = self
            .legs
            .values()
            .map(|leg| safe!(leg.filled_quantity / leg.quantity))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(overflow)?
            .into_iter()
            .min()
            .unwrap_or_default()
            .min(Amount::ONE);

        let filled_amount = safe!(self.amount * fraction).ok_or_else(overflow)?;

        // Price of the index as implied by average fill of each leg
        let filled_price = if self.legs.values().all(|leg| !leg.filled_quantity.is_zero()) {
            let price = self
                .legs
                .values()
                .map(|leg| safe!(leg.average_price() * leg.quantity / self.amount))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(overflow)?
                .into_iter()
                .sum::<Amount>();
            Some(round_to_scale(price, AMOUNT_SCALE))
        } else {
            None
        };

        let fill_loss = match filled_price {
            Some(price) => {
                let slippage = match self.side {
                    Side::Buy => safe!(price - self.limit_price),
                    Side::Sell => safe!(self.limit_price - price),
                }
                .ok_or_else(overflow)?;
                safe!(slippage.max(Amount::ZERO) * filled_amount).ok_or_else(overflow)?
            }
            None => Amount::ZERO,
        };

        self.filled_amount = round_to_scale(filled_amount, AMOUNT_SCALE);
        self.filled_price = filled_price;
        self.fill_loss = round_to_scale(fill_loss, AMOUNT_SCALE);
        Ok(())
    }
}
