use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use safe_math::safe;
use serde::{Deserialize, Serialize};

use symm_core::{
    core::{
        bits::{Amount, ClientOrderId, ExchangeOrderId, Side, Symbol},
        decimal_ext::{floor_to_scale, DecimalExt, AMOUNT_SCALE},
    },
    numeric_id,
};

use crate::{
    error::{SolverError, SolverResult},
    index::index_definition::IndexId,
};

use super::intent::IntentId;

numeric_id!(AggOrderId, "A-");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggOrderStatus {
    /// Collecting intents, not yet on exchange
    Pending,

    /// Acknowledged by exchange
    Active,

    /// Completely filled
    Fulfilled,

    /// Cancel acknowledged by exchange, or cancelled before submission
    Cancelled,
}

/// Exchange order for one asset and side, backing the legs of many intents
#[derive(Clone, Debug)]
pub struct AggregatedOrder {
    pub id: AggOrderId,

    /// ID assigned by exchange on acknowledgement
    pub exchange_order_id: Option<ExchangeOrderId>,

    /// ID we sent the order with
    pub client_order_id: Option<ClientOrderId>,

    pub index_id: IndexId,
    pub symbol: Symbol,
    pub side: Side,

    /// Outstanding quantity of each contributing intent
    pub contributions: BTreeMap<IntentId, Amount>,

    pub status: AggOrderStatus,

    /// Total quantity of the order
    pub agg_quantity: Amount,

    /// Limit price quoted for the order
    pub agg_price: Option<Amount>,

    /// Quantity confirmed as filled
    pub filled_quantity: Amount,

    pub created_at: DateTime<Utc>,
}

impl AggregatedOrder {
    pub fn new_pending(
        id: AggOrderId,
        index_id: IndexId,
        symbol: Symbol,
        side: Side,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            exchange_order_id: None,
            client_order_id: None,
            index_id,
            symbol,
            side,
            contributions: BTreeMap::new(),
            status: AggOrderStatus::Pending,
            agg_quantity: Amount::ZERO,
            agg_price: None,
            filled_quantity: Amount::ZERO,
            created_at,
        }
    }

    pub fn intent_ids(&self) -> Vec<IntentId> {
        self.contributions.keys().copied().collect()
    }

    pub fn remaining_quantity(&self) -> Amount {
        (self.agg_quantity - self.filled_quantity).max(Amount::ZERO)
    }

    /// Pending or active, i.e. still occupies its (symbol, side) slot
    pub fn is_working(&self) -> bool {
        matches!(
            self.status,
            AggOrderStatus::Pending | AggOrderStatus::Active
        )
    }

    fn expect_status(&self, status: AggOrderStatus, action: &str) -> SolverResult<()> {
        if self.status != status {
            return Err(SolverError::InvalidState(format!(
                "Cannot {} {} in status {:?}",
                action, self.id, self.status
            )));
        }
        Ok(())
    }

    /// Add quantity contributed by intent
    pub fn fold(&mut self, intent_id: IntentId, quantity: Amount) -> SolverResult<()> {
        self.expect_status(AggOrderStatus::Pending, "fold into")?;

        let overflow = || SolverError::MathOverflow(format!("Quantity of {}", self.id));
        let agg_quantity = safe!(self.agg_quantity + quantity).ok_or_else(overflow)?;
        let contribution = match self.contributions.get(&intent_id) {
            Some(existing) => safe!(*existing + quantity).ok_or_else(overflow)?,
            None => quantity,
        };

        self.agg_quantity = agg_quantity;
        self.contributions.insert(intent_id, contribution);
        Ok(())
    }

    /// Take intent out of order not yet submitted
    pub fn detach(&mut self, intent_id: IntentId) -> SolverResult<Option<Amount>> {
        self.expect_status(AggOrderStatus::Pending, "detach from")?;

        let removed = self.contributions.remove(&intent_id);
        if let Some(quantity) = removed {
            self.agg_quantity = (self.agg_quantity - quantity).max(Amount::ZERO);
        }
        Ok(removed)
    }

    pub fn set_price(&mut self, price: Amount) {
        self.agg_price = Some(price);
    }

    pub fn activate(
        &mut self,
        exchange_order_id: ExchangeOrderId,
        client_order_id: ClientOrderId,
    ) -> SolverResult<()> {
        self.expect_status(AggOrderStatus::Pending, "activate")?;

        self.exchange_order_id = Some(exchange_order_id);
        self.client_order_id = Some(client_order_id);
        self.status = AggOrderStatus::Active;
        Ok(())
    }

    /// Tell whether market moved away from our price by at least threshold
    ///
    /// Buy order is behind the market when market rose above it, and sell
    /// order when market fell below it. Boundary is inclusive.
    pub fn is_drift_triggered(&self, market_price: Amount, threshold: Amount) -> bool {
        let Some(price) = self.agg_price else {
            return false;
        };

        match self.side {
            Side::Buy => safe!(price * (Amount::ONE + threshold))
                .is_some_and(|trigger| market_price >= trigger),
            Side::Sell => safe!(price * (Amount::ONE - threshold))
                .is_some_and(|trigger| market_price <= trigger),
        }
    }

    /// Apply fill, and return quantity allocated to each contributing intent
    ///
    /// Fill is clamped to remaining quantity. Each intent receives its share
    /// rounded down to 1e-8, and what is left over is handed out in intent id
    /// order up to each intent's outstanding quantity, so that allocations
    /// always sum to the fill exactly.
    pub fn apply_fill(&mut self, quantity: Amount) -> SolverResult<Vec<(IntentId, Amount)>> {
        self.expect_status(AggOrderStatus::Active, "fill")?;

        let overflow = || SolverError::MathOverflow(format!("Fill of {}", self.id));
        let applied = quantity.min(self.remaining_quantity());
        if applied <= Amount::ZERO {
            return Ok(Vec::new());
        }

        let total_outstanding: Amount = self.contributions.values().copied().sum();
        let mut allocations = Vec::with_capacity(self.contributions.len());

        for (intent_id, outstanding) in &self.contributions {
            let share = if total_outstanding.is_zero() {
                Amount::ZERO
            } else {
                let exact = safe!(applied * *outstanding / total_outstanding).ok_or_else(overflow)?;
                floor_to_scale(exact, AMOUNT_SCALE).min(*outstanding)
            };
            allocations.push((*intent_id, share, *outstanding));
        }

        let mut left_over = applied - allocations.iter().map(|(_, share, _)| *share).sum::<Amount>();
        for (_, share, outstanding) in allocations.iter_mut() {
            if left_over <= Amount::ZERO {
                break;
            }
            let extra = left_over.min(*outstanding - *share);
            *share += extra;
            left_over -= extra;
        }

        for (intent_id, share, _) in &allocations {
            if let Some(outstanding) = self.contributions.get_mut(intent_id) {
                *outstanding -= *share;
            }
        }

        self.filled_quantity = safe!(self.filled_quantity + applied).ok_or_else(overflow)?;
        if self.filled_quantity >= self.agg_quantity {
            self.status = AggOrderStatus::Fulfilled;
        }

        Ok(allocations
            .into_iter()
            .filter(|(_, share, _)| !share.is_zero())
            .map(|(intent_id, share, _)| (intent_id, share))
            .collect())
    }

    pub fn cancel(&mut self) -> SolverResult<()> {
        if !self.is_working() {
            return Err(SolverError::InvalidState(format!(
                "Cannot cancel {} in status {:?}",
                self.id, self.status
            )));
        }
        self.status = AggOrderStatus::Cancelled;
        Ok(())
    }

    /// New pending order for the residual quantity, with same intents
    pub fn make_replacement(
        &self,
        id: AggOrderId,
        price: Amount,
        created_at: DateTime<Utc>,
    ) -> AggregatedOrder {
        AggregatedOrder {
            id,
            exchange_order_id: None,
            client_order_id: None,
            index_id: self.index_id,
            symbol: self.symbol.clone(),
            side: self.side,
            contributions: self.contributions.clone(),
            status: AggOrderStatus::Pending,
            agg_quantity: self.remaining_quantity(),
            agg_price: Some(price),
            filled_quantity: Amount::ZERO,
            created_at,
        }
    }
}
