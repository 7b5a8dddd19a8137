use std::collections::{HashMap, HashSet};

use chrono::Utc;
use itertools::Itertools;

use symm_core::core::{
    bits::{Amount, ClientOrderId, ExchangeOrderId, Side, Symbol},
    id_macros::IdSequence,
};

use crate::{
    error::{SolverError, SolverResult},
    index::index_definition::IndexId,
};

use super::{
    agg_order::{AggOrderId, AggOrderStatus, AggregatedOrder},
    intent::IntentId,
};

/// Outcome of applying exchange fill to aggregated order
#[derive(Clone, Debug, PartialEq)]
pub struct FillResult {
    pub order_id: AggOrderId,
    pub symbol: Symbol,
    pub side: Side,

    /// Quantity applied after clamping to remaining
    pub applied_quantity: Amount,

    /// Order became completely filled
    pub fulfilled: bool,

    /// Quantity allocated to each contributing intent
    pub allocations: Vec<(IntentId, Amount)>,
}

/// Aggregated orders with at most one working order per (symbol, side)
#[derive(Default)]
pub struct AggregatedOrderBook {
    orders: HashMap<AggOrderId, AggregatedOrder>,
    working: HashMap<(Symbol, Side), AggOrderId>,
    by_exchange_id: HashMap<ExchangeOrderId, AggOrderId>,
    order_ids: IdSequence,
}

impl AggregatedOrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_order(&self, order_id: AggOrderId) -> SolverResult<&AggregatedOrder> {
        self.orders
            .get(&order_id)
            .ok_or(SolverError::AggOrderNotFound(order_id))
    }

    fn get_order_mut(&mut self, order_id: AggOrderId) -> SolverResult<&mut AggregatedOrder> {
        self.orders
            .get_mut(&order_id)
            .ok_or(SolverError::AggOrderNotFound(order_id))
    }

    pub fn get_orders(&self) -> Vec<&AggregatedOrder> {
        self.orders
            .values()
            .sorted_by_key(|order| order.id)
            .collect()
    }

    pub fn get_working_order(&self, symbol: &Symbol, side: Side) -> Option<&AggregatedOrder> {
        self.working
            .get(&(symbol.clone(), side))
            .and_then(|order_id| self.orders.get(order_id))
    }

    pub fn find_by_exchange_id(&self, exchange_order_id: &ExchangeOrderId) -> Option<AggOrderId> {
        self.by_exchange_id.get(exchange_order_id).copied()
    }

    pub fn has_active(&self, symbol: &Symbol, side: Side) -> bool {
        self.get_working_order(symbol, side)
            .is_some_and(|order| order.status == AggOrderStatus::Active)
    }

    fn order_ids_with<F>(&self, predicate: F) -> Vec<AggOrderId>
    where
        F: Fn(&AggregatedOrder) -> bool,
    {
        self.orders
            .values()
            .filter(|order| predicate(order))
            .map(|order| order.id)
            .sorted()
            .collect()
    }

    pub fn pending_order_ids(&self) -> Vec<AggOrderId> {
        self.order_ids_with(|order| order.status == AggOrderStatus::Pending)
    }

    pub fn active_unfilled_order_ids(&self) -> Vec<AggOrderId> {
        self.order_ids_with(|order| {
            order.status == AggOrderStatus::Active && order.filled_quantity < order.agg_quantity
        })
    }

    /// Add intent's leg to the pending order for (symbol, side), creating one
    /// if slot is free
    ///
    /// Active order cannot be extended, and InvalidState is returned.
    pub fn fold(
        &mut self,
        index_id: IndexId,
        symbol: &Symbol,
        side: Side,
        intent_id: IntentId,
        quantity: Amount,
    ) -> SolverResult<AggOrderId> {
        let key = (symbol.clone(), side);

        let order_id = match self.working.get(&key).copied() {
            Some(order_id) => order_id,
            None => {
                let order_id = self.order_ids.next_id();
                let order =
                    AggregatedOrder::new_pending(order_id, index_id, symbol.clone(), side, Utc::now());
                self.orders.insert(order_id, order);
                self.working.insert(key, order_id);
                order_id
            }
        };

        self.get_order_mut(order_id)?.fold(intent_id, quantity)?;
        Ok(order_id)
    }

    /// Remove intents from orders not yet submitted
    ///
    /// Order left without any intent is cancelled, and its slot freed.
    pub fn detach_intents(&mut self, intent_ids: &HashSet<IntentId>) -> Vec<(AggOrderId, IntentId)> {
        let mut detached = Vec::new();
        let mut emptied = Vec::new();

        for order in self
            .orders
            .values_mut()
            .filter(|order| order.status == AggOrderStatus::Pending)
        {
            for intent_id in intent_ids {
                if let Ok(Some(_)) = order.detach(*intent_id) {
                    detached.push((order.id, *intent_id));
                }
            }
            if order.contributions.is_empty() {
                emptied.push(order.id);
            }
        }

        for order_id in emptied {
            if let Err(err) = self.cancel_order(order_id) {
                tracing::warn!(%order_id, "Failed to cancel empty order: {:?}", err);
            }
        }

        detached.sort();
        detached
    }

    pub fn set_order_price(&mut self, order_id: AggOrderId, price: Amount) -> SolverResult<()> {
        self.get_order_mut(order_id)?.set_price(price);
        Ok(())
    }

    pub fn activate(
        &mut self,
        order_id: AggOrderId,
        exchange_order_id: ExchangeOrderId,
        client_order_id: ClientOrderId,
    ) -> SolverResult<()> {
        self.get_order_mut(order_id)?
            .activate(exchange_order_id.clone(), client_order_id)?;
        self.by_exchange_id.insert(exchange_order_id, order_id);
        Ok(())
    }

    /// Cancel order and put pending replacement for residual into its slot
    pub fn replace(&mut self, order_id: AggOrderId, price: Amount) -> SolverResult<AggOrderId> {
        let new_order_id = self.order_ids.next_id();

        let order = self.get_order_mut(order_id)?;
        let replacement = order.make_replacement(new_order_id, price, Utc::now());
        order.cancel()?;

        self.working
            .insert((replacement.symbol.clone(), replacement.side), new_order_id);
        self.orders.insert(new_order_id, replacement);
        Ok(new_order_id)
    }

    /// Apply fill reported by exchange
    ///
    /// Returns `None` when exchange order is not known to us.
    pub fn apply_fill(
        &mut self,
        exchange_order_id: &ExchangeOrderId,
        quantity: Amount,
    ) -> SolverResult<Option<FillResult>> {
        let Some(order_id) = self.find_by_exchange_id(exchange_order_id) else {
            return Ok(None);
        };

        let order = self.get_order_mut(order_id)?;
        let allocations = order.apply_fill(quantity)?;
        let applied_quantity: Amount = allocations.iter().map(|(_, q)| *q).sum();
        let fulfilled = order.status == AggOrderStatus::Fulfilled;
        let symbol = order.symbol.clone();
        let side = order.side;

        if fulfilled {
            self.release_slot(order_id, &symbol, side);
        }

        Ok(Some(FillResult {
            order_id,
            symbol,
            side,
            applied_quantity,
            fulfilled,
            allocations,
        }))
    }

    pub fn cancel_order(&mut self, order_id: AggOrderId) -> SolverResult<()> {
        let order = self.get_order_mut(order_id)?;
        order.cancel()?;

        let symbol = order.symbol.clone();
        let side = order.side;
        self.release_slot(order_id, &symbol, side);
        Ok(())
    }

    fn release_slot(&mut self, order_id: AggOrderId, symbol: &Symbol, side: Side) {
        let key = (symbol.clone(), side);
        if self.working.get(&key) == Some(&order_id) {
            self.working.remove(&key);
        }
    }
}
