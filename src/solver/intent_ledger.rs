use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;

use symm_core::core::{
    bits::{Amount, Symbol},
    id_macros::IdSequence,
};

use crate::{
    error::{SolverError, SolverResult},
    index::index_manager::IndexManager,
};

use super::intent::{CreateIntentDto, Intent, IntentId, IntentLeg, IntentStatus};

/// Position of a pending intent in the queue
#[derive(Clone, Debug, PartialEq)]
pub struct QueueEntry {
    pub notional: Amount,
    pub intent_id: IntentId,
}

#[derive(Default)]
struct LedgerState {
    intents: HashMap<IntentId, Intent>,

    /// Pending intents in ascending notional order
    queue: Vec<QueueEntry>,
}

impl LedgerState {
    fn remove_from_queue(&mut self, intent_id: IntentId) {
        self.queue.retain(|entry| entry.intent_id != intent_id);
    }
}

/// Holds all intents, and queue of those waiting to be matched
pub struct IntentLedger {
    state: RwLock<LedgerState>,
    intent_ids: IdSequence,
}

impl Default for IntentLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentLedger {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            intent_ids: IdSequence::new(),
        }
    }

    /// Validate and enqueue new intent
    ///
    /// Intent is inserted after any existing intents of equal notional.
    pub async fn submit(
        &self,
        dto: CreateIntentDto,
        index_manager: &IndexManager,
    ) -> SolverResult<IntentId> {
        if dto.amount <= Amount::ZERO {
            return Err(SolverError::ValidationError(format!(
                "Amount must be positive: {}",
                dto.amount
            )));
        }
        if dto.limit_price <= Amount::ZERO {
            return Err(SolverError::ValidationError(format!(
                "Limit price must be positive: {}",
                dto.limit_price
            )));
        }

        // Fails with IndexNotFound or PriceUnavailable
        index_manager.get_index_price(dto.index_id).await?;

        let intent_id = self.intent_ids.next_id();
        let intent = Intent::new(intent_id, dto, Utc::now());
        let notional = intent
            .notional()
            .ok_or_else(|| SolverError::MathOverflow(format!("Notional of {}", intent_id)))?;

        tracing::info!(
            %intent_id,
            user_id = %intent.user_id,
            index_id = %intent.index_id,
            side = %intent.side,
            amount = %intent.amount,
            limit_price = %intent.limit_price,
            "Intent submitted"
        );

        let mut state = self.state.write();
        let position = state.queue.partition_point(|entry| entry.notional <= notional);
        state.queue.insert(
            position,
            QueueEntry {
                notional,
                intent_id,
            },
        );
        state.intents.insert(intent_id, intent);

        Ok(intent_id)
    }

    pub fn cancel(&self, intent_id: IntentId) -> SolverResult<()> {
        let mut state = self.state.write();
        let intent = state
            .intents
            .get_mut(&intent_id)
            .ok_or(SolverError::IntentNotFound(intent_id))?;

        intent.cancel()?;
        state.remove_from_queue(intent_id);

        tracing::info!(%intent_id, "Intent cancelled");
        Ok(())
    }

    /// Pending intents in queue order
    pub fn pending_snapshot(&self) -> Vec<Intent> {
        let state = self.state.read();
        state
            .queue
            .iter()
            .filter_map(|entry| state.intents.get(&entry.intent_id))
            .cloned()
            .collect()
    }

    pub fn get_intent(&self, intent_id: IntentId) -> SolverResult<Intent> {
        self.state
            .read()
            .intents
            .get(&intent_id)
            .cloned()
            .ok_or(SolverError::IntentNotFound(intent_id))
    }

    pub fn len(&self) -> usize {
        self.state.read().intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().intents.is_empty()
    }

    pub fn queue_len(&self) -> usize {
        self.state.read().queue.len()
    }

    pub fn queue_entries(&self) -> Vec<QueueEntry> {
        self.state.read().queue.clone()
    }

    pub fn is_cancelled(&self, intent_id: IntentId) -> bool {
        self.state
            .read()
            .intents
            .get(&intent_id)
            .is_some_and(|intent| intent.status == IntentStatus::Cancelled)
    }

    /// Move pending intent to active, taking it out of the queue
    pub(crate) fn activate(
        &self,
        intent_id: IntentId,
        legs: HashMap<Symbol, IntentLeg>,
    ) -> SolverResult<()> {
        let mut state = self.state.write();
        let intent = state
            .intents
            .get_mut(&intent_id)
            .ok_or(SolverError::IntentNotFound(intent_id))?;

        intent.activate(legs)?;
        state.remove_from_queue(intent_id);
        Ok(())
    }

    /// Record fill of one leg, and return whether intent became fulfilled
    pub(crate) fn apply_leg_fill(
        &self,
        intent_id: IntentId,
        symbol: &Symbol,
        quantity: Amount,
        price: Amount,
    ) -> SolverResult<bool> {
        let mut state = self.state.write();
        let intent = state
            .intents
            .get_mut(&intent_id)
            .ok_or(SolverError::IntentNotFound(intent_id))?;

        intent.apply_leg_fill(symbol, quantity, price)
    }
}
