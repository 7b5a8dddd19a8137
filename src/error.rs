use thiserror::Error;

use crate::{
    index::index_definition::IndexId,
    solver::{agg_order::AggOrderId, intent::IntentId},
};

/// Errors returned from index, ledger and solver operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("Index not found: {0}")]
    IndexNotFound(IndexId),

    #[error("Intent not found: {0}")]
    IntentNotFound(IntentId),

    #[error("Aggregated order not found: {0}")]
    AggOrderNotFound(AggOrderId),

    #[error("Price unavailable: {0}")]
    PriceUnavailable(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Execution gateway error: {0}")]
    ExecutionGatewayError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Math overflow: {0}")]
    MathOverflow(String),
}

pub type SolverResult<T> = std::result::Result<T, SolverError>;
