use thiserror::Error;
use uuid::Uuid;

use crate::ledger::LedgerError;
use crate::models::Role;

/// Domain error shared by the store and the HTTP layer.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The toy is already in someone's sack (or was never released).
    #[error("toy {0} is no longer available")]
    ToyUnavailable(Uuid),

    #[error("toy {0} is not in this sack")]
    NotInSack(Uuid),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{required} role required")]
    Forbidden { required: Role },

    /// Storage or transport failure. The message is for logs, not users.
    #[error("backend failure: {0}")]
    Backend(String),
}

impl MarketError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        MarketError::NotFound { entity, id: id.to_string() }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        MarketError::Validation(msg.into())
    }
}

pub type MarketResult<T> = Result<T, MarketError>;
