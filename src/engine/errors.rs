//! Engine error types.
//!
//! Every variant is non-fatal: operations return these as structured
//! results for the caller to relay or retry, and never crash a handler
//! task. Persistence failures roll back the in-flight unit and surface as
//! the retryable `StorageUnavailable`.

use crate::game::{MatchId, ParseChoiceError};
use crate::wallet::WalletError;
use thiserror::Error;

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Debit would drive the balance negative
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: i64, required: i64 },

    /// Match already has a full roster (or is no longer waiting)
    #[error("Match {0} is full")]
    MatchFull(MatchId),

    /// User already holds a seat in this match
    #[error("Already joined match {0}")]
    AlreadyJoined(MatchId),

    /// Operation requires an active match
    #[error("Match {0} is not active")]
    MatchNotActive(MatchId),

    /// Participant's choice is write-once
    #[error("Choice already made in match {0}")]
    AlreadyChosen(MatchId),

    /// No such match
    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),

    /// No such user
    #[error("User not found: {0}")]
    UserNotFound(i64),

    /// User holds no seat in this match
    #[error("Not seated in match {0}")]
    NotSeated(MatchId),

    /// Unrecognized choice string
    #[error("Invalid choice: {0}")]
    InvalidChoice(String),

    /// Bet amount must be positive
    #[error("Invalid bet amount: {0}")]
    InvalidBet(i64),

    /// Lock contention persisted past the retry budget; safe to retry
    #[error("Match is busy, try again")]
    Busy,

    /// Persistence failure; the atomic unit was rolled back, safe to retry
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Postgres surfaces a failed `FOR UPDATE NOWAIT` as `lock_not_available`.
fn is_lock_contention(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("55P03")
    )
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        if is_lock_contention(&e) {
            EngineError::Busy
        } else {
            EngineError::StorageUnavailable(e.to_string())
        }
    }
}

impl From<WalletError> for EngineError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::InsufficientFunds {
                available,
                required,
            } => EngineError::InsufficientFunds {
                available,
                required,
            },
            WalletError::Database(db) => EngineError::from(db),
            other => EngineError::StorageUnavailable(other.to_string()),
        }
    }
}

impl From<ParseChoiceError> for EngineError {
    fn from(e: ParseChoiceError) -> Self {
        EngineError::InvalidChoice(e.0)
    }
}

impl EngineError {
    /// Whether the caller may simply retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Busy | EngineError::StorageUnavailable(_))
    }

    /// Get a client-safe error message that doesn't leak internal detail.
    pub fn client_message(&self) -> String {
        match self {
            EngineError::StorageUnavailable(_) => "Service temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}
