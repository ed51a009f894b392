//! Wallet error types.

use thiserror::Error;

/// Wallet errors
#[derive(Debug, Error)]
pub enum WalletError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Insufficient funds for a debit. Never silently clamped.
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: i64, required: i64 },

    /// Wallet not found
    #[error("Wallet not found for user {0}")]
    WalletNotFound(i64),

    /// Ledger reference already used
    #[error("Duplicate ledger reference: {0}")]
    DuplicateReference(String),

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Crediting would overflow the balance
    #[error("Balance overflow")]
    BalanceOverflow,

    /// No pending entry matches the reference
    #[error("No pending ledger entry for reference {0}")]
    EntryNotFound(String),
}

impl WalletError {
    /// Get a client-safe error message that doesn't leak sensitive
    /// information. Database errors are sanitized and user IDs redacted.
    pub fn client_message(&self) -> String {
        match self {
            WalletError::Database(_) => "Internal server error".to_string(),
            WalletError::WalletNotFound(_) => "Wallet not found".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;
