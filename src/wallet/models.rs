//! Wallet data models.

use crate::game::MatchId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wallet model. `balance` is a cached value in minor currency units,
/// derived from the ledger and never negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: i64,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ledger entry model (append-only audit trail).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: i64,
    pub match_id: Option<MatchId>,
    /// Signed amount: negative for debits, positive for credits.
    pub amount: i64,
    pub balance_after: i64,
    pub kind: EntryKind,
    pub status: EntryStatus,
    /// Unique external reference; doubles as the idempotency key.
    pub reference: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Bet,
    Win,
    Refund,
    AdminAdjustment,
    Deposit,
    Withdrawal,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Bet => write!(f, "bet"),
            EntryKind::Win => write!(f, "win"),
            EntryKind::Refund => write!(f, "refund"),
            EntryKind::AdminAdjustment => write!(f, "admin_adjustment"),
            EntryKind::Deposit => write!(f, "deposit"),
            EntryKind::Withdrawal => write!(f, "withdrawal"),
        }
    }
}

impl EntryKind {
    pub fn from_db(s: &str) -> Self {
        match s {
            "bet" => EntryKind::Bet,
            "win" => EntryKind::Win,
            "refund" => EntryKind::Refund,
            "deposit" => EntryKind::Deposit,
            "withdrawal" => EntryKind::Withdrawal,
            _ => EntryKind::AdminAdjustment,
        }
    }
}

/// Entry status. Engine-written entries are always `Settled`; only
/// gateway-originated withdrawals pass through `Pending`, and `Reversed`
/// is their terminal failure state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Settled,
    Reversed,
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryStatus::Pending => write!(f, "pending"),
            EntryStatus::Settled => write!(f, "settled"),
            EntryStatus::Reversed => write!(f, "reversed"),
        }
    }
}

impl EntryStatus {
    pub fn from_db(s: &str) -> Self {
        match s {
            "pending" => EntryStatus::Pending,
            "reversed" => EntryStatus::Reversed,
            _ => EntryStatus::Settled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_kind_round_trips() {
        for kind in [
            EntryKind::Bet,
            EntryKind::Win,
            EntryKind::Refund,
            EntryKind::AdminAdjustment,
            EntryKind::Deposit,
            EntryKind::Withdrawal,
        ] {
            assert_eq!(EntryKind::from_db(&kind.to_string()), kind);
        }
    }

    #[test]
    fn entry_status_round_trips() {
        for status in [
            EntryStatus::Pending,
            EntryStatus::Settled,
            EntryStatus::Reversed,
        ] {
            assert_eq!(EntryStatus::from_db(&status.to_string()), status);
        }
    }
}
