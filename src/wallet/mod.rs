//! Wallet module providing balance management over an append-only ledger.
//!
//! This module implements:
//! - The two atomic funds primitives, `debit` and `credit`
//! - An append-only ledger entry for every balance-affecting event
//! - Unique external references to prevent duplicate application
//! - Pending/settled/reversed entry states for payment-gateway flows
//!
//! Every other component moves money exclusively through these primitives;
//! nothing else writes `wallets.balance`.

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{WalletError, WalletResult};
pub use manager::WalletManager;
pub use models::{EntryKind, EntryStatus, LedgerEntry, Wallet};
