//! # RPS Arena
//!
//! A wagered three-player rock-paper-scissors match engine.
//!
//! Players stake money into a shared pot, make simultaneous choices, and a
//! single winner (or a refunding draw) is computed and paid out. The crate
//! implements the match lifecycle and settlement engine: atomic seat
//! allocation, escrow of funds, winner determination, payout and fee
//! calculation, and timeout-driven cleanup, all correct under concurrent
//! access from multiple players and a background reaper.
//!
//! ## Architecture
//!
//! - [`wallet`]: the two atomic funds primitives (debit/credit) over an
//!   append-only ledger; the only path that ever moves a balance
//! - [`game`]: pure choice/match types and the settlement resolver
//! - [`engine`]: matchmaking, escrow, choice submission, settlement and
//!   admin override, each as one per-match serializable unit
//! - [`reaper`]: periodic cancellation of stale matches and force-start of
//!   two-player matches that waited too long
//! - [`gateway`]: the boundary contract for an external payment provider
//! - [`db`]: PostgreSQL pool, configuration and query timeouts
//!
//! ## Example
//!
//! ```no_run
//! use rps_arena::db::{Database, DatabaseConfig};
//! use rps_arena::engine::{EngineConfig, MatchEngine};
//! use rps_arena::game::Choice;
//! use rps_arena::reaper::Reaper;
//! use rps_arena::wallet::WalletManager;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Database::new(&DatabaseConfig::from_env()).await?;
//!     let pool = Arc::new(db.pool().clone());
//!
//!     let wallet = WalletManager::new(pool.clone());
//!     let engine = MatchEngine::new(pool.clone(), wallet, EngineConfig::from_env());
//!     Reaper::new(pool, engine.clone()).spawn();
//!
//!     let seat = engine.join(1, 1000).await?;
//!     engine.choose(seat.match_id, 1, Choice::Rock).await?;
//!     Ok(())
//! }
//! ```

/// PostgreSQL pool, configuration and query timeout helpers.
pub mod db;

/// Match lifecycle engine: matchmaking, settlement, admin override.
pub mod engine;

/// Funds gateway boundary for deposits and withdrawals.
pub mod gateway;

/// Pure game types and the settlement resolver.
pub mod game;

/// Timeout-driven background cleanup.
pub mod reaper;

/// Atomic debit/credit over the append-only ledger.
pub mod wallet;

pub use engine::{EngineConfig, EngineError, IntentResponse, MatchEngine, MatchEvent};
pub use game::{Choice, MatchStatus, MAX_SEATS};
pub use reaper::Reaper;
pub use wallet::WalletManager;
