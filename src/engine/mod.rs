//! Match lifecycle engine: matchmaking, escrow, choice submission,
//! settlement and admin override.
//!
//! The engine owns every status transition a match can make. Each
//! operation is one transaction scoped to the match row (locked first,
//! wallets second), so concurrent joiners, choosers, the reaper and admin
//! cancels serialize per match and never partially apply.

pub mod config;
pub mod errors;
pub mod events;
pub mod manager;
pub mod messages;

pub use config::EngineConfig;
pub use errors::{EngineError, EngineResult};
pub use events::{MatchCompleted, MatchEvent, SeatResult};
pub use manager::{CancelOutcome, ChooseOutcome, JoinOutcome, MatchEngine};
pub use messages::{CancelIntent, ChooseIntent, IntentResponse, JoinIntent};
