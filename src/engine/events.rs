//! Outbound engine events.
//!
//! Adapters (chat bot, dashboard, animation layers) subscribe to these to
//! message players when a match fills or settles. Events are emitted only
//! after the owning transaction commits, so a subscriber never observes a
//! state that later rolled back.

use crate::game::{Choice, MatchId, Outcome, Payout};
use serde::{Deserialize, Serialize};

/// One seat's final line in a completed match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatResult {
    pub user_id: i64,
    pub choice: Choice,
    /// Amount credited back to this seat; zero for losers.
    pub payout: i64,
}

/// Payload for a settled match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCompleted {
    pub match_id: MatchId,
    pub outcome: Outcome,
    /// Sole winner, if any; `None` for draws and split wins.
    pub winner_id: Option<i64>,
    pub pot: i64,
    pub fee: i64,
    pub seats: Vec<SeatResult>,
}

/// Notification sent when match state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MatchEvent {
    /// All seats taken; the match went active and choices are open.
    MatchFilled {
        match_id: MatchId,
        bet_amount: i64,
        seat_count: usize,
        participants: Vec<i64>,
    },

    /// Match settled (winner paid or draw refunded).
    MatchCompleted(MatchCompleted),

    /// Match cancelled (admin or reaper); every seat refunded.
    MatchCancelled {
        match_id: MatchId,
        refunds: Vec<Payout>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Choice;

    #[test]
    fn events_serialize_with_tag() {
        let event = MatchEvent::MatchFilled {
            match_id: 7,
            bet_amount: 1000,
            seat_count: 3,
            participants: vec![1, 2, 3],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "match_filled");
        assert_eq!(json["seat_count"], 3);
    }

    #[test]
    fn completed_event_carries_per_seat_results() {
        let event = MatchEvent::MatchCompleted(MatchCompleted {
            match_id: 9,
            outcome: Outcome::Decisive {
                winning_choice: Choice::Paper,
            },
            winner_id: Some(2),
            pot: 3000,
            fee: 150,
            seats: vec![
                SeatResult {
                    user_id: 1,
                    choice: Choice::Rock,
                    payout: 0,
                },
                SeatResult {
                    user_id: 2,
                    choice: Choice::Paper,
                    payout: 2850,
                },
            ],
        });
        let json = serde_json::to_string(&event).unwrap();
        let back: MatchEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
