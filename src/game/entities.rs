//! Match, participant and choice models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Match ID type
pub type MatchId = i64;

/// Maximum seats in a match. The matchmaker fills to this count before the
/// match goes active on its own.
pub const MAX_SEATS: usize = 3;

/// Minimum seats a match can be settled with (reaper force-start floor).
pub const MIN_SEATS: usize = 2;

/// A player's choice in a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Rock,
    Paper,
    Scissors,
}

impl Choice {
    /// The fixed dominance relation: rock beats scissors, paper beats rock,
    /// scissors beats paper.
    pub fn beats(self, other: Choice) -> bool {
        matches!(
            (self, other),
            (Choice::Rock, Choice::Scissors)
                | (Choice::Paper, Choice::Rock)
                | (Choice::Scissors, Choice::Paper)
        )
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::Rock => write!(f, "rock"),
            Choice::Paper => write!(f, "paper"),
            Choice::Scissors => write!(f, "scissors"),
        }
    }
}

/// Error returned when parsing an unrecognized choice string.
#[derive(Debug, Error)]
#[error("not a valid choice: {0}")]
pub struct ParseChoiceError(pub String);

impl FromStr for Choice {
    type Err = ParseChoiceError;

    /// Accepts the full word or its first letter, case-insensitively, the
    /// way chat adapters pass them through.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rock" | "r" => Ok(Choice::Rock),
            "paper" | "p" => Ok(Choice::Paper),
            "scissors" | "s" => Ok(Choice::Scissors),
            _ => Err(ParseChoiceError(s.to_string())),
        }
    }
}

/// Match lifecycle status. Transitions are monotonic: waiting -> active ->
/// completed, with cancelled reachable from waiting or active only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Waiting,
    Active,
    Completed,
    Cancelled,
}

impl MatchStatus {
    /// Parse a database status string. Unknown strings map to `Cancelled`
    /// so a corrupt row reads as terminal rather than joinable.
    pub fn from_db(s: &str) -> Self {
        match s {
            "waiting" => MatchStatus::Waiting,
            "active" => MatchStatus::Active,
            "completed" => MatchStatus::Completed,
            _ => MatchStatus::Cancelled,
        }
    }

    /// Whether the match has reached a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Cancelled)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStatus::Waiting => write!(f, "waiting"),
            MatchStatus::Active => write!(f, "active"),
            MatchStatus::Completed => write!(f, "completed"),
            MatchStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Match row model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub bet_amount: i64,
    pub status: MatchStatus,
    pub winner_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A user's committed seat in a match. `choice` is write-once; `None` means
/// the seat has not chosen yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub match_id: MatchId,
    pub user_id: i64,
    pub choice: Option<Choice>,
    pub joined_at: DateTime<Utc>,
}

/// User row model with cumulative match counters. Balances live in the
/// wallet, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub matches_played: i64,
    pub matches_won: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beats_relation_is_a_cycle() {
        assert!(Choice::Rock.beats(Choice::Scissors));
        assert!(Choice::Paper.beats(Choice::Rock));
        assert!(Choice::Scissors.beats(Choice::Paper));

        assert!(!Choice::Scissors.beats(Choice::Rock));
        assert!(!Choice::Rock.beats(Choice::Paper));
        assert!(!Choice::Paper.beats(Choice::Scissors));
    }

    #[test]
    fn no_choice_beats_itself() {
        for c in [Choice::Rock, Choice::Paper, Choice::Scissors] {
            assert!(!c.beats(c));
        }
    }

    #[test]
    fn parse_accepts_words_and_letters() {
        assert_eq!("rock".parse::<Choice>().unwrap(), Choice::Rock);
        assert_eq!("  Paper ".parse::<Choice>().unwrap(), Choice::Paper);
        assert_eq!("S".parse::<Choice>().unwrap(), Choice::Scissors);
        assert!("lizard".parse::<Choice>().is_err());
        assert!("".parse::<Choice>().is_err());
    }

    #[test]
    fn status_round_trips_through_db_strings() {
        for s in [
            MatchStatus::Waiting,
            MatchStatus::Active,
            MatchStatus::Completed,
            MatchStatus::Cancelled,
        ] {
            assert_eq!(MatchStatus::from_db(&s.to_string()), s);
        }
        // Unknown strings read as terminal.
        assert_eq!(MatchStatus::from_db("exploded"), MatchStatus::Cancelled);
        assert!(MatchStatus::from_db("exploded").is_terminal());
    }
}
