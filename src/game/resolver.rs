//! Winner determination and payout math.
//!
//! [`resolve`] is a pure function of the seated choices, the bet amount, and
//! the fee rate; repeated invocation over the same inputs yields the same
//! settlement. All amounts are integer minor currency units, and every
//! settlement satisfies `sum(payouts) + fee == bet_amount * seat_count`.

use super::entities::Choice;
use serde::{Deserialize, Serialize};

/// Fee rates are expressed in basis points (1/100th of a percent).
pub const FEE_DENOMINATOR: i64 = 10_000;

/// Outcome of a settled match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Outcome {
    /// Nobody dominates: one distinct choice across all seats, or all three
    /// choices present on a three-seat match. Every seat is refunded and no
    /// fee applies.
    Draw,
    /// Exactly two distinct choices were present; the holders of the
    /// dominating value share the pot less the fee.
    Decisive { winning_choice: Choice },
}

/// A single credit owed to a user by the settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub user_id: i64,
    pub amount: i64,
}

/// The full settlement for one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub outcome: Outcome,
    /// Total escrowed funds: `bet_amount * seat_count`.
    pub pot: i64,
    /// House cut, zero on draws. The only value not returned to players.
    pub fee: i64,
    /// Refunds (draw) or winnings (decisive), in seat order.
    pub payouts: Vec<Payout>,
    /// Members of the winner set, in seat order; empty on a draw.
    pub winner_ids: Vec<i64>,
    /// Set only when the winner set has exactly one member. A draw or a
    /// split win records no single winner.
    pub winner_id: Option<i64>,
}

/// Compute the settlement for a fully-seated match.
///
/// `seats` must be in join order (earliest first) with distinct user ids;
/// the engine guarantees two or three seats, each with a choice. The
/// function is seat-count-generic: with two seats the same rules produce
/// the natural two-player game (tie refunds, otherwise the beating choice
/// wins), which is what makes reaper force-starts sound.
///
/// When the winner set has several members the pot (less fee) is split
/// evenly; remainder units go one each to the earliest-seated winners so
/// conservation is exact.
pub fn resolve(seats: &[(i64, Choice)], bet_amount: i64, fee_bps: u32) -> Settlement {
    debug_assert!((crate::game::MIN_SEATS..=crate::game::MAX_SEATS).contains(&seats.len()));
    debug_assert!(bet_amount > 0);
    debug_assert!(i64::from(fee_bps) <= FEE_DENOMINATOR);

    let pot = bet_amount * seats.len() as i64;

    let mut distinct: Vec<Choice> = Vec::with_capacity(3);
    for (_, choice) in seats {
        if !distinct.contains(choice) {
            distinct.push(*choice);
        }
    }

    // One value everywhere, or all three on a full match: nothing dominates.
    if distinct.len() != 2 {
        return Settlement {
            outcome: Outcome::Draw,
            pot,
            fee: 0,
            payouts: seats
                .iter()
                .map(|&(user_id, _)| Payout {
                    user_id,
                    amount: bet_amount,
                })
                .collect(),
            winner_ids: Vec::new(),
            winner_id: None,
        };
    }

    let winning_choice = if distinct[0].beats(distinct[1]) {
        distinct[0]
    } else {
        distinct[1]
    };

    let winner_ids: Vec<i64> = seats
        .iter()
        .filter(|&&(_, choice)| choice == winning_choice)
        .map(|&(user_id, _)| user_id)
        .collect();

    let fee = pot * i64::from(fee_bps) / FEE_DENOMINATOR;
    let prize = pot - fee;
    let share = prize / winner_ids.len() as i64;
    let remainder = prize % winner_ids.len() as i64;

    let payouts = winner_ids
        .iter()
        .enumerate()
        .map(|(i, &user_id)| Payout {
            user_id,
            amount: share + i64::from((i as i64) < remainder),
        })
        .collect();

    Settlement {
        outcome: Outcome::Decisive { winning_choice },
        pot,
        fee,
        winner_id: (winner_ids.len() == 1).then(|| winner_ids[0]),
        winner_ids,
        payouts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Choice::{Paper, Rock, Scissors};

    fn total_paid(s: &Settlement) -> i64 {
        s.payouts.iter().map(|p| p.amount).sum()
    }

    #[test]
    fn three_distinct_choices_draw_and_refund() {
        // Rock/Paper/Scissors at bet 10.00: everyone gets their stake back.
        let s = resolve(&[(1, Rock), (2, Paper), (3, Scissors)], 1000, 500);
        assert_eq!(s.outcome, Outcome::Draw);
        assert_eq!(s.fee, 0);
        assert_eq!(s.pot, 3000);
        assert_eq!(
            s.payouts,
            vec![
                Payout { user_id: 1, amount: 1000 },
                Payout { user_id: 2, amount: 1000 },
                Payout { user_id: 3, amount: 1000 },
            ]
        );
        assert_eq!(s.winner_id, None);
        assert!(s.winner_ids.is_empty());
    }

    #[test]
    fn identical_choices_draw() {
        let s = resolve(&[(1, Rock), (2, Rock), (3, Rock)], 500, 500);
        assert_eq!(s.outcome, Outcome::Draw);
        assert_eq!(total_paid(&s), s.pot);
    }

    #[test]
    fn sole_winner_takes_pot_less_fee() {
        // Rock/Rock/Paper at bet 10.00 with a 5% fee: pot 30.00, fee 1.50,
        // the paper holder collects 28.50.
        let s = resolve(&[(1, Rock), (2, Rock), (3, Paper)], 1000, 500);
        assert_eq!(
            s.outcome,
            Outcome::Decisive { winning_choice: Paper }
        );
        assert_eq!(s.pot, 3000);
        assert_eq!(s.fee, 150);
        assert_eq!(s.payouts, vec![Payout { user_id: 3, amount: 2850 }]);
        assert_eq!(s.winner_id, Some(3));
        assert_eq!(s.winner_ids, vec![3]);
    }

    #[test]
    fn split_win_divides_pot_evenly() {
        // Two scissors beat one paper: winners split, no single winner_id.
        let s = resolve(&[(1, Scissors), (2, Paper), (3, Scissors)], 1000, 0);
        assert_eq!(
            s.outcome,
            Outcome::Decisive { winning_choice: Scissors }
        );
        assert_eq!(s.winner_ids, vec![1, 3]);
        assert_eq!(s.winner_id, None);
        assert_eq!(s.payouts, vec![
            Payout { user_id: 1, amount: 1500 },
            Payout { user_id: 3, amount: 1500 },
        ]);
    }

    #[test]
    fn split_win_remainder_goes_to_earliest_seat() {
        // Pot 3 * 333 = 999, fee 0, split 2 ways: 500 + 499.
        let s = resolve(&[(7, Rock), (8, Scissors), (9, Rock)], 333, 0);
        assert_eq!(s.payouts, vec![
            Payout { user_id: 7, amount: 500 },
            Payout { user_id: 9, amount: 499 },
        ]);
        assert_eq!(total_paid(&s) + s.fee, s.pot);
    }

    #[test]
    fn fee_rounds_down_and_conservation_holds() {
        // Pot 3, 5% fee floors to 0; the winner takes the whole pot.
        let s = resolve(&[(1, Rock), (2, Rock), (3, Paper)], 1, 500);
        assert_eq!(s.fee, 0);
        assert_eq!(total_paid(&s), 3);
    }

    #[test]
    fn two_seat_match_decides_by_direct_dominance() {
        let s = resolve(&[(1, Rock), (2, Scissors)], 1000, 500);
        assert_eq!(s.outcome, Outcome::Decisive { winning_choice: Rock });
        assert_eq!(s.pot, 2000);
        assert_eq!(s.fee, 100);
        assert_eq!(s.payouts, vec![Payout { user_id: 1, amount: 1900 }]);
        assert_eq!(s.winner_id, Some(1));
    }

    #[test]
    fn two_seat_tie_is_a_draw() {
        let s = resolve(&[(1, Paper), (2, Paper)], 1000, 500);
        assert_eq!(s.outcome, Outcome::Draw);
        assert_eq!(s.fee, 0);
        assert_eq!(total_paid(&s), 2000);
    }

    #[test]
    fn settlement_is_deterministic() {
        let seats = [(4, Rock), (5, Paper), (6, Rock)];
        let a = resolve(&seats, 250, 250);
        let b = resolve(&seats, 250, 250);
        assert_eq!(a, b);
    }
}
