//! Pot conservation tests for match settlement.
//!
//! These tests verify that settlements never create or destroy money
//! beyond the fee: for every decisive outcome the payouts plus the fee
//! equal the pot exactly, and every draw refunds each stake in full.

use rps_arena::game::Choice::{Paper, Rock, Scissors};
use rps_arena::game::{resolve, Outcome, Payout};

#[test]
fn test_decisive_conservation_across_bets_and_fees() {
    let test_cases = vec![
        (1000, 500),  // 10.00 bet, 5% fee
        (1000, 0),    // no fee
        (1, 500),     // minimal pot, fee floors to zero
        (333, 250),   // odd pot
        (999, 10000), // fee consumes the whole pot
        (25, 1),      // tiny fee rate
    ];

    for (bet, fee_bps) in test_cases {
        let s = resolve(&[(1, Rock), (2, Rock), (3, Paper)], bet, fee_bps);
        let paid: i64 = s.payouts.iter().map(|p| p.amount).sum();

        assert_eq!(
            paid + s.fee,
            bet * 3,
            "bet {} at {} bps: payouts {} + fee {} must equal pot {}",
            bet,
            fee_bps,
            paid,
            s.fee,
            bet * 3
        );
    }
}

#[test]
fn test_split_win_conservation_with_odd_pots() {
    // Two winners share; odd prizes leave a remainder unit that must land
    // on the earliest seat, never be dropped.
    let test_cases = vec![
        (1000, 500), // prize 2850 splits 1425/1425
        (333, 0),    // prize 999 splits 500/499
        (1, 0),      // prize 3 splits 2/1
        (501, 100),  // odd everything
    ];

    for (bet, fee_bps) in test_cases {
        let s = resolve(&[(1, Rock), (2, Scissors), (3, Rock)], bet, fee_bps);
        let paid: i64 = s.payouts.iter().map(|p| p.amount).sum();

        assert_eq!(paid + s.fee, s.pot, "bet {bet} at {fee_bps} bps");
        assert_eq!(s.payouts.len(), 2);
        assert!(
            s.payouts[0].amount >= s.payouts[1].amount,
            "remainder goes to the earliest seat"
        );
        assert!(s.payouts[0].amount - s.payouts[1].amount <= 1);
    }
}

#[test]
fn test_draw_refunds_are_exact() {
    for seats in [
        vec![(1, Rock), (2, Rock), (3, Rock)],
        vec![(1, Rock), (2, Paper), (3, Scissors)],
        vec![(1, Paper), (2, Paper)],
    ] {
        let s = resolve(&seats, 777, 500);
        assert_eq!(s.outcome, Outcome::Draw);
        assert_eq!(s.fee, 0);
        assert_eq!(
            s.payouts,
            seats
                .iter()
                .map(|&(user_id, _)| Payout {
                    user_id,
                    amount: 777
                })
                .collect::<Vec<_>>()
        );
    }
}

#[test]
fn test_full_fee_pot_pays_nothing() {
    // A 100% fee is legal configuration; the winner set still resolves
    // and the payout is simply zero.
    let s = resolve(&[(1, Paper), (2, Rock), (3, Rock)], 100, 10_000);
    assert_eq!(s.fee, 300);
    let paid: i64 = s.payouts.iter().map(|p| p.amount).sum();
    assert_eq!(paid, 0);
}

#[test]
fn test_two_seat_conservation() {
    let s = resolve(&[(8, Scissors), (9, Paper)], 450, 500);
    assert_eq!(
        s.outcome,
        Outcome::Decisive {
            winning_choice: Scissors
        }
    );
    let paid: i64 = s.payouts.iter().map(|p| p.amount).sum();
    assert_eq!(paid + s.fee, 900);
    assert_eq!(s.winner_id, Some(8));
}
