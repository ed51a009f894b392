/// Property-based tests for match settlement using proptest
///
/// These tests verify the resolver's conservation and determinism
/// guarantees across randomly generated seat configurations, bet amounts
/// and fee rates, for both two- and three-seat matches.
use proptest::prelude::*;
use rps_arena::game::{resolve, Choice, Outcome};

// Strategy to generate one of the three choices
fn choice_strategy() -> impl Strategy<Value = Choice> {
    prop_oneof![
        Just(Choice::Rock),
        Just(Choice::Paper),
        Just(Choice::Scissors),
    ]
}

// Strategy to generate a seated match: 2 or 3 seats with distinct user ids
fn seats_strategy() -> impl Strategy<Value = Vec<(i64, Choice)>> {
    prop::collection::vec(choice_strategy(), 2..=3)
        .prop_map(|choices| {
            choices
                .into_iter()
                .enumerate()
                .map(|(i, c)| (i as i64 + 1, c))
                .collect()
        })
}

// Bets stay in a realistic range; fees span zero to the whole pot.
const MAX_BET: i64 = 1_000_000;

proptest! {
    #[test]
    fn pot_is_always_conserved(
        seats in seats_strategy(),
        bet in 1..MAX_BET,
        fee_bps in 0u32..=10_000,
    ) {
        let settlement = resolve(&seats, bet, fee_bps);
        let paid: i64 = settlement.payouts.iter().map(|p| p.amount).sum();

        prop_assert_eq!(settlement.pot, bet * seats.len() as i64);
        prop_assert_eq!(
            paid + settlement.fee,
            settlement.pot,
            "payouts {} + fee {} must equal pot {}",
            paid,
            settlement.fee,
            settlement.pot
        );
    }

    #[test]
    fn draws_refund_exactly_and_carry_no_fee(
        seats in seats_strategy(),
        bet in 1..MAX_BET,
        fee_bps in 0u32..=10_000,
    ) {
        let settlement = resolve(&seats, bet, fee_bps);

        if settlement.outcome == Outcome::Draw {
            prop_assert_eq!(settlement.fee, 0);
            prop_assert_eq!(settlement.payouts.len(), seats.len());
            for payout in &settlement.payouts {
                prop_assert_eq!(payout.amount, bet);
            }
            prop_assert!(settlement.winner_ids.is_empty());
            prop_assert_eq!(settlement.winner_id, None);
        }
    }

    #[test]
    fn winners_hold_the_winning_choice(
        seats in seats_strategy(),
        bet in 1..MAX_BET,
        fee_bps in 0u32..=10_000,
    ) {
        let settlement = resolve(&seats, bet, fee_bps);

        if let Outcome::Decisive { winning_choice } = settlement.outcome {
            // Every winner holds the winning value, every holder is a winner.
            let holders: Vec<i64> = seats
                .iter()
                .filter(|&&(_, c)| c == winning_choice)
                .map(|&(uid, _)| uid)
                .collect();
            prop_assert_eq!(&settlement.winner_ids, &holders);

            // The winning value beats the other value present.
            for &(_, c) in &seats {
                if c != winning_choice {
                    prop_assert!(winning_choice.beats(c));
                }
            }

            // Payouts go to winners only and never exceed one unit of spread.
            prop_assert_eq!(settlement.payouts.len(), holders.len());
            let min = settlement.payouts.iter().map(|p| p.amount).min().unwrap();
            let max = settlement.payouts.iter().map(|p| p.amount).max().unwrap();
            prop_assert!(max - min <= 1, "even split may differ by at most 1 unit");
        }
    }

    #[test]
    fn sole_winner_id_matches_singleton_winner_set(
        seats in seats_strategy(),
        bet in 1..MAX_BET,
        fee_bps in 0u32..=10_000,
    ) {
        let settlement = resolve(&seats, bet, fee_bps);

        match settlement.winner_ids.len() {
            1 => prop_assert_eq!(settlement.winner_id, Some(settlement.winner_ids[0])),
            _ => prop_assert_eq!(settlement.winner_id, None),
        }
    }

    #[test]
    fn settlement_is_a_pure_function(
        seats in seats_strategy(),
        bet in 1..MAX_BET,
        fee_bps in 0u32..=10_000,
    ) {
        prop_assert_eq!(
            resolve(&seats, bet, fee_bps),
            resolve(&seats, bet, fee_bps)
        );
    }

    #[test]
    fn fee_never_exceeds_its_rate(
        seats in seats_strategy(),
        bet in 1..MAX_BET,
        fee_bps in 0u32..=10_000,
    ) {
        let settlement = resolve(&seats, bet, fee_bps);
        // Floored integer fee: at most rate * pot, short by less than one unit.
        prop_assert!(settlement.fee <= settlement.pot * i64::from(fee_bps) / 10_000);
        prop_assert!(settlement.fee >= 0);
    }
}
