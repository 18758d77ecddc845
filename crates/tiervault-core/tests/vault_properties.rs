//! # Property Tests
//!
//! Randomized deposit/redeem sequences checked against the accounting
//! invariants, plus purity of the rebalance trigger.

mod common;

use proptest::prelude::*;
use tiervault_core::ratio::{needs_rebalance, TriggerInputs};
use tiervault_core::*;

use common::*;

#[derive(Debug, Clone)]
enum Op {
    Deposit { holder: usize, reference: u128, skew_bps: u16 },
    Redeem { holder: usize, fraction_bps: u16 },
    Advance(i64),
}

prop_compose! {
    fn deposit_strategy()(
        holder in 0usize..3,
        reference in 1u128..50_000,
        skew_bps in 0u16..2_000
    ) -> Op {
        Op::Deposit { holder, reference, skew_bps }
    }
}

prop_compose! {
    fn redeem_strategy()(
        holder in 0usize..3,
        fraction_bps in 1u16..=10_000
    ) -> Op {
        Op::Redeem { holder, fraction_bps }
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => deposit_strategy(),
        2 => redeem_strategy(),
        1 => (0i64..7_200).prop_map(Op::Advance),
    ]
}

fn apply(vault: &mut TierVault, ledger: &sim::SimLedger, op: &Op) {
    match *op {
        Op::Deposit {
            holder,
            reference,
            skew_bps,
        } => {
            // Around 2000:1, skewed up to 20% toward primary
            let primary = reference * 2_000 * (10_000 + skew_bps as u128) / 10_000;
            vault.deposit(HOLDERS[holder], primary, reference).unwrap();
        }
        Op::Redeem {
            holder,
            fraction_bps,
        } => {
            let held = ledger.units_of(HOLDERS[holder]);
            let units = held * fraction_bps as u128 / 10_000;
            if units > 0 {
                vault.redeem(HOLDERS[holder], units).unwrap();
            }
        }
        Op::Advance(secs) => ledger.advance(secs),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_units_always_sum_to_total(ops in prop::collection::vec(op_strategy(), 1..25)) {
        let (mut vault, ledger) = standard_vault();
        for op in &ops {
            apply(&mut vault, &ledger, op);
            prop_assert_eq!(ledger.sum_of_holder_units(), ledger.total_units());
        }
    }

    #[test]
    fn prop_staked_never_exceeds_pooled(ops in prop::collection::vec(op_strategy(), 1..25)) {
        let (mut vault, ledger) = standard_vault();
        for op in &ops {
            apply(&mut vault, &ledger, op);
            let pool = vault.pool();
            for asset in Asset::BOTH {
                prop_assert!(pool.staked(asset) <= pool.pooled(asset));
                prop_assert_eq!(
                    pool.pooled(asset),
                    ledger.vault_wallet(asset) + ledger.program_staked(asset)
                );
            }
        }
    }

    #[test]
    fn prop_sole_depositor_round_trip(reference in 1u128..1_000_000, primary in 0u128..1_000_000_000) {
        // Ratio-free tier: no rebalancing between the two calls
        let (mut vault, ledger) = vault_on(TierId(0), TierPolicy::standard(), config());
        let units = vault.deposit(HOLDERS[0], primary, reference).unwrap();
        let out = vault.redeem(HOLDERS[0], units).unwrap();
        prop_assert_eq!(out, AssetPair::new(primary, reference));
        prop_assert_eq!(ledger.total_units(), 0);
    }

    #[test]
    fn prop_needs_rebalance_is_pure(
        primary in 0u128..10_000_000,
        reference in 0u128..10_000,
        ratio in 0u128..5_000,
        now in 0i64..100_000,
        last_rebalance in 0i64..100_000,
        threshold_bps in 1u16..2_000
    ) {
        let inputs = TriggerInputs {
            pooled: AssetPair::new(primary, reference),
            target_ratio: math::ratio_from_int(ratio),
            params: RebalanceParams { threshold_bps, ..RebalanceParams::default() },
            rebalance_paused: false,
            last_rebalance,
            now,
        };
        let first = needs_rebalance(&inputs).unwrap();
        prop_assert_eq!(first, needs_rebalance(&inputs).unwrap());
        if ratio == 0 {
            prop_assert!(!first);
        }
    }

    #[test]
    fn prop_engine_trigger_has_no_side_effects(skew_bps in 0u16..5_000) {
        let (mut vault, ledger) = standard_vault();
        ledger.fail(sim::SimCall::Swap);
        let primary = 2_000_000 * (10_000 + skew_bps as u128) / 10_000;
        vault.deposit(HOLDERS[0], primary, 1_000).unwrap();
        let pool = vault.pool().clone();
        let first = vault.needs_rebalance().unwrap();
        prop_assert_eq!(first, vault.needs_rebalance().unwrap());
        prop_assert_eq!(vault.pool(), &pool);
    }
}
