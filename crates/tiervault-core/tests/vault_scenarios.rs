//! # Vault Scenarios
//!
//! End-to-end flows against the simulated ledger: holder round trips, the
//! circuit breaker, keeper payments, tier policies and emergency paths.

mod common;

#[cfg(test)]
mod tests {
    use super::common::*;
    use tiervault_core::circuit_breaker::RebalancePhase;
    use tiervault_core::math::ratio_from_int;
    use tiervault_core::sim::SimCall;
    use tiervault_core::*;

    #[test]
    fn test_sole_depositor_round_trip() {
        init_tracing();
        let (mut vault, ledger) = standard_vault();
        let alice = HOLDERS[0];
        let primary_before = ledger.wallet(alice, Asset::Primary);
        let reference_before = ledger.wallet(alice, Asset::Reference);

        let units = vault.deposit(alice, 6_000_000, 3_000).unwrap();
        assert_eq!(vault.pool().staked, vault.pool().pooled);
        let out = vault.redeem(alice, units).unwrap();

        assert_eq!(out, AssetPair::new(6_000_000, 3_000));
        assert_eq!(ledger.wallet(alice, Asset::Primary), primary_before);
        assert_eq!(ledger.wallet(alice, Asset::Reference), reference_before);
        assert_eq!(ledger.total_units(), 0);
        assert!(vault.pool().pooled.is_zero());
        assert!(vault.pool().staked.is_zero());
    }

    #[test]
    fn test_quantity_ratio_trigger() {
        let (mut vault, ledger) = standard_vault();
        vault.deposit(HOLDERS[0], 2_000, 1).unwrap();
        assert!(!vault.needs_rebalance().unwrap());

        // 25% over target; the corrective swap is dust so nothing executes
        vault.deposit(HOLDERS[1], 500, 0).unwrap();
        assert_eq!(vault.pool().pooled, AssetPair::new(2_500, 1));
        assert_eq!(vault.deviation_bps().unwrap(), Some(2_500));
        assert!(vault.needs_rebalance().unwrap());
        assert!(ledger.calls().iter().all(|call| *call != SimCall::Swap));
    }

    #[test]
    fn test_circuit_breaker_trips_after_three_failures() {
        init_tracing();
        let (mut vault, ledger) = drifted_vault();
        ledger.fail(SimCall::Swap);

        for attempt in 1..=3u8 {
            let err = vault.rebalance(KEEPER, ROUTER).unwrap_err();
            assert!(matches!(err, VaultError::SwapFailed(_)));
            assert_eq!(vault.rebalance_state().consecutive_failures, attempt);
            ledger.advance(60);
        }
        assert_eq!(vault.rebalance_state().phase(), RebalancePhase::Paused);
        assert!(vault
            .events()
            .iter()
            .any(|event| matches!(event, VaultEvent::CircuitBreakerTriggered { consecutive_failures: 3, .. })));
        assert_eq!(ledger.wallet(KEEPER, Asset::Primary), 0);

        // Paused: rejected even once the router recovers
        ledger.heal(SimCall::Swap);
        assert_eq!(vault.rebalance(KEEPER, ROUTER), Err(VaultError::RebalancePaused));
        assert!(!vault.needs_rebalance().unwrap());

        assert_eq!(vault.resume_rebalancing(KEEPER), Err(VaultError::Unauthorized(KEEPER)));
        vault.resume_rebalancing(ADMIN).unwrap();
        assert_eq!(vault.rebalance_state().consecutive_failures, 0);
        assert!(vault.rebalance(KEEPER, ROUTER).is_ok());
    }

    #[test]
    fn test_failures_spread_beyond_window_do_not_trip() {
        let (mut vault, ledger) = drifted_vault();
        ledger.fail(SimCall::Swap);
        for _ in 0..5 {
            assert!(vault.rebalance(KEEPER, ROUTER).is_err());
            ledger.advance(DEFAULT_FAILURE_WINDOW_SECS + 1);
        }
        assert_eq!(vault.rebalance_state().consecutive_failures, 1);
        assert_eq!(vault.rebalance_state().phase(), RebalancePhase::Idle);
    }

    #[test]
    fn test_keeper_reward_tracks_configured_rate() {
        let (mut vault, ledger) = drifted_vault();
        vault.set_keeper_reward_bps(ADMIN, 50).unwrap();

        let report = vault.rebalance(KEEPER, ROUTER).unwrap();
        // Post-swap pool is worth 4_500_000 primary; 0.5% of that
        assert_eq!(report.keeper_reward, 22_500);
        assert_eq!(ledger.wallet(KEEPER, Asset::Primary), 22_500);
        assert_eq!(vault.pool().pooled(Asset::Primary), 2_250_000 - 22_500);
        vault.pool().check_invariants().unwrap();
    }

    #[test]
    fn test_admin_rebalance_is_unpaid() {
        let (mut vault, ledger) = drifted_vault();
        let report = vault.rebalance(ADMIN, ROUTER).unwrap();
        assert_eq!(report.keeper_reward, 0);
        assert_eq!(ledger.wallet(ADMIN, Asset::Primary), 0);
        assert!(!vault
            .events()
            .iter()
            .any(|event| matches!(event, VaultEvent::KeeperPaid { .. })));
    }

    #[test]
    fn test_under_target_pool_buys_primary() {
        let (mut vault, ledger) = standard_vault();
        vault.deposit(HOLDERS[0], 2_000_000, 1_000).unwrap();
        ledger.fail(SimCall::Swap);
        vault.deposit(HOLDERS[1], 0, 500).unwrap();
        ledger.heal(SimCall::Swap);

        // Needs 3_000_000 primary, holds 2_000_000: buys 500 reference worth,
        // capped at half the 1_500 pooled reference
        let report = vault.rebalance(ADMIN, ROUTER).unwrap();
        assert_eq!(report.asset_in, Asset::Reference);
        assert_eq!(report.amount_in, 500);
        assert_eq!(report.amount_out, 1_000_000);
        assert_eq!(vault.pool().pooled, AssetPair::new(3_000_000, 1_000));
    }

    #[test]
    fn test_ratio_free_tier_never_rebalances() {
        let (mut vault, ledger) = vault_on(TierId(0), TierPolicy::standard(), config());
        vault.deposit(HOLDERS[0], 9_000_000, 1).unwrap();
        vault.deposit(HOLDERS[1], 0, 5_000).unwrap();
        ledger.advance(30 * 86_400);

        assert!(!vault.needs_rebalance().unwrap());
        assert_eq!(vault.deviation_bps().unwrap(), None);
        assert_eq!(vault.preview_swap().unwrap(), None);
        assert_eq!(vault.rebalance(KEEPER, ROUTER), Err(VaultError::RebalanceNotNeeded));
    }

    #[test]
    fn test_retargeting_tier_triggers_rebalance() {
        let (mut vault, ledger) = standard_vault();
        vault.deposit(HOLDERS[0], 2_000_000, 1_000).unwrap();
        vault.set_target_tier(ADMIN, TierId(3)).unwrap();
        assert_eq!(vault.deviation_bps().unwrap(), Some(5_000));

        let plan = vault.preview_swap().unwrap().unwrap();
        assert_eq!(plan.asset_in, Asset::Reference);
        let report = vault.rebalance(KEEPER, ROUTER).unwrap();
        assert_eq!(report.amount_in, plan.amount_in);
        assert!(vault.current_ratio().unwrap() > ratio_from_int(2_000));
        assert!(ledger.wallet(KEEPER, Asset::Primary) > 0);
    }

    fn strict_vault() -> (TierVault, sim::SimLedger) {
        let policy = TierPolicy::standard()
            .with_constrained_tier(
                TierId(4),
                ratio_from_int(2_000),
                TierConstraints::strict(10_000, 5),
            )
            .unwrap();
        vault_on(TierId(4), policy, config())
    }

    #[test]
    fn test_strict_tier_rejects_short_pairing() {
        let (mut vault, ledger) = strict_vault();
        // 10 reference implies 20_000 primary; 95% is 19_000
        let err = vault.deposit(HOLDERS[0], 18_999, 10).unwrap_err();
        assert!(matches!(
            err,
            VaultError::TierViolation(TierViolation::PrimaryBelowRequirement {
                supplied: 18_999,
                required: 20_000,
                tolerance_bps: 500,
            })
        ));
        assert_eq!(ledger.total_units(), 0);

        assert!(vault.deposit(HOLDERS[0], 19_000, 10).is_ok());
        assert!(matches!(
            vault.deposit(HOLDERS[1], 9_000, 5),
            Err(VaultError::TierViolation(TierViolation::PrimaryBelowMinimum { .. }))
        ));
    }

    #[test]
    fn test_strict_tier_tightens_trigger() {
        let (mut vault, ledger) = strict_vault();
        // 3% over target: under the generic 5% threshold, over the strict 2%
        ledger.fail(SimCall::Swap);
        vault.deposit(HOLDERS[0], 20_600_000, 10_000).unwrap();
        ledger.heal(SimCall::Swap);
        assert_eq!(vault.deviation_bps().unwrap(), Some(300));
        assert!(vault.needs_rebalance().unwrap());

        // Strict 0.5% slippage bound instead of the generic 1%
        let plan = vault.preview_swap().unwrap().unwrap();
        assert_eq!(plan.amount_in, 300_000);
        assert_eq!(plan.expected_out, 150);
        assert_eq!(plan.min_amount_out, 149);
    }

    #[test]
    fn test_emergency_mode_blocks_deposits_and_allows_exit() {
        let (mut vault, ledger) = strict_vault();
        let alice = HOLDERS[0];
        vault.deposit(alice, 20_000, 10).unwrap();
        vault.deposit(HOLDERS[1], 40_000, 20).unwrap();

        assert_eq!(vault.emergency_exit(alice), Err(VaultError::EmergencyModeInactive));
        vault.set_emergency_mode(ADMIN, true).unwrap();
        assert_eq!(
            vault.deposit(alice, 20_000, 10),
            Err(VaultError::TierViolation(TierViolation::EmergencyMode))
        );

        let out = vault.emergency_exit(alice).unwrap();
        assert_eq!(out, AssetPair::new(20_000, 10));
        assert_eq!(ledger.units_of(alice), 0);
        // Everything was released from the staking program
        assert!(vault.pool().staked.is_zero());
        assert_eq!(ledger.program_staked(Asset::Primary), 0);
        assert_eq!(vault.pool().pooled, AssetPair::new(40_000, 20));
    }

    #[test]
    fn test_redeem_fails_cleanly_when_unstaking_is_blocked() {
        let (mut vault, ledger) = standard_vault();
        let alice = HOLDERS[0];
        let units = vault.deposit(alice, 2_000_000, 1_000).unwrap();
        ledger.fail(SimCall::UnstakeJoint);
        ledger.fail(SimCall::Unstake(Asset::Primary));
        ledger.fail(SimCall::Unstake(Asset::Reference));

        assert!(matches!(
            vault.redeem(alice, units),
            Err(VaultError::InsufficientLiquidity { .. })
        ));
        assert_eq!(ledger.units_of(alice), units);
        assert_eq!(vault.pool().pooled, AssetPair::new(2_000_000, 1_000));

        ledger.heal_all();
        assert_eq!(vault.redeem(alice, units).unwrap(), AssetPair::new(2_000_000, 1_000));
    }

    #[test]
    fn test_compound_with_fees_grows_unit_price() {
        let mut config = config();
        config.fees = FeeParams {
            management_bps: 0,
            performance_bps: 2_000,
            protocol_share_bps: 5_000,
        };
        let (mut vault, ledger) = vault_on(TierId(2), TierPolicy::standard(), config);
        vault.deposit(HOLDERS[0], 2_000_000, 1_000).unwrap();
        let price_before = vault.unit_price().unwrap();

        ledger.accrue_rewards(200_000, 100);
        let report = vault.compound(KEEPER).unwrap();
        assert_eq!(report.rewards, AssetPair::new(200_000, 100));
        assert!(report.fee_units > 0);
        assert_eq!(ledger.units_of(ADMIN), report.fee_units);
        assert!(vault.unit_price().unwrap() > price_before);
        assert_eq!(vault.pool().staked, vault.pool().pooled);
    }

    #[test]
    fn test_compound_without_oracle_skips_fee_only() {
        let mut config = config();
        config.fees.performance_bps = 1_000;
        let (mut vault, ledger) = vault_on(TierId(2), TierPolicy::standard(), config);
        vault.deposit(HOLDERS[0], 2_000_000, 1_000).unwrap();
        ledger.accrue_rewards(2_000, 1);
        ledger.fail(SimCall::Oracle);

        let report = vault.compound(KEEPER).unwrap();
        assert_eq!(report.rewards, AssetPair::new(2_000, 1));
        assert_eq!(report.fee_units, 0);
        assert_eq!(vault.pool().pooled, AssetPair::new(2_002_000, 1_001));
    }

    #[test]
    fn test_every_safety_transition_emits_an_event() {
        let (mut vault, _ledger) = standard_vault();
        vault.pause_rebalancing(ADMIN).unwrap();
        vault.resume_rebalancing(ADMIN).unwrap();
        vault.pause(ADMIN).unwrap();
        vault.unpause(ADMIN).unwrap();
        let events = vault.drain_events();
        assert!(matches!(events[0], VaultEvent::RebalancePaused { by: ADMIN, .. }));
        assert!(matches!(events[1], VaultEvent::RebalanceResumed { by: ADMIN, .. }));
        assert!(matches!(events[2], VaultEvent::VaultPaused { .. }));
        assert!(matches!(events[3], VaultEvent::VaultUnpaused { .. }));
    }
}
