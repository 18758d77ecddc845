//! # Reward Compounder
//!
//! Claims staking rewards through both claim entry points, credits what
//! arrived to the pool, takes the performance fee, then runs the same
//! rebalance-if-needed and restake passes as a deposit.

use tracing::{info, warn};

use super::TierVault;
use crate::errors::VaultResult;
use crate::events::VaultEvent;
use crate::math::safe_add_u128;
use crate::types::{AccountId, Asset, AssetPair};

/// What one compounding pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub struct CompoundReport {
    /// Rewards received, measured as custody deltas
    pub rewards: AssetPair,
    /// Units minted as performance fee
    pub fee_units: u128,
    /// Whether the internal rebalance pass swapped
    pub rebalanced: bool,
    /// Amounts moved into the staking program
    pub staked: AssetPair,
}

impl TierVault {
    /// Claim and reinvest staking rewards. Permissionless.
    pub fn compound(&mut self, caller: AccountId) -> VaultResult<CompoundReport> {
        self.guarded(|vault| vault.compound_inner(caller))
    }

    fn compound_inner(&mut self, caller: AccountId) -> VaultResult<CompoundReport> {
        self.ensure_not_paused()?;
        let config = self.config.clone();
        let now = self.ports.clock.now();

        let (generic, generic_delta) = self.measure_inflow(|staking| staking.claim_rewards());
        if let Err(err) = generic {
            warn!("Reward claim failed: {}", err);
        }
        let (specific, specific_delta) = self.measure_inflow(|staking| staking.claim_asset_rewards());
        if let Err(err) = specific {
            warn!("Asset-specific reward claim failed: {}", err);
        }
        let rewards = AssetPair::new(
            safe_add_u128(generic_delta.primary, specific_delta.primary)?,
            safe_add_u128(generic_delta.reference, specific_delta.reference)?,
        );

        let mut report = CompoundReport {
            rewards,
            ..Default::default()
        };
        if !rewards.is_zero() {
            self.pool.credit(Asset::Primary, rewards.primary)?;
            self.pool.credit(Asset::Reference, rewards.reference)?;

            report.fee_units = match self.read_prices() {
                Ok(prices) => self.charge_performance_fee(rewards, &config, &prices, now)?,
                Err(err) => {
                    warn!("Performance fee skipped: {}", err);
                    0
                }
            };
            info!(
                "Compounded {} primary, {} reference for {} ({} fee units)",
                rewards.primary, rewards.reference, caller, report.fee_units
            );
            self.events.push(VaultEvent::RewardsCompounded {
                primary: rewards.primary,
                reference: rewards.reference,
                fee_units: report.fee_units,
                timestamp: now,
            });
        }

        report.rebalanced = self.try_internal_rebalance(&config);
        report.staked = self.stake_idle()?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::FeeParams;
    use crate::sim::SimCall;

    #[test]
    fn test_compound_credits_both_claims_and_restakes() {
        let (mut vault, ledger) = setup();
        vault.deposit(ALICE, 2_000_000, 1_000).unwrap();
        ledger.accrue_rewards(2_000, 0);
        ledger.accrue_asset_rewards(0, 1);

        let report = vault.compound(KEEPER).unwrap();
        assert_eq!(report.rewards, AssetPair::new(2_000, 1));
        assert_eq!(report.fee_units, 0);
        assert!(!report.rebalanced);
        assert_eq!(report.staked, AssetPair::new(2_000, 1));
        assert_eq!(vault.pool().pooled, AssetPair::new(2_002_000, 1_001));
        assert_eq!(vault.pool().staked, vault.pool().pooled);
    }

    #[test]
    fn test_failed_claim_is_not_fatal() {
        let (mut vault, ledger) = setup();
        vault.deposit(ALICE, 2_000_000, 1_000).unwrap();
        ledger.accrue_rewards(2_000, 1);
        ledger.accrue_asset_rewards(4_000, 2);
        ledger.fail(SimCall::ClaimRewards);

        let report = vault.compound(KEEPER).unwrap();
        assert_eq!(report.rewards, AssetPair::new(4_000, 2));
    }

    #[test]
    fn test_performance_fee_minted_on_rewards() {
        let (mut vault, ledger) = setup();
        vault
            .set_fee_params(
                ADMIN,
                FeeParams {
                    management_bps: 0,
                    performance_bps: 1_000,
                    protocol_share_bps: 0,
                },
            )
            .unwrap();
        vault.deposit(ALICE, 2_000_000, 1_000).unwrap();
        ledger.accrue_rewards(400_000, 200);

        // Reward value 800_000, fee 80_000 inside a pool worth 4_800_000
        let report = vault.compound(KEEPER).unwrap();
        assert_eq!(report.fee_units, 80_000 * 4_000_000 / 4_720_000);
        assert_eq!(ledger.units_of(ADMIN), report.fee_units);
    }

    #[test]
    fn test_nothing_to_claim_still_restakes() {
        let (mut vault, _ledger) = setup();
        let report = vault.compound(KEEPER).unwrap();
        assert_eq!(report, CompoundReport::default());
        assert!(vault.events().is_empty());
    }
}
