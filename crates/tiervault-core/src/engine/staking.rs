//! # Stake Allocator
//!
//! Moves idle pooled balances into the dual-staking program and back.
//! Joint calls are preferred whenever both assets are involved and the tier
//! has a ratio; each failed leg degrades to isolated single-asset calls.
//! Leg failures are logged and recorded, never propagated.
//!
//! The staking program returns no amounts, so every stake and unstake is
//! measured as a custody balance delta.

use tracing::{debug, warn};

use super::TierVault;
use crate::constants::MAX_BPS;
use crate::errors::{PortResult, VaultResult};
use crate::events::VaultEvent;
use crate::math::{apply_ratio, invert_ratio, ratio_bps_ceil};
use crate::ports::DualStaking;
use crate::types::{Asset, AssetPair};

/// Largest jointly stakeable pair out of `idle` at `ratio`
pub(crate) fn joint_amounts(idle: AssetPair, ratio: u128) -> VaultResult<AssetPair> {
    let primary = idle.primary.min(apply_ratio(idle.reference, ratio)?);
    let reference = idle.reference.min(invert_ratio(primary, ratio)?);
    Ok(AssetPair::new(primary, reference))
}

impl TierVault {
    /// Stake every idle pooled balance. Returns what was actually staked.
    pub(crate) fn stake_idle(&mut self) -> VaultResult<AssetPair> {
        let idle = self.pool.idle_pair();
        if idle.is_zero() {
            return Ok(AssetPair::ZERO);
        }
        let ratio = self.pool.target_ratio;

        let joint = if idle.primary > 0 && idle.reference > 0 && ratio > 0 {
            Some(joint_amounts(idle, ratio)?).filter(|pair| pair.primary > 0 && pair.reference > 0)
        } else {
            None
        };

        let staked = match joint {
            Some(pair) => {
                let (result, delta) =
                    self.measure_outflow(|staking| staking.stake_joint(pair.primary, pair.reference));
                match result {
                    Ok(()) => {
                        let staked = self.record_stakes(delta)?;
                        self.events.push(VaultEvent::Staked {
                            primary: staked.primary,
                            reference: staked.reference,
                            joint: true,
                        });
                        staked
                    }
                    Err(err) => {
                        warn!("Joint stake failed, falling back to single-asset stakes: {}", err);
                        self.events.push(VaultEvent::StakeLegFailed {
                            asset: None,
                            reason: err.to_string(),
                        });
                        self.stake_each(idle)?
                    }
                }
            }
            None => self.stake_each(idle)?,
        };
        debug!("Staked {} primary, {} reference", staked.primary, staked.reference);
        Ok(staked)
    }

    /// Isolated per-asset stakes of whatever is idle
    fn stake_each(&mut self, idle: AssetPair) -> VaultResult<AssetPair> {
        let mut staked = AssetPair::ZERO;
        for asset in Asset::BOTH {
            let amount = idle.get(asset).min(self.pool.idle(asset));
            if amount == 0 {
                continue;
            }
            let (result, delta) = self.measure_outflow(|staking| staking.stake(asset, amount));
            match result {
                Ok(()) => {
                    let recorded = self.record_stakes(delta)?;
                    *staked.get_mut(asset) += recorded.get(asset);
                }
                Err(err) => {
                    warn!("Stake of {} {:?} failed: {}", amount, asset, err);
                    self.events.push(VaultEvent::StakeLegFailed {
                        asset: Some(asset),
                        reason: err.to_string(),
                    });
                }
            }
        }
        if !staked.is_zero() {
            self.events.push(VaultEvent::Staked {
                primary: staked.primary,
                reference: staked.reference,
                joint: false,
            });
        }
        Ok(staked)
    }

    /// Release at least `shortfall` where possible: one joint unstake sized
    /// to the smaller per-asset percentage, then per-asset unstakes for the
    /// rest. Returns what came back.
    pub(crate) fn unstake_for(&mut self, shortfall: AssetPair) -> VaultResult<AssetPair> {
        let mut released = AssetPair::ZERO;
        let staked = self.pool.staked;

        if shortfall.primary > 0
            && shortfall.reference > 0
            && staked.primary > 0
            && staked.reference > 0
            && self.pool.target_ratio > 0
        {
            let percent = ratio_bps_ceil(shortfall.primary, staked.primary)?
                .min(ratio_bps_ceil(shortfall.reference, staked.reference)?);
            released = self.unstake_joint(percent)?;
        }

        for asset in Asset::BOTH {
            let remaining = shortfall
                .get(asset)
                .saturating_sub(released.get(asset))
                .min(self.pool.staked(asset));
            if remaining == 0 {
                continue;
            }
            *released.get_mut(asset) += self.unstake_single(asset, remaining)?;
        }
        Ok(released)
    }

    /// Release every staked position
    pub(crate) fn unstake_all(&mut self) -> VaultResult<AssetPair> {
        let mut released = AssetPair::ZERO;
        let staked = self.pool.staked;
        if staked.primary > 0 && staked.reference > 0 {
            released = self.unstake_joint(MAX_BPS)?;
        }
        for asset in Asset::BOTH {
            let remaining = self.pool.staked(asset);
            if remaining > 0 {
                *released.get_mut(asset) += self.unstake_single(asset, remaining)?;
            }
        }
        Ok(released)
    }

    fn unstake_joint(&mut self, percent_bps: u16) -> VaultResult<AssetPair> {
        if percent_bps == 0 {
            return Ok(AssetPair::ZERO);
        }
        let (result, delta) = self.measure_inflow(|staking| staking.unstake_joint(percent_bps));
        match result {
            Ok(()) => {
                self.record_unstakes(delta);
                self.events.push(VaultEvent::Unstaked {
                    primary: delta.primary,
                    reference: delta.reference,
                    joint: true,
                });
                Ok(delta)
            }
            Err(err) => {
                warn!("Joint unstake of {} bps failed: {}", percent_bps, err);
                self.events.push(VaultEvent::StakeLegFailed {
                    asset: None,
                    reason: err.to_string(),
                });
                Ok(AssetPair::ZERO)
            }
        }
    }

    fn unstake_single(&mut self, asset: Asset, amount: u128) -> VaultResult<u128> {
        let (result, delta) = self.measure_inflow(|staking| staking.unstake(asset, amount));
        match result {
            Ok(()) => {
                self.record_unstakes(delta);
                self.events.push(VaultEvent::Unstaked {
                    primary: delta.primary,
                    reference: delta.reference,
                    joint: false,
                });
                Ok(delta.get(asset))
            }
            Err(err) => {
                warn!("Unstake of {} {:?} failed: {}", amount, asset, err);
                self.events.push(VaultEvent::StakeLegFailed {
                    asset: Some(asset),
                    reason: err.to_string(),
                });
                Ok(0)
            }
        }
    }

    /// Run a staking call and report how much left custody
    fn measure_outflow(
        &mut self,
        call: impl FnOnce(&mut dyn DualStaking) -> PortResult<()>,
    ) -> (PortResult<()>, AssetPair) {
        let before = self.custody_balances();
        let result = call(&mut *self.ports.staking);
        let after = self.custody_balances();
        let delta = AssetPair::new(
            before.primary.saturating_sub(after.primary),
            before.reference.saturating_sub(after.reference),
        );
        (result, delta)
    }

    /// Run a staking call and report how much arrived in custody
    pub(crate) fn measure_inflow(
        &mut self,
        call: impl FnOnce(&mut dyn DualStaking) -> PortResult<()>,
    ) -> (PortResult<()>, AssetPair) {
        let before = self.custody_balances();
        let result = call(&mut *self.ports.staking);
        let after = self.custody_balances();
        let delta = AssetPair::new(
            after.primary.saturating_sub(before.primary),
            after.reference.saturating_sub(before.reference),
        );
        (result, delta)
    }

    pub(crate) fn custody_balances(&self) -> AssetPair {
        AssetPair::new(
            self.ports.custody.balance(Asset::Primary),
            self.ports.custody.balance(Asset::Reference),
        )
    }

    fn record_stakes(&mut self, delta: AssetPair) -> VaultResult<AssetPair> {
        let recorded = AssetPair::new(
            delta.primary.min(self.pool.idle(Asset::Primary)),
            delta.reference.min(self.pool.idle(Asset::Reference)),
        );
        for asset in Asset::BOTH {
            self.pool.record_stake(asset, recorded.get(asset))?;
        }
        Ok(recorded)
    }

    fn record_unstakes(&mut self, delta: AssetPair) {
        for asset in Asset::BOTH {
            self.pool.record_unstake(asset, delta.get(asset));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::math::ratio_from_int;
    use crate::sim::SimCall;
    use crate::types::TierId;
    use crate::tier::TierPolicy;

    #[test]
    fn test_joint_amounts_respect_ratio() {
        let ratio = ratio_from_int(2_000);
        assert_eq!(
            joint_amounts(AssetPair::new(5_000, 1), ratio).unwrap(),
            AssetPair::new(2_000, 1)
        );
        assert_eq!(
            joint_amounts(AssetPair::new(3_000, 10), ratio).unwrap(),
            AssetPair::new(3_000, 1)
        );
    }

    #[test]
    fn test_joint_stake_leaves_remainder_idle() {
        let (mut vault, ledger) = setup();
        // 4% over target: inside the threshold, so no rebalance first
        vault.deposit(ALICE, 2_080, 1).unwrap();
        assert_eq!(vault.pool().staked, AssetPair::new(2_000, 1));
        assert_eq!(vault.pool().idle(Asset::Primary), 80);
        assert_eq!(ledger.program_staked(Asset::Primary), 2_000);
    }

    #[test]
    fn test_joint_failure_falls_back_to_single_stakes() {
        let (mut vault, ledger) = setup();
        ledger.fail(SimCall::StakeJoint);
        vault.deposit(ALICE, 2_000, 1).unwrap();
        assert_eq!(vault.pool().staked, AssetPair::new(2_000, 1));
        assert!(vault.events().iter().any(|event| matches!(
            event,
            VaultEvent::StakeLegFailed { asset: None, .. }
        )));
        assert!(vault
            .events()
            .iter()
            .any(|event| matches!(event, VaultEvent::Staked { joint: false, .. })));
    }

    #[test]
    fn test_single_leg_failure_is_not_fatal() {
        let (mut vault, ledger) = setup();
        ledger.fail(SimCall::StakeJoint);
        ledger.fail(SimCall::Stake(Asset::Reference));
        vault.deposit(ALICE, 2_000, 1).unwrap();
        assert_eq!(vault.pool().staked, AssetPair::new(2_000, 0));
        assert_eq!(vault.pool().idle(Asset::Reference), 1);
    }

    #[test]
    fn test_ratio_free_tier_stakes_each_asset() {
        let (mut vault, ledger) = setup_tier(TierId(0), TierPolicy::standard());
        vault.deposit(ALICE, 7_000, 3).unwrap();
        assert_eq!(vault.pool().staked, AssetPair::new(7_000, 3));
        assert!(!ledger.calls().contains(&SimCall::StakeJoint));
    }

    #[test]
    fn test_unstake_prefers_joint_then_fills_per_asset() {
        let (mut vault, ledger) = setup();
        vault.deposit(ALICE, 20_000, 10).unwrap();
        ledger.clear_calls();

        // 10% of primary, 30% of reference: joint at 10%, reference topped up
        let released = vault.unstake_for(AssetPair::new(2_000, 3)).unwrap();
        assert_eq!(released, AssetPair::new(2_000, 3));
        assert_eq!(
            ledger.calls(),
            vec![SimCall::UnstakeJoint, SimCall::Unstake(Asset::Reference)]
        );
        assert_eq!(vault.pool().staked, AssetPair::new(18_000, 7));
    }

    #[test]
    fn test_unstake_joint_failure_falls_back() {
        let (mut vault, ledger) = setup();
        vault.deposit(ALICE, 20_000, 10).unwrap();
        ledger.fail(SimCall::UnstakeJoint);
        let released = vault.unstake_for(AssetPair::new(2_000, 1)).unwrap();
        assert_eq!(released, AssetPair::new(2_000, 1));
        vault.pool().check_invariants().unwrap();
    }

    #[test]
    fn test_unstake_all_releases_everything() {
        let (mut vault, ledger) = setup();
        vault.deposit(ALICE, 2_080, 1).unwrap();
        vault.unstake_all().unwrap();
        assert!(vault.pool().staked.is_zero());
        assert_eq!(ledger.program_staked(Asset::Primary), 0);
        assert_eq!(ledger.vault_wallet(Asset::Primary), 2_080);
    }
}
