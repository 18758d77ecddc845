//! Keeper incentive: a cut of total pool value, paid in the primary asset
//! to whoever triggered a successful rebalance.

use tracing::{info, warn};

use super::TierVault;
use crate::accounting::{self, Prices};
use crate::config::VaultConfig;
use crate::errors::VaultResult;
use crate::events::VaultEvent;
use crate::math::safe_calculate_bps;
use crate::types::{AccountId, Asset, AssetPair};

/// `pool_value * keeper_reward_bps / 10000`, denominated in primary asset units
pub fn keeper_reward(pool_value: u128, keeper_reward_bps: u16) -> VaultResult<u128> {
    safe_calculate_bps(pool_value, keeper_reward_bps)
}

impl TierVault {
    /// Pay the reward for a rebalance that just succeeded. Valued on the
    /// post-swap pool. Capped at pooled primary; a payment that cannot be
    /// funded is skipped rather than undoing the rebalance.
    pub(crate) fn pay_keeper(
        &mut self,
        keeper: AccountId,
        config: &VaultConfig,
        prices: &Prices,
        now: i64,
    ) -> VaultResult<u128> {
        if config.keeper_reward_bps == 0 {
            return Ok(0);
        }
        let pool_value = accounting::total_value(self.pool.pooled, prices)?;
        let reward = keeper_reward(pool_value, config.keeper_reward_bps)?
            .min(self.pool.pooled(Asset::Primary));
        if reward == 0 {
            return Ok(0);
        }

        if let Err(err) = self.ensure_idle(AssetPair::new(reward, 0)) {
            warn!("Keeper reward of {} for {} not funded: {}", reward, keeper, err);
            return Ok(0);
        }
        if let Err(err) = self.ports.custody.push(keeper, Asset::Primary, reward) {
            warn!("Keeper reward transfer to {} failed: {}", keeper, err);
            return Ok(0);
        }
        self.pool.debit(Asset::Primary, reward)?;

        info!("Paid keeper {} reward of {} primary", keeper, reward);
        self.events.push(VaultEvent::KeeperPaid {
            keeper,
            amount: reward,
            timestamp: now,
        });
        Ok(reward)
    }
}
