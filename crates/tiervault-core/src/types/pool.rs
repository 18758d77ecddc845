//! Pooled balance state.
//!
//! The pool tracks how much of each asset belongs to unit holders and how
//! much of that is currently committed to the staking program. Every
//! mutation keeps `staked <= pooled` per asset.

use crate::errors::{VaultError, VaultResult};
use crate::math::safe_math::{safe_add_u128, safe_sub_u128};
use crate::types::{Asset, TierId};

/// Per-asset quantities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub struct AssetPair {
    pub primary: u128,
    pub reference: u128,
}

impl AssetPair {
    pub const ZERO: AssetPair = AssetPair {
        primary: 0,
        reference: 0,
    };

    pub fn new(primary: u128, reference: u128) -> Self {
        Self { primary, reference }
    }

    pub fn get(&self, asset: Asset) -> u128 {
        match asset {
            Asset::Primary => self.primary,
            Asset::Reference => self.reference,
        }
    }

    pub fn get_mut(&mut self, asset: Asset) -> &mut u128 {
        match asset {
            Asset::Primary => &mut self.primary,
            Asset::Reference => &mut self.reference,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.primary == 0 && self.reference == 0
    }
}

/// Central pool state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub struct Pool {
    /// Quantities owned by unit holders (idle + staked)
    pub pooled: AssetPair,
    /// Subset of `pooled` committed to the staking program
    pub staked: AssetPair,
    /// Tier the pool is targeting
    pub tier: TierId,
    /// Target primary:reference ratio, 18 fractional digits (0 = ratio-free)
    pub target_ratio: u128,
    /// Last management fee collection (unix seconds)
    pub last_fee_collection: i64,
    /// Last successful rebalance (unix seconds)
    pub last_rebalance: i64,
}

impl Pool {
    pub fn new(tier: TierId, target_ratio: u128, now: i64) -> Self {
        Self {
            tier,
            target_ratio,
            last_fee_collection: now,
            ..Default::default()
        }
    }

    pub fn pooled(&self, asset: Asset) -> u128 {
        self.pooled.get(asset)
    }

    pub fn staked(&self, asset: Asset) -> u128 {
        self.staked.get(asset)
    }

    /// Pooled quantity not committed to the staking program
    pub fn idle(&self, asset: Asset) -> u128 {
        self.pooled(asset).saturating_sub(self.staked(asset))
    }

    pub fn idle_pair(&self) -> AssetPair {
        AssetPair::new(self.idle(Asset::Primary), self.idle(Asset::Reference))
    }

    pub fn credit(&mut self, asset: Asset, amount: u128) -> VaultResult<()> {
        let slot = self.pooled.get_mut(asset);
        *slot = safe_add_u128(*slot, amount)?;
        Ok(())
    }

    /// Remove idle balance; staked balance must be released first
    pub fn debit(&mut self, asset: Asset, amount: u128) -> VaultResult<()> {
        let idle = self.idle(asset);
        if amount > idle {
            return Err(VaultError::InsufficientLiquidity {
                asset,
                idle,
                required: amount,
            });
        }
        let slot = self.pooled.get_mut(asset);
        *slot = safe_sub_u128(*slot, amount)?;
        Ok(())
    }

    pub fn record_stake(&mut self, asset: Asset, amount: u128) -> VaultResult<()> {
        let staked = safe_add_u128(self.staked(asset), amount)?;
        if staked > self.pooled(asset) {
            return Err(VaultError::InsufficientLiquidity {
                asset,
                idle: self.idle(asset),
                required: amount,
            });
        }
        *self.staked.get_mut(asset) = staked;
        Ok(())
    }

    /// Release staked balance back to idle. Saturates at zero: the staking
    /// program may return more than was recorded (e.g. bundled rewards).
    pub fn record_unstake(&mut self, asset: Asset, amount: u128) {
        let slot = self.staked.get_mut(asset);
        *slot = slot.saturating_sub(amount);
    }

    /// Verify `staked <= pooled` for both assets
    pub fn check_invariants(&self) -> VaultResult<()> {
        for asset in Asset::BOTH {
            if self.staked(asset) > self.pooled(asset) {
                return Err(VaultError::InsufficientLiquidity {
                    asset,
                    idle: 0,
                    required: self.staked(asset) - self.pooled(asset),
                });
            }
        }
        Ok(())
    }
}
