//! # Fee Accrual
//!
//! Fees are taken by minting units, never by moving pooled assets:
//!
//! - management: `total_units * management_bps * elapsed / (10000 * year)`
//! - performance: `performance_bps` of compounded reward value, minted at the
//!   post-compound unit price
//!
//! `protocol_share_bps` of every mint goes to the protocol recipient, the
//! rest to the fee recipient.

use tracing::info;

use super::TierVault;
use crate::accounting::{self, Prices};
use crate::config::VaultConfig;
use crate::constants::{BPS_DENOMINATOR, SECONDS_PER_YEAR};
use crate::errors::VaultResult;
use crate::events::VaultEvent;
use crate::math::{mul_div, safe_calculate_bps, safe_mul_u128, safe_sub_u128, Rounding};
use crate::types::AssetPair;

/// Management fee units accrued over `elapsed` seconds
pub fn management_fee_units(total_units: u128, management_bps: u16, elapsed: i64) -> VaultResult<u128> {
    if elapsed <= 0 || management_bps == 0 {
        return Ok(0);
    }
    let rate_time = safe_mul_u128(management_bps as u128, elapsed as u128)?;
    let denominator = safe_mul_u128(BPS_DENOMINATOR, SECONDS_PER_YEAR)?;
    mul_div(total_units, rate_time, denominator, Rounding::Down)
}

impl TierVault {
    /// Mint the management fee accrued since the last collection. Returns
    /// the units minted.
    pub fn collect_fees(&mut self) -> VaultResult<u128> {
        self.guarded(|vault| {
            let config = vault.config.clone();
            vault.collect_fees_inner(&config)
        })
    }

    pub(crate) fn collect_fees_inner(&mut self, config: &VaultConfig) -> VaultResult<u128> {
        let now = self.ports.clock.now();
        let elapsed = now.saturating_sub(self.pool.last_fee_collection);
        let units = management_fee_units(
            self.ports.units.total_units(),
            config.fees.management_bps,
            elapsed,
        )?;
        self.pool.last_fee_collection = now;
        if units == 0 {
            return Ok(0);
        }
        self.mint_fee_units(units, config, now)?;
        Ok(units)
    }

    /// Performance fee on freshly compounded `rewards`. The rewards must
    /// already be credited to the pool.
    pub(crate) fn charge_performance_fee(
        &mut self,
        rewards: AssetPair,
        config: &VaultConfig,
        prices: &Prices,
        now: i64,
    ) -> VaultResult<u128> {
        if config.fees.performance_bps == 0 || rewards.is_zero() {
            return Ok(0);
        }
        let reward_value = accounting::total_value(rewards, prices)?;
        let fee_value = safe_calculate_bps(reward_value, config.fees.performance_bps)?;
        let pool_value = accounting::total_value(self.pool.pooled, prices)?;
        let units = accounting::units_for_fee(fee_value, pool_value, self.ports.units.total_units())?;
        if units == 0 {
            return Ok(0);
        }
        self.mint_fee_units(units, config, now)?;
        Ok(units)
    }

    fn mint_fee_units(&mut self, units: u128, config: &VaultConfig, now: i64) -> VaultResult<()> {
        let protocol_units = safe_calculate_bps(units, config.fees.protocol_share_bps)?;
        let fee_units = safe_sub_u128(units, protocol_units)?;
        if fee_units > 0 {
            self.ports.units.mint(config.fee_recipient, fee_units)?;
        }
        if protocol_units > 0 {
            self.ports.units.mint(config.protocol_recipient, protocol_units)?;
        }
        info!(
            "Minted fee units: {} to {}, {} to protocol {}",
            fee_units, config.fee_recipient, protocol_units, config.protocol_recipient
        );
        self.events.push(VaultEvent::FeesCollected {
            fee_units,
            protocol_units,
            timestamp: now,
        });
        Ok(())
    }
}
