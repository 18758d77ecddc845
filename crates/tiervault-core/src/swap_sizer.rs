//! # Swap Sizer
//!
//! Bounded swap that moves the pool toward its target ratio. Both
//! directions deliberately under-correct so that one step never overshoots
//! and market impact stays bounded:
//!
//! - under target: buy the primary deficit with reference asset, spending at
//!   most half of the pooled reference asset
//! - over target: sell half of the primary excess for reference asset

use crate::accounting::Prices;
use crate::constants::{EXCESS_SWAP_DIVISOR, MAX_SWAP_FRACTION_DIVISOR};
use crate::errors::VaultResult;
use crate::math::{apply_haircut_bps, apply_ratio, convert_amount, safe_div_u128};
use crate::types::{Asset, AssetPair};

/// A sized swap, ready to submit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub struct SwapPlan {
    pub asset_in: Asset,
    pub amount_in: u128,
    /// Output at the oracle rate
    pub expected_out: u128,
    /// Output below which the swap counts as failed
    pub min_amount_out: u128,
}

impl SwapPlan {
    pub fn asset_out(&self) -> Asset {
        self.asset_in.other()
    }

    pub fn path(&self) -> [Asset; 2] {
        [self.asset_in, self.asset_out()]
    }
}

/// Size the corrective swap. Returns `None` when the pool is on target or
/// the bounded amount (or its output) rounds to zero.
pub fn size_swap(
    pooled: AssetPair,
    target_ratio: u128,
    prices: &Prices,
    max_slippage_bps: u16,
) -> VaultResult<Option<SwapPlan>> {
    if target_ratio == 0 {
        return Ok(None);
    }
    let required_primary = apply_ratio(pooled.reference, target_ratio)?;

    let (asset_in, amount_in) = if pooled.primary < required_primary {
        let deficit = required_primary - pooled.primary;
        let reference_needed = convert_amount(deficit, prices.primary, prices.reference)?;
        let cap = safe_div_u128(pooled.reference, MAX_SWAP_FRACTION_DIVISOR)?;
        (Asset::Reference, reference_needed.min(cap))
    } else if pooled.primary > required_primary {
        let excess = pooled.primary - required_primary;
        (Asset::Primary, safe_div_u128(excess, EXCESS_SWAP_DIVISOR)?)
    } else {
        return Ok(None);
    };

    if amount_in == 0 {
        return Ok(None);
    }

    let expected_out = convert_amount(amount_in, prices.of(asset_in), prices.of(asset_in.other()))?;
    if expected_out == 0 {
        return Ok(None);
    }
    let min_amount_out = apply_haircut_bps(expected_out, max_slippage_bps)?;
    tracing::debug!(
        ?asset_in,
        amount_in,
        expected_out,
        min_amount_out,
        "sized rebalance swap"
    );
    Ok(Some(SwapPlan {
        asset_in,
        amount_in,
        expected_out,
        min_amount_out,
    }))
}
