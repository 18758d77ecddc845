//! # Ratio Calculator
//!
//! Quantity ratio of primary to reference asset and its deviation from the
//! tier target. Prices play no part here: tiers are defined on quantities.

use std::cmp::Ordering;

use crate::config::RebalanceParams;
use crate::constants::BPS_DENOMINATOR;
use crate::errors::VaultResult;
use crate::math::{safe_mul_div_u128, to_ratio};
use crate::types::AssetPair;

/// Which way the pool has drifted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub enum Drift {
    /// Too little primary asset for the target
    UnderTarget,
    /// Too much primary asset for the target
    OverTarget,
    OnTarget,
}

/// Snapshot of the pool's position relative to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub struct Deviation {
    pub current_ratio: u128,
    pub target_ratio: u128,
    pub drift: Drift,
    /// |current - target| / target in basis points
    pub deviation_bps: u128,
}

/// `pooled_primary * SCALE / pooled_reference`, zero when there is no
/// reference asset
pub fn current_ratio(pooled: AssetPair) -> VaultResult<u128> {
    if pooled.reference == 0 {
        return Ok(0);
    }
    to_ratio(pooled.primary, pooled.reference)
}

/// Deviation of `pooled` from `target_ratio`. `None` for ratio-free tiers.
pub fn deviation(pooled: AssetPair, target_ratio: u128) -> VaultResult<Option<Deviation>> {
    if target_ratio == 0 {
        return Ok(None);
    }
    let current = current_ratio(pooled)?;
    let (drift, distance) = match current.cmp(&target_ratio) {
        Ordering::Less => (Drift::UnderTarget, target_ratio - current),
        Ordering::Greater => (Drift::OverTarget, current - target_ratio),
        Ordering::Equal => (Drift::OnTarget, 0),
    };
    let deviation_bps = safe_mul_div_u128(distance, BPS_DENOMINATOR, target_ratio)?;
    Ok(Some(Deviation {
        current_ratio: current,
        target_ratio,
        drift,
        deviation_bps,
    }))
}

/// Inputs to the rebalance trigger, all read from one state snapshot
#[derive(Debug, Clone, Copy)]
pub struct TriggerInputs {
    pub pooled: AssetPair,
    pub target_ratio: u128,
    pub params: RebalanceParams,
    pub rebalance_paused: bool,
    pub last_rebalance: i64,
    pub now: i64,
}

/// Whether the pool should be rebalanced. Pure: the same inputs always give
/// the same answer.
pub fn needs_rebalance(inputs: &TriggerInputs) -> VaultResult<bool> {
    if inputs.target_ratio == 0 || inputs.rebalance_paused {
        return Ok(false);
    }
    if inputs.now.saturating_sub(inputs.last_rebalance) < inputs.params.min_interval_secs {
        return Ok(false);
    }
    if inputs.pooled.is_zero() {
        return Ok(false);
    }
    match deviation(inputs.pooled, inputs.target_ratio)? {
        Some(dev) => Ok(dev.deviation_bps > inputs.params.threshold_bps as u128),
        None => Ok(false),
    }
}
