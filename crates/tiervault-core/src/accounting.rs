//! # Value Accounting
//!
//! Converts pooled quantities into a common value unit with oracle prices
//! and sizes ownership-unit issuance and redemption.
//!
//! Unit price is `total value / total units`, defined as 1.0 before the
//! first deposit. The first depositor therefore receives exactly the value
//! of what they contributed.

use crate::constants::SCALE;
use crate::errors::{VaultError, VaultResult};
use crate::math::{safe_add_u128, safe_mul_div_u128, safe_sub_u128, value_of};
use crate::types::{Asset, AssetPair};

/// Oracle prices for both assets, read once per operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub struct Prices {
    pub primary: u128,
    pub reference: u128,
}

impl Prices {
    pub fn new(primary: u128, reference: u128) -> VaultResult<Self> {
        if primary == 0 {
            return Err(VaultError::InvalidPrice(Asset::Primary));
        }
        if reference == 0 {
            return Err(VaultError::InvalidPrice(Asset::Reference));
        }
        Ok(Self { primary, reference })
    }

    pub fn of(&self, asset: Asset) -> u128 {
        match asset {
            Asset::Primary => self.primary,
            Asset::Reference => self.reference,
        }
    }
}

/// Combined value of both quantities
pub fn total_value(amounts: AssetPair, prices: &Prices) -> VaultResult<u128> {
    let primary = value_of(amounts.primary, prices.primary)?;
    let reference = value_of(amounts.reference, prices.reference)?;
    safe_add_u128(primary, reference)
}

/// Value of one unit, 18 fractional digits
pub fn unit_price(pool_value: u128, total_units: u128) -> VaultResult<u128> {
    if total_units == 0 {
        return Ok(SCALE);
    }
    safe_mul_div_u128(pool_value, SCALE, total_units)
}

/// Units minted for a deposit of `deposit` into a pool holding `pooled`
/// (balances before the deposit)
pub fn shares_for_deposit(
    deposit: AssetPair,
    pooled: AssetPair,
    total_units: u128,
    prices: &Prices,
) -> VaultResult<u128> {
    if deposit.is_zero() {
        return Err(VaultError::InvalidAmount);
    }
    let deposit_value = total_value(deposit, prices)?;
    if total_units == 0 {
        return Ok(deposit_value);
    }
    let pool_value = total_value(pooled, prices)?;
    if pool_value == 0 {
        // Units outstanding against an empty pool; refuse rather than
        // mint against a zero denominator
        return Err(VaultError::DivisionByZero);
    }
    safe_mul_div_u128(deposit_value, total_units, pool_value)
}

/// Pooled quantities owed for burning `units` out of `total_units`
pub fn assets_for_redeem(
    units: u128,
    held: u128,
    total_units: u128,
    pooled: AssetPair,
) -> VaultResult<AssetPair> {
    if units == 0 {
        return Err(VaultError::InvalidAmount);
    }
    if units > held {
        return Err(VaultError::InsufficientUnits {
            held,
            requested: units,
        });
    }
    if units > total_units {
        return Err(VaultError::InsufficientUnits {
            held: total_units,
            requested: units,
        });
    }
    Ok(AssetPair::new(
        safe_mul_div_u128(pooled.primary, units, total_units)?,
        safe_mul_div_u128(pooled.reference, units, total_units)?,
    ))
}

/// Units to mint so that `fee_value` is owned by the fee recipient once the
/// fee has been left inside a pool now worth `pool_value`
pub fn units_for_fee(fee_value: u128, pool_value: u128, total_units: u128) -> VaultResult<u128> {
    if fee_value == 0 || total_units == 0 {
        return Ok(0);
    }
    let remaining = safe_sub_u128(pool_value, fee_value)?;
    if remaining == 0 {
        return Err(VaultError::DivisionByZero);
    }
    safe_mul_div_u128(fee_value, total_units, remaining)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices() -> Prices {
        // Reference asset is worth 2000 primary
        Prices::new(SCALE, 2_000 * SCALE).unwrap()
    }

    #[test]
    fn test_first_deposit_fixes_unit_price() {
        let units = shares_for_deposit(AssetPair::new(2_000, 1), AssetPair::ZERO, 0, &prices()).unwrap();
        assert_eq!(units, 4_000);
        assert_eq!(unit_price(4_000, units).unwrap(), SCALE);
        assert_eq!(unit_price(0, 0).unwrap(), SCALE);
    }

    #[test]
    fn test_subsequent_deposit_is_proportional() {
        let pooled = AssetPair::new(2_000, 1);
        let units = shares_for_deposit(AssetPair::new(1_000, 0), pooled, 4_000, &prices()).unwrap();
        assert_eq!(units, 1_000);

        // Pool doubled in value: the same deposit now earns half the units
        let units = shares_for_deposit(AssetPair::new(1_000, 0), pooled, 2_000, &prices()).unwrap();
        assert_eq!(units, 500);
    }

    #[test]
    fn test_zero_deposit_rejected() {
        assert_eq!(
            shares_for_deposit(AssetPair::ZERO, AssetPair::ZERO, 0, &prices()),
            Err(VaultError::InvalidAmount)
        );
    }

    #[test]
    fn test_redeem_is_whole_pool_proportional() {
        let pooled = AssetPair::new(3_000, 9);
        let out = assets_for_redeem(1_000, 1_000, 3_000, pooled).unwrap();
        assert_eq!(out, AssetPair::new(1_000, 3));

        assert_eq!(
            assets_for_redeem(1_001, 1_000, 3_000, pooled),
            Err(VaultError::InsufficientUnits {
                held: 1_000,
                requested: 1_001
            })
        );
        assert_eq!(assets_for_redeem(0, 1_000, 3_000, pooled), Err(VaultError::InvalidAmount));
    }

    #[test]
    fn test_units_for_fee() {
        // Fee of 100 inside a pool worth 1100 with 1000 units: the recipient
        // must end up owning 100/1100 of the pool
        let minted = units_for_fee(100, 1_100, 1_000).unwrap();
        assert_eq!(minted, 100);
        assert_eq!(units_for_fee(0, 1_100, 1_000).unwrap(), 0);
    }

    #[test]
    fn test_zero_price_rejected() {
        assert_eq!(Prices::new(0, 1), Err(VaultError::InvalidPrice(Asset::Primary)));
        assert_eq!(Prices::new(1, 0), Err(VaultError::InvalidPrice(Asset::Reference)));
    }
}
