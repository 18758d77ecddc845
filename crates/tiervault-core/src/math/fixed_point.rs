//! # Fixed-Point Arithmetic
//!
//! 18-digit fixed-point helpers for prices and ratios. Prices are the value
//! of one whole unit of an asset, scaled by [`SCALE`].

use crate::constants::SCALE;
use crate::errors::VaultResult;
use crate::math::safe_math::{mul_div, Rounding};

/// Value of `amount` at `price`
pub fn value_of(amount: u128, price: u128) -> VaultResult<u128> {
    mul_div(amount, price, SCALE, Rounding::Down)
}

/// Quantity of the output asset worth the same as `amount_in` of the input
/// asset, using oracle prices for both
pub fn convert_amount(amount_in: u128, price_in: u128, price_out: u128) -> VaultResult<u128> {
    mul_div(amount_in, price_in, price_out, Rounding::Down)
}

/// `numerator * SCALE / denominator`
pub fn to_ratio(numerator: u128, denominator: u128) -> VaultResult<u128> {
    mul_div(numerator, SCALE, denominator, Rounding::Down)
}

/// `amount * ratio / SCALE`
pub fn apply_ratio(amount: u128, ratio: u128) -> VaultResult<u128> {
    mul_div(amount, ratio, SCALE, Rounding::Down)
}

/// `amount * SCALE / ratio`, the inverse of [`apply_ratio`]
pub fn invert_ratio(amount: u128, ratio: u128) -> VaultResult<u128> {
    mul_div(amount, SCALE, ratio, Rounding::Down)
}

/// Whole-number ratio `n:1` in fixed-point
pub const fn ratio_from_int(n: u128) -> u128 {
    n * SCALE
}
