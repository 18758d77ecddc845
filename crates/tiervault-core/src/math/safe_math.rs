//! # Safe Math Operations
//!
//! Overflow-checked arithmetic. Products that may exceed `u128` go through
//! a 256-bit intermediate.

use ethnum::U256;

use crate::constants::BPS_DENOMINATOR;
use crate::errors::{VaultError, VaultResult};

/// Rounding direction for mul-div
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

/// Macro to generate safe arithmetic functions
macro_rules! safe_arith {
    // Binary operations with checked methods
    ($fn_name:ident, $type:ty, $checked_method:ident, $error:expr) => {
        /// Checked binary operation
        pub fn $fn_name(a: $type, b: $type) -> VaultResult<$type> {
            a.$checked_method(b).ok_or($error)
        }
    };

    // Division operations with zero check
    (div, $fn_name:ident, $type:ty) => {
        /// Safe division with zero check
        pub fn $fn_name(a: $type, b: $type) -> VaultResult<$type> {
            if b == 0 {
                return Err(VaultError::DivisionByZero);
            }
            Ok(a / b)
        }
    };
}

safe_arith!(safe_add_u128, u128, checked_add, VaultError::MathOverflow);
safe_arith!(safe_sub_u128, u128, checked_sub, VaultError::MathUnderflow);
safe_arith!(safe_mul_u128, u128, checked_mul, VaultError::MathOverflow);
safe_arith!(div, safe_div_u128, u128);

/// `a * b / c` with a 256-bit intermediate
pub fn mul_div(a: u128, b: u128, c: u128, rounding: Rounding) -> VaultResult<u128> {
    if c == 0 {
        return Err(VaultError::DivisionByZero);
    }
    let product = U256::from(a)
        .checked_mul(U256::from(b))
        .ok_or(VaultError::MathOverflow)?;
    let divisor = U256::from(c);
    let mut quotient = product / divisor;
    if rounding == Rounding::Up && quotient * divisor != product {
        quotient += U256::ONE;
    }
    let (high, low) = quotient.into_words();
    if high != 0 {
        return Err(VaultError::MathOverflow);
    }
    Ok(low)
}

/// Mul-div rounding down
pub fn safe_mul_div_u128(a: u128, b: u128, c: u128) -> VaultResult<u128> {
    mul_div(a, b, c, Rounding::Down)
}

/// `value * bps / 10_000`, rounding down
pub fn safe_calculate_bps(value: u128, bps: u16) -> VaultResult<u128> {
    mul_div(value, bps as u128, BPS_DENOMINATOR, Rounding::Down)
}

/// `value * (10_000 - bps) / 10_000`, rounding down
pub fn apply_haircut_bps(value: u128, bps: u16) -> VaultResult<u128> {
    let keep = safe_sub_u128(BPS_DENOMINATOR, bps as u128)?;
    mul_div(value, keep, BPS_DENOMINATOR, Rounding::Down)
}

/// `part / whole` expressed in basis points, rounding up, capped at 100%
pub fn ratio_bps_ceil(part: u128, whole: u128) -> VaultResult<u16> {
    if whole == 0 {
        return Err(VaultError::DivisionByZero);
    }
    let bps = mul_div(part, BPS_DENOMINATOR, whole, Rounding::Up)?;
    Ok(bps.min(BPS_DENOMINATOR) as u16)
}
