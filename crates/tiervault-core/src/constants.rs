//! # Vault Constants
//!
//! Fundamental constants for the tier vault including:
//! - Fixed-point scale and basis-point denominators
//! - Rebalance and circuit-breaker defaults
//! - Fee caps
//! - Tier policy defaults

// ============================================================================
// Mathematical Constants
// ============================================================================

/// Fixed-point scale for ratios and prices (18 fractional digits)
pub const SCALE: u128 = 1_000_000_000_000_000_000;

/// Basis points denominator (10,000 = 100%)
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Maximum percentage in basis points (100%)
pub const MAX_BPS: u16 = 10_000;

/// Seconds in a 365 day year, used for management fee accrual
pub const SECONDS_PER_YEAR: u128 = 31_536_000;

// ============================================================================
// Rebalance Defaults
// ============================================================================

/// Default deviation threshold before a rebalance is needed (5%)
pub const DEFAULT_REBALANCE_THRESHOLD_BPS: u16 = 500;

/// Default minimum interval between rebalances (1 hour)
pub const DEFAULT_MIN_REBALANCE_INTERVAL: i64 = 3_600;

/// Default maximum slippage on a rebalance swap (1%)
pub const DEFAULT_MAX_SLIPPAGE_BPS: u16 = 100;

/// Hard cap on configurable slippage (10%)
pub const MAX_SLIPPAGE_BPS: u16 = 1_000;

/// Default keeper reward (0.1% of pool value)
pub const DEFAULT_KEEPER_REWARD_BPS: u16 = 10;

/// Hard cap on keeper reward (1%)
pub const MAX_KEEPER_REWARD_BPS: u16 = 100;

/// Deadline granted to the exchange for a rebalance swap
pub const SWAP_DEADLINE_SECS: i64 = 300;

/// Under-target swaps never spend more than 1/N of pooled reference asset
pub const MAX_SWAP_FRACTION_DIVISOR: u128 = 2;

/// Over-target swaps only sell 1/N of the computed excess
pub const EXCESS_SWAP_DIVISOR: u128 = 2;

// ============================================================================
// Circuit Breaker Defaults
// ============================================================================

/// Consecutive failures that trip the breaker
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u8 = 3;

/// Rolling window in which failures are counted (24 hours)
pub const DEFAULT_FAILURE_WINDOW_SECS: i64 = 86_400;

// ============================================================================
// Fee Structure Constants
// ============================================================================

/// Maximum annual management fee (5%)
pub const MAX_MANAGEMENT_FEE_BPS: u16 = 500;

/// Maximum performance fee on compounded rewards (30%)
pub const MAX_PERFORMANCE_FEE_BPS: u16 = 3_000;

/// Default annual management fee (1%)
pub const DEFAULT_MANAGEMENT_FEE_BPS: u16 = 100;

/// Default performance fee (10%)
pub const DEFAULT_PERFORMANCE_FEE_BPS: u16 = 1_000;

/// Default protocol share of collected fees (20%)
pub const DEFAULT_PROTOCOL_SHARE_BPS: u16 = 2_000;

// ============================================================================
// Tier Policy Constants
// ============================================================================

/// Default tolerance around the ratio-implied deposit requirement (5%)
pub const DEFAULT_TIER_TOLERANCE_BPS: u16 = 500;

/// Strict tier deviation threshold (2%)
pub const STRICT_REBALANCE_THRESHOLD_BPS: u16 = 200;

/// Strict tier slippage cap (0.5%)
pub const STRICT_MAX_SLIPPAGE_BPS: u16 = 50;

/// Maximum number of tiers in a ratio table
pub const MAX_TIERS: usize = 16;

/// Maximum number of trusted exchanges
pub const MAX_TRUSTED_EXCHANGES: usize = 8;
