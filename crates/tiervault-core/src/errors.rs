//! # Vault Error Types
//!
//! Errors returned by the engine and by its external collaborators.
//! Port failures are kept separate so the engine can decide which of them
//! are fatal.

use thiserror::Error;

use crate::types::{AccountId, Asset};

/// Reasons a tier-constrained deposit is rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierViolation {
    #[error("primary amount {supplied} below tier minimum {minimum}")]
    PrimaryBelowMinimum { supplied: u128, minimum: u128 },

    #[error("reference amount {supplied} below tier minimum {minimum}")]
    ReferenceBelowMinimum { supplied: u128, minimum: u128 },

    #[error("primary amount {supplied} below ratio requirement {required} (tolerance {tolerance_bps} bps)")]
    PrimaryBelowRequirement {
        supplied: u128,
        required: u128,
        tolerance_bps: u16,
    },

    #[error("primary amount {supplied} above ratio requirement {required} (tolerance {tolerance_bps} bps)")]
    PrimaryAboveRequirement {
        supplied: u128,
        required: u128,
        tolerance_bps: u16,
    },

    #[error("tier deposits are blocked by emergency mode")]
    EmergencyMode,
}

/// Errors reported by external collaborators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("call reverted: {0}")]
    Reverted(String),

    #[error("output {actual} below minimum {minimum}")]
    InsufficientOutput { actual: u128, minimum: u128 },

    #[error("deadline {0} expired")]
    DeadlineExpired(i64),

    #[error("insufficient balance of {asset:?}: have {available}, need {requested}")]
    InsufficientBalance {
        asset: Asset,
        available: u128,
        requested: u128,
    },

    #[error("price unavailable for {0:?}")]
    PriceUnavailable(Asset),
}

/// Result type for port calls
pub type PortResult<T> = Result<T, PortError>;

/// Engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    // ========================================================================
    // Math Errors
    // ========================================================================
    #[error("Math overflow")]
    MathOverflow,

    #[error("Math underflow")]
    MathUnderflow,

    #[error("Division by zero")]
    DivisionByZero,

    // ========================================================================
    // Validation Errors
    // ========================================================================
    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Invalid price for {0:?}")]
    InvalidPrice(Asset),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),

    #[error("Deposit would mint zero units")]
    ZeroUnits,

    #[error("Insufficient units: have {held}, requested {requested}")]
    InsufficientUnits { held: u128, requested: u128 },

    #[error("Insufficient liquidity in {asset:?}: idle {idle}, required {required}")]
    InsufficientLiquidity {
        asset: Asset,
        idle: u128,
        required: u128,
    },

    #[error("Unknown tier {0}")]
    UnknownTier(u8),

    #[error("Tier validation failed: {0}")]
    TierViolation(#[from] TierViolation),

    // ========================================================================
    // Authorization Errors
    // ========================================================================
    #[error("Unauthorized caller {0}")]
    Unauthorized(AccountId),

    #[error("Exchange {0} is not trusted")]
    UntrustedExchange(AccountId),

    // ========================================================================
    // State Errors
    // ========================================================================
    #[error("Reentrancy detected")]
    ReentrancyDetected,

    #[error("Vault is paused")]
    VaultPaused,

    #[error("Vault is not paused")]
    VaultNotPaused,

    #[error("Rebalancing is paused")]
    RebalancePaused,

    #[error("Rebalance not needed")]
    RebalanceNotNeeded,

    #[error("Emergency mode is not active")]
    EmergencyModeInactive,

    // ========================================================================
    // External Errors
    // ========================================================================
    #[error("Rebalance swap failed: {0}")]
    SwapFailed(PortError),

    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(PortError),

    #[error("External call failed: {0}")]
    External(#[from] PortError),
}

/// Result type using vault errors
pub type VaultResult<T> = Result<T, VaultError>;

impl VaultError {
    /// Whether the error is counted by the rebalance circuit breaker
    pub fn is_swap_failure(&self) -> bool {
        matches!(self, Self::SwapFailed(_) | Self::UntrustedExchange(_))
    }
}
