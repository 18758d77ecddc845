//! Event definitions

use crate::types::{AccountId, Asset, TierId};

/// Observability events recorded by the vault. Callers drain them with
/// [`TierVault::drain_events`](crate::engine::TierVault::drain_events).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub enum VaultEvent {
    Deposited {
        holder: AccountId,
        primary: u128,
        reference: u128,
        units_minted: u128,
        timestamp: i64,
    },
    Redeemed {
        holder: AccountId,
        units_burned: u128,
        primary: u128,
        reference: u128,
        timestamp: i64,
    },
    Rebalanced {
        caller: AccountId,
        asset_in: Asset,
        amount_in: u128,
        amount_out: u128,
        tier: TierId,
        ratio_after: u128,
        timestamp: i64,
    },
    RebalanceFailed {
        caller: AccountId,
        reason: String,
        consecutive_failures: u8,
        timestamp: i64,
    },
    RewardsCompounded {
        primary: u128,
        reference: u128,
        fee_units: u128,
        timestamp: i64,
    },
    KeeperPaid {
        keeper: AccountId,
        amount: u128,
        timestamp: i64,
    },
    FeesCollected {
        fee_units: u128,
        protocol_units: u128,
        timestamp: i64,
    },
    Staked {
        primary: u128,
        reference: u128,
        joint: bool,
    },
    Unstaked {
        primary: u128,
        reference: u128,
        joint: bool,
    },
    StakeLegFailed {
        asset: Option<Asset>,
        reason: String,
    },
    CircuitBreakerTriggered {
        consecutive_failures: u8,
        timestamp: i64,
    },
    RebalancePaused {
        by: AccountId,
        timestamp: i64,
    },
    RebalanceResumed {
        by: AccountId,
        timestamp: i64,
    },
    VaultPaused {
        timestamp: i64,
    },
    VaultUnpaused {
        timestamp: i64,
    },
    TierChanged {
        old_tier: TierId,
        new_tier: TierId,
        target_ratio: u128,
    },
    TierRatioUpdated {
        tier: TierId,
        ratio: u128,
    },
    ExchangeAllowlisted {
        exchange: AccountId,
        trusted: bool,
    },
    ConfigUpdated {
        field: String,
    },
    EmergencyModeSet {
        active: bool,
        timestamp: i64,
    },
    EmergencyWithdrawal {
        recipient: AccountId,
        primary: u128,
        reference: u128,
        timestamp: i64,
    },
}
