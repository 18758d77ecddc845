//! # Vault Configuration
//!
//! Administrator-controlled parameters. The engine clones the whole
//! [`VaultConfig`] at the start of every operation, so deviation and swap
//! math always run against one consistent snapshot.

use std::collections::BTreeSet;

use crate::constants::*;
use crate::errors::{VaultError, VaultResult};
use crate::types::AccountId;

/// Rebalance trigger and execution bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub struct RebalanceParams {
    /// Deviation from target (bps) that must be exceeded to rebalance
    pub threshold_bps: u16,
    /// Minimum seconds between successful rebalances
    pub min_interval_secs: i64,
    /// Maximum loss versus the oracle rate on a rebalance swap (bps)
    pub max_slippage_bps: u16,
}

impl Default for RebalanceParams {
    fn default() -> Self {
        Self {
            threshold_bps: DEFAULT_REBALANCE_THRESHOLD_BPS,
            min_interval_secs: DEFAULT_MIN_REBALANCE_INTERVAL,
            max_slippage_bps: DEFAULT_MAX_SLIPPAGE_BPS,
        }
    }
}

impl RebalanceParams {
    pub fn validate(&self) -> VaultResult<()> {
        if self.threshold_bps == 0 || self.threshold_bps > MAX_BPS {
            return Err(VaultError::InvalidParameter("threshold_bps"));
        }
        if self.min_interval_secs < 0 {
            return Err(VaultError::InvalidParameter("min_interval_secs"));
        }
        if self.max_slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(VaultError::InvalidParameter("max_slippage_bps"));
        }
        Ok(())
    }
}

/// Fee schedule, all in basis points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub struct FeeParams {
    /// Annualized management fee on pool value
    pub management_bps: u16,
    /// Fee on compounded rewards
    pub performance_bps: u16,
    /// Share of collected fees routed to the protocol recipient
    pub protocol_share_bps: u16,
}

impl Default for FeeParams {
    fn default() -> Self {
        Self {
            management_bps: DEFAULT_MANAGEMENT_FEE_BPS,
            performance_bps: DEFAULT_PERFORMANCE_FEE_BPS,
            protocol_share_bps: DEFAULT_PROTOCOL_SHARE_BPS,
        }
    }
}

impl FeeParams {
    /// No fees at all
    pub const ZERO: FeeParams = FeeParams {
        management_bps: 0,
        performance_bps: 0,
        protocol_share_bps: 0,
    };

    pub fn validate(&self) -> VaultResult<()> {
        if self.management_bps > MAX_MANAGEMENT_FEE_BPS {
            return Err(VaultError::InvalidParameter("management_bps"));
        }
        if self.performance_bps > MAX_PERFORMANCE_FEE_BPS {
            return Err(VaultError::InvalidParameter("performance_bps"));
        }
        if self.protocol_share_bps > MAX_BPS {
            return Err(VaultError::InvalidParameter("protocol_share_bps"));
        }
        Ok(())
    }
}

/// Consecutive-failure circuit breaker settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub struct CircuitBreakerParams {
    /// Failures inside the window that pause rebalancing
    pub max_consecutive_failures: u8,
    /// Rolling window for counting failures (seconds)
    pub failure_window_secs: i64,
}

impl Default for CircuitBreakerParams {
    fn default() -> Self {
        Self {
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            failure_window_secs: DEFAULT_FAILURE_WINDOW_SECS,
        }
    }
}

impl CircuitBreakerParams {
    pub fn validate(&self) -> VaultResult<()> {
        if self.max_consecutive_failures == 0 {
            return Err(VaultError::InvalidParameter("max_consecutive_failures"));
        }
        if self.failure_window_secs <= 0 {
            return Err(VaultError::InvalidParameter("failure_window_secs"));
        }
        Ok(())
    }
}

/// Complete configuration snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub struct VaultConfig {
    /// Holder of the administrative capability
    pub admin: AccountId,
    /// Receives the non-protocol share of fees
    pub fee_recipient: AccountId,
    /// Receives the protocol share of fees
    pub protocol_recipient: AccountId,
    pub rebalance: RebalanceParams,
    pub fees: FeeParams,
    pub circuit_breaker: CircuitBreakerParams,
    /// Keeper reward as bps of total pool value
    pub keeper_reward_bps: u16,
    /// Exchanges the rebalancer may route through
    pub trusted_exchanges: BTreeSet<AccountId>,
    /// Exchange used by the internal best-effort rebalance
    pub default_exchange: Option<AccountId>,
}

impl VaultConfig {
    pub fn new(admin: AccountId) -> Self {
        Self {
            admin,
            fee_recipient: admin,
            protocol_recipient: admin,
            rebalance: RebalanceParams::default(),
            fees: FeeParams::default(),
            circuit_breaker: CircuitBreakerParams::default(),
            keeper_reward_bps: DEFAULT_KEEPER_REWARD_BPS,
            trusted_exchanges: BTreeSet::new(),
            default_exchange: None,
        }
    }

    /// Builder-style helper that trusts `exchange` and makes it the default route
    pub fn with_exchange(mut self, exchange: AccountId) -> Self {
        self.trusted_exchanges.insert(exchange);
        self.default_exchange = Some(exchange);
        self
    }

    pub fn validate(&self) -> VaultResult<()> {
        self.rebalance.validate()?;
        self.fees.validate()?;
        self.circuit_breaker.validate()?;
        if self.keeper_reward_bps > MAX_KEEPER_REWARD_BPS {
            return Err(VaultError::InvalidParameter("keeper_reward_bps"));
        }
        if self.trusted_exchanges.len() > MAX_TRUSTED_EXCHANGES {
            return Err(VaultError::InvalidParameter("trusted_exchanges"));
        }
        if let Some(exchange) = self.default_exchange {
            if !self.trusted_exchanges.contains(&exchange) {
                return Err(VaultError::UntrustedExchange(exchange));
            }
        }
        Ok(())
    }

    pub fn is_trusted(&self, exchange: &AccountId) -> bool {
        self.trusted_exchanges.contains(exchange)
    }
}
