//! # Administrative Surface
//!
//! Capability-gated setters and safety switches. Every setter edits a copy
//! of the configuration, validates the copy and only then swaps it in, under
//! the same reentrancy lock as the user-facing operations.

use tracing::{info, warn};

use super::TierVault;
use crate::config::{CircuitBreakerParams, FeeParams, RebalanceParams, VaultConfig};
use crate::errors::{VaultError, VaultResult};
use crate::events::VaultEvent;
use crate::types::{AccountId, Asset, AssetPair, TierId};

impl TierVault {
    // ------------------------------------------------------------------
    // Tier table
    // ------------------------------------------------------------------

    /// Retarget the pool at another tier of the policy table
    pub fn set_target_tier(&mut self, caller: AccountId, tier: TierId) -> VaultResult<()> {
        self.guarded(|vault| {
            vault.require_admin(caller)?;
            let ratio = vault.policy.spec(tier)?.ratio;
            let old_tier = vault.pool.tier;
            vault.pool.tier = tier;
            vault.pool.target_ratio = ratio;
            info!("Target tier {} -> {} (ratio {})", old_tier, tier, ratio);
            vault.events.push(VaultEvent::TierChanged {
                old_tier,
                new_tier: tier,
                target_ratio: ratio,
            });
            Ok(())
        })
    }

    /// Change one row of the ratio table. Applies immediately when it is the
    /// row the pool targets.
    pub fn set_tier_ratio(&mut self, caller: AccountId, tier: TierId, ratio: u128) -> VaultResult<()> {
        self.guarded(|vault| {
            vault.require_admin(caller)?;
            vault.policy.set_ratio(tier, ratio)?;
            if vault.pool.tier == tier {
                vault.pool.target_ratio = ratio;
            }
            info!("Ratio of {} set to {}", tier, ratio);
            vault.events.push(VaultEvent::TierRatioUpdated { tier, ratio });
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    pub fn set_exchange_trusted(
        &mut self,
        caller: AccountId,
        exchange: AccountId,
        trusted: bool,
    ) -> VaultResult<()> {
        self.guarded(|vault| {
            vault.update_config(caller, |config| {
                if trusted {
                    config.trusted_exchanges.insert(exchange);
                } else {
                    config.trusted_exchanges.remove(&exchange);
                    if config.default_exchange == Some(exchange) {
                        config.default_exchange = None;
                    }
                }
            })?;
            info!("Exchange {} trusted: {}", exchange, trusted);
            vault
                .events
                .push(VaultEvent::ExchangeAllowlisted { exchange, trusted });
            Ok(())
        })
    }

    /// Route for internal rebalances; must already be trusted
    pub fn set_default_exchange(&mut self, caller: AccountId, exchange: Option<AccountId>) -> VaultResult<()> {
        self.guarded(|vault| {
            vault.update_config(caller, |config| config.default_exchange = exchange)?;
            vault.config_updated("default_exchange");
            Ok(())
        })
    }

    pub fn set_keeper_reward_bps(&mut self, caller: AccountId, bps: u16) -> VaultResult<()> {
        self.guarded(|vault| {
            vault.update_config(caller, |config| config.keeper_reward_bps = bps)?;
            vault.config_updated("keeper_reward_bps");
            Ok(())
        })
    }

    pub fn set_rebalance_params(&mut self, caller: AccountId, params: RebalanceParams) -> VaultResult<()> {
        self.guarded(|vault| {
            vault.update_config(caller, |config| config.rebalance = params)?;
            vault.config_updated("rebalance");
            Ok(())
        })
    }

    pub fn set_circuit_breaker_params(
        &mut self,
        caller: AccountId,
        params: CircuitBreakerParams,
    ) -> VaultResult<()> {
        self.guarded(|vault| {
            vault.update_config(caller, |config| config.circuit_breaker = params)?;
            vault.config_updated("circuit_breaker");
            Ok(())
        })
    }

    /// New fee schedule. Management fee accrued so far is collected at the
    /// old rate first.
    pub fn set_fee_params(&mut self, caller: AccountId, params: FeeParams) -> VaultResult<()> {
        self.guarded(|vault| {
            vault.require_admin(caller)?;
            params.validate()?;
            let current = vault.config.clone();
            vault.collect_fees_inner(&current)?;
            vault.update_config(caller, |config| config.fees = params)?;
            vault.config_updated("fees");
            Ok(())
        })
    }

    pub fn set_fee_recipients(
        &mut self,
        caller: AccountId,
        fee_recipient: AccountId,
        protocol_recipient: AccountId,
    ) -> VaultResult<()> {
        self.guarded(|vault| {
            vault.update_config(caller, |config| {
                config.fee_recipient = fee_recipient;
                config.protocol_recipient = protocol_recipient;
            })?;
            vault.config_updated("fee_recipients");
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Safety switches
    // ------------------------------------------------------------------

    pub fn pause_rebalancing(&mut self, caller: AccountId) -> VaultResult<()> {
        self.guarded(|vault| {
            vault.require_admin(caller)?;
            vault.rebalance.pause();
            let timestamp = vault.ports.clock.now();
            warn!("Rebalancing paused by {}", caller);
            vault.events.push(VaultEvent::RebalancePaused { by: caller, timestamp });
            Ok(())
        })
    }

    /// Lift a manual or circuit-breaker pause and clear the failure count
    pub fn resume_rebalancing(&mut self, caller: AccountId) -> VaultResult<()> {
        self.guarded(|vault| {
            vault.require_admin(caller)?;
            vault.rebalance.resume();
            let timestamp = vault.ports.clock.now();
            info!("Rebalancing resumed by {}", caller);
            vault.events.push(VaultEvent::RebalanceResumed { by: caller, timestamp });
            Ok(())
        })
    }

    /// Stop deposits, redemptions, rebalances and compounding
    pub fn pause(&mut self, caller: AccountId) -> VaultResult<()> {
        self.guarded(|vault| {
            vault.require_admin(caller)?;
            vault.paused = true;
            let timestamp = vault.ports.clock.now();
            warn!("Vault paused by {}", caller);
            vault.events.push(VaultEvent::VaultPaused { timestamp });
            Ok(())
        })
    }

    pub fn unpause(&mut self, caller: AccountId) -> VaultResult<()> {
        self.guarded(|vault| {
            vault.require_admin(caller)?;
            vault.paused = false;
            let timestamp = vault.ports.clock.now();
            info!("Vault unpaused by {}", caller);
            vault.events.push(VaultEvent::VaultUnpaused { timestamp });
            Ok(())
        })
    }

    /// Tier emergency mode: blocks constrained deposits and opens
    /// [`emergency_exit`](TierVault::emergency_exit)
    pub fn set_emergency_mode(&mut self, caller: AccountId, active: bool) -> VaultResult<()> {
        self.guarded(|vault| {
            vault.require_admin(caller)?;
            vault.emergency_mode = active;
            let timestamp = vault.ports.clock.now();
            warn!("Emergency mode set to {} by {}", active, caller);
            vault.events.push(VaultEvent::EmergencyModeSet { active, timestamp });
            Ok(())
        })
    }

    /// Release every staked position and send all pooled assets to
    /// `recipient`. Only while the vault is paused.
    pub fn emergency_withdraw(&mut self, caller: AccountId, recipient: AccountId) -> VaultResult<AssetPair> {
        self.guarded(|vault| {
            vault.require_admin(caller)?;
            if !vault.paused {
                return Err(VaultError::VaultNotPaused);
            }
            vault.unstake_all()?;
            let idle = vault.pool.idle_pair();
            vault.push_pair(recipient, idle)?;
            vault.pool.debit(Asset::Primary, idle.primary)?;
            vault.pool.debit(Asset::Reference, idle.reference)?;

            let timestamp = vault.ports.clock.now();
            warn!(
                "Emergency withdrawal of {} primary, {} reference to {}",
                idle.primary, idle.reference, recipient
            );
            vault.events.push(VaultEvent::EmergencyWithdrawal {
                recipient,
                primary: idle.primary,
                reference: idle.reference,
                timestamp,
            });
            Ok(idle)
        })
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn update_config(&mut self, caller: AccountId, edit: impl FnOnce(&mut VaultConfig)) -> VaultResult<()> {
        self.require_admin(caller)?;
        let mut next = self.config.clone();
        edit(&mut next);
        next.validate()?;
        self.config = next;
        Ok(())
    }

    fn config_updated(&mut self, field: &str) {
        info!("Configuration updated: {}", field);
        self.events.push(VaultEvent::ConfigUpdated {
            field: field.to_string(),
        });
    }
}
