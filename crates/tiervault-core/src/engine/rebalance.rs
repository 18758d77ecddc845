//! # Rebalancer
//!
//! Keeper-triggered and internal best-effort rebalancing. Both paths size
//! the swap the same way; they differ in what happens around it:
//!
//! | | keeper path | internal path |
//! |---|---|---|
//! | router | caller-supplied, must be allowlisted | configured default |
//! | failure | returned, counted by the circuit breaker | logged and swallowed |
//! | reward | paid to non-admin callers | never |

use tracing::{debug, error, info, warn};

use super::TierVault;
use crate::accounting::Prices;
use crate::circuit_breaker::FailureOutcome;
use crate::config::VaultConfig;
use crate::constants::SWAP_DEADLINE_SECS;
use crate::errors::{PortError, VaultError, VaultResult};
use crate::events::VaultEvent;
use crate::swap_sizer;
use crate::types::{AccountId, Asset, AssetPair};

/// Result of a successful keeper rebalance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub struct RebalanceReport {
    pub asset_in: Asset,
    pub amount_in: u128,
    pub amount_out: u128,
    /// Primary asset paid to the caller
    pub keeper_reward: u128,
    pub ratio_after: u128,
}

/// Balance movement of an executed swap
#[derive(Debug, Clone, Copy)]
pub(crate) struct SwapOutcome {
    pub asset_in: Asset,
    pub amount_in: u128,
    pub amount_out: u128,
}

impl TierVault {
    /// Rebalance through `exchange`. Non-admin callers earn the keeper reward
    /// on success.
    pub fn rebalance(&mut self, caller: AccountId, exchange: AccountId) -> VaultResult<RebalanceReport> {
        self.guarded(|vault| vault.rebalance_inner(caller, exchange))
    }

    fn rebalance_inner(&mut self, caller: AccountId, exchange: AccountId) -> VaultResult<RebalanceReport> {
        let config = self.config.clone();
        self.ensure_not_paused()?;
        if self.rebalance.paused {
            return Err(VaultError::RebalancePaused);
        }
        let now = self.ports.clock.now();
        if !self.needs_rebalance_at(&config, now)? {
            return Err(VaultError::RebalanceNotNeeded);
        }

        self.rebalance.begin()?;
        let prices = match self.read_prices() {
            Ok(prices) => prices,
            Err(err) => {
                self.rebalance.abandon();
                return Err(err);
            }
        };

        match self.execute_swap(&config, exchange, &prices, now) {
            Ok(Some(outcome)) => {
                self.rebalance.record_success();
                self.pool.last_rebalance = now;
                let ratio_after = self.current_ratio()?;
                self.events.push(VaultEvent::Rebalanced {
                    caller,
                    asset_in: outcome.asset_in,
                    amount_in: outcome.amount_in,
                    amount_out: outcome.amount_out,
                    tier: self.pool.tier,
                    ratio_after,
                    timestamp: now,
                });
                info!(
                    "Rebalanced by {}: {} {:?} -> {} (ratio {})",
                    caller, outcome.amount_in, outcome.asset_in, outcome.amount_out, ratio_after
                );

                let keeper_reward = if caller != config.admin {
                    self.pay_keeper(caller, &config, &prices, now)?
                } else {
                    0
                };
                self.stake_idle()?;

                Ok(RebalanceReport {
                    asset_in: outcome.asset_in,
                    amount_in: outcome.amount_in,
                    amount_out: outcome.amount_out,
                    keeper_reward,
                    ratio_after,
                })
            }
            Ok(None) => {
                self.rebalance.abandon();
                Err(VaultError::RebalanceNotNeeded)
            }
            Err(err) if err.is_swap_failure() => {
                let outcome = self.rebalance.record_failure(now, &config.circuit_breaker);
                let consecutive_failures = match outcome {
                    FailureOutcome::Counted { consecutive_failures } => consecutive_failures,
                    FailureOutcome::Tripped { consecutive_failures } => consecutive_failures,
                };
                warn!(
                    "Rebalance by {} failed ({} consecutive): {}",
                    caller, consecutive_failures, err
                );
                self.events.push(VaultEvent::RebalanceFailed {
                    caller,
                    reason: err.to_string(),
                    consecutive_failures,
                    timestamp: now,
                });
                if let FailureOutcome::Tripped { consecutive_failures } = outcome {
                    warn!(
                        "Circuit breaker tripped after {} failures, rebalancing paused",
                        consecutive_failures
                    );
                    self.events.push(VaultEvent::CircuitBreakerTriggered {
                        consecutive_failures,
                        timestamp: now,
                    });
                }
                Err(err)
            }
            Err(err) => {
                self.rebalance.abandon();
                Err(err)
            }
        }
    }

    /// Rebalance-if-needed pass run by deposits and compounding. Never fails
    /// the enclosing operation and never touches the failure count.
    pub(crate) fn try_internal_rebalance(&mut self, config: &VaultConfig) -> bool {
        let now = self.ports.clock.now();
        match self.needs_rebalance_at(config, now) {
            Ok(true) => {}
            Ok(false) => return false,
            Err(err) => {
                warn!("Skipping internal rebalance: {}", err);
                return false;
            }
        }
        let Some(exchange) = config.default_exchange else {
            debug!("No default exchange configured, skipping internal rebalance");
            return false;
        };
        let prices = match self.read_prices() {
            Ok(prices) => prices,
            Err(err) => {
                warn!("Skipping internal rebalance: {}", err);
                return false;
            }
        };
        if self.rebalance.begin().is_err() {
            return false;
        }

        match self.execute_swap(config, exchange, &prices, now) {
            Ok(Some(outcome)) => {
                self.rebalance.record_internal_success();
                self.pool.last_rebalance = now;
                let ratio_after = self.current_ratio().unwrap_or_default();
                self.events.push(VaultEvent::Rebalanced {
                    caller: self.vault_id,
                    asset_in: outcome.asset_in,
                    amount_in: outcome.amount_in,
                    amount_out: outcome.amount_out,
                    tier: self.pool.tier,
                    ratio_after,
                    timestamp: now,
                });
                info!(
                    "Internal rebalance: {} {:?} -> {}",
                    outcome.amount_in, outcome.asset_in, outcome.amount_out
                );
                true
            }
            Ok(None) => {
                self.rebalance.abandon();
                false
            }
            Err(err) => {
                self.rebalance.abandon();
                warn!("Internal rebalance failed: {}", err);
                false
            }
        }
    }

    /// Size and submit the corrective swap, then bring pooled balances in
    /// line with what actually moved. `Ok(None)` means nothing to swap.
    fn execute_swap(
        &mut self,
        config: &VaultConfig,
        exchange: AccountId,
        prices: &Prices,
        now: i64,
    ) -> VaultResult<Option<SwapOutcome>> {
        let params = self.effective_params(config);
        let Some(plan) = swap_sizer::size_swap(
            self.pool.pooled,
            self.pool.target_ratio,
            prices,
            params.max_slippage_bps,
        )?
        else {
            return Ok(None);
        };
        if !config.is_trusted(&exchange) {
            return Err(VaultError::UntrustedExchange(exchange));
        }

        let asset_in = plan.asset_in;
        let asset_out = plan.asset_out();
        let mut required = AssetPair::ZERO;
        *required.get_mut(asset_in) = plan.amount_in;
        self.ensure_idle(required)?;

        let before = self.custody_balances();
        let amounts = self
            .ports
            .exchange
            .swap(
                exchange,
                plan.amount_in,
                plan.min_amount_out,
                &plan.path(),
                self.vault_id,
                now + SWAP_DEADLINE_SECS,
            )
            .map_err(VaultError::SwapFailed)?;
        let after = self.custody_balances();

        let spent = before.get(asset_in).saturating_sub(after.get(asset_in));
        let received = after.get(asset_out).saturating_sub(before.get(asset_out));
        debug!(
            "Swap reported {:?}, measured {} in / {} out",
            amounts, spent, received
        );

        // Pooled balances mirror custody whatever the venue did
        self.pool.debit(asset_in, spent)?;
        self.pool.credit(asset_out, received)?;

        if received < plan.min_amount_out {
            error!(
                "Exchange {} settled {} below minimum {}, breaching its min-out guarantee",
                exchange, received, plan.min_amount_out
            );
            return Err(VaultError::SwapFailed(PortError::InsufficientOutput {
                actual: received,
                minimum: plan.min_amount_out,
            }));
        }
        Ok(Some(SwapOutcome {
            asset_in,
            amount_in: spent,
            amount_out: received,
        }))
    }
}
