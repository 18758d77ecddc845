use std::time::Duration;

use tracing::{debug, error, info, warn};

use tiervault_core::circuit_breaker::RebalancePhase;
use tiervault_core::{AccountId, RebalanceReport, TierVault, VaultError};

use crate::config::{KeeperConfig, RetryConfig, VaultTarget};
use crate::error::{KeeperError, KeeperResult};
use crate::simulation::SimMarket;

/// First byte of the simulated vault accounts; vault `i` uses `base + i`
const VAULT_ACCOUNT_BASE: u8 = 0xe0;

/// A vault the keeper services, with the market it lives in
pub struct ManagedVault {
    pub target: VaultTarget,
    pub vault: TierVault,
    pub market: SimMarket,
}

/// Running totals across iterations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeeperStats {
    pub iterations: u64,
    pub rebalances: u64,
    pub rebalance_failures: u64,
    pub keeper_rewards: u128,
    pub compounds: u64,
    pub fee_units: u128,
    pub events: u64,
}

/// What one pass over the vaults did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationSummary {
    pub iteration: u64,
    pub rebalanced: usize,
    pub compounded: usize,
    pub errors: usize,
}

/// Keeper service that rebalances and compounds every enabled vault
pub struct Keeper {
    /// Keeper configuration
    config: KeeperConfig,

    /// Serviced vaults, highest priority first
    vaults: Vec<ManagedVault>,

    /// Dry run mode flag
    dry_run: bool,

    iteration: u64,
    stats: KeeperStats,
}

impl Keeper {
    /// Create a new keeper instance, opening one simulated vault per enabled
    /// target
    pub fn new(config: KeeperConfig, dry_run: bool) -> KeeperResult<Self> {
        config.validate()?;

        let mut vaults = Vec::new();
        for (i, target) in config.enabled_vaults().into_iter().enumerate() {
            let vault_id = AccountId::from_byte(VAULT_ACCOUNT_BASE.wrapping_add(i as u8));
            let market = SimMarket::new(vault_id, &config.simulation, i as u64);
            let vault = market.open_vault(target, config.exchange)?;
            info!("Servicing vault {} ({}) on tier {}", target.name, vault_id, target.tier);
            vaults.push(ManagedVault {
                target: target.clone(),
                vault,
                market,
            });
        }

        Ok(Self {
            config,
            vaults,
            dry_run,
            iteration: 0,
            stats: KeeperStats::default(),
        })
    }

    pub fn stats(&self) -> &KeeperStats {
        &self.stats
    }

    pub fn vaults(&self) -> &[ManagedVault] {
        &self.vaults
    }

    pub fn vaults_mut(&mut self) -> &mut [ManagedVault] {
        &mut self.vaults
    }

    /// Advance every market one tick and service each vault
    pub async fn run_iteration(&mut self) -> KeeperResult<IterationSummary> {
        self.iteration += 1;
        self.stats.iterations += 1;
        let compound_due = self.iteration % self.config.compound_every == 0;
        let mut summary = IterationSummary {
            iteration: self.iteration,
            ..Default::default()
        };

        for managed in &mut self.vaults {
            match service_vault(managed, &self.config, self.dry_run, compound_due, &mut self.stats).await {
                Ok(outcome) => {
                    summary.rebalanced += outcome.rebalanced as usize;
                    summary.compounded += outcome.compounded as usize;
                }
                Err(e) => {
                    error!("Failed to service vault {}: {}", managed.target.name, e);
                    summary.errors += 1;
                    // Continue with other vaults
                }
            }
        }

        Ok(summary)
    }

    /// Report vaults that need operator attention
    pub async fn health_check(&self) -> KeeperResult<()> {
        let mut problems = Vec::new();

        for managed in &self.vaults {
            let status = managed.vault.status()?;
            debug!("{}: {}", managed.target.name, serde_json::to_string(&status)?);

            if status.paused {
                problems.push(format!("{} is paused", managed.target.name));
            }
            if status.emergency_mode {
                problems.push(format!("{} is in emergency mode", managed.target.name));
            }
            if status.phase == RebalancePhase::Paused {
                problems.push(format!(
                    "{} circuit breaker tripped after {} failures",
                    managed.target.name, status.consecutive_failures
                ));
            }
            if status.total_value.is_none() {
                problems.push(format!("{} has no price", managed.target.name));
            }
        }

        info!(
            "Stats: {} iterations, {} rebalances ({} failed), {} keeper reward, {} compounds",
            self.stats.iterations,
            self.stats.rebalances,
            self.stats.rebalance_failures,
            self.stats.keeper_rewards,
            self.stats.compounds
        );

        if problems.is_empty() {
            Ok(())
        } else {
            Err(KeeperError::Unhealthy(problems.join("; ")))
        }
    }
}

#[derive(Debug, Default)]
struct VaultOutcome {
    rebalanced: bool,
    compounded: bool,
}

async fn service_vault(
    managed: &mut ManagedVault,
    config: &KeeperConfig,
    dry_run: bool,
    compound_due: bool,
    stats: &mut KeeperStats,
) -> KeeperResult<VaultOutcome> {
    let name = managed.target.name.as_str();
    let mut outcome = VaultOutcome::default();

    let tick = managed.market.step(&mut managed.vault)?;
    debug!("{}: market tick {:?}", name, tick);

    if managed.vault.is_paused() {
        debug!("{}: vault paused, skipping", name);
        return Ok(outcome);
    }

    if managed.vault.needs_rebalance()? {
        if dry_run {
            match managed.vault.preview_swap()? {
                Some(plan) => info!(
                    "DRY RUN: Would rebalance {}: {} {:?} for at least {}",
                    name, plan.amount_in, plan.asset_in, plan.min_amount_out
                ),
                None => info!("DRY RUN: {} drifted but no swap is possible", name),
            }
        } else {
            match rebalance_with_retry(&mut managed.vault, config.keeper_account, config.exchange, &config.retry)
                .await
            {
                Ok(report) => {
                    info!(
                        "Rebalanced {}: {} {:?} -> {}, reward {}",
                        name, report.amount_in, report.asset_in, report.amount_out, report.keeper_reward
                    );
                    stats.rebalances += 1;
                    stats.keeper_rewards += report.keeper_reward;
                    outcome.rebalanced = true;
                }
                Err(KeeperError::Vault(e)) if e.is_swap_failure() => {
                    warn!("Rebalance of {} failed: {}", name, e);
                    stats.rebalance_failures += 1;
                }
                Err(e) => return Err(e),
            }
        }
    } else {
        debug!("{}: within band", name);
    }

    if compound_due && !dry_run {
        let report = managed.vault.compound(config.keeper_account)?;
        let fee_units = managed.vault.collect_fees()?;
        debug!(
            "{}: compounded {}/{}, {} performance + {} management fee units",
            name, report.rewards.primary, report.rewards.reference, report.fee_units, fee_units
        );
        stats.compounds += 1;
        stats.fee_units += report.fee_units + fee_units;
        outcome.compounded = true;
    }

    for event in managed.vault.drain_events() {
        debug!("{} event: {}", name, serde_json::to_string(&event)?);
        stats.events += 1;
    }

    Ok(outcome)
}

/// Submit a rebalance, retrying with backoff while the oracle is down.
/// Swap failures are not retried; the vault's circuit breaker counts them.
async fn rebalance_with_retry(
    vault: &mut TierVault,
    keeper: AccountId,
    exchange: AccountId,
    retry: &RetryConfig,
) -> KeeperResult<RebalanceReport> {
    let mut attempt = 0;
    loop {
        match vault.rebalance(keeper, exchange) {
            Ok(report) => return Ok(report),
            Err(e @ VaultError::OracleUnavailable(_)) => {
                if attempt >= retry.max_retries {
                    return Err(KeeperError::RetriesExhausted {
                        attempts: attempt + 1,
                        last: e,
                    });
                }
                let delay = retry.delay_for_attempt(attempt);
                warn!("Rebalance attempt {} failed: {}, retrying in {}ms", attempt + 1, e, delay);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
