//! # Tier Vault Engine
//!
//! The generic rebalancing engine. One [`TierVault`] owns the pool state,
//! the rebalance bookkeeping, the configuration snapshot and the injected
//! collaborators, and exposes every vault operation:
//!
//! - holder flows: [`deposit`](TierVault::deposit),
//!   [`redeem`](TierVault::redeem), [`emergency_exit`](TierVault::emergency_exit)
//! - keeper flows: [`rebalance`](TierVault::rebalance),
//!   [`compound`](TierVault::compound), [`collect_fees`](TierVault::collect_fees)
//! - administration (see `admin.rs`)
//!
//! Every mutating operation runs under the reentrancy lock and reads one
//! [`VaultConfig`] snapshot. Validation happens before any collaborator is
//! called; after that, pool accounting only ever mirrors balance changes the
//! collaborators actually made.

mod admin;
mod compound;
mod fees;
mod incentive;
mod rebalance;
mod staking;

use tracing::{debug, info, warn};

use crate::accounting::{self, Prices};
use crate::circuit_breaker::{RebalancePhase, RebalanceState};
use crate::config::{RebalanceParams, VaultConfig};
use crate::errors::{VaultError, VaultResult};
use crate::events::VaultEvent;
use crate::ports::{AssetCustody, Clock, DualStaking, Exchange, PriceOracle, UnitToken};
use crate::ratio::{self, Deviation, TriggerInputs};
use crate::reentrancy::{ReentrancyGuard, ReentrancyStatus};
use crate::swap_sizer::{self, SwapPlan};
use crate::tier::TierPolicy;
use crate::types::{AccountId, Asset, AssetPair, Pool, TierId};

pub use compound::CompoundReport;
pub use fees::management_fee_units;
pub use incentive::keeper_reward;
pub use rebalance::RebalanceReport;

// ============================================================================
// Collaborators
// ============================================================================

/// External systems the engine talks to
pub struct Collaborators {
    pub oracle: Box<dyn PriceOracle>,
    pub units: Box<dyn UnitToken>,
    pub exchange: Box<dyn Exchange>,
    pub staking: Box<dyn DualStaking>,
    pub custody: Box<dyn AssetCustody>,
    pub clock: Box<dyn Clock>,
}

// ============================================================================
// Views
// ============================================================================

/// Read-only snapshot for dashboards and keepers
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub struct VaultStatus {
    pub tier: TierId,
    pub pooled: AssetPair,
    pub staked: AssetPair,
    pub target_ratio: u128,
    pub current_ratio: u128,
    /// `None` for ratio-free tiers
    pub deviation_bps: Option<u128>,
    pub total_units: u128,
    /// `None` while the oracle is unavailable
    pub total_value: Option<u128>,
    pub unit_price: Option<u128>,
    pub phase: RebalancePhase,
    pub consecutive_failures: u8,
    pub successful_rebalances: u64,
    pub last_rebalance: i64,
    pub paused: bool,
    pub emergency_mode: bool,
}

// ============================================================================
// Engine
// ============================================================================

pub struct TierVault {
    /// Account that holds the pooled assets and receives swap output
    vault_id: AccountId,
    pool: Pool,
    rebalance: RebalanceState,
    config: VaultConfig,
    policy: TierPolicy,
    /// Engine-wide pause set by the administrator
    paused: bool,
    /// Tier emergency mode
    emergency_mode: bool,
    lock: ReentrancyStatus,
    events: Vec<VaultEvent>,
    ports: Collaborators,
}

impl std::fmt::Debug for TierVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TierVault")
            .field("vault_id", &self.vault_id)
            .field("pool", &self.pool)
            .field("rebalance", &self.rebalance)
            .field("paused", &self.paused)
            .field("emergency_mode", &self.emergency_mode)
            .finish_non_exhaustive()
    }
}

impl TierVault {
    /// Create an empty vault targeting `tier`
    pub fn new(
        vault_id: AccountId,
        config: VaultConfig,
        policy: TierPolicy,
        tier: TierId,
        ports: Collaborators,
    ) -> VaultResult<Self> {
        config.validate()?;
        let ratio = policy.spec(tier)?.ratio;
        let now = ports.clock.now();
        info!("Created vault {} targeting {} (ratio {})", vault_id, tier, ratio);
        Ok(Self {
            vault_id,
            pool: Pool::new(tier, ratio, now),
            rebalance: RebalanceState::new(),
            config,
            policy,
            paused: false,
            emergency_mode: false,
            lock: ReentrancyStatus::Unlocked,
            events: Vec::new(),
            ports,
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn vault_id(&self) -> AccountId {
        self.vault_id
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn rebalance_state(&self) -> &RebalanceState {
        &self.rebalance
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn policy(&self) -> &TierPolicy {
        &self.policy
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn emergency_mode(&self) -> bool {
        self.emergency_mode
    }

    pub fn events(&self) -> &[VaultEvent] {
        &self.events
    }

    /// Take every event recorded since the last drain
    pub fn drain_events(&mut self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // Read-only views
    // ------------------------------------------------------------------

    pub fn current_ratio(&self) -> VaultResult<u128> {
        ratio::current_ratio(self.pool.pooled)
    }

    pub fn deviation(&self) -> VaultResult<Option<Deviation>> {
        ratio::deviation(self.pool.pooled, self.pool.target_ratio)
    }

    pub fn deviation_bps(&self) -> VaultResult<Option<u128>> {
        Ok(self.deviation()?.map(|dev| dev.deviation_bps))
    }

    /// Whether a rebalance would currently be accepted
    pub fn needs_rebalance(&self) -> VaultResult<bool> {
        self.needs_rebalance_at(&self.config, self.ports.clock.now())
    }

    pub fn total_value(&self) -> VaultResult<u128> {
        accounting::total_value(self.pool.pooled, &self.read_prices()?)
    }

    pub fn unit_price(&self) -> VaultResult<u128> {
        let value = self.total_value()?;
        accounting::unit_price(value, self.ports.units.total_units())
    }

    /// The swap a rebalance would submit right now, if any
    pub fn preview_swap(&self) -> VaultResult<Option<SwapPlan>> {
        let prices = self.read_prices()?;
        let params = self.effective_params(&self.config);
        swap_sizer::size_swap(
            self.pool.pooled,
            self.pool.target_ratio,
            &prices,
            params.max_slippage_bps,
        )
    }

    pub fn status(&self) -> VaultResult<VaultStatus> {
        let total_units = self.ports.units.total_units();
        let total_value = self.total_value().ok();
        let unit_price = match total_value {
            Some(value) => Some(accounting::unit_price(value, total_units)?),
            None => None,
        };
        Ok(VaultStatus {
            tier: self.pool.tier,
            pooled: self.pool.pooled,
            staked: self.pool.staked,
            target_ratio: self.pool.target_ratio,
            current_ratio: self.current_ratio()?,
            deviation_bps: self.deviation_bps()?,
            total_units,
            total_value,
            unit_price,
            phase: self.rebalance.phase(),
            consecutive_failures: self.rebalance.consecutive_failures,
            successful_rebalances: self.rebalance.successful_rebalances,
            last_rebalance: self.pool.last_rebalance,
            paused: self.paused,
            emergency_mode: self.emergency_mode,
        })
    }

    // ------------------------------------------------------------------
    // Holder operations
    // ------------------------------------------------------------------

    /// Deposit any mix of both assets and receive ownership units.
    /// Returns the units minted.
    pub fn deposit(&mut self, holder: AccountId, primary: u128, reference: u128) -> VaultResult<u128> {
        self.guarded(|vault| vault.deposit_inner(holder, primary, reference))
    }

    /// Burn `units` for a proportional share of both pooled assets
    pub fn redeem(&mut self, holder: AccountId, units: u128) -> VaultResult<AssetPair> {
        self.guarded(|vault| {
            vault.ensure_not_paused()?;
            vault.redeem_inner(holder, units)
        })
    }

    /// Unconstrained exit while tier emergency mode is active: release every
    /// staked position, then redeem all of the holder's units
    pub fn emergency_exit(&mut self, holder: AccountId) -> VaultResult<AssetPair> {
        self.guarded(|vault| {
            if !vault.emergency_mode {
                return Err(VaultError::EmergencyModeInactive);
            }
            vault.unstake_all()?;
            let units = vault.ports.units.balance_of(holder);
            vault.redeem_inner(holder, units)
        })
    }

    fn deposit_inner(&mut self, holder: AccountId, primary: u128, reference: u128) -> VaultResult<u128> {
        self.ensure_not_paused()?;
        if primary == 0 && reference == 0 {
            return Err(VaultError::InvalidAmount);
        }
        let config = self.config.clone();
        self.policy
            .validate_deposit(self.pool.tier, primary, reference, self.emergency_mode)?;

        let prices = self.read_prices()?;
        // Settle accrued management fee so the new units don't pay for time
        // before they existed
        self.collect_fees_inner(&config)?;
        let deposit = AssetPair::new(primary, reference);
        let units = accounting::shares_for_deposit(
            deposit,
            self.pool.pooled,
            self.ports.units.total_units(),
            &prices,
        )?;
        if units == 0 {
            return Err(VaultError::ZeroUnits);
        }

        self.pull_pair(holder, deposit)?;
        if let Err(err) = self.ports.units.mint(holder, units) {
            self.push_pair(holder, deposit)?;
            return Err(err.into());
        }
        self.pool.credit(Asset::Primary, primary)?;
        self.pool.credit(Asset::Reference, reference)?;

        let now = self.ports.clock.now();
        info!(
            "Deposit by {}: {} primary, {} reference -> {} units",
            holder, primary, reference, units
        );
        self.events.push(VaultEvent::Deposited {
            holder,
            primary,
            reference,
            units_minted: units,
            timestamp: now,
        });

        self.try_internal_rebalance(&config);
        self.stake_idle()?;
        Ok(units)
    }

    fn redeem_inner(&mut self, holder: AccountId, units: u128) -> VaultResult<AssetPair> {
        // Reject bad amounts before settling fees
        accounting::assets_for_redeem(
            units,
            self.ports.units.balance_of(holder),
            self.ports.units.total_units(),
            self.pool.pooled,
        )?;

        let config = self.config.clone();
        self.collect_fees_inner(&config)?;
        let held = self.ports.units.balance_of(holder);
        let total_units = self.ports.units.total_units();
        let owed = accounting::assets_for_redeem(units, held, total_units, self.pool.pooled)?;

        self.ensure_idle(owed)?;

        self.push_pair(holder, owed)?;
        self.ports.units.burn(holder, units)?;
        self.pool.debit(Asset::Primary, owed.primary)?;
        self.pool.debit(Asset::Reference, owed.reference)?;

        let now = self.ports.clock.now();
        info!(
            "Redeem by {}: {} units -> {} primary, {} reference",
            holder, units, owed.primary, owed.reference
        );
        self.events.push(VaultEvent::Redeemed {
            holder,
            units_burned: units,
            primary: owed.primary,
            reference: owed.reference,
            timestamp: now,
        });
        Ok(owed)
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    /// Run `op` holding the reentrancy lock
    fn guarded<T>(&mut self, op: impl FnOnce(&mut Self) -> VaultResult<T>) -> VaultResult<T> {
        ReentrancyGuard::acquire(&mut self.lock)?;
        let result = op(self);
        ReentrancyGuard::release(&mut self.lock);
        result
    }

    fn ensure_not_paused(&self) -> VaultResult<()> {
        if self.paused {
            return Err(VaultError::VaultPaused);
        }
        Ok(())
    }

    fn read_prices(&self) -> VaultResult<Prices> {
        let primary = self
            .ports
            .oracle
            .price_of(Asset::Primary)
            .map_err(VaultError::OracleUnavailable)?;
        let reference = self
            .ports
            .oracle
            .price_of(Asset::Reference)
            .map_err(VaultError::OracleUnavailable)?;
        Prices::new(primary, reference)
    }

    fn effective_params(&self, config: &VaultConfig) -> RebalanceParams {
        self.policy.effective_params(self.pool.tier, config.rebalance)
    }

    fn needs_rebalance_at(&self, config: &VaultConfig, now: i64) -> VaultResult<bool> {
        ratio::needs_rebalance(&TriggerInputs {
            pooled: self.pool.pooled,
            target_ratio: self.pool.target_ratio,
            params: self.effective_params(config),
            rebalance_paused: self.rebalance.paused,
            last_rebalance: self.pool.last_rebalance,
            now,
        })
    }

    /// Make sure `required` is sitting idle, unstaking the shortfall
    fn ensure_idle(&mut self, required: AssetPair) -> VaultResult<()> {
        let shortfall = AssetPair::new(
            required.primary.saturating_sub(self.pool.idle(Asset::Primary)),
            required.reference.saturating_sub(self.pool.idle(Asset::Reference)),
        );
        if shortfall.is_zero() {
            return Ok(());
        }
        debug!(
            "Unstaking shortfall: {} primary, {} reference",
            shortfall.primary, shortfall.reference
        );
        self.unstake_for(shortfall)?;
        for asset in Asset::BOTH {
            let idle = self.pool.idle(asset);
            if idle < required.get(asset) {
                return Err(VaultError::InsufficientLiquidity {
                    asset,
                    idle,
                    required: required.get(asset),
                });
            }
        }
        Ok(())
    }

    /// Pull both amounts from `from`, returning the first leg if the second fails
    fn pull_pair(&mut self, from: AccountId, amounts: AssetPair) -> VaultResult<()> {
        if amounts.primary > 0 {
            self.ports.custody.pull(from, Asset::Primary, amounts.primary)?;
        }
        if amounts.reference > 0 {
            if let Err(err) = self.ports.custody.pull(from, Asset::Reference, amounts.reference) {
                if amounts.primary > 0 {
                    self.ports.custody.push(from, Asset::Primary, amounts.primary)?;
                }
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Push both amounts to `to`, recovering the first leg if the second fails
    fn push_pair(&mut self, to: AccountId, amounts: AssetPair) -> VaultResult<()> {
        if amounts.primary > 0 {
            self.ports.custody.push(to, Asset::Primary, amounts.primary)?;
        }
        if amounts.reference > 0 {
            if let Err(err) = self.ports.custody.push(to, Asset::Reference, amounts.reference) {
                if amounts.primary > 0 {
                    if let Err(recover) = self.ports.custody.pull(to, Asset::Primary, amounts.primary) {
                        warn!("Could not recover primary leg from {}: {}", to, recover);
                    }
                }
                return Err(err.into());
            }
        }
        Ok(())
    }

    fn require_admin(&self, caller: AccountId) -> VaultResult<()> {
        if caller != self.config.admin {
            return Err(VaultError::Unauthorized(caller));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::FeeParams;
    use crate::sim::SimLedger;

    pub const VAULT: AccountId = AccountId::from_byte(0xee);
    pub const ADMIN: AccountId = AccountId::from_byte(0xad);
    pub const ROUTER: AccountId = AccountId::from_byte(0x5a);
    pub const ALICE: AccountId = AccountId::from_byte(1);
    pub const BOB: AccountId = AccountId::from_byte(2);
    pub const KEEPER: AccountId = AccountId::from_byte(3);

    /// Fee-free vault on tier 2 (2000:1) over the default market
    pub fn setup() -> (TierVault, SimLedger) {
        setup_tier(TierId(2), TierPolicy::standard())
    }

    pub fn setup_tier(tier: TierId, policy: TierPolicy) -> (TierVault, SimLedger) {
        let ledger = SimLedger::default_market(VAULT);
        for holder in [ALICE, BOB] {
            ledger.fund(holder, Asset::Primary, 1_000_000_000);
            ledger.fund(holder, Asset::Reference, 1_000_000);
        }
        let mut config = VaultConfig::new(ADMIN).with_exchange(ROUTER);
        config.fees = FeeParams::ZERO;
        let vault = TierVault::new(VAULT, config, policy, tier, ledger.collaborators()).unwrap();
        (vault, ledger)
    }
}
