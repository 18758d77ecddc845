//! Simulated market the keeper runs against.
//!
//! Each vault gets its own [`SimLedger`] plus a seeded RNG that moves the
//! reference price, drips staking rewards, toggles exchange outages and
//! makes one-sided holder deposits that push the pool off its target ratio.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use tiervault_core::math::{apply_ratio, safe_calculate_bps};
use tiervault_core::sim::{SimCall, SimLedger};
use tiervault_core::{
    AccountId, Asset, TierId, TierPolicy, TierVault, VaultConfig, VaultError, SCALE,
};

use crate::config::{SimulationConfig, VaultTarget};
use crate::error::KeeperResult;

/// Administrator of every simulated vault
pub const SIM_ADMIN: AccountId = AccountId::from_byte(0xad);

/// Holders that make the random deposits
pub const SIM_HOLDERS: [AccountId; 3] = [
    AccountId::from_byte(0x01),
    AccountId::from_byte(0x02),
    AccountId::from_byte(0x03),
];

const HOLDER_PRIMARY_FUNDS: u128 = 1_000_000_000_000_000;
const HOLDER_REFERENCE_FUNDS: u128 = 1_000_000_000_000;

/// What happened to the market in one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub reference_price: u128,
    pub rewards: (u128, u128),
    pub exchange_down: bool,
    /// Units minted by a random deposit, if one was made and accepted
    pub deposit_units: Option<u128>,
}

pub struct SimMarket {
    vault_id: AccountId,
    ledger: SimLedger,
    rng: StdRng,
    config: SimulationConfig,
}

impl SimMarket {
    /// Market for one vault. `stream` separates the RNG streams of vaults
    /// sharing a seed.
    pub fn new(vault_id: AccountId, config: &SimulationConfig, stream: u64) -> Self {
        let ledger = SimLedger::new(
            vault_id,
            chrono::Utc::now().timestamp(),
            SCALE,
            config.initial_reference_price as u128 * SCALE,
        );
        for holder in SIM_HOLDERS {
            ledger.fund(holder, Asset::Primary, HOLDER_PRIMARY_FUNDS);
            ledger.fund(holder, Asset::Reference, HOLDER_REFERENCE_FUNDS);
        }
        Self {
            vault_id,
            ledger,
            rng: StdRng::seed_from_u64(config.seed.wrapping_add(stream)),
            config: config.clone(),
        }
    }

    pub fn ledger(&self) -> &SimLedger {
        &self.ledger
    }

    /// Build a vault wired to this market, trusting `exchange`, and seed it
    /// with liquidity at the tier's target ratio
    pub fn open_vault(&self, target: &VaultTarget, exchange: AccountId) -> KeeperResult<TierVault> {
        let tier = TierId(target.tier);
        let policy = TierPolicy::standard();
        let ratio = policy.spec(tier)?.ratio;
        let config = VaultConfig::new(SIM_ADMIN).with_exchange(exchange);

        let mut vault = TierVault::new(
            self.vault_id,
            config,
            policy,
            tier,
            self.ledger.collaborators(),
        )?;

        let reference = self.config.seed_reference as u128;
        let primary = if ratio == 0 {
            self.config.seed_primary as u128
        } else {
            apply_ratio(reference, ratio)?
        };
        self.ledger.fund(SIM_ADMIN, Asset::Primary, primary);
        self.ledger.fund(SIM_ADMIN, Asset::Reference, reference);
        let units = vault.deposit(SIM_ADMIN, primary, reference)?;
        debug!("Seeded {} with {}/{} for {} units", target.name, primary, reference, units);

        Ok(vault)
    }

    /// Advance the market by one tick
    pub fn step(&mut self, vault: &mut TierVault) -> KeeperResult<TickReport> {
        self.ledger.advance(self.config.seconds_per_tick);

        let reference_price = self.walk_price();

        let rewards = (
            safe_calculate_bps(self.ledger.program_staked(Asset::Primary), self.config.reward_rate_bps)?,
            safe_calculate_bps(self.ledger.program_staked(Asset::Reference), self.config.reward_rate_bps)?,
        );
        self.ledger.accrue_rewards(rewards.0, rewards.1);

        let exchange_down = self.rng.gen_bool(self.config.swap_failure_probability);
        if exchange_down {
            self.ledger.fail(SimCall::Swap);
        } else {
            self.ledger.heal(SimCall::Swap);
        }

        let deposit_units = if self.rng.gen_bool(self.config.deposit_probability) {
            self.random_deposit(vault)
        } else {
            None
        };

        Ok(TickReport {
            reference_price,
            rewards,
            exchange_down,
            deposit_units,
        })
    }

    fn walk_price(&mut self) -> u128 {
        let prices = self.ledger.prices();
        let vol = self.config.volatility_bps as i64;
        let move_bps = if vol == 0 { 0 } else { self.rng.gen_range(-vol..=vol) };
        let reference = (prices.reference as i128 * (10_000 + move_bps as i128) / 10_000).max(1) as u128;
        self.ledger.set_prices(prices.primary, reference);
        reference
    }

    /// One-sided deposit of 1-5% of the pooled amount of a random asset
    fn random_deposit(&mut self, vault: &mut TierVault) -> Option<u128> {
        let holder = SIM_HOLDERS[self.rng.gen_range(0..SIM_HOLDERS.len())];
        let asset = if self.rng.gen_bool(0.5) {
            Asset::Primary
        } else {
            Asset::Reference
        };
        let pct = self.rng.gen_range(1u128..=5);
        let amount = (vault.pool().pooled(asset) * pct / 100).max(1);
        let (primary, reference) = match asset {
            Asset::Primary => (amount, 0),
            Asset::Reference => (0, amount),
        };

        match vault.deposit(holder, primary, reference) {
            Ok(units) => {
                debug!("Holder {} deposited {} {:?} for {} units", holder, amount, asset, units);
                Some(units)
            }
            Err(VaultError::VaultPaused) => None,
            Err(e) => {
                warn!("Simulated deposit by {} rejected: {}", holder, e);
                None
            }
        }
    }
}
