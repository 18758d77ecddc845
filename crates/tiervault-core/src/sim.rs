//! # Simulated Ledger
//!
//! In-memory implementation of every collaborator port, sharing one ledger
//! so that balances stay consistent across the oracle, custody, exchange,
//! staking program and unit token. Used by the test suites and by the
//! keeper's simulation mode.
//!
//! Single-threaded by construction (`Rc<RefCell<_>>`), matching the vault's
//! execution model. Failures can be injected per call with [`SimLedger::fail`].

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::constants::{BPS_DENOMINATOR, SCALE};
use crate::engine::Collaborators;
use crate::errors::{PortError, PortResult};
use crate::math::{convert_amount, mul_div, Rounding};
use crate::ports::{AssetCustody, Clock, DualStaking, Exchange, PriceOracle, UnitToken};
use crate::types::{AccountId, Asset, AssetPair};

/// Calls that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimCall {
    Swap,
    Stake(Asset),
    StakeJoint,
    Unstake(Asset),
    UnstakeJoint,
    ClaimRewards,
    ClaimAssetRewards,
    Oracle,
}

#[derive(Debug)]
struct LedgerState {
    vault: AccountId,
    now: i64,
    prices: AssetPair,
    wallets: HashMap<(AccountId, Asset), u128>,
    units: HashMap<AccountId, u128>,
    total_units: u128,
    program_staked: AssetPair,
    pending_rewards: AssetPair,
    pending_asset_rewards: AssetPair,
    /// Fee charged by the exchange on output (bps)
    exchange_fee_bps: u16,
    failing: HashSet<SimCall>,
    calls: Vec<SimCall>,
}

impl LedgerState {
    fn wallet(&self, account: AccountId, asset: Asset) -> u128 {
        self.wallets.get(&(account, asset)).copied().unwrap_or(0)
    }

    fn move_funds(&mut self, from: AccountId, to: AccountId, asset: Asset, amount: u128) -> PortResult<()> {
        let available = self.wallet(from, asset);
        if available < amount {
            return Err(PortError::InsufficientBalance {
                asset,
                available,
                requested: amount,
            });
        }
        self.wallets.insert((from, asset), available - amount);
        *self.wallets.entry((to, asset)).or_insert(0) += amount;
        Ok(())
    }

    fn check(&mut self, call: SimCall) -> PortResult<()> {
        self.calls.push(call);
        if self.failing.contains(&call) {
            return Err(PortError::Reverted(format!("{:?} disabled", call)));
        }
        Ok(())
    }

    fn stake_from_vault(&mut self, asset: Asset, amount: u128) -> PortResult<()> {
        let vault = self.vault;
        let available = self.wallet(vault, asset);
        if available < amount {
            return Err(PortError::InsufficientBalance {
                asset,
                available,
                requested: amount,
            });
        }
        self.wallets.insert((vault, asset), available - amount);
        *self.program_staked.get_mut(asset) += amount;
        Ok(())
    }

    fn unstake_to_vault(&mut self, asset: Asset, amount: u128) -> PortResult<()> {
        let staked = self.program_staked.get(asset);
        if staked < amount {
            return Err(PortError::InsufficientBalance {
                asset,
                available: staked,
                requested: amount,
            });
        }
        *self.program_staked.get_mut(asset) -= amount;
        let vault = self.vault;
        *self.wallets.entry((vault, asset)).or_insert(0) += amount;
        Ok(())
    }
}

/// Handle to the shared ledger. Clones share state.
#[derive(Debug, Clone)]
pub struct SimLedger {
    state: Rc<RefCell<LedgerState>>,
}

impl SimLedger {
    /// New ledger for `vault`, starting at `now` with prices in 18-digit
    /// fixed point
    pub fn new(vault: AccountId, now: i64, primary_price: u128, reference_price: u128) -> Self {
        Self {
            state: Rc::new(RefCell::new(LedgerState {
                vault,
                now,
                prices: AssetPair::new(primary_price, reference_price),
                wallets: HashMap::new(),
                units: HashMap::new(),
                total_units: 0,
                program_staked: AssetPair::ZERO,
                pending_rewards: AssetPair::ZERO,
                pending_asset_rewards: AssetPair::ZERO,
                exchange_fee_bps: 0,
                failing: HashSet::new(),
                calls: Vec::new(),
            })),
        }
    }

    /// Ledger with 1 reference = 2000 primary at t = 1_000_000
    pub fn default_market(vault: AccountId) -> Self {
        Self::new(vault, 1_000_000, SCALE, 2_000 * SCALE)
    }

    /// Boxed ports wired to this ledger
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            oracle: Box::new(SimOracle(self.clone())),
            units: Box::new(SimUnits(self.clone())),
            exchange: Box::new(SimExchange(self.clone())),
            staking: Box::new(SimStaking(self.clone())),
            custody: Box::new(SimCustody(self.clone())),
            clock: Box::new(SimClock(self.clone())),
        }
    }

    // ------------------------------------------------------------------
    // Scenario controls
    // ------------------------------------------------------------------

    pub fn fund(&self, account: AccountId, asset: Asset, amount: u128) {
        *self.state.borrow_mut().wallets.entry((account, asset)).or_insert(0) += amount;
    }

    pub fn set_prices(&self, primary: u128, reference: u128) {
        self.state.borrow_mut().prices = AssetPair::new(primary, reference);
    }

    pub fn prices(&self) -> AssetPair {
        self.state.borrow().prices
    }

    pub fn advance(&self, secs: i64) {
        self.state.borrow_mut().now += secs;
    }

    pub fn now(&self) -> i64 {
        self.state.borrow().now
    }

    pub fn fail(&self, call: SimCall) {
        self.state.borrow_mut().failing.insert(call);
    }

    pub fn heal(&self, call: SimCall) {
        self.state.borrow_mut().failing.remove(&call);
    }

    pub fn heal_all(&self) {
        self.state.borrow_mut().failing.clear();
    }

    pub fn set_exchange_fee_bps(&self, bps: u16) {
        self.state.borrow_mut().exchange_fee_bps = bps;
    }

    /// Rewards paid out by the generic claim
    pub fn accrue_rewards(&self, primary: u128, reference: u128) {
        let mut state = self.state.borrow_mut();
        state.pending_rewards.primary += primary;
        state.pending_rewards.reference += reference;
    }

    /// Rewards paid out by the asset-specific claim
    pub fn accrue_asset_rewards(&self, primary: u128, reference: u128) {
        let mut state = self.state.borrow_mut();
        state.pending_asset_rewards.primary += primary;
        state.pending_asset_rewards.reference += reference;
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn wallet(&self, account: AccountId, asset: Asset) -> u128 {
        self.state.borrow().wallet(account, asset)
    }

    pub fn vault_wallet(&self, asset: Asset) -> u128 {
        let state = self.state.borrow();
        state.wallet(state.vault, asset)
    }

    pub fn program_staked(&self, asset: Asset) -> u128 {
        self.state.borrow().program_staked.get(asset)
    }

    pub fn units_of(&self, holder: AccountId) -> u128 {
        self.state.borrow().units.get(&holder).copied().unwrap_or(0)
    }

    pub fn total_units(&self) -> u128 {
        self.state.borrow().total_units
    }

    /// Sum of every holder's units
    pub fn sum_of_holder_units(&self) -> u128 {
        self.state.borrow().units.values().sum()
    }

    pub fn calls(&self) -> Vec<SimCall> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }
}

/// Oracle port
pub struct SimOracle(SimLedger);

impl PriceOracle for SimOracle {
    fn price_of(&self, asset: Asset) -> PortResult<u128> {
        let state = self.0.state.borrow();
        if state.failing.contains(&SimCall::Oracle) {
            return Err(PortError::PriceUnavailable(asset));
        }
        Ok(state.prices.get(asset))
    }
}

/// Unit token port
pub struct SimUnits(SimLedger);

impl UnitToken for SimUnits {
    fn mint(&mut self, holder: AccountId, amount: u128) -> PortResult<()> {
        let mut state = self.0.state.borrow_mut();
        *state.units.entry(holder).or_insert(0) += amount;
        state.total_units += amount;
        Ok(())
    }

    fn burn(&mut self, holder: AccountId, amount: u128) -> PortResult<()> {
        let mut state = self.0.state.borrow_mut();
        let held = state.units.get(&holder).copied().unwrap_or(0);
        if held < amount {
            return Err(PortError::Reverted(format!(
                "burn {} exceeds balance {}",
                amount, held
            )));
        }
        state.units.insert(holder, held - amount);
        state.total_units -= amount;
        Ok(())
    }

    fn total_units(&self) -> u128 {
        self.0.state.borrow().total_units
    }

    fn balance_of(&self, holder: AccountId) -> u128 {
        self.0.state.borrow().units.get(&holder).copied().unwrap_or(0)
    }
}

/// Exchange port. Fills at the oracle rate less the configured fee and
/// reverts without moving funds when that is below `min_amount_out`.
pub struct SimExchange(SimLedger);

impl Exchange for SimExchange {
    fn swap(
        &mut self,
        _exchange: AccountId,
        amount_in: u128,
        min_amount_out: u128,
        path: &[Asset],
        recipient: AccountId,
        deadline: i64,
    ) -> PortResult<Vec<u128>> {
        let mut state = self.0.state.borrow_mut();
        state.check(SimCall::Swap)?;
        if deadline < state.now {
            return Err(PortError::DeadlineExpired(deadline));
        }
        let (asset_in, asset_out) = match path {
            [first, .., last] if first != last => (*first, *last),
            _ => return Err(PortError::Reverted("invalid path".into())),
        };

        let fair = convert_amount(amount_in, state.prices.get(asset_in), state.prices.get(asset_out))
            .map_err(|e| PortError::Reverted(e.to_string()))?;
        let amount_out = mul_div(
            fair,
            BPS_DENOMINATOR.saturating_sub(state.exchange_fee_bps as u128),
            BPS_DENOMINATOR,
            Rounding::Down,
        )
        .map_err(|e| PortError::Reverted(e.to_string()))?;

        if amount_out < min_amount_out {
            return Err(PortError::InsufficientOutput {
                actual: amount_out,
                minimum: min_amount_out,
            });
        }

        let vault = state.vault;
        let available = state.wallet(vault, asset_in);
        if available < amount_in {
            return Err(PortError::InsufficientBalance {
                asset: asset_in,
                available,
                requested: amount_in,
            });
        }
        state.wallets.insert((vault, asset_in), available - amount_in);
        *state.wallets.entry((recipient, asset_out)).or_insert(0) += amount_out;
        Ok(vec![amount_in, amount_out])
    }
}

/// Dual staking program port
pub struct SimStaking(SimLedger);

impl DualStaking for SimStaking {
    fn stake(&mut self, asset: Asset, amount: u128) -> PortResult<()> {
        let mut state = self.0.state.borrow_mut();
        state.check(SimCall::Stake(asset))?;
        state.stake_from_vault(asset, amount)
    }

    fn unstake(&mut self, asset: Asset, amount: u128) -> PortResult<()> {
        let mut state = self.0.state.borrow_mut();
        state.check(SimCall::Unstake(asset))?;
        state.unstake_to_vault(asset, amount)
    }

    fn stake_joint(&mut self, primary: u128, reference: u128) -> PortResult<()> {
        let mut state = self.0.state.borrow_mut();
        state.check(SimCall::StakeJoint)?;
        let vault = state.vault;
        if state.wallet(vault, Asset::Primary) < primary
            || state.wallet(vault, Asset::Reference) < reference
        {
            return Err(PortError::Reverted("joint stake exceeds balance".into()));
        }
        state.stake_from_vault(Asset::Primary, primary)?;
        state.stake_from_vault(Asset::Reference, reference)
    }

    fn unstake_joint(&mut self, percent_bps: u16) -> PortResult<()> {
        let mut state = self.0.state.borrow_mut();
        state.check(SimCall::UnstakeJoint)?;
        if percent_bps as u128 > BPS_DENOMINATOR {
            return Err(PortError::Reverted("percent above 100%".into()));
        }
        for asset in Asset::BOTH {
            let amount = mul_div(
                state.program_staked.get(asset),
                percent_bps as u128,
                BPS_DENOMINATOR,
                Rounding::Down,
            )
            .map_err(|e| PortError::Reverted(e.to_string()))?;
            state.unstake_to_vault(asset, amount)?;
        }
        Ok(())
    }

    fn claim_rewards(&mut self) -> PortResult<()> {
        let mut state = self.0.state.borrow_mut();
        state.check(SimCall::ClaimRewards)?;
        let rewards = std::mem::take(&mut state.pending_rewards);
        let vault = state.vault;
        for asset in Asset::BOTH {
            *state.wallets.entry((vault, asset)).or_insert(0) += rewards.get(asset);
        }
        Ok(())
    }

    fn claim_asset_rewards(&mut self) -> PortResult<()> {
        let mut state = self.0.state.borrow_mut();
        state.check(SimCall::ClaimAssetRewards)?;
        let rewards = std::mem::take(&mut state.pending_asset_rewards);
        let vault = state.vault;
        for asset in Asset::BOTH {
            *state.wallets.entry((vault, asset)).or_insert(0) += rewards.get(asset);
        }
        Ok(())
    }
}

/// Custody port for the vault account
pub struct SimCustody(SimLedger);

impl AssetCustody for SimCustody {
    fn balance(&self, asset: Asset) -> u128 {
        self.0.vault_wallet(asset)
    }

    fn pull(&mut self, from: AccountId, asset: Asset, amount: u128) -> PortResult<()> {
        let mut state = self.0.state.borrow_mut();
        let vault = state.vault;
        state.move_funds(from, vault, asset, amount)
    }

    fn push(&mut self, to: AccountId, asset: Asset, amount: u128) -> PortResult<()> {
        let mut state = self.0.state.borrow_mut();
        let vault = state.vault;
        state.move_funds(vault, to, asset, amount)
    }
}

/// Clock port
pub struct SimClock(SimLedger);

impl Clock for SimClock {
    fn now(&self) -> i64 {
        self.0.now()
    }
}
