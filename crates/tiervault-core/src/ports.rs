//! # External Collaborator Interfaces
//!
//! The engine never touches token balances, prices or the staking program
//! directly. Each collaborator is a trait object injected at construction.
//!
//! None of the staking calls report transferred amounts; the engine infers
//! them from [`AssetCustody::balance`] deltas around each call.

use crate::errors::PortResult;
use crate::types::{AccountId, Asset};

/// Price feed for both pooled assets
pub trait PriceOracle {
    /// Value of one whole unit of `asset`, 18 fractional digits
    fn price_of(&self, asset: Asset) -> PortResult<u128>;
}

/// Ownership unit ledger. The engine is its only minter and burner.
pub trait UnitToken {
    fn mint(&mut self, holder: AccountId, amount: u128) -> PortResult<()>;
    fn burn(&mut self, holder: AccountId, amount: u128) -> PortResult<()>;
    fn total_units(&self) -> u128;
    fn balance_of(&self, holder: AccountId) -> u128;
}

/// Swap venue. `exchange` selects the router; the engine only passes
/// allowlisted routers.
pub trait Exchange {
    /// Swap `amount_in` of `path[0]` for the last asset of `path`.
    /// Returns the amount at every hop; the last entry is the output.
    ///
    /// Settlement is all-or-nothing: when the output would be below
    /// `min_amount_out` the swap must revert with
    /// [`PortError::InsufficientOutput`] and move no funds.
    fn swap(
        &mut self,
        exchange: AccountId,
        amount_in: u128,
        min_amount_out: u128,
        path: &[Asset],
        recipient: AccountId,
        deadline: i64,
    ) -> PortResult<Vec<u128>>;
}

/// External dual-asset staking program
pub trait DualStaking {
    fn stake(&mut self, asset: Asset, amount: u128) -> PortResult<()>;
    fn unstake(&mut self, asset: Asset, amount: u128) -> PortResult<()>;
    /// Stake both assets in one call so the program sees the ratio at once
    fn stake_joint(&mut self, primary: u128, reference: u128) -> PortResult<()>;
    /// Withdraw `percent_bps` of both staked positions
    fn unstake_joint(&mut self, percent_bps: u16) -> PortResult<()>;
    fn claim_rewards(&mut self) -> PortResult<()>;
    fn claim_asset_rewards(&mut self) -> PortResult<()>;
}

/// Token custody of the vault account
pub trait AssetCustody {
    /// Idle holdings of the vault account
    fn balance(&self, asset: Asset) -> u128;
    /// Move `amount` from `from` into the vault account
    fn pull(&mut self, from: AccountId, asset: Asset, amount: u128) -> PortResult<()>;
    /// Move `amount` from the vault account to `to`
    fn push(&mut self, to: AccountId, asset: Asset, amount: u128) -> PortResult<()>;
}

/// Ledger time source (unix seconds)
pub trait Clock {
    fn now(&self) -> i64;
}
