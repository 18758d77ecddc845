//! Shared fixtures for the integration suites

#![allow(dead_code)]

use tiervault_core::sim::SimLedger;
use tiervault_core::*;

pub const VAULT: AccountId = AccountId::from_byte(0xee);
pub const ADMIN: AccountId = AccountId::from_byte(0xad);
pub const ROUTER: AccountId = AccountId::from_byte(0x5a);
pub const KEEPER: AccountId = AccountId::from_byte(0x4b);
pub const HOLDERS: [AccountId; 3] = [
    AccountId::from_byte(1),
    AccountId::from_byte(2),
    AccountId::from_byte(3),
];

/// Fee-free config with one trusted router
pub fn config() -> VaultConfig {
    let mut config = VaultConfig::new(ADMIN).with_exchange(ROUTER);
    config.fees = FeeParams::ZERO;
    config
}

pub fn vault_on(tier: TierId, policy: TierPolicy, config: VaultConfig) -> (TierVault, SimLedger) {
    let ledger = SimLedger::default_market(VAULT);
    for holder in HOLDERS {
        ledger.fund(holder, Asset::Primary, 1_000_000_000_000);
        ledger.fund(holder, Asset::Reference, 1_000_000_000);
    }
    let vault = TierVault::new(VAULT, config, policy, tier, ledger.collaborators())
        .expect("vault construction");
    (vault, ledger)
}

/// Tier 2 (2000:1) vault with no fees
pub fn standard_vault() -> (TierVault, SimLedger) {
    vault_on(TierId(2), TierPolicy::standard(), config())
}

/// Seed an on-target pool, then push it 25% over target while the router
/// is down so no internal rebalance can correct it
pub fn drifted_vault() -> (TierVault, SimLedger) {
    let (mut vault, ledger) = standard_vault();
    vault.deposit(HOLDERS[0], 2_000_000, 1_000).unwrap();
    ledger.fail(sim::SimCall::Swap);
    vault.deposit(HOLDERS[1], 500_000, 0).unwrap();
    ledger.heal(sim::SimCall::Swap);
    vault.drain_events();
    (vault, ledger)
}

/// Route engine logs to the test harness output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("tiervault_core=debug")
        .try_init();
}
