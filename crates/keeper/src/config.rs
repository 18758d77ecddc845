use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tiervault_core::AccountId;

use crate::error::{KeeperError, KeeperResult};

/// Environment prefix for overrides, e.g. `TIERVAULT_COMPOUND_EVERY=5`
pub const ENV_PREFIX: &str = "TIERVAULT";

/// Keeper configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeeperConfig {
    /// Account that submits rebalances and collects rewards (64 hex chars)
    #[serde(with = "account_serde")]
    pub keeper_account: AccountId,

    /// Router passed to every rebalance; must be allowlisted by the vault
    #[serde(with = "account_serde")]
    pub exchange: AccountId,

    /// Default update interval in seconds
    pub default_update_interval: u64,

    /// Compound rewards every N iterations
    pub compound_every: u64,

    /// Retry configuration
    pub retry: RetryConfig,

    /// Vaults to service
    pub vaults: Vec<VaultTarget>,

    /// Simulated market driving the vaults
    pub simulation: SimulationConfig,
}

/// One vault the keeper services
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VaultTarget {
    /// Vault name for logging
    pub name: String,

    /// Tier the vault targets
    pub tier: u8,

    /// Higher priority vaults are serviced first
    pub priority: u8,

    /// Whether this vault is enabled
    pub enabled: bool,
}

/// Random-walk market used in simulation mode
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// RNG seed; identical seeds replay identical runs
    pub seed: u64,

    /// Simulated seconds that pass per keeper iteration
    pub seconds_per_tick: i64,

    /// Reference asset price in whole primary units
    pub initial_reference_price: u64,

    /// Largest per-tick price move (basis points)
    pub volatility_bps: u16,

    /// Staking reward per tick on staked balances (basis points)
    pub reward_rate_bps: u16,

    /// Probability that a simulated holder makes a one-sided deposit in a tick
    pub deposit_probability: f64,

    /// Probability that the exchange is down for a tick
    pub swap_failure_probability: f64,

    /// Seed liquidity for each vault
    pub seed_primary: u64,
    pub seed_reference: u64,
}

/// Retry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Maximum number of retries for failed operations
    pub max_retries: u32,

    /// Base delay between retries in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,
}

impl KeeperConfig {
    /// Load configuration from a TOML file, then apply `TIERVAULT_*`
    /// environment overrides
    pub fn load(path: &str) -> KeeperResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(Path::new(path)))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;
        let config: KeeperConfig = settings.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: &str) -> KeeperResult<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> KeeperResult<()> {
        if self.vaults.is_empty() {
            return Err(KeeperError::InvalidConfig("at least one vault required".into()));
        }

        if self.default_update_interval == 0 {
            return Err(KeeperError::InvalidConfig(
                "default_update_interval must be greater than 0".into(),
            ));
        }

        if self.compound_every == 0 {
            return Err(KeeperError::InvalidConfig("compound_every must be greater than 0".into()));
        }

        if self.keeper_account == self.exchange {
            return Err(KeeperError::InvalidConfig(
                "keeper_account and exchange must differ".into(),
            ));
        }

        for vault in &self.vaults {
            vault.validate()?;
        }

        self.retry.validate()?;
        self.simulation.validate()?;

        Ok(())
    }

    /// Get enabled vaults sorted by priority
    pub fn enabled_vaults(&self) -> Vec<&VaultTarget> {
        let mut vaults: Vec<_> = self.vaults.iter().filter(|v| v.enabled).collect();

        vaults.sort_by(|a, b| b.priority.cmp(&a.priority));
        vaults
    }
}

impl VaultTarget {
    fn validate(&self) -> KeeperResult<()> {
        if self.name.is_empty() {
            return Err(KeeperError::InvalidConfig("vault name must not be empty".into()));
        }
        Ok(())
    }
}

impl SimulationConfig {
    fn validate(&self) -> KeeperResult<()> {
        if self.seconds_per_tick <= 0 {
            return Err(KeeperError::InvalidConfig(
                "seconds_per_tick must be greater than 0".into(),
            ));
        }

        if self.initial_reference_price == 0 {
            return Err(KeeperError::InvalidConfig(
                "initial_reference_price must be greater than 0".into(),
            ));
        }

        if self.volatility_bps >= 10_000 || self.reward_rate_bps > 10_000 {
            return Err(KeeperError::InvalidConfig(format!(
                "volatility_bps ({}) must be below 10000 and reward_rate_bps ({}) at most 10000",
                self.volatility_bps, self.reward_rate_bps
            )));
        }

        for (name, p) in [
            ("deposit_probability", self.deposit_probability),
            ("swap_failure_probability", self.swap_failure_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(KeeperError::InvalidConfig(format!("{} must be within [0, 1]", name)));
            }
        }

        if self.seed_reference == 0 {
            return Err(KeeperError::InvalidConfig("seed_reference must be greater than 0".into()));
        }

        Ok(())
    }
}

impl RetryConfig {
    /// Validate retry configuration
    fn validate(&self) -> KeeperResult<()> {
        if self.max_retries == 0 {
            return Err(KeeperError::InvalidConfig("max_retries must be greater than 0".into()));
        }

        if self.base_delay_ms == 0 {
            return Err(KeeperError::InvalidConfig("base_delay_ms must be greater than 0".into()));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(KeeperError::InvalidConfig(format!(
                "max_delay_ms ({}) must be at least base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }

        if self.backoff_multiplier <= 1.0 {
            return Err(KeeperError::InvalidConfig(
                "backoff_multiplier must be greater than 1.0".into(),
            ));
        }

        Ok(())
    }

    /// Calculate delay for retry attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        if attempt == 0 {
            return self.base_delay_ms;
        }

        let exponential_delay = self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        (exponential_delay as u64).min(self.max_delay_ms)
    }
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            keeper_account: AccountId::from_byte(0x4b),
            exchange: AccountId::from_byte(0x5a),
            default_update_interval: 60,
            compound_every: 10,
            retry: RetryConfig::default(),
            vaults: vec![],
            simulation: SimulationConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl Default for VaultTarget {
    fn default() -> Self {
        Self {
            name: "Default Vault".to_string(),
            tier: 2,
            priority: 1,
            enabled: true,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            seconds_per_tick: 3_600,
            initial_reference_price: 2_000,
            volatility_bps: 200,
            reward_rate_bps: 5,
            deposit_probability: 0.3,
            swap_failure_probability: 0.05,
            seed_primary: 20_000_000_000,
            seed_reference: 10_000_000,
        }
    }
}

/// Create example configuration file
pub fn create_example_config(path: &str) -> KeeperResult<()> {
    let example_config = KeeperConfig {
        default_update_interval: 30,
        compound_every: 6,
        vaults: vec![
            VaultTarget {
                name: "balanced-2000".to_string(),
                tier: 2,
                priority: 10,
                enabled: true,
            },
            VaultTarget {
                name: "heavy-4000".to_string(),
                tier: 3,
                priority: 8,
                enabled: true,
            },
        ],
        ..KeeperConfig::default()
    };

    example_config.save(path)?;
    Ok(())
}

// Hex serde for account ids
mod account_serde {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(account: &AccountId, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&account.to_hex())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<AccountId, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<AccountId>().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> KeeperConfig {
        let mut config = KeeperConfig::default();
        config.vaults.push(VaultTarget::default());
        config
    }

    #[test]
    fn test_config_validation() {
        let mut config = valid_config();
        assert!(config.validate().is_ok());

        config.compound_every = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.exchange = config.keeper_account;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.simulation.swap_failure_probability = 1.5;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.vaults.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_delay_calculation() {
        let retry_config = RetryConfig::default();

        assert_eq!(retry_config.delay_for_attempt(0), 1000);
        assert_eq!(retry_config.delay_for_attempt(1), 2000);
        assert_eq!(retry_config.delay_for_attempt(2), 4000);

        // Should cap at max_delay_ms
        assert_eq!(retry_config.delay_for_attempt(10), 30_000);
    }

    #[test]
    fn test_enabled_vaults_sorted_by_priority() {
        let mut config = valid_config();
        config.vaults = vec![
            VaultTarget {
                name: "low".into(),
                priority: 1,
                ..VaultTarget::default()
            },
            VaultTarget {
                name: "off".into(),
                priority: 9,
                enabled: false,
                ..VaultTarget::default()
            },
            VaultTarget {
                name: "high".into(),
                priority: 5,
                ..VaultTarget::default()
            },
        ];
        let names: Vec<_> = config.enabled_vaults().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["high", "low"]);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = std::env::temp_dir().join(format!("tiervault-keeper-{}.toml", std::process::id()));
        let path = path.to_string_lossy().to_string();
        create_example_config(&path).unwrap();

        let loaded = KeeperConfig::load(&path).unwrap();
        assert_eq!(loaded.vaults.len(), 2);
        assert_eq!(loaded.compound_every, 6);
        assert_eq!(loaded.keeper_account, AccountId::from_byte(0x4b));
        std::fs::remove_file(&path).unwrap();
    }
}
