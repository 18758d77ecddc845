pub mod config;
pub mod error;
pub mod keeper;
pub mod simulation;

pub use config::{KeeperConfig, RetryConfig, SimulationConfig, VaultTarget};
pub use error::{KeeperError, KeeperResult};
pub use keeper::{IterationSummary, Keeper, KeeperStats};
pub use simulation::SimMarket;
