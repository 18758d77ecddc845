//! # Tier Vault Core - Rebalancing Engine
//!
//! Pooled two-asset vault that keeps its primary:reference quantity ratio
//! inside the band required by a dual-staking yield tier. It provides:
//!
//! - Value accounting and ownership-unit issuance/redemption
//! - Ratio deviation detection and bounded swap sizing
//! - A circuit-breaker guarded rebalancer with keeper incentives
//! - Joint/per-asset stake orchestration and reward compounding
//! - Tier policies that specialize the generic engine
//!
//! Every collaborator (oracle, unit token, exchange, staking program,
//! custody, clock) sits behind a trait in [`ports`]; [`sim`] provides an
//! in-memory ledger implementing all of them.
//!
//! ## Feature Flags
//!
//! - `client`: Enables serde serialization for configuration and views

pub mod accounting;
pub mod circuit_breaker;
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod events;
pub mod math;
pub mod ports;
pub mod ratio;
pub mod reentrancy;
pub mod sim;
pub mod swap_sizer;
pub mod tier;
pub mod types;

// Re-export commonly used items
pub use config::{CircuitBreakerParams, FeeParams, RebalanceParams, VaultConfig};
pub use constants::*;
pub use engine::{Collaborators, CompoundReport, RebalanceReport, TierVault, VaultStatus};
pub use errors::{PortError, PortResult, TierViolation, VaultError, VaultResult};
pub use events::VaultEvent;
pub use tier::{TierConstraints, TierPolicy, TierSpec};
pub use types::*;
