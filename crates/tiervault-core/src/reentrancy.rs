/// Reentrancy protection for vault operations.
/// Every state-mutating operation that calls out to a collaborator holds
/// the lock for its whole duration, so a collaborator calling back into the
/// vault is rejected instead of observing half-applied state.
use crate::errors::{VaultError, VaultResult};

/// Reentrancy guard status flags
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReentrancyStatus {
    /// Vault is unlocked and ready for operations
    #[default]
    Unlocked,
    /// Vault is locked due to ongoing operation
    Locked,
}

/// Reentrancy guard manager
pub struct ReentrancyGuard;

impl ReentrancyGuard {
    /// Acquire lock for a vault operation
    pub fn acquire(status: &mut ReentrancyStatus) -> VaultResult<()> {
        match *status {
            ReentrancyStatus::Unlocked => {
                *status = ReentrancyStatus::Locked;
                Ok(())
            }
            ReentrancyStatus::Locked => Err(VaultError::ReentrancyDetected),
        }
    }

    /// Release lock after operation completes
    pub fn release(status: &mut ReentrancyStatus) {
        if *status == ReentrancyStatus::Unlocked {
            tracing::warn!("releasing an already unlocked vault");
        }
        *status = ReentrancyStatus::Unlocked;
    }
}
