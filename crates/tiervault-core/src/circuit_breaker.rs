//! # Rebalance Circuit Breaker
//!
//! State machine around automated rebalancing:
//!
//! ```text
//!   Idle --begin--> InFlight --success--> Idle
//!                      |
//!                      +--failure--> Idle (failures += 1)
//!                                     |
//!                 failures >= max within window
//!                                     v
//!                                   Paused --admin resume--> Idle
//! ```
//!
//! Failures older than the rolling window are forgotten: the next failure
//! after a quiet window starts the count again at one.

use crate::config::CircuitBreakerParams;
use crate::errors::{VaultError, VaultResult};

/// Observable phase of the rebalancer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub enum RebalancePhase {
    Idle,
    InFlight,
    Paused,
}

/// Outcome of recording a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Still accepting attempts
    Counted { consecutive_failures: u8 },
    /// This failure paused rebalancing
    Tripped { consecutive_failures: u8 },
}

/// Rebalance bookkeeping, created with the pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub struct RebalanceState {
    pub consecutive_failures: u8,
    /// Unix seconds of the last failed attempt (0 = never)
    pub last_failure: i64,
    /// Set by the breaker or by the administrator
    pub paused: bool,
    pub successful_rebalances: u64,
    in_flight: bool,
}

impl RebalanceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RebalancePhase {
        if self.paused {
            RebalancePhase::Paused
        } else if self.in_flight {
            RebalancePhase::InFlight
        } else {
            RebalancePhase::Idle
        }
    }

    /// Idle -> InFlight
    pub fn begin(&mut self) -> VaultResult<()> {
        match self.phase() {
            RebalancePhase::Paused => Err(VaultError::RebalancePaused),
            RebalancePhase::InFlight => Err(VaultError::ReentrancyDetected),
            RebalancePhase::Idle => {
                self.in_flight = true;
                Ok(())
            }
        }
    }

    /// InFlight -> Idle without touching the failure count (attempt never
    /// reached the exchange)
    pub fn abandon(&mut self) {
        self.in_flight = false;
    }

    /// InFlight -> Idle on success
    pub fn record_success(&mut self) {
        self.in_flight = false;
        self.consecutive_failures = 0;
        self.successful_rebalances = self.successful_rebalances.saturating_add(1);
    }

    /// InFlight -> Idle after an internal pass. Failures counted against
    /// keeper rebalances stand.
    pub fn record_internal_success(&mut self) {
        self.in_flight = false;
        self.successful_rebalances = self.successful_rebalances.saturating_add(1);
    }

    /// InFlight -> Idle (or Paused) on failure
    pub fn record_failure(&mut self, now: i64, params: &CircuitBreakerParams) -> FailureOutcome {
        self.in_flight = false;
        let window_expired = self.last_failure != 0
            && now.saturating_sub(self.last_failure) > params.failure_window_secs;
        if window_expired {
            self.consecutive_failures = 0;
        }
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = now;

        if self.consecutive_failures >= params.max_consecutive_failures {
            self.paused = true;
            FailureOutcome::Tripped {
                consecutive_failures: self.consecutive_failures,
            }
        } else {
            FailureOutcome::Counted {
                consecutive_failures: self.consecutive_failures,
            }
        }
    }

    /// Administrative pause
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Administrative resume: Paused -> Idle, failure count cleared
    pub fn resume(&mut self) {
        self.paused = false;
        self.consecutive_failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CircuitBreakerParams {
        CircuitBreakerParams {
            max_consecutive_failures: 3,
            failure_window_secs: 86_400,
        }
    }

    #[test]
    fn test_three_failures_trip_breaker() {
        let mut state = RebalanceState::new();
        for expected in 1..=2u8 {
            state.begin().unwrap();
            assert_eq!(state.phase(), RebalancePhase::InFlight);
            assert_eq!(
                state.record_failure(100 * expected as i64, &params()),
                FailureOutcome::Counted {
                    consecutive_failures: expected
                }
            );
            assert_eq!(state.phase(), RebalancePhase::Idle);
        }
        state.begin().unwrap();
        assert_eq!(
            state.record_failure(300, &params()),
            FailureOutcome::Tripped {
                consecutive_failures: 3
            }
        );
        assert_eq!(state.phase(), RebalancePhase::Paused);
        assert_eq!(state.begin(), Err(VaultError::RebalancePaused));

        state.resume();
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.phase(), RebalancePhase::Idle);
        assert!(state.begin().is_ok());
    }

    #[test]
    fn test_success_resets_failures() {
        let mut state = RebalanceState::new();
        state.begin().unwrap();
        state.record_failure(10, &params());
        state.begin().unwrap();
        state.record_success();
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.successful_rebalances, 1);
    }

    #[test]
    fn test_internal_success_keeps_failures() {
        let mut state = RebalanceState::new();
        state.begin().unwrap();
        state.record_failure(10, &params());
        state.begin().unwrap();
        state.record_internal_success();
        assert_eq!(state.consecutive_failures, 1);
        assert_eq!(state.successful_rebalances, 1);
        assert_eq!(state.phase(), RebalancePhase::Idle);
    }

    #[test]
    fn test_failures_outside_window_are_forgotten() {
        let mut state = RebalanceState::new();
        state.record_failure(1_000, &params());
        state.record_failure(2_000, &params());
        let outcome = state.record_failure(2_000 + 86_401, &params());
        assert_eq!(
            outcome,
            FailureOutcome::Counted {
                consecutive_failures: 1
            }
        );
        assert!(!state.paused);
    }

    #[test]
    fn test_double_begin_is_rejected() {
        let mut state = RebalanceState::new();
        state.begin().unwrap();
        assert_eq!(state.begin(), Err(VaultError::ReentrancyDetected));
        state.abandon();
        assert_eq!(state.phase(), RebalancePhase::Idle);
    }
}
