//! # Tier Policy
//!
//! Ratio table mapping tiers to target ratios. Tiers may carry
//! [`TierConstraints`], which tighten the generic rebalance parameters and
//! gate deposits on minimum sizes and on matching the ratio-implied pairing.
//!
//! The engine is generic; a strict tier is just a policy value with
//! constraints attached.

use std::collections::BTreeMap;

use crate::config::RebalanceParams;
use crate::constants::*;
use crate::errors::{TierViolation, VaultError, VaultResult};
use crate::math::{apply_ratio, mul_div, ratio_from_int, Rounding};
use crate::types::TierId;

/// Extra rules for a specialized tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub struct TierConstraints {
    pub min_primary_deposit: u128,
    pub min_reference_deposit: u128,
    /// Allowed distance from the ratio-implied primary amount (bps)
    pub tolerance_bps: u16,
    /// Upper bound on the deviation threshold while in this tier
    pub threshold_bps: u16,
    /// Upper bound on swap slippage while in this tier
    pub max_slippage_bps: u16,
}

impl TierConstraints {
    /// Strict defaults: 5% pairing tolerance, 2% threshold, 0.5% slippage
    pub fn strict(min_primary_deposit: u128, min_reference_deposit: u128) -> Self {
        Self {
            min_primary_deposit,
            min_reference_deposit,
            tolerance_bps: DEFAULT_TIER_TOLERANCE_BPS,
            threshold_bps: STRICT_REBALANCE_THRESHOLD_BPS,
            max_slippage_bps: STRICT_MAX_SLIPPAGE_BPS,
        }
    }
}

/// One row of the ratio table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub struct TierSpec {
    /// Target primary:reference ratio (0 = ratio-free)
    pub ratio: u128,
    pub constraints: Option<TierConstraints>,
}

impl TierSpec {
    pub fn ratio_free() -> Self {
        Self {
            ratio: 0,
            constraints: None,
        }
    }

    pub fn with_ratio(ratio: u128) -> Self {
        Self {
            ratio,
            constraints: None,
        }
    }
}

/// Ratio table plus per-tier rules
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub struct TierPolicy {
    tiers: BTreeMap<TierId, TierSpec>,
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl TierPolicy {
    pub fn new(tiers: BTreeMap<TierId, TierSpec>) -> VaultResult<Self> {
        let policy = Self { tiers };
        policy.validate()?;
        Ok(policy)
    }

    /// Standard four-tier table: ratio-free base tier, then 1000:1, 2000:1
    /// and 4000:1
    pub fn standard() -> Self {
        let tiers = [
            (TierId(0), TierSpec::ratio_free()),
            (TierId(1), TierSpec::with_ratio(ratio_from_int(1_000))),
            (TierId(2), TierSpec::with_ratio(ratio_from_int(2_000))),
            (TierId(3), TierSpec::with_ratio(ratio_from_int(4_000))),
        ];
        Self {
            tiers: tiers.into_iter().collect(),
        }
    }

    /// Add or replace a constrained tier
    pub fn with_constrained_tier(
        mut self,
        tier: TierId,
        ratio: u128,
        constraints: TierConstraints,
    ) -> VaultResult<Self> {
        self.tiers.insert(
            tier,
            TierSpec {
                ratio,
                constraints: Some(constraints),
            },
        );
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> VaultResult<()> {
        if self.tiers.is_empty() || self.tiers.len() > MAX_TIERS {
            return Err(VaultError::InvalidParameter("tier table size"));
        }
        for spec in self.tiers.values() {
            if let Some(constraints) = spec.constraints {
                if spec.ratio == 0 {
                    return Err(VaultError::InvalidParameter("constrained tier needs a ratio"));
                }
                if constraints.tolerance_bps > MAX_BPS {
                    return Err(VaultError::InvalidParameter("tolerance_bps"));
                }
                if constraints.threshold_bps == 0 {
                    return Err(VaultError::InvalidParameter("threshold_bps"));
                }
            }
        }
        Ok(())
    }

    pub fn spec(&self, tier: TierId) -> VaultResult<&TierSpec> {
        self.tiers.get(&tier).ok_or(VaultError::UnknownTier(tier.0))
    }

    pub fn tiers(&self) -> impl Iterator<Item = (&TierId, &TierSpec)> {
        self.tiers.iter()
    }

    /// Replace the target ratio of an existing tier
    pub fn set_ratio(&mut self, tier: TierId, ratio: u128) -> VaultResult<()> {
        let spec = self
            .tiers
            .get_mut(&tier)
            .ok_or(VaultError::UnknownTier(tier.0))?;
        if ratio == 0 && spec.constraints.is_some() {
            return Err(VaultError::InvalidParameter("constrained tier needs a ratio"));
        }
        spec.ratio = ratio;
        Ok(())
    }

    /// Rebalance parameters in force for `tier`: the configured ones,
    /// tightened by the tier's constraints
    pub fn effective_params(&self, tier: TierId, base: RebalanceParams) -> RebalanceParams {
        match self.tiers.get(&tier).and_then(|spec| spec.constraints) {
            Some(constraints) => RebalanceParams {
                threshold_bps: base.threshold_bps.min(constraints.threshold_bps),
                min_interval_secs: base.min_interval_secs,
                max_slippage_bps: base.max_slippage_bps.min(constraints.max_slippage_bps),
            },
            None => base,
        }
    }

    /// Check a deposit pairing against the tier's rules
    pub fn validate_deposit(
        &self,
        tier: TierId,
        primary: u128,
        reference: u128,
        emergency_mode: bool,
    ) -> VaultResult<()> {
        let spec = self.spec(tier)?;
        let Some(constraints) = spec.constraints else {
            return Ok(());
        };
        if emergency_mode {
            return Err(TierViolation::EmergencyMode.into());
        }
        if primary < constraints.min_primary_deposit {
            return Err(TierViolation::PrimaryBelowMinimum {
                supplied: primary,
                minimum: constraints.min_primary_deposit,
            }
            .into());
        }
        if reference < constraints.min_reference_deposit {
            return Err(TierViolation::ReferenceBelowMinimum {
                supplied: reference,
                minimum: constraints.min_reference_deposit,
            }
            .into());
        }

        let required = apply_ratio(reference, spec.ratio)?;
        let tolerance = constraints.tolerance_bps as u128;
        let lower = mul_div(required, BPS_DENOMINATOR - tolerance, BPS_DENOMINATOR, Rounding::Up)?;
        let upper = mul_div(required, BPS_DENOMINATOR + tolerance, BPS_DENOMINATOR, Rounding::Down)?;
        if primary < lower {
            return Err(TierViolation::PrimaryBelowRequirement {
                supplied: primary,
                required,
                tolerance_bps: constraints.tolerance_bps,
            }
            .into());
        }
        if primary > upper {
            return Err(TierViolation::PrimaryAboveRequirement {
                supplied: primary,
                required,
                tolerance_bps: constraints.tolerance_bps,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict_policy() -> TierPolicy {
        TierPolicy::standard()
            .with_constrained_tier(
                TierId(7),
                ratio_from_int(2_000),
                TierConstraints::strict(1_000, 1),
            )
            .unwrap()
    }

    #[test]
    fn test_standard_table() {
        let policy = TierPolicy::standard();
        assert_eq!(policy.spec(TierId(0)).unwrap().ratio, 0);
        assert_eq!(policy.spec(TierId(2)).unwrap().ratio, ratio_from_int(2_000));
        assert_eq!(policy.spec(TierId(9)), Err(VaultError::UnknownTier(9)));
    }

    #[test]
    fn test_unconstrained_tier_accepts_any_pairing() {
        let policy = TierPolicy::standard();
        assert!(policy.validate_deposit(TierId(2), 1, 0, true).is_ok());
    }

    #[test]
    fn test_pairing_below_tolerance_rejected() {
        let policy = strict_policy();
        // 10 reference requires 20_000 primary; 95% is 19_000
        assert!(policy.validate_deposit(TierId(7), 19_000, 10, false).is_ok());
        assert_eq!(
            policy.validate_deposit(TierId(7), 18_999, 10, false),
            Err(VaultError::TierViolation(TierViolation::PrimaryBelowRequirement {
                supplied: 18_999,
                required: 20_000,
                tolerance_bps: 500,
            }))
        );
        assert!(matches!(
            policy.validate_deposit(TierId(7), 21_001, 10, false),
            Err(VaultError::TierViolation(TierViolation::PrimaryAboveRequirement { .. }))
        ));
    }

    #[test]
    fn test_minimum_deposits_enforced() {
        let policy = strict_policy();
        assert!(matches!(
            policy.validate_deposit(TierId(7), 999, 1, false),
            Err(VaultError::TierViolation(TierViolation::PrimaryBelowMinimum { .. }))
        ));
        assert!(matches!(
            policy.validate_deposit(TierId(7), 2_000, 0, false),
            Err(VaultError::TierViolation(TierViolation::ReferenceBelowMinimum { .. }))
        ));
    }

    #[test]
    fn test_emergency_mode_blocks_constrained_deposits() {
        let policy = strict_policy();
        assert_eq!(
            policy.validate_deposit(TierId(7), 20_000, 10, true),
            Err(VaultError::TierViolation(TierViolation::EmergencyMode))
        );
    }

    #[test]
    fn test_effective_params_are_tightened() {
        let policy = strict_policy();
        let base = RebalanceParams::default();
        let strict = policy.effective_params(TierId(7), base);
        assert_eq!(strict.threshold_bps, STRICT_REBALANCE_THRESHOLD_BPS);
        assert_eq!(strict.max_slippage_bps, STRICT_MAX_SLIPPAGE_BPS);
        assert_eq!(policy.effective_params(TierId(2), base), base);
    }

    #[test]
    fn test_constrained_tier_cannot_be_ratio_free() {
        let mut policy = strict_policy();
        assert!(policy.set_ratio(TierId(7), 0).is_err());
        policy.set_ratio(TierId(1), ratio_from_int(1_500)).unwrap();
        assert_eq!(policy.spec(TierId(1)).unwrap().ratio, ratio_from_int(1_500));
    }
}
