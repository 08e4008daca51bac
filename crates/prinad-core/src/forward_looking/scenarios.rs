//! Forward-looking macroeconomic scenarios.
//!
//! Covers:
//! 1. **Scenario set** -- optimistic / base / pessimistic with weights that
//!    always sum to one; `update_weights` re-normalises.
//! 2. **k-factors** -- `k_pd_fl = sum(w_i * spread_pd_i)` and the LGD
//!    analogue, checked against configured sanity bands.
//! 3. **Weighted ECL** -- per-scenario `clamp(pd*s_pd) * clamp(lgd*s_lgd) * ead`,
//!    aggregated with the scenario weights.
//!
//! Band breaches are reported as [`InvariantViolation`]s on the result; they
//! are never clamped away.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{SanityBand, ScenarioConfig, ScenarioTriple};
use crate::error::PrinadError;
use crate::types::{clamp_decimal, InvariantViolation, Money, Rate};
use crate::PrinadResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioKind {
    Optimistic,
    Base,
    Pessimistic,
}

impl std::fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Optimistic => write!(f, "OPTIMISTIC"),
            Self::Base => write!(f, "BASE"),
            Self::Pessimistic => write!(f, "PESSIMISTIC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroScenario {
    pub kind: ScenarioKind,
    pub weight: Rate,
    pub pd_spread: Decimal,
    pub lgd_spread: Decimal,
}

/// Per-scenario contribution to the weighted PD multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioKFactor {
    pub kind: ScenarioKind,
    pub weight: Rate,
    pub pd_spread: Decimal,
    /// `clamp(pd_base * pd_spread, 0, 1)`.
    pub pd_adjusted: Rate,
    /// `weight * pd_spread`.
    pub weighted_spread: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KFactors {
    pub k_pd_fl: Decimal,
    pub k_lgd_fl: Decimal,
    pub violations: Vec<InvariantViolation>,
}

/// Multipliers for one PD base, with the per-scenario breakdown and any
/// sanity-band breach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedKFactors {
    pub pd_base: Rate,
    pub k_pd_fl: Decimal,
    pub k_lgd_fl: Decimal,
    pub details: Vec<ScenarioKFactor>,
    pub violations: Vec<InvariantViolation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub kind: ScenarioKind,
    pub weight: Rate,
    pub pd_adjusted: Rate,
    pub lgd_adjusted: Rate,
    pub ecl: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EclResult {
    /// `sum(weight_i * ecl_i)`, or `pd * lgd * ead` without scenarios.
    pub ecl_final: Money,
    /// Plain `pd * lgd * ead`, for comparison.
    pub ecl_deterministic: Money,
    pub scenarios: Vec<ScenarioResult>,
    pub k_pd_fl: Decimal,
    pub k_lgd_fl: Decimal,
    /// Pessimistic >= base >= optimistic.
    pub scenario_ordering_holds: bool,
    pub used_scenarios: bool,
    pub violations: Vec<InvariantViolation>,
}

/// Outcome of a weight update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightUpdate {
    pub weights: ScenarioTriple,
    pub weight_sum: Decimal,
    pub violations: Vec<InvariantViolation>,
}

// ---------------------------------------------------------------------------
// Scenario set
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioSet {
    scenarios: [MacroScenario; 3],
    k_pd_band: SanityBand,
    k_lgd_band: SanityBand,
    weight_tolerance: Decimal,
}

impl Default for ScenarioSet {
    fn default() -> Self {
        let config = ScenarioConfig::default();
        let weights = normalize(&config.weights);
        Self::from_parts(&config, weights)
    }
}

impl ScenarioSet {
    pub fn new(config: &ScenarioConfig) -> PrinadResult<Self> {
        config.validate()?;
        let weights = normalize(&config.weights);
        Ok(Self::from_parts(config, weights))
    }

    fn from_parts(config: &ScenarioConfig, weights: ScenarioTriple) -> Self {
        Self {
            scenarios: [
                MacroScenario {
                    kind: ScenarioKind::Optimistic,
                    weight: weights.optimistic,
                    pd_spread: config.pd_spreads.optimistic,
                    lgd_spread: config.lgd_spreads.optimistic,
                },
                MacroScenario {
                    kind: ScenarioKind::Base,
                    weight: weights.base,
                    pd_spread: config.pd_spreads.base,
                    lgd_spread: config.lgd_spreads.base,
                },
                MacroScenario {
                    kind: ScenarioKind::Pessimistic,
                    weight: weights.pessimistic,
                    pd_spread: config.pd_spreads.pessimistic,
                    lgd_spread: config.lgd_spreads.pessimistic,
                },
            ],
            k_pd_band: config.k_pd_band,
            k_lgd_band: config.k_lgd_band,
            weight_tolerance: config.weight_tolerance,
        }
    }

    pub fn scenarios(&self) -> &[MacroScenario; 3] {
        &self.scenarios
    }

    pub fn scenario(&self, kind: ScenarioKind) -> &MacroScenario {
        match kind {
            ScenarioKind::Optimistic => &self.scenarios[0],
            ScenarioKind::Base => &self.scenarios[1],
            ScenarioKind::Pessimistic => &self.scenarios[2],
        }
    }

    pub fn weights(&self) -> ScenarioTriple {
        ScenarioTriple::new(
            self.scenarios[0].weight,
            self.scenarios[1].weight,
            self.scenarios[2].weight,
        )
    }

    pub fn weight_sum(&self) -> Decimal {
        self.scenarios.iter().map(|s| s.weight).sum()
    }

    /// Replace the scenario weights, re-normalising them to sum to one.
    ///
    /// Negative or all-zero weights are rejected and leave the set untouched.
    pub fn update_weights(&mut self, weights: ScenarioTriple) -> PrinadResult<WeightUpdate> {
        for (name, w) in [
            ("optimistic", weights.optimistic),
            ("base", weights.base),
            ("pessimistic", weights.pessimistic),
        ] {
            if w < Decimal::ZERO {
                return Err(PrinadError::invalid(
                    "weights",
                    format!("Weight for {} cannot be negative, got {}.", name, w),
                ));
            }
        }
        if weights.sum() <= Decimal::ZERO {
            return Err(PrinadError::invalid(
                "weights",
                "At least one scenario weight must be positive.",
            ));
        }

        let normalized = normalize(&weights);
        self.scenarios[0].weight = normalized.optimistic;
        self.scenarios[1].weight = normalized.base;
        self.scenarios[2].weight = normalized.pessimistic;

        let weight_sum = self.weight_sum();
        let mut violations = Vec::new();
        if let Some(v) = InvariantViolation::check_band(
            "scenario_weight_sum",
            weight_sum,
            Decimal::ONE - self.weight_tolerance,
            Decimal::ONE + self.weight_tolerance,
        ) {
            warn!(violation = %v, "scenario weights do not sum to one after update");
            violations.push(v);
        }
        violations.extend(self.k_factors().violations);

        info!(
            optimistic = %normalized.optimistic,
            base = %normalized.base,
            pessimistic = %normalized.pessimistic,
            "scenario weights updated"
        );

        Ok(WeightUpdate {
            weights: normalized,
            weight_sum,
            violations,
        })
    }

    /// Weighted PD and LGD multipliers with their sanity-band checks.
    pub fn k_factors(&self) -> KFactors {
        let k_pd_fl: Decimal = self.scenarios.iter().map(|s| s.weight * s.pd_spread).sum();
        let k_lgd_fl: Decimal = self.scenarios.iter().map(|s| s.weight * s.lgd_spread).sum();

        let violations: Vec<InvariantViolation> = [
            InvariantViolation::check_band("k_pd_fl", k_pd_fl, self.k_pd_band.lower, self.k_pd_band.upper),
            InvariantViolation::check_band("k_lgd_fl", k_lgd_fl, self.k_lgd_band.lower, self.k_lgd_band.upper),
        ]
        .into_iter()
        .flatten()
        .collect();

        for v in &violations {
            warn!(violation = %v, "forward-looking multiplier outside sanity band");
        }

        KFactors {
            k_pd_fl,
            k_lgd_fl,
            violations,
        }
    }

    /// Weighted PD multiplier and the per-scenario detail for `pd_base`.
    pub fn compute_weighted_k_factors(
        &self,
        pd_base: Rate,
    ) -> PrinadResult<WeightedKFactors> {
        validate_unit_interval("pd_base", pd_base)?;

        let details: Vec<ScenarioKFactor> = self
            .scenarios
            .iter()
            .map(|s| ScenarioKFactor {
                kind: s.kind,
                weight: s.weight,
                pd_spread: s.pd_spread,
                pd_adjusted: clamp_decimal(pd_base * s.pd_spread, Decimal::ZERO, Decimal::ONE),
                weighted_spread: s.weight * s.pd_spread,
            })
            .collect();
        let k_pd_fl = details.iter().map(|d| d.weighted_spread).sum();
        let k = self.k_factors();

        Ok(WeightedKFactors {
            pd_base,
            k_pd_fl,
            k_lgd_fl: k.k_lgd_fl,
            details,
            violations: k.violations,
        })
    }

    /// Probability-weighted ECL across the three scenarios.
    pub fn compute_weighted_ecl(&self, pd: Rate, lgd: Rate, ead: Money) -> PrinadResult<EclResult> {
        validate_ecl_inputs(pd, lgd, ead)?;

        let scenarios: Vec<ScenarioResult> = self
            .scenarios
            .iter()
            .map(|s| {
                let pd_adjusted = clamp_decimal(pd * s.pd_spread, Decimal::ZERO, Decimal::ONE);
                let lgd_adjusted = clamp_decimal(lgd * s.lgd_spread, Decimal::ZERO, Decimal::ONE);
                ScenarioResult {
                    kind: s.kind,
                    weight: s.weight,
                    pd_adjusted,
                    lgd_adjusted,
                    ecl: pd_adjusted * lgd_adjusted * ead,
                }
            })
            .collect();

        let ecl_final: Money = scenarios.iter().map(|r| r.weight * r.ecl).sum();
        let scenario_ordering_holds =
            scenarios[2].ecl >= scenarios[1].ecl && scenarios[1].ecl >= scenarios[0].ecl;
        let k = self.k_factors();

        debug!(%pd, %lgd, %ead, %ecl_final, "weighted ECL computed");

        Ok(EclResult {
            ecl_final,
            ecl_deterministic: pd * lgd * ead,
            scenarios,
            k_pd_fl: k.k_pd_fl,
            k_lgd_fl: k.k_lgd_fl,
            scenario_ordering_holds,
            used_scenarios: true,
            violations: k.violations,
        })
    }
}

/// ECL with or without forward-looking scenarios.
///
/// Without scenarios the result is the deterministic `pd * lgd * ead` and
/// carries no scenario breakdown.
pub fn compute_ecl(
    set: &ScenarioSet,
    pd: Rate,
    lgd: Rate,
    ead: Money,
    use_scenarios: bool,
) -> PrinadResult<EclResult> {
    if use_scenarios {
        return set.compute_weighted_ecl(pd, lgd, ead);
    }
    validate_ecl_inputs(pd, lgd, ead)?;
    let ecl = pd * lgd * ead;
    Ok(EclResult {
        ecl_final: ecl,
        ecl_deterministic: ecl,
        scenarios: Vec::new(),
        k_pd_fl: Decimal::ONE,
        k_lgd_fl: Decimal::ONE,
        scenario_ordering_holds: true,
        used_scenarios: false,
        violations: Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Scale weights to sum to one; base absorbs the rounding residue.
fn normalize(weights: &ScenarioTriple) -> ScenarioTriple {
    let total = weights.sum();
    let optimistic = weights.optimistic / total;
    let pessimistic = weights.pessimistic / total;
    let base = (Decimal::ONE - optimistic - pessimistic).max(Decimal::ZERO);
    ScenarioTriple::new(optimistic, base, pessimistic)
}

fn validate_unit_interval(field: &str, value: Decimal) -> PrinadResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(PrinadError::invalid(
            field,
            format!("Must be in [0, 1], got {}.", value),
        ));
    }
    Ok(())
}

pub(crate) fn validate_ecl_inputs(pd: Rate, lgd: Rate, ead: Money) -> PrinadResult<()> {
    validate_unit_interval("pd", pd)?;
    validate_unit_interval("lgd", lgd)?;
    if ead < Decimal::ZERO {
        return Err(PrinadError::invalid(
            "ead",
            format!("Exposure at default cannot be negative, got {}.", ead),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn approx_eq(a: Decimal, b: Decimal, eps: Decimal) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let set = ScenarioSet::default();
        assert_eq!(set.weight_sum(), Decimal::ONE);
        assert_eq!(set.scenario(ScenarioKind::Base).weight, dec!(0.70));
    }

    #[test]
    fn test_default_k_factors() {
        let k = ScenarioSet::default().k_factors();
        // 0.15*0.85 + 0.70*1.00 + 0.15*1.25
        assert_eq!(k.k_pd_fl, dec!(1.015));
        // 0.15*0.90 + 0.70*1.00 + 0.15*1.15
        assert_eq!(k.k_lgd_fl, dec!(1.0075));
        assert!(k.violations.is_empty());
    }

    #[test]
    fn test_weighted_k_factor_details() {
        let set = ScenarioSet::default();
        let k = set.compute_weighted_k_factors(dec!(0.10)).unwrap();
        assert_eq!(k.k_pd_fl, dec!(1.015));
        assert!(k.violations.is_empty());
        let details = k.details;
        assert_eq!(details.len(), 3);
        assert_eq!(details[0].pd_adjusted, dec!(0.085));
        assert_eq!(details[2].pd_adjusted, dec!(0.125));
    }

    #[test]
    fn test_k_factor_pd_adjustment_clamped() {
        let set = ScenarioSet::default();
        let k = set.compute_weighted_k_factors(dec!(0.95)).unwrap();
        assert_eq!(k.details[2].pd_adjusted, Decimal::ONE);
    }

    #[test]
    fn test_reference_weighted_ecl() {
        let set = ScenarioSet::default();
        let r = set
            .compute_weighted_ecl(dec!(0.10), dec!(0.45), dec!(100_000.0))
            .unwrap();
        assert_eq!(r.scenarios.len(), 3);
        assert_eq!(r.scenarios[0].ecl, dec!(3442.5));
        assert_eq!(r.scenarios[1].ecl, dec!(4500));
        assert_eq!(r.scenarios[2].ecl, dec!(6468.75));
        assert_eq!(r.ecl_final, dec!(4636.6875));
        assert_eq!(r.ecl_deterministic, dec!(4500));
        let recomposed: Decimal = r.scenarios.iter().map(|s| s.weight * s.ecl).sum();
        assert!(approx_eq(recomposed, r.ecl_final, dec!(0.01)));
    }

    #[test]
    fn test_final_equals_weighted_sum_grid() {
        let set = ScenarioSet::default();
        for pd in [dec!(0), dec!(0.01), dec!(0.2), dec!(0.85), dec!(1)] {
            for lgd in [dec!(0), dec!(0.25), dec!(0.9), dec!(1)] {
                let r = set.compute_weighted_ecl(pd, lgd, dec!(250_000)).unwrap();
                let sum: Decimal = r.scenarios.iter().map(|s| s.weight * s.ecl).sum();
                assert!(approx_eq(sum, r.ecl_final, dec!(0.01)));
                assert!(r.scenarios[2].ecl >= r.scenarios[1].ecl);
                assert!(r.scenarios[1].ecl >= r.scenarios[0].ecl);
                assert!(r.scenario_ordering_holds);
            }
        }
    }

    #[test]
    fn test_adjusted_values_clamped_to_one() {
        let set = ScenarioSet::default();
        let r = set.compute_weighted_ecl(dec!(0.9), dec!(0.95), dec!(1000)).unwrap();
        let pess = &r.scenarios[2];
        assert_eq!(pess.pd_adjusted, Decimal::ONE);
        assert_eq!(pess.lgd_adjusted, Decimal::ONE);
        assert_eq!(pess.ecl, dec!(1000));
    }

    #[test]
    fn test_update_weights_renormalizes() {
        let mut set = ScenarioSet::default();
        let update = set
            .update_weights(ScenarioTriple::new(dec!(1), dec!(1), dec!(1)))
            .unwrap();
        assert!(approx_eq(update.weight_sum, Decimal::ONE, dec!(0.001)));
        assert_eq!(set.weight_sum(), Decimal::ONE);
        assert!(approx_eq(set.weights().base, dec!(0.3333333), dec!(0.0001)));
    }

    #[test]
    fn test_update_weights_many_inputs_sum_to_one() {
        let mut set = ScenarioSet::default();
        let inputs = [
            (dec!(0.2), dec!(0.5), dec!(0.3)),
            (dec!(3), dec!(7), dec!(11)),
            (dec!(0), dec!(1), dec!(0)),
            (dec!(0.001), dec!(0.002), dec!(0.997)),
            (dec!(17), dec!(0), dec!(4)),
        ];
        for (o, b, p) in inputs {
            set.update_weights(ScenarioTriple::new(o, b, p)).unwrap();
            assert!(approx_eq(set.weight_sum(), Decimal::ONE, dec!(0.001)));
        }
    }

    #[test]
    fn test_update_weights_rejects_negative() {
        let mut set = ScenarioSet::default();
        let before = set.clone();
        assert!(set
            .update_weights(ScenarioTriple::new(dec!(-0.1), dec!(0.6), dec!(0.5)))
            .is_err());
        assert_eq!(set, before);
    }

    #[test]
    fn test_update_weights_rejects_all_zero() {
        let mut set = ScenarioSet::default();
        assert!(set
            .update_weights(ScenarioTriple::new(dec!(0), dec!(0), dec!(0)))
            .is_err());
    }

    #[test]
    fn test_pessimistic_heavy_weights_surface_band_violation() {
        let config = ScenarioConfig {
            pd_spreads: ScenarioTriple::new(dec!(0.85), dec!(1.00), dec!(1.60)),
            ..ScenarioConfig::default()
        };
        let mut set = ScenarioSet::new(&config).unwrap();
        let update = set
            .update_weights(ScenarioTriple::new(dec!(0), dec!(0.2), dec!(0.8)))
            .unwrap();
        // k_pd = 0.2 + 0.8*1.6 = 1.48 > 1.25
        assert!(update.violations.iter().any(|v| v.check == "k_pd_fl"));

        let r = set.compute_weighted_ecl(dec!(0.1), dec!(0.4), dec!(1000)).unwrap();
        assert_eq!(r.k_pd_fl, dec!(1.48));
        assert!(!r.violations.is_empty());
    }

    #[test]
    fn test_weighted_k_factors_carry_band_violation() {
        let config = ScenarioConfig {
            weights: ScenarioTriple::new(dec!(0), dec!(0.2), dec!(0.8)),
            pd_spreads: ScenarioTriple::new(dec!(0.85), dec!(1.00), dec!(1.60)),
            ..ScenarioConfig::default()
        };
        let set = ScenarioSet::new(&config).unwrap();
        let k = set.compute_weighted_k_factors(dec!(0.05)).unwrap();
        assert_eq!(k.k_pd_fl, dec!(1.48));
        assert_eq!(k.violations.len(), 1);
        assert_eq!(k.violations[0].check, "k_pd_fl");
    }

    #[test]
    fn test_compute_ecl_without_scenarios() {
        let set = ScenarioSet::default();
        let r = compute_ecl(&set, dec!(0.10), dec!(0.45), dec!(100_000), false).unwrap();
        assert_eq!(r.ecl_final, dec!(4500));
        assert!(r.scenarios.is_empty());
        assert!(!r.used_scenarios);

        let with = compute_ecl(&set, dec!(0.10), dec!(0.45), dec!(100_000), true).unwrap();
        assert!(with.used_scenarios);
        assert_eq!(with.scenarios.len(), 3);
    }

    #[test]
    fn test_reject_invalid_ecl_inputs() {
        let set = ScenarioSet::default();
        assert!(set.compute_weighted_ecl(dec!(1.1), dec!(0.4), dec!(1)).is_err());
        assert!(set.compute_weighted_ecl(dec!(0.1), dec!(-0.4), dec!(1)).is_err());
        assert!(set.compute_weighted_ecl(dec!(0.1), dec!(0.4), dec!(-1)).is_err());
        assert!(set.compute_weighted_k_factors(dec!(2)).is_err());
    }

    #[test]
    fn test_reject_invalid_config() {
        let config = ScenarioConfig {
            lgd_spreads: ScenarioTriple::new(dec!(0), dec!(1), dec!(1.1)),
            ..ScenarioConfig::default()
        };
        assert!(ScenarioSet::new(&config).is_err());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let r = ScenarioSet::default()
            .compute_weighted_ecl(dec!(0.05), dec!(0.4), dec!(5000))
            .unwrap();
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("PESSIMISTIC"));
        let _: EclResult = serde_json::from_str(&json).unwrap();
    }
}
