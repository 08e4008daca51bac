//! Stage-aware ECL provisioning.
//!
//! Covers:
//! 1. **12-month ECL** -- scenario-weighted PD x LGD x EAD for Stage 1.
//! 2. **Lifetime ECL** -- scenario-weighted, discounted sum over remaining life
//!    for Stages 2 and 3.
//! 3. **Portfolio totals** -- total provision, coverage ratio, per-stage
//!    breakdown.
//!
//! All arithmetic uses `rust_decimal::Decimal`. No `f64`.

use std::collections::BTreeMap;
use std::time::Instant;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PrinadError;
use crate::forward_looking::scenarios::{validate_ecl_inputs, ScenarioSet};
use crate::types::{clamp_decimal, with_metadata, ComputationOutput, Money, Rate, Stage};
use crate::PrinadResult;

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionExposure {
    pub contract_id: String,
    /// Exposure at default.
    pub ead: Money,
    /// Annual probability of default (0-1).
    pub pd: Rate,
    /// Loss given default (0-1).
    pub lgd: Rate,
    /// Remaining life in years.
    pub remaining_life: Decimal,
    pub stage: Stage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionInput {
    pub exposures: Vec<ProvisionExposure>,
    /// Discount rate for lifetime ECL.
    pub discount_rate: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureProvision {
    pub contract_id: String,
    pub stage: Stage,
    pub ead: Money,
    /// Scenario-weighted 12-month ECL.
    pub ecl_12month: Money,
    /// Scenario-weighted lifetime ECL.
    pub ecl_lifetime: Money,
    /// 12-month for stage 1, lifetime otherwise.
    pub applied_ecl: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTotals {
    pub contracts: u64,
    pub exposure: Money,
    pub provision: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionOutput {
    pub total_provision: Money,
    pub total_exposure: Money,
    /// total_provision / total_exposure.
    pub coverage_ratio: Rate,
    pub exposures: Vec<ExposureProvision>,
    pub by_stage: BTreeMap<Stage, StageTotals>,
    pub k_pd_fl: Decimal,
    pub k_lgd_fl: Decimal,
}

// ---------------------------------------------------------------------------
// Core function
// ---------------------------------------------------------------------------

/// Provision a portfolio by stage, weighting every figure across scenarios.
pub fn calculate_provision(
    set: &ScenarioSet,
    input: &ProvisionInput,
) -> PrinadResult<ComputationOutput<ProvisionOutput>> {
    let start = Instant::now();
    validate_provision_input(input)?;

    let k = set.k_factors();
    let warnings: Vec<String> = k.violations.iter().map(|v| v.to_string()).collect();

    let mut exposures = Vec::with_capacity(input.exposures.len());
    let mut by_stage: BTreeMap<Stage, StageTotals> = BTreeMap::new();
    let mut total_provision = Decimal::ZERO;
    let mut total_exposure = Decimal::ZERO;

    for exp in &input.exposures {
        let mut ecl_12month = Decimal::ZERO;
        let mut ecl_lifetime = Decimal::ZERO;

        for scenario in set.scenarios() {
            let pd = clamp_decimal(exp.pd * scenario.pd_spread, Decimal::ZERO, Decimal::ONE);
            let lgd = clamp_decimal(exp.lgd * scenario.lgd_spread, Decimal::ZERO, Decimal::ONE);
            ecl_12month += scenario.weight * pd * lgd * exp.ead;
            ecl_lifetime += scenario.weight
                * lifetime_ecl(pd, lgd, exp.ead, exp.remaining_life, input.discount_rate)?;
        }

        let applied_ecl = if exp.stage.uses_lifetime_ecl() {
            ecl_lifetime
        } else {
            ecl_12month
        };

        total_provision += applied_ecl;
        total_exposure += exp.ead;
        let totals = by_stage.entry(exp.stage).or_default();
        totals.contracts += 1;
        totals.exposure += exp.ead;
        totals.provision += applied_ecl;

        exposures.push(ExposureProvision {
            contract_id: exp.contract_id.clone(),
            stage: exp.stage,
            ead: exp.ead,
            ecl_12month,
            ecl_lifetime,
            applied_ecl,
        });
    }

    let coverage_ratio = if total_exposure > Decimal::ZERO {
        total_provision / total_exposure
    } else {
        Decimal::ZERO
    };

    let output = ProvisionOutput {
        total_provision,
        total_exposure,
        coverage_ratio,
        exposures,
        by_stage,
        k_pd_fl: k.k_pd_fl,
        k_lgd_fl: k.k_lgd_fl,
    };

    let assumptions = serde_json::json!({
        "stage_1": "12-month ECL = PD x LGD x EAD",
        "stage_2_3": "lifetime ECL = sum_t PD x LGD x EAD / (1+r)^t",
        "scenario_weights": set.weights(),
        "discount_rate": input.discount_rate.to_string(),
    });

    Ok(with_metadata(
        "IFRS 9 stage-aware ECL with forward-looking scenario weighting",
        &assumptions,
        warnings,
        start.elapsed().as_micros() as u64,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Longest remaining life accepted for lifetime ECL, in years.
pub const MAX_REMAINING_LIFE_YEARS: u32 = 100;

/// Discounted annual loss over the remaining life, with a pro-rated final
/// year: `sum_t PD x LGD x EAD x w_t / (1+r)^t`.
fn lifetime_ecl(
    pd: Decimal,
    lgd: Decimal,
    ead: Decimal,
    remaining_life: Decimal,
    discount_rate: Decimal,
) -> PrinadResult<Decimal> {
    let annual_loss = pd * lgd * ead;
    let growth = Decimal::ONE + discount_rate;
    let whole_years = remaining_life.trunc();
    let tail = remaining_life - whole_years;
    let year_count = whole_years.to_u32().unwrap_or(0);

    let mut compounded = Decimal::ONE;
    let mut total = Decimal::ZERO;
    let mut year = 0;
    while year < year_count || (year == year_count && tail > Decimal::ZERO) {
        compounded = compounded.checked_mul(growth).ok_or_else(|| {
            PrinadError::invalid(
                "discount_rate",
                format!(
                    "Discount factor overflows after {} years at rate {}.",
                    year + 1,
                    discount_rate
                ),
            )
        })?;
        let share = if year < year_count { Decimal::ONE } else { tail };
        total += annual_loss * share / compounded;
        year += 1;
    }
    Ok(total)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_provision_input(input: &ProvisionInput) -> PrinadResult<()> {
    if input.exposures.is_empty() {
        return Err(PrinadError::invalid(
            "exposures",
            "At least one exposure is required.",
        ));
    }
    if input.discount_rate < Decimal::ZERO {
        return Err(PrinadError::invalid(
            "discount_rate",
            "Discount rate cannot be negative.",
        ));
    }
    for exp in &input.exposures {
        validate_ecl_inputs(exp.pd, exp.lgd, exp.ead).map_err(|e| match e {
            PrinadError::InvalidInput { field, reason } => PrinadError::InvalidInput {
                field,
                reason: format!("Contract '{}': {}", exp.contract_id, reason),
            },
            other => other,
        })?;
        if exp.remaining_life <= Decimal::ZERO {
            return Err(PrinadError::invalid(
                "remaining_life",
                format!("Contract '{}' remaining life must be positive.", exp.contract_id),
            ));
        }
        if exp.remaining_life > Decimal::from(MAX_REMAINING_LIFE_YEARS) {
            return Err(PrinadError::invalid(
                "remaining_life",
                format!(
                    "Contract '{}' remaining life cannot exceed {} years.",
                    exp.contract_id, MAX_REMAINING_LIFE_YEARS
                ),
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
