use std::time::Instant;

use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use prinad_core::config::ScenarioTriple;
use prinad_core::forward_looking::scenarios::{compute_ecl, ScenarioSet};
use prinad_core::{Money, PrinadConfig, Rate};

use super::envelope;
use crate::input;

#[derive(Args)]
pub struct EclArgs {
    /// JSON with `pd`, `lgd`, `ead`, optional `use_scenarios` and `weights`
    #[arg(long)]
    pub input: Option<String>,
    /// Deterministic PD x LGD x EAD only
    #[arg(long)]
    pub no_scenarios: bool,
}

#[derive(Args)]
pub struct KFactorsArgs {
    /// JSON with `pd_base` and optional `weights`
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EclRequest {
    pd: Rate,
    lgd: Rate,
    ead: Money,
    #[serde(default = "default_true")]
    use_scenarios: bool,
    #[serde(default)]
    weights: Option<ScenarioTriple>,
}

#[derive(Debug, Deserialize)]
struct KFactorsRequest {
    pd_base: Rate,
    #[serde(default)]
    weights: Option<ScenarioTriple>,
}

fn default_true() -> bool {
    true
}

/// Build the configured scenario set, applying a weight override if given.
fn scenario_set(
    config: &PrinadConfig,
    weights: Option<ScenarioTriple>,
    warnings: &mut Vec<String>,
) -> Result<ScenarioSet, Box<dyn std::error::Error>> {
    let mut set = ScenarioSet::new(&config.scenarios)?;
    if let Some(weights) = weights {
        let update = set.update_weights(weights)?;
        warnings.extend(update.violations.iter().map(|v| v.to_string()));
    }
    Ok(set)
}

pub fn run_ecl(args: EclArgs, config: &PrinadConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let request: EclRequest = input::read_input(args.input.as_deref())?;
    let mut warnings = Vec::new();
    let set = scenario_set(config, request.weights, &mut warnings)?;

    let use_scenarios = request.use_scenarios && !args.no_scenarios;
    let result = compute_ecl(&set, request.pd, request.lgd, request.ead, use_scenarios)?;
    warnings.extend(result.violations.iter().map(|v| v.to_string()));

    envelope(
        "Forward-looking ECL: sum_i w_i x clamp(pd x s_pd_i) x clamp(lgd x s_lgd_i) x ead",
        &set,
        warnings,
        start,
        result,
    )
}

pub fn run_k_factors(args: KFactorsArgs, config: &PrinadConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let request: KFactorsRequest = input::read_input(args.input.as_deref())?;
    let mut warnings = Vec::new();
    let set = scenario_set(config, request.weights, &mut warnings)?;

    let k = set.compute_weighted_k_factors(request.pd_base)?;
    warnings.extend(k.violations.iter().map(|v| v.to_string()));

    envelope(
        "Scenario-weighted forward-looking multipliers",
        &set,
        warnings,
        start,
        k,
    )
}
