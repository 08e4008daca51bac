use chrono::NaiveDate;
use napi::Result as NapiResult;
use napi_derive::napi;
use serde::Deserialize;

use prinad_core::behavioral::delinquency::BehavioralHistory;
use prinad_core::behavioral::penalty::HistoricalPenaltyCalculator;
use prinad_core::config::ScenarioTriple;
use prinad_core::forward_looking::provision::{self, ProvisionInput};
use prinad_core::forward_looking::scenarios::{self, ScenarioSet};
use prinad_core::rating::scale::RatingScale;
use prinad_core::staging::engine::{ContractState, Observation, StageEngine};
use prinad_core::write_off::events::LedgerEvent;
use prinad_core::write_off::ledger::WriteOffLedger;
use prinad_core::{Money, PrinadConfig, Rate, Score};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Parse an optional engine configuration; absent means defaults.
fn parse_config(config_json: Option<String>) -> NapiResult<PrinadConfig> {
    match config_json {
        Some(raw) => PrinadConfig::from_json_str(&raw).map_err(to_napi_error),
        None => Ok(PrinadConfig::default()),
    }
}

fn scenario_set(config: &PrinadConfig, weights: Option<ScenarioTriple>) -> NapiResult<ScenarioSet> {
    let mut set = ScenarioSet::new(&config.scenarios).map_err(to_napi_error)?;
    if let Some(weights) = weights {
        set.update_weights(weights).map_err(to_napi_error)?;
    }
    Ok(set)
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct PenaltyRequest {
    pd_base: Score,
    #[serde(flatten)]
    history: BehavioralHistory,
}

#[napi]
pub fn apply_penalty(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let config = parse_config(config_json)?;
    let input: PenaltyRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let calc = HistoricalPenaltyCalculator::new(config.penalty).map_err(to_napi_error)?;
    let (final_score, analysis) = calc
        .apply_penalty(input.pd_base, &input.history)
        .map_err(to_napi_error)?;
    let output = serde_json::json!({
        "final_score": final_score,
        "analysis": analysis,
        "weights": calc.weights(),
    });
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn get_rating(score: String, config_json: Option<String>) -> NapiResult<String> {
    let config = parse_config(config_json)?;
    let score: Score = score.parse().map_err(to_napi_error)?;
    let info = RatingScale::for_kind(config.classifier.rating_scale).get_rating(score);
    serde_json::to_string(&info).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Forward-looking
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct EclRequest {
    pd: Rate,
    lgd: Rate,
    ead: Money,
    #[serde(default = "default_true")]
    use_scenarios: bool,
    #[serde(default)]
    weights: Option<ScenarioTriple>,
}

fn default_true() -> bool {
    true
}

#[napi]
pub fn compute_ecl(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let config = parse_config(config_json)?;
    let input: EclRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let set = scenario_set(&config, input.weights)?;
    let output = scenarios::compute_ecl(&set, input.pd, input.lgd, input.ead, input.use_scenarios)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct ProvisionRequest {
    #[serde(flatten)]
    portfolio: ProvisionInput,
    #[serde(default)]
    weights: Option<ScenarioTriple>,
}

#[napi]
pub fn calculate_provision(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let config = parse_config(config_json)?;
    let input: ProvisionRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let set = scenario_set(&config, input.weights)?;
    let output = provision::calculate_provision(&set, &input.portfolio).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Staging
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct StageRequest {
    state: ContractState,
    observation: Observation,
}

#[napi]
pub fn evaluate_stage(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let config = parse_config(config_json)?;
    let input: StageRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let engine = StageEngine::new(config.staging).map_err(to_napi_error)?;
    let output = engine
        .evaluate_stage(&input.state, &input.observation)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

/// Replay a ledger and report on it. `report` is `summary`, `observation`
/// or `stats`; `as_of` is `YYYY-MM-DD` and defaults to today (UTC).
#[napi]
pub fn recovery_report(
    events_json: String,
    report: String,
    contract_id: Option<String>,
    as_of: Option<String>,
    config_json: Option<String>,
) -> NapiResult<String> {
    let config = parse_config(config_json)?;
    let events: Vec<LedgerEvent> = serde_json::from_str(&events_json).map_err(to_napi_error)?;
    let ledger = WriteOffLedger::replay(&config.recovery, events).map_err(to_napi_error)?;
    let as_of = match as_of {
        Some(raw) => raw.parse::<NaiveDate>().map_err(to_napi_error)?,
        None => chrono::Utc::now().date_naive(),
    };

    let output = match report.as_str() {
        "summary" => {
            let contract_id = contract_id
                .ok_or_else(|| to_napi_error("contract_id is required for the summary report"))?;
            serde_json::to_value(
                ledger
                    .contract_summary_as_of(&contract_id, as_of)
                    .map_err(to_napi_error)?,
            )
        }
        "observation" => serde_json::to_value(ledger.contracts_under_observation_as_of(as_of)),
        "stats" => serde_json::to_value(ledger.historical_recovery_stats()),
        other => return Err(to_napi_error(format!("unknown report '{}'", other))),
    }
    .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
