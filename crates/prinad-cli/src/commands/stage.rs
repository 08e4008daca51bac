use std::time::Instant;

use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use prinad_core::staging::engine::{ContractState, Observation, StageEngine, StageEvaluation};
use prinad_core::staging::registry::ContractRegistry;
use prinad_core::{PrinadConfig, Rate, Stage};

use super::envelope;
use crate::input;

#[derive(Args)]
pub struct StageArgs {
    /// JSON with either `state` + `observation`, or `contracts` with observation histories
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContractHistory {
    contract_id: String,
    pd_at_origination: Rate,
    observations: Vec<Observation>,
    #[serde(default)]
    written_off: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StageInput {
    Single {
        state: ContractState,
        observation: Observation,
    },
    Replay {
        contracts: Vec<ContractHistory>,
    },
}

#[derive(Debug, Serialize)]
struct ContractOutcome {
    contract_id: String,
    stage: Stage,
    transitions: usize,
    data_degraded: bool,
    cure_applied: bool,
    written_off: bool,
}

pub fn run_stage(args: StageArgs, config: &PrinadConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let input: StageInput = input::read_input(args.input.as_deref())?;

    match input {
        StageInput::Single { state, observation } => {
            let engine = StageEngine::new(config.staging.clone())?;
            let evaluation = engine.evaluate_stage(&state, &observation)?;
            let warnings = degraded_warning(&evaluation).into_iter().collect();
            envelope(
                "IFRS 9 staging: DPD and PD-deterioration triggers with a consecutive-period cure",
                &config.staging,
                warnings,
                start,
                evaluation,
            )
        }
        StageInput::Replay { contracts } => {
            let registry = ContractRegistry::new(config.staging.clone())?;
            let mut outcomes = Vec::with_capacity(contracts.len());
            let mut warnings = Vec::new();

            for history in contracts {
                registry.open_contract(&history.contract_id, history.pd_at_origination)?;
                let mut transitions = 0;
                let mut data_degraded = false;
                let mut cure_applied = false;
                for observation in &history.observations {
                    let evaluation = registry.observe(&history.contract_id, observation)?;
                    transitions += usize::from(evaluation.new_stage != evaluation.previous_stage);
                    data_degraded |= evaluation.data_degraded;
                    cure_applied |= evaluation.cure.cure_applied;
                    warnings.extend(degraded_warning(&evaluation));
                }
                if history.written_off {
                    registry.mark_written_off(&history.contract_id)?;
                }
                let state = registry
                    .get(&history.contract_id)
                    .ok_or_else(|| format!("contract '{}' vanished from registry", history.contract_id))?;
                outcomes.push(ContractOutcome {
                    contract_id: state.contract_id,
                    stage: state.stage,
                    transitions,
                    data_degraded,
                    cure_applied,
                    written_off: state.written_off,
                });
            }

            Ok(json!({
                "contracts": outcomes,
                "distribution": registry.stage_distribution(),
                "warnings": warnings,
                "elapsed_us": u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX),
            }))
        }
    }
}

fn degraded_warning(evaluation: &StageEvaluation) -> Option<String> {
    evaluation.data_degraded.then(|| {
        format!(
            "{}: days past due missing, held at {}",
            evaluation.contract_id, evaluation.new_stage
        )
    })
}
