use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use prinad_core::config::ScenarioTriple;
use prinad_core::forward_looking::provision::{calculate_provision, ProvisionInput};
use prinad_core::forward_looking::scenarios::ScenarioSet;
use prinad_core::PrinadConfig;

use crate::input;

#[derive(Args)]
pub struct ProvisionArgs {
    /// JSON with `exposures`, `discount_rate` and optional `weights`
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProvisionRequest {
    #[serde(flatten)]
    portfolio: ProvisionInput,
    #[serde(default)]
    weights: Option<ScenarioTriple>,
}

pub fn run_provision(args: ProvisionArgs, config: &PrinadConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let request: ProvisionRequest = input::read_input(args.input.as_deref())?;
    let mut set = ScenarioSet::new(&config.scenarios)?;
    let mut weight_warnings = Vec::new();
    if let Some(weights) = request.weights {
        let update = set.update_weights(weights)?;
        weight_warnings.extend(update.violations.iter().map(|v| v.to_string()));
    }

    let mut output = calculate_provision(&set, &request.portfolio)?;
    output.warnings.extend(weight_warnings);
    Ok(serde_json::to_value(output)?)
}
