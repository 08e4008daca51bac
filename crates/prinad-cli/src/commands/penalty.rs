use std::time::Instant;

use clap::Args;
use serde::Deserialize;
use serde_json::{json, Value};

use prinad_core::behavioral::delinquency::BehavioralHistory;
use prinad_core::behavioral::penalty::HistoricalPenaltyCalculator;
use prinad_core::{PrinadConfig, Score};

use super::envelope;
use crate::input;

#[derive(Args)]
pub struct PenaltyArgs {
    /// JSON with `internal`, `external` delinquency vectors and optional `pd_base`
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PenaltyRequest {
    #[serde(default)]
    pd_base: Option<Score>,
    #[serde(flatten)]
    history: BehavioralHistory,
}

pub fn run_penalty(args: PenaltyArgs, config: &PrinadConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let request: PenaltyRequest = input::read_input(args.input.as_deref())?;
    let calc = HistoricalPenaltyCalculator::new(config.penalty.clone())?;

    let result = match request.pd_base {
        Some(pd_base) => {
            let (final_score, analysis) = calc.apply_penalty(pd_base, &request.history)?;
            json!({
                "pd_base": pd_base,
                "final_score": final_score,
                "total_penalty": analysis.total_penalty,
                "analysis": analysis,
            })
        }
        None => serde_json::to_value(calc.calculate(&request.history)?)?,
    };

    envelope(
        "Historical delinquency penalty: min(100, pd_base x (1 + penalty))",
        &calc.weights(),
        Vec::new(),
        start,
        result,
    )
}
