use std::time::Instant;

use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use prinad_core::config::RatingScaleKind;
use prinad_core::rating::scale::RatingScale;
use prinad_core::{PrinadConfig, Score};

use super::envelope;
use crate::input;

#[derive(Args)]
pub struct RatingArgs {
    /// Score to rate; skips --input
    #[arg(long, allow_hyphen_values = true)]
    pub score: Option<Decimal>,
    /// Use the 11-band granular scale
    #[arg(long)]
    pub granular: bool,
    /// JSON with `score` and optional custom `bands`
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RatingRequest {
    score: Score,
    #[serde(default)]
    scale: Option<RatingScaleKind>,
    /// Custom scale, validated on parse.
    #[serde(default)]
    bands: Option<RatingScale>,
}

pub fn run_rating(args: RatingArgs, config: &PrinadConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let default_kind = if args.granular {
        RatingScaleKind::Granular
    } else {
        config.classifier.rating_scale
    };

    let request = match args.score {
        Some(score) => RatingRequest {
            score,
            scale: None,
            bands: None,
        },
        None => input::read_input(args.input.as_deref())?,
    };

    let scale = match request.bands {
        Some(bands) => bands,
        None => RatingScale::for_kind(request.scale.unwrap_or(default_kind)),
    };
    let info = scale.get_rating(request.score);

    let mut warnings = Vec::new();
    if info.score != request.score {
        warnings.push(format!(
            "Score {} saturated to {} before rating",
            request.score, info.score
        ));
    }

    envelope(
        "Half-open band lookup on the [0, 100] PRINAD scale",
        &scale,
        warnings,
        start,
        info,
    )
}
