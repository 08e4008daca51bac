pub mod classify;
pub mod ecl;
pub mod penalty;
pub mod provision;
pub mod rating;
pub mod recovery;
pub mod stage;

use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use prinad_core::with_metadata;

/// Wrap a command result in the standard envelope.
pub(crate) fn envelope<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    mut warnings: Vec<String>,
    start: Instant,
    result: T,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut seen = std::collections::HashSet::new();
    warnings.retain(|w| seen.insert(w.clone()));
    let elapsed = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
    let output = with_metadata(methodology, assumptions, warnings, elapsed, result);
    Ok(serde_json::to_value(output)?)
}
