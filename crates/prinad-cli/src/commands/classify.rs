use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use serde::Deserialize;
use serde_json::{json, Value};

use prinad_core::classifier::estimator::StaticPdEstimator;
use prinad_core::classifier::service::{ClassificationRequest, RiskClassifier};
use prinad_core::{PrinadConfig, PrinadError, Score};

use crate::input;

#[derive(Args)]
pub struct ClassifyArgs {
    /// JSON request (or `{"requests": [...]}`) with a precomputed `pd_base` per contract
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScoredRequest {
    /// PD base from an upstream model, 0-100.
    pd_base: Score,
    #[serde(flatten)]
    request: ClassificationRequest,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifyInput {
    Batch { requests: Vec<ScoredRequest> },
    Single(ScoredRequest),
}

pub fn run_classify(args: ClassifyArgs, config: &PrinadConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let input: ClassifyInput = input::read_input(args.input.as_deref())?;
    let (scored, single) = match input {
        ClassifyInput::Batch { requests } => (requests, false),
        ClassifyInput::Single(request) => (vec![request], true),
    };

    // The estimator looks PDs up by contract id, so each id may appear once.
    let mut pds: BTreeMap<String, Score> = BTreeMap::new();
    for s in &scored {
        if pds.insert(s.request.contract_id.clone(), s.pd_base).is_some() {
            return Err(PrinadError::InvalidInput {
                field: "requests".into(),
                reason: format!("Duplicate contract_id '{}' in batch.", s.request.contract_id),
            }
            .into());
        }
    }
    let requests: Vec<ClassificationRequest> = scored.into_iter().map(|s| s.request).collect();

    let classifier = RiskClassifier::new(
        Arc::new(StaticPdEstimator::new(pds)),
        None,
        config.penalty.clone(),
        config.classifier.clone(),
    )?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    if single {
        let result = runtime.block_on(classifier.classify_request(&requests[0]))?;
        let weights = result.penalty_weights.clone();
        return super::envelope(
            "PRINAD = min(100, PD base x (1 + historical penalty)), mapped to rating bands",
            &weights,
            Vec::new(),
            start,
            result,
        );
    }

    let outcomes = runtime.block_on(classifier.classify_batch(&requests));
    let warnings: Vec<String> = outcomes
        .iter()
        .filter_map(|o| o.error.as_ref().map(|e| format!("{}: {}", o.contract_id, e)))
        .collect();
    Ok(json!({
        "results": outcomes,
        "stats": classifier.stats(),
        "warnings": warnings,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::InputFile;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn request(contract_id: &str, pd_base: &str) -> String {
        format!(
            r#"{{"contract_id": "{}", "pd_base": "{}",
                "registration": {{"product_type": "PERSONAL_LOAN", "requested_amount": "5000", "term_months": 24}}}}"#,
            contract_id, pd_base
        )
    }

    fn decimal_at(v: &Value, pointer: &str) -> Decimal {
        v.pointer(pointer).and_then(Value::as_str).unwrap().parse().unwrap()
    }

    #[test]
    fn test_single_request() {
        let file = InputFile::new(&request("C-1", "20"));
        let v = run_classify(ClassifyArgs { input: Some(file.path()) }, &PrinadConfig::default()).unwrap();
        assert_eq!(v["result"]["contract_id"], "C-1");
        assert_eq!(decimal_at(&v, "/result/pd_base"), dec!(20));
        // Clean history carries no penalty.
        assert_eq!(decimal_at(&v, "/result/final_score"), dec!(20));
        assert!(v["assumptions"].is_object());
    }

    #[test]
    fn test_batch_keeps_input_order() {
        let body = format!(r#"{{"requests": [{}, {}]}}"#, request("C-1", "10"), request("C-2", "80"));
        let file = InputFile::new(&body);
        let v = run_classify(ClassifyArgs { input: Some(file.path()) }, &PrinadConfig::default()).unwrap();
        assert_eq!(v["results"][0]["contract_id"], "C-1");
        assert_eq!(decimal_at(&v, "/results/0/result/pd_base"), dec!(10));
        assert_eq!(decimal_at(&v, "/results/1/result/pd_base"), dec!(80));
    }

    #[test]
    fn test_duplicate_contract_ids_rejected() {
        let body = format!(r#"{{"requests": [{}, {}]}}"#, request("X", "10"), request("X", "80"));
        let file = InputFile::new(&body);
        let err = run_classify(ClassifyArgs { input: Some(file.path()) }, &PrinadConfig::default()).unwrap_err();
        assert!(err.to_string().contains("Duplicate contract_id 'X'"));
    }
}
