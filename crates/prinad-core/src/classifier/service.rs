//! Risk classification service.
//!
//! `RiskClassifier` is built once with its collaborators and shared by
//! reference. A call flattens the typed inputs, asks the PD estimator for a
//! base PD under a timeout, applies the historical penalty, maps the final
//! score onto the rating scale and, when an explainer is configured, attaches
//! an explanation. A failing explainer degrades the explanation only; a
//! failing estimator fails the call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::estimator::{Explainer, FeatureContribution, PdEstimator};
use super::features::{to_feature_record, BehavioralData, FeatureRecord, RegistrationData};
use super::stats::{ClassificationStats, StatsCollector};
use crate::behavioral::penalty::{HistoricalAnalysis, HistoricalPenaltyCalculator, PenaltyWeights};
use crate::config::{ClassifierConfig, PenaltyConfig};
use crate::error::PrinadError;
use crate::rating::scale::{RatingCode, RatingInfo, RatingScale};
use crate::types::{Score, MAX_SCORE};
use crate::PrinadResult;

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub contract_id: String,
    pub registration: RegistrationData,
    #[serde(default)]
    pub behavioral: BehavioralData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExplanationStatus {
    Available,
    Unavailable { reason: String },
    NotRequested,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub contract_id: String,
    /// PRINAD score in `[0, 100]`.
    pub final_score: Score,
    pub rating_code: RatingCode,
    pub rating: RatingInfo,
    pub pd_base: Score,
    pub penalty: Decimal,
    pub historical_analysis: HistoricalAnalysis,
    pub penalty_weights: PenaltyWeights,
    pub explanation: Vec<FeatureContribution>,
    pub explanation_status: ExplanationStatus,
    pub timestamp: DateTime<Utc>,
    pub model_version: String,
    pub latency_us: u64,
}

/// Per-request outcome of a batch; one failure does not sink the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub contract_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ClassificationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct RiskClassifier {
    estimator: Arc<dyn PdEstimator>,
    explainer: Option<Arc<dyn Explainer>>,
    penalty: HistoricalPenaltyCalculator,
    scale: RatingScale,
    config: ClassifierConfig,
    stats: StatsCollector,
}

impl RiskClassifier {
    pub fn new(
        estimator: Arc<dyn PdEstimator>,
        explainer: Option<Arc<dyn Explainer>>,
        penalty_config: PenaltyConfig,
        config: ClassifierConfig,
    ) -> PrinadResult<Self> {
        config.validate()?;
        Ok(Self {
            estimator,
            explainer,
            penalty: HistoricalPenaltyCalculator::new(penalty_config)?,
            scale: RatingScale::for_kind(config.rating_scale),
            config,
            stats: StatsCollector::new(),
        })
    }

    /// Replace the built-in scale named by the configuration.
    pub fn with_rating_scale(mut self, scale: RatingScale) -> Self {
        self.scale = scale;
        self
    }

    pub fn rating_scale(&self) -> &RatingScale {
        &self.scale
    }

    pub fn stats(&self) -> ClassificationStats {
        self.stats.snapshot()
    }

    pub async fn classify(
        &self,
        contract_id: &str,
        registration: &RegistrationData,
        behavioral: &BehavioralData,
    ) -> PrinadResult<ClassificationResult> {
        let start = Instant::now();
        match self.classify_inner(contract_id, registration, behavioral, start).await {
            Ok(result) => {
                self.stats.record_success(result.rating_code, start.elapsed());
                Ok(result)
            }
            Err(e) => {
                self.stats.record_failure();
                warn!(contract_id, error = %e, "classification failed");
                Err(e)
            }
        }
    }

    pub async fn classify_request(&self, request: &ClassificationRequest) -> PrinadResult<ClassificationResult> {
        self.classify(&request.contract_id, &request.registration, &request.behavioral)
            .await
    }

    /// Classify many requests with at most `batch_concurrency` in flight.
    /// Outcomes keep the input order.
    pub async fn classify_batch(&self, requests: &[ClassificationRequest]) -> Vec<BatchOutcome> {
        stream::iter(requests)
            .map(|request| async move {
                match self.classify_request(request).await {
                    Ok(result) => BatchOutcome {
                        contract_id: request.contract_id.clone(),
                        result: Some(result),
                        error: None,
                    },
                    Err(e) => BatchOutcome {
                        contract_id: request.contract_id.clone(),
                        result: None,
                        error: Some(e.to_string()),
                    },
                }
            })
            .buffered(self.config.batch_concurrency)
            .collect()
            .await
    }

    async fn classify_inner(
        &self,
        contract_id: &str,
        registration: &RegistrationData,
        behavioral: &BehavioralData,
        start: Instant,
    ) -> PrinadResult<ClassificationResult> {
        if contract_id.trim().is_empty() {
            return Err(PrinadError::invalid("contract_id", "Contract id cannot be empty."));
        }
        registration.validate()?;
        behavioral.validate()?;

        if !self.estimator.is_ready() {
            return Err(PrinadError::NotReady(
                "PD estimator has not finished loading".into(),
            ));
        }

        let features = to_feature_record(contract_id, registration, behavioral);
        let pd_base = self.predict(&features).await?;
        let (final_score, analysis) = self.penalty.apply_penalty(pd_base, &behavioral.history)?;
        let rating = self.scale.get_rating(final_score);
        let (explanation, explanation_status) = self.explain(contract_id, &features).await;

        debug!(
            contract_id,
            pd_base = %pd_base,
            penalty = %analysis.total_penalty,
            final_score = %final_score,
            rating = %rating.code,
            "contract classified"
        );

        Ok(ClassificationResult {
            contract_id: contract_id.to_string(),
            final_score,
            rating_code: rating.code,
            rating,
            pd_base,
            penalty: analysis.total_penalty,
            historical_analysis: analysis,
            penalty_weights: self.penalty.weights(),
            explanation,
            explanation_status,
            timestamp: Utc::now(),
            model_version: self.config.model_version.clone(),
            latency_us: u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX),
        })
    }

    async fn predict(&self, features: &FeatureRecord) -> PrinadResult<Score> {
        let limit = Duration::from_millis(self.config.estimator_timeout_ms);
        let pd_base = timeout(limit, self.estimator.predict_pd_base(features))
            .await
            .map_err(|_| PrinadError::Timeout {
                operation: "pd_estimator".into(),
                timeout: limit,
            })??;
        if pd_base < Decimal::ZERO || pd_base > MAX_SCORE {
            return Err(PrinadError::EstimatorFailure(format!(
                "PD base {} outside [0, 100]",
                pd_base
            )));
        }
        Ok(pd_base)
    }

    async fn explain(
        &self,
        contract_id: &str,
        features: &FeatureRecord,
    ) -> (Vec<FeatureContribution>, ExplanationStatus) {
        let explainer = match &self.explainer {
            Some(e) if self.config.max_explanation_features > 0 => e,
            _ => return (Vec::new(), ExplanationStatus::NotRequested),
        };
        let limit = Duration::from_millis(self.config.explainer_timeout_ms);
        let max_features = self.config.max_explanation_features;

        let outcome = match timeout(limit, explainer.explain(features, max_features)).await {
            Ok(Ok(contributions)) => Ok(contributions),
            Ok(Err(e)) => Err(PrinadError::ExplanationUnavailable(e.to_string())),
            Err(_) => Err(PrinadError::ExplanationUnavailable(format!(
                "explainer timed out after {:?}",
                limit
            ))),
        };

        match outcome {
            Ok(mut contributions) => {
                contributions.sort_by(|a, b| b.contribution.abs().cmp(&a.contribution.abs()));
                contributions.truncate(max_features);
                (contributions, ExplanationStatus::Available)
            }
            Err(e) => {
                warn!(contract_id, error = %e, "explanation degraded");
                (
                    Vec::new(),
                    ExplanationStatus::Unavailable {
                        reason: e.to_string(),
                    },
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavioral::delinquency::{BehavioralHistory, DelinquencyBucket, DelinquencyVector};
    use crate::classifier::estimator::{ContributionDirection, StaticPdEstimator};
    use crate::config::RatingScaleKind;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    struct UnreadyEstimator;

    #[async_trait]
    impl PdEstimator for UnreadyEstimator {
        fn is_ready(&self) -> bool {
            false
        }
        async fn predict_pd_base(&self, _: &FeatureRecord) -> PrinadResult<Score> {
            Ok(dec!(10))
        }
    }

    struct SlowEstimator;

    #[async_trait]
    impl PdEstimator for SlowEstimator {
        fn is_ready(&self) -> bool {
            true
        }
        async fn predict_pd_base(&self, _: &FeatureRecord) -> PrinadResult<Score> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(dec!(10))
        }
    }

    struct OutOfRangeEstimator;

    #[async_trait]
    impl PdEstimator for OutOfRangeEstimator {
        fn is_ready(&self) -> bool {
            true
        }
        async fn predict_pd_base(&self, _: &FeatureRecord) -> PrinadResult<Score> {
            Ok(dec!(140))
        }
    }

    struct FixedExplainer;

    #[async_trait]
    impl Explainer for FixedExplainer {
        async fn explain(&self, _: &FeatureRecord, _: usize) -> PrinadResult<Vec<FeatureContribution>> {
            Ok(vec![
                FeatureContribution {
                    feature: "monthly_income".into(),
                    contribution: dec!(-0.4),
                    direction: ContributionDirection::DecreasesRisk,
                },
                FeatureContribution {
                    feature: "internal_90d".into(),
                    contribution: dec!(1.2),
                    direction: ContributionDirection::IncreasesRisk,
                },
                FeatureContribution {
                    feature: "term_months".into(),
                    contribution: dec!(0.1),
                    direction: ContributionDirection::IncreasesRisk,
                },
            ])
        }
    }

    struct BrokenExplainer;

    #[async_trait]
    impl Explainer for BrokenExplainer {
        async fn explain(&self, _: &FeatureRecord, _: usize) -> PrinadResult<Vec<FeatureContribution>> {
            Err(PrinadError::EstimatorFailure("shap backend down".into()))
        }
    }

    struct HangingExplainer;

    #[async_trait]
    impl Explainer for HangingExplainer {
        async fn explain(&self, _: &FeatureRecord, _: usize) -> PrinadResult<Vec<FeatureContribution>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    fn registration() -> RegistrationData {
        RegistrationData {
            product_type: "personal_loan".into(),
            requested_amount: dec!(20000),
            term_months: 48,
            ..RegistrationData::default()
        }
    }

    fn delinquent() -> BehavioralData {
        BehavioralData {
            history: BehavioralHistory::new(
                DelinquencyVector::new().with_exposure(DelinquencyBucket::Days90, dec!(1000)),
                DelinquencyVector::new(),
            ),
            ..BehavioralData::default()
        }
    }

    fn classifier(estimator: Arc<dyn PdEstimator>, explainer: Option<Arc<dyn Explainer>>) -> RiskClassifier {
        RiskClassifier::new(estimator, explainer, PenaltyConfig::default(), ClassifierConfig::default())
            .unwrap()
    }

    #[tokio::test]
    async fn test_clean_history_keeps_pd_base() {
        let svc = classifier(Arc::new(StaticPdEstimator::fixed(dec!(3))), None);
        let r = svc
            .classify("C-1", &registration(), &BehavioralData::default())
            .await
            .unwrap();
        assert_eq!(r.final_score, dec!(3));
        assert_eq!(r.penalty, Decimal::ZERO);
        assert_eq!(r.rating_code, RatingCode::A1);
        assert_eq!(r.explanation_status, ExplanationStatus::NotRequested);
        assert_eq!(r.model_version, "prinad-v1");
    }

    #[tokio::test]
    async fn test_penalty_raises_score() {
        let svc = classifier(Arc::new(StaticPdEstimator::fixed(dec!(20))), None);
        let r = svc.classify("C-1", &registration(), &delinquent()).await.unwrap();
        // internal: 1.25 * 90/360 = 0.3125
        assert_eq!(r.penalty, dec!(0.3125));
        assert_eq!(r.final_score, dec!(26.25));
        assert_eq!(r.rating_code, RatingCode::B1);
    }

    #[tokio::test]
    async fn test_not_ready_fails_fast() {
        let svc = classifier(Arc::new(UnreadyEstimator), None);
        let err = svc
            .classify("C-1", &registration(), &BehavioralData::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PrinadError::NotReady(_)));
        assert_eq!(svc.stats().failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_estimator_timeout_is_distinct() {
        let svc = classifier(Arc::new(SlowEstimator), None);
        let err = svc
            .classify("C-1", &registration(), &BehavioralData::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PrinadError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_out_of_range_estimate_rejected() {
        let svc = classifier(Arc::new(OutOfRangeEstimator), None);
        let err = svc
            .classify("C-1", &registration(), &BehavioralData::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PrinadError::EstimatorFailure(_)));
    }

    #[tokio::test]
    async fn test_explanation_sorted_and_truncated() {
        let config = ClassifierConfig {
            max_explanation_features: 2,
            ..ClassifierConfig::default()
        };
        let svc = RiskClassifier::new(
            Arc::new(StaticPdEstimator::fixed(dec!(10))),
            Some(Arc::new(FixedExplainer)),
            PenaltyConfig::default(),
            config,
        )
        .unwrap();
        let r = svc
            .classify("C-1", &registration(), &BehavioralData::default())
            .await
            .unwrap();
        assert_eq!(r.explanation_status, ExplanationStatus::Available);
        let names: Vec<&str> = r.explanation.iter().map(|c| c.feature.as_str()).collect();
        assert_eq!(names, vec!["internal_90d", "monthly_income"]);
    }

    #[tokio::test]
    async fn test_explainer_failure_degrades_only_explanation() {
        let svc = classifier(
            Arc::new(StaticPdEstimator::fixed(dec!(10))),
            Some(Arc::new(BrokenExplainer)),
        );
        let r = svc
            .classify("C-1", &registration(), &BehavioralData::default())
            .await
            .unwrap();
        assert!(r.explanation.is_empty());
        assert!(matches!(
            r.explanation_status,
            ExplanationStatus::Unavailable { ref reason } if reason.contains("shap backend down")
        ));
        assert_eq!(svc.stats().failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explainer_timeout_degrades_only_explanation() {
        let svc = classifier(
            Arc::new(StaticPdEstimator::fixed(dec!(10))),
            Some(Arc::new(HangingExplainer)),
        );
        let r = svc
            .classify("C-1", &registration(), &BehavioralData::default())
            .await
            .unwrap();
        assert!(matches!(r.explanation_status, ExplanationStatus::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_granular_scale_from_config() {
        let config = ClassifierConfig {
            rating_scale: RatingScaleKind::Granular,
            ..ClassifierConfig::default()
        };
        let svc = RiskClassifier::new(
            Arc::new(StaticPdEstimator::fixed(dec!(97))),
            None,
            PenaltyConfig::default(),
            config,
        )
        .unwrap();
        let r = svc
            .classify("C-1", &registration(), &BehavioralData::default())
            .await
            .unwrap();
        assert_eq!(r.rating_code, RatingCode::Default);
    }

    #[tokio::test]
    async fn test_invalid_input_rejected() {
        let svc = classifier(Arc::new(StaticPdEstimator::fixed(dec!(10))), None);
        let bad = BehavioralData {
            history: BehavioralHistory::new(
                DelinquencyVector::new().with_exposure(DelinquencyBucket::Days30, dec!(-5)),
                DelinquencyVector::new(),
            ),
            ..BehavioralData::default()
        };
        assert!(matches!(
            svc.classify("C-1", &registration(), &bad).await,
            Err(PrinadError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_batch_keeps_order_and_isolates_failures() {
        let mut estimator = StaticPdEstimator::default();
        estimator.insert("A", dec!(2));
        estimator.insert("C", dec!(70));
        let svc = classifier(Arc::new(estimator), None);

        let requests: Vec<ClassificationRequest> = ["A", "B", "C"]
            .iter()
            .map(|id| ClassificationRequest {
                contract_id: id.to_string(),
                registration: registration(),
                behavioral: BehavioralData::default(),
            })
            .collect();
        let outcomes = svc.classify_batch(&requests).await;

        let ids: Vec<&str> = outcomes.iter().map(|o| o.contract_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert!(outcomes[0].result.is_some());
        assert!(outcomes[1].error.is_some());
        assert_eq!(
            outcomes[2].result.as_ref().map(|r| r.rating_code),
            Some(RatingCode::C1)
        );

        let stats = svc.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.failures, 1);
    }

    #[tokio::test]
    async fn test_concurrent_classifications_share_stats() {
        let svc = Arc::new(classifier(Arc::new(StaticPdEstimator::fixed(dec!(10))), None));
        let mut handles = Vec::new();
        for i in 0..20 {
            let svc = Arc::clone(&svc);
            handles.push(tokio::spawn(async move {
                svc.classify(&format!("C-{}", i), &registration(), &BehavioralData::default())
                    .await
                    .map(|r| r.rating_code)
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), RatingCode::A2);
        }
        assert_eq!(svc.stats().by_rating[&RatingCode::A2], 20);
    }
}
