//! Boundaries to the external PD model and its explainer.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::features::{FeatureRecord, CONTRACT_ID_FEATURE};
use crate::error::PrinadError;
use crate::types::Score;
use crate::PrinadResult;

/// Produces a PD base on the 0-100 scale.
#[async_trait]
pub trait PdEstimator: Send + Sync {
    /// False until the underlying model is loaded.
    fn is_ready(&self) -> bool;

    async fn predict_pd_base(&self, features: &FeatureRecord) -> PrinadResult<Score>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionDirection {
    IncreasesRisk,
    DecreasesRisk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub contribution: rust_decimal::Decimal,
    pub direction: ContributionDirection,
}

/// Attributes a prediction to its input features, most influential first.
#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(
        &self,
        features: &FeatureRecord,
        max_features: usize,
    ) -> PrinadResult<Vec<FeatureContribution>>;
}

/// Serves precomputed PDs, looked up by the contract id feature with an
/// optional fallback for contracts not in the table.
#[derive(Debug, Clone, Default)]
pub struct StaticPdEstimator {
    by_contract: BTreeMap<String, Score>,
    fallback: Option<Score>,
}

impl StaticPdEstimator {
    pub fn new(by_contract: BTreeMap<String, Score>) -> Self {
        Self {
            by_contract,
            fallback: None,
        }
    }

    /// Every contract gets the same PD.
    pub fn fixed(pd_base: Score) -> Self {
        Self {
            by_contract: BTreeMap::new(),
            fallback: Some(pd_base),
        }
    }

    pub fn with_fallback(mut self, pd_base: Score) -> Self {
        self.fallback = Some(pd_base);
        self
    }

    pub fn insert(&mut self, contract_id: impl Into<String>, pd_base: Score) {
        self.by_contract.insert(contract_id.into(), pd_base);
    }
}

#[async_trait]
impl PdEstimator for StaticPdEstimator {
    fn is_ready(&self) -> bool {
        !self.by_contract.is_empty() || self.fallback.is_some()
    }

    async fn predict_pd_base(&self, features: &FeatureRecord) -> PrinadResult<Score> {
        let contract_id = features
            .get(CONTRACT_ID_FEATURE)
            .and_then(|v| v.as_text())
            .unwrap_or_default();
        self.by_contract
            .get(contract_id)
            .copied()
            .or(self.fallback)
            .ok_or_else(|| {
                PrinadError::EstimatorFailure(format!(
                    "no precomputed PD for contract '{}'",
                    contract_id
                ))
            })
    }
}
