//! Historical delinquency penalty.
//!
//! Covers:
//! 1. **Delinquency level** -- deepest delinquent bucket across the internal
//!    and bureau histories, banded into NONE / SHORT_TERM / LONG_TERM /
//!    SEVERE / DEFAULT.
//! 2. **Source penalty** -- `weight * sum_b(days_b / 360 * exposure_b / total)`
//!    per source, capped at the source maximum.
//! 3. **Combined penalty** -- internal + external, capped at `max_penalty`.
//! 4. **Forgiveness** -- a source whose latest delinquency is at least
//!    `forgiveness_months` old contributes nothing.
//! 5. **Score application** -- `min(100, pd_base * (1 + penalty))`.
//!
//! All arithmetic uses `rust_decimal::Decimal`. No `f64`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::behavioral::delinquency::{BehavioralHistory, DelinquencyVector};
use crate::config::PenaltyConfig;
use crate::error::PrinadError;
use crate::types::{Score, MAX_SCORE};
use crate::PrinadResult;

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DelinquencyLevel {
    None,
    ShortTerm,
    LongTerm,
    Severe,
    Default,
}

impl std::fmt::Display for DelinquencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::ShortTerm => write!(f, "SHORT_TERM"),
            Self::LongTerm => write!(f, "LONG_TERM"),
            Self::Severe => write!(f, "SEVERE"),
            Self::Default => write!(f, "DEFAULT"),
        }
    }
}

/// Result of a penalty calculation. Built fresh per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalAnalysis {
    pub level: DelinquencyLevel,
    pub max_delinquency_days: u32,
    /// Internal-source penalty after its cap and forgiveness.
    pub internal_penalty: Decimal,
    /// Bureau-source penalty after its cap and forgiveness.
    pub external_penalty: Decimal,
    /// Combined penalty in `[0, max_penalty]`.
    pub total_penalty: Decimal,
    /// Every delinquent source is past the forgiveness window.
    pub eligible_for_forgiveness: bool,
    pub internal_forgiven: bool,
    pub external_forgiven: bool,
}

/// Weights and caps that produced a penalty, echoed for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyWeights {
    pub internal_weight: Decimal,
    pub external_weight: Decimal,
    pub max_internal_penalty: Decimal,
    pub max_external_penalty: Decimal,
    pub max_penalty: Decimal,
    pub forgiveness_months: Option<u32>,
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct HistoricalPenaltyCalculator {
    config: PenaltyConfig,
}

struct SourcePenalty {
    penalty: Decimal,
    forgiven: bool,
}

impl HistoricalPenaltyCalculator {
    pub fn new(config: PenaltyConfig) -> PrinadResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PenaltyConfig {
        &self.config
    }

    pub fn weights(&self) -> PenaltyWeights {
        PenaltyWeights {
            internal_weight: self.config.internal_weight,
            external_weight: self.config.external_weight,
            max_internal_penalty: self.config.max_internal_penalty,
            max_external_penalty: self.config.max_external_penalty,
            max_penalty: self.config.max_penalty,
            forgiveness_months: self.config.forgiveness_months,
        }
    }

    /// Analyse a delinquency history into a level and a bounded penalty.
    pub fn calculate(&self, history: &BehavioralHistory) -> PrinadResult<HistoricalAnalysis> {
        history.validate()?;

        let max_delinquency_days = history.max_delinquency_days();
        let level = self.classify_level(max_delinquency_days);

        let internal = self.source_penalty(
            &history.internal,
            self.config.internal_weight,
            self.config.max_internal_penalty,
        );
        let external = self.source_penalty(
            &history.external,
            self.config.external_weight,
            self.config.max_external_penalty,
        );

        let total_penalty = (internal.penalty + external.penalty).min(self.config.max_penalty);

        let eligible_for_forgiveness = self.config.forgiveness_months.is_some()
            && max_delinquency_days > 0
            && (history.internal.is_clear() || internal.forgiven)
            && (history.external.is_clear() || external.forgiven);

        debug!(
            %level,
            max_delinquency_days,
            internal = %internal.penalty,
            external = %external.penalty,
            total = %total_penalty,
            "historical penalty calculated"
        );

        Ok(HistoricalAnalysis {
            level,
            max_delinquency_days,
            internal_penalty: internal.penalty,
            external_penalty: external.penalty,
            total_penalty,
            eligible_for_forgiveness,
            internal_forgiven: internal.forgiven,
            external_forgiven: external.forgiven,
        })
    }

    /// Apply the historical penalty to a PD base on the 0-100 scale.
    pub fn apply_penalty(
        &self,
        pd_base: Score,
        history: &BehavioralHistory,
    ) -> PrinadResult<(Score, HistoricalAnalysis)> {
        if pd_base < Decimal::ZERO || pd_base > MAX_SCORE {
            return Err(PrinadError::invalid(
                "pd_base",
                format!("PD base must be in [0, 100], got {}.", pd_base),
            ));
        }
        let analysis = self.calculate(history)?;
        let final_score = (pd_base * (Decimal::ONE + analysis.total_penalty)).min(MAX_SCORE);
        Ok((final_score, analysis))
    }

    fn classify_level(&self, days: u32) -> DelinquencyLevel {
        if days == 0 {
            DelinquencyLevel::None
        } else if days <= self.config.short_term_max_days {
            DelinquencyLevel::ShortTerm
        } else if days <= self.config.long_term_max_days {
            DelinquencyLevel::LongTerm
        } else if days < self.config.default_min_days {
            DelinquencyLevel::Severe
        } else {
            DelinquencyLevel::Default
        }
    }

    fn source_penalty(&self, vector: &DelinquencyVector, weight: Decimal, cap: Decimal) -> SourcePenalty {
        let total = vector.total_exposure();
        if total <= Decimal::ZERO {
            return SourcePenalty {
                penalty: Decimal::ZERO,
                forgiven: false,
            };
        }

        if let (Some(window), Some(months)) = (
            self.config.forgiveness_months,
            vector.months_since_last_delinquency,
        ) {
            if months >= window {
                return SourcePenalty {
                    penalty: Decimal::ZERO,
                    forgiven: true,
                };
            }
        }

        let normalizer = Decimal::from(self.config.bucket_normalizer_days);
        let depth: Decimal = vector
            .exposures
            .iter()
            .map(|(bucket, amount)| Decimal::from(bucket.days()) / normalizer * (*amount / total))
            .sum();

        SourcePenalty {
            penalty: (weight * depth).min(cap),
            forgiven: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
