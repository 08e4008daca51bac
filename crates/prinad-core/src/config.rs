//! Engine configuration.
//!
//! Every threshold that carries regulatory meaning lives here rather than as a
//! hidden constant: delinquency cut-offs, penalty caps, the forgiveness
//! window, scenario weights and spreads, k-factor sanity bands, staging
//! triggers and the cure window. All fields default, so a partial JSON/YAML
//! document only needs to name what it overrides.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::PrinadError;
use crate::PrinadResult;

// ---------------------------------------------------------------------------
// Penalty
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyConfig {
    /// Day count every bucket threshold is divided by.
    pub bucket_normalizer_days: u32,
    /// Multiplier on the internal exposure-weighted depth.
    pub internal_weight: Decimal,
    /// Multiplier on the bureau exposure-weighted depth.
    pub external_weight: Decimal,
    pub max_internal_penalty: Decimal,
    pub max_external_penalty: Decimal,
    /// Cap on the combined penalty.
    pub max_penalty: Decimal,
    /// Largest delinquency (days) still classified as short-term.
    pub short_term_max_days: u32,
    /// Largest delinquency (days) still classified as long-term.
    pub long_term_max_days: u32,
    /// Delinquency (days) from which the history counts as default.
    pub default_min_days: u32,
    /// Suppress a source's penalty when its most recent delinquency is at
    /// least this many months old. `None` disables forgiveness.
    pub forgiveness_months: Option<u32>,
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            bucket_normalizer_days: 360,
            internal_weight: dec!(1.25),
            external_weight: dec!(0.75),
            max_internal_penalty: dec!(1.0),
            max_external_penalty: dec!(0.5),
            max_penalty: dec!(1.5),
            short_term_max_days: 120,
            long_term_max_days: 180,
            default_min_days: 360,
            forgiveness_months: None,
        }
    }
}

impl PenaltyConfig {
    pub fn validate(&self) -> PrinadResult<()> {
        if self.bucket_normalizer_days == 0 {
            return Err(PrinadError::InvalidConfiguration(
                "penalty.bucket_normalizer_days must be positive".into(),
            ));
        }
        for (name, value) in [
            ("internal_weight", self.internal_weight),
            ("external_weight", self.external_weight),
            ("max_internal_penalty", self.max_internal_penalty),
            ("max_external_penalty", self.max_external_penalty),
            ("max_penalty", self.max_penalty),
        ] {
            if value < Decimal::ZERO {
                return Err(PrinadError::InvalidConfiguration(format!(
                    "penalty.{} cannot be negative, got {}",
                    name, value
                )));
            }
        }
        if !(self.short_term_max_days < self.long_term_max_days
            && self.long_term_max_days < self.default_min_days)
        {
            return Err(PrinadError::InvalidConfiguration(format!(
                "penalty level cut-offs must be strictly increasing, got {}/{}/{}",
                self.short_term_max_days, self.long_term_max_days, self.default_min_days
            )));
        }
        if self.forgiveness_months == Some(0) {
            return Err(PrinadError::InvalidConfiguration(
                "penalty.forgiveness_months must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rating
// ---------------------------------------------------------------------------

/// Which built-in rating scale to map scores onto.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingScaleKind {
    /// A1, A2, A3, B1, B2, C1, D.
    #[default]
    Standard,
    /// A1..A3, B1..B3, C1..C3, D, DEFAULT.
    Granular,
}

// ---------------------------------------------------------------------------
// Forward-looking scenarios
// ---------------------------------------------------------------------------

/// One value per macroeconomic scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioTriple {
    pub optimistic: Decimal,
    pub base: Decimal,
    pub pessimistic: Decimal,
}

impl ScenarioTriple {
    pub fn new(optimistic: Decimal, base: Decimal, pessimistic: Decimal) -> Self {
        Self {
            optimistic,
            base,
            pessimistic,
        }
    }

    pub fn sum(&self) -> Decimal {
        self.optimistic + self.base + self.pessimistic
    }
}

/// Closed interval used for regulatory sanity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanityBand {
    pub lower: Decimal,
    pub upper: Decimal,
}

impl SanityBand {
    pub fn contains(&self, value: Decimal) -> bool {
        value >= self.lower && value <= self.upper
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub weights: ScenarioTriple,
    pub pd_spreads: ScenarioTriple,
    pub lgd_spreads: ScenarioTriple,
    pub k_pd_band: SanityBand,
    pub k_lgd_band: SanityBand,
    /// Allowed deviation of the weight sum from 1.
    pub weight_tolerance: Decimal,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            weights: ScenarioTriple::new(dec!(0.15), dec!(0.70), dec!(0.15)),
            pd_spreads: ScenarioTriple::new(dec!(0.85), dec!(1.00), dec!(1.25)),
            lgd_spreads: ScenarioTriple::new(dec!(0.90), dec!(1.00), dec!(1.15)),
            k_pd_band: SanityBand {
                lower: dec!(0.75),
                upper: dec!(1.25),
            },
            k_lgd_band: SanityBand {
                lower: dec!(0.80),
                upper: dec!(1.20),
            },
            weight_tolerance: dec!(0.001),
        }
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> PrinadResult<()> {
        let w = &self.weights;
        if w.optimistic < Decimal::ZERO || w.base < Decimal::ZERO || w.pessimistic < Decimal::ZERO
        {
            return Err(PrinadError::InvalidConfiguration(
                "scenario weights cannot be negative".into(),
            ));
        }
        if w.sum() <= Decimal::ZERO {
            return Err(PrinadError::InvalidConfiguration(
                "scenario weights must not all be zero".into(),
            ));
        }
        for (name, t) in [("pd_spreads", &self.pd_spreads), ("lgd_spreads", &self.lgd_spreads)] {
            if t.optimistic <= Decimal::ZERO || t.base <= Decimal::ZERO || t.pessimistic <= Decimal::ZERO
            {
                return Err(PrinadError::InvalidConfiguration(format!(
                    "scenarios.{} must be positive",
                    name
                )));
            }
        }
        for (name, band) in [("k_pd_band", &self.k_pd_band), ("k_lgd_band", &self.k_lgd_band)] {
            if band.lower > band.upper {
                return Err(PrinadError::InvalidConfiguration(format!(
                    "scenarios.{} lower bound {} exceeds upper bound {}",
                    name, band.lower, band.upper
                )));
            }
        }
        if self.weight_tolerance <= Decimal::ZERO {
            return Err(PrinadError::InvalidConfiguration(
                "scenarios.weight_tolerance must be positive".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Staging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Stage 2 when days past due exceed this value.
    pub stage2_dpd_threshold: u32,
    /// Stage 3 when days past due exceed this value.
    pub stage3_dpd_threshold: u32,
    /// Significant increase in credit risk when current PD / origination PD
    /// reaches this ratio.
    pub sicr_pd_ratio: Decimal,
    /// Minimum absolute PD increase for the ratio trigger to count, so that
    /// tiny origination PDs do not flip on noise.
    pub sicr_min_absolute_increase: Decimal,
    /// Consecutive observations below the stage 2 trigger before a cure.
    pub min_cure_periods: u32,
    /// Apply the cure in the same evaluation that finds the contract
    /// eligible. When false, eligibility is recorded and the cure waits for
    /// an explicit `apply_cure`.
    pub auto_apply_cure: bool,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            stage2_dpd_threshold: 30,
            stage3_dpd_threshold: 90,
            sicr_pd_ratio: dec!(2.0),
            sicr_min_absolute_increase: dec!(0.01),
            min_cure_periods: 3,
            auto_apply_cure: true,
        }
    }
}

impl StagingConfig {
    pub fn validate(&self) -> PrinadResult<()> {
        if self.stage3_dpd_threshold <= self.stage2_dpd_threshold {
            return Err(PrinadError::InvalidConfiguration(format!(
                "staging.stage3_dpd_threshold ({}) must exceed stage2_dpd_threshold ({})",
                self.stage3_dpd_threshold, self.stage2_dpd_threshold
            )));
        }
        if self.sicr_pd_ratio <= Decimal::ONE {
            return Err(PrinadError::InvalidConfiguration(
                "staging.sicr_pd_ratio must be greater than 1".into(),
            ));
        }
        if self.sicr_min_absolute_increase < Decimal::ZERO {
            return Err(PrinadError::InvalidConfiguration(
                "staging.sicr_min_absolute_increase cannot be negative".into(),
            ));
        }
        if self.min_cure_periods == 0 {
            return Err(PrinadError::InvalidConfiguration(
                "staging.min_cure_periods must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

/// Regulatory observation window after a write-off (5 x 365 days).
pub const DEFAULT_OBSERVATION_HORIZON_DAYS: u32 = 1825;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Days after the most recent write-off during which recoveries are tracked.
    pub observation_horizon_days: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            observation_horizon_days: DEFAULT_OBSERVATION_HORIZON_DAYS,
        }
    }
}

impl RecoveryConfig {
    pub fn validate(&self) -> PrinadResult<()> {
        if self.observation_horizon_days == 0 {
            return Err(PrinadError::InvalidConfiguration(
                "recovery.observation_horizon_days must be positive".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub estimator_timeout_ms: u64,
    pub explainer_timeout_ms: u64,
    pub max_explanation_features: usize,
    pub model_version: String,
    pub rating_scale: RatingScaleKind,
    /// Upper bound on in-flight classifications in a batch.
    pub batch_concurrency: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            estimator_timeout_ms: 2_000,
            explainer_timeout_ms: 1_000,
            max_explanation_features: 10,
            model_version: "prinad-v1".into(),
            rating_scale: RatingScaleKind::Standard,
            batch_concurrency: 8,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> PrinadResult<()> {
        if self.estimator_timeout_ms == 0 || self.explainer_timeout_ms == 0 {
            return Err(PrinadError::InvalidConfiguration(
                "classifier timeouts must be positive".into(),
            ));
        }
        if self.batch_concurrency == 0 {
            return Err(PrinadError::InvalidConfiguration(
                "classifier.batch_concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinadConfig {
    pub penalty: PenaltyConfig,
    pub scenarios: ScenarioConfig,
    pub staging: StagingConfig,
    pub recovery: RecoveryConfig,
    pub classifier: ClassifierConfig,
}

impl PrinadConfig {
    /// Parse a JSON document and validate the result.
    pub fn from_json_str(raw: &str) -> PrinadResult<Self> {
        let config: PrinadConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PrinadResult<()> {
        self.penalty.validate()?;
        self.scenarios.validate()?;
        self.staging.validate()?;
        self.recovery.validate()?;
        self.classifier.validate()?;
        Ok(())
    }
}
