use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Scores on the 0-100 PRINAD scale.
pub type Score = Decimal;

/// Upper bound of the PRINAD score scale.
pub const MAX_SCORE: Decimal = dec!(100);

/// Clamp a value into `[lower, upper]`.
pub fn clamp_decimal(value: Decimal, lower: Decimal, upper: Decimal) -> Decimal {
    value.max(lower).min(upper)
}

/// IFRS 9 impairment stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Performing: 12-month ECL.
    #[serde(rename = "STAGE_1")]
    Stage1,
    /// Significant increase in credit risk: lifetime ECL.
    #[serde(rename = "STAGE_2")]
    Stage2,
    /// Credit-impaired: lifetime ECL.
    #[serde(rename = "STAGE_3")]
    Stage3,
}

impl Stage {
    pub fn number(self) -> u8 {
        match self {
            Stage::Stage1 => 1,
            Stage::Stage2 => 2,
            Stage::Stage3 => 3,
        }
    }

    pub fn uses_lifetime_ecl(self) -> bool {
        self != Stage::Stage1
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "STAGE_{}", self.number())
    }
}

/// A computed fact that breaches a configured regulatory sanity band.
///
/// Violations are reported alongside the result, never corrected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantViolation {
    pub check: String,
    pub value: Decimal,
    pub lower: Decimal,
    pub upper: Decimal,
}

impl InvariantViolation {
    /// Returns a violation when `value` falls outside `[lower, upper]`.
    pub fn check_band(
        check: &str,
        value: Decimal,
        lower: Decimal,
        upper: Decimal,
    ) -> Option<InvariantViolation> {
        if value < lower || value > upper {
            Some(InvariantViolation {
                check: check.to_string(),
                value,
                lower,
                upper,
            })
        } else {
            None
        }
    }
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} = {} outside sanity band [{}, {}]",
            self.check, self.value, self.lower, self.upper
        )
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
