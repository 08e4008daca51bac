//! PRINAD rating scales.
//!
//! A scale is an ordered, contiguous partition of `[0, 100]` into half-open
//! bands `[lower, upper)`; the terminal band also accepts 100. Scores outside
//! `[0, 100]` saturate to the nearest end rather than being rejected.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::RatingScaleKind;
use crate::error::PrinadError;
use crate::types::{clamp_decimal, Score, MAX_SCORE};
use crate::PrinadResult;

/// Ordinal rating codes, from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RatingCode {
    A1,
    A2,
    A3,
    B1,
    B2,
    B3,
    C1,
    C2,
    C3,
    D,
    #[serde(rename = "DEFAULT")]
    Default,
}

impl RatingCode {
    pub const ALL: [RatingCode; 11] = [
        RatingCode::A1,
        RatingCode::A2,
        RatingCode::A3,
        RatingCode::B1,
        RatingCode::B2,
        RatingCode::B3,
        RatingCode::C1,
        RatingCode::C2,
        RatingCode::C3,
        RatingCode::D,
        RatingCode::Default,
    ];

    /// Position on the risk ladder; higher is riskier.
    pub fn severity(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for RatingCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::A1 => "A1",
            Self::A2 => "A2",
            Self::A3 => "A3",
            Self::B1 => "B1",
            Self::B2 => "B2",
            Self::B3 => "B3",
            Self::C1 => "C1",
            Self::C2 => "C2",
            Self::C3 => "C3",
            Self::D => "D",
            Self::Default => "DEFAULT",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingBand {
    pub code: RatingCode,
    /// Inclusive lower bound.
    pub lower: Score,
    /// Exclusive upper bound (inclusive for the terminal band).
    pub upper: Score,
    pub description: String,
    pub color: String,
    pub suggested_action: String,
}

impl RatingBand {
    fn new(code: RatingCode, lower: Score, upper: Score, description: &str, color: &str, action: &str) -> Self {
        Self {
            code,
            lower,
            upper,
            description: description.into(),
            color: color.into(),
            suggested_action: action.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandRange {
    pub lower: Score,
    pub upper: Score,
    pub upper_inclusive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingInfo {
    pub code: RatingCode,
    pub description: String,
    pub color: String,
    pub suggested_action: String,
    pub band: BandRange,
    /// Score after saturation into `[0, 100]`.
    pub score: Score,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RatingBand>", into = "Vec<RatingBand>")]
pub struct RatingScale {
    bands: Vec<RatingBand>,
}

impl TryFrom<Vec<RatingBand>> for RatingScale {
    type Error = PrinadError;

    fn try_from(bands: Vec<RatingBand>) -> PrinadResult<Self> {
        RatingScale::new(bands)
    }
}

impl From<RatingScale> for Vec<RatingBand> {
    fn from(scale: RatingScale) -> Self {
        scale.bands
    }
}

impl RatingScale {
    /// Build a scale, checking that it partitions `[0, 100]`.
    pub fn new(bands: Vec<RatingBand>) -> PrinadResult<Self> {
        validate_bands(&bands)?;
        Ok(Self { bands })
    }

    pub fn for_kind(kind: RatingScaleKind) -> Self {
        match kind {
            RatingScaleKind::Standard => Self::standard(),
            RatingScaleKind::Granular => Self::granular(),
        }
    }

    /// Seven-band scale, A1 through D.
    pub fn standard() -> Self {
        Self {
            bands: vec![
                RatingBand::new(RatingCode::A1, dec!(0), dec!(5), "Minimal risk", "green", "Approve; eligible for pre-approved limits"),
                RatingBand::new(RatingCode::A2, dec!(5), dec!(15), "Low risk", "light_green", "Approve on standard terms"),
                RatingBand::new(RatingCode::A3, dec!(15), dec!(25), "Moderate-low risk", "yellow_green", "Approve with periodic review"),
                RatingBand::new(RatingCode::B1, dec!(25), dec!(40), "Moderate risk", "yellow", "Approve with enhanced monitoring"),
                RatingBand::new(RatingCode::B2, dec!(40), dec!(60), "Elevated risk", "orange", "Reduce limits; require guarantees"),
                RatingBand::new(RatingCode::C1, dec!(60), dec!(80), "High risk", "red", "Restrict new credit; start active collection"),
                RatingBand::new(RatingCode::D, dec!(80), dec!(100), "Critical risk", "black", "Decline; move to recovery"),
            ],
        }
    }

    /// Eleven-band scale, A1 through DEFAULT.
    pub fn granular() -> Self {
        Self {
            bands: vec![
                RatingBand::new(RatingCode::A1, dec!(0), dec!(2), "Minimal risk", "green", "Approve; eligible for pre-approved limits"),
                RatingBand::new(RatingCode::A2, dec!(2), dec!(5), "Very low risk", "green", "Approve on standard terms"),
                RatingBand::new(RatingCode::A3, dec!(5), dec!(10), "Low risk", "light_green", "Approve on standard terms"),
                RatingBand::new(RatingCode::B1, dec!(10), dec!(15), "Moderate-low risk", "yellow_green", "Approve with periodic review"),
                RatingBand::new(RatingCode::B2, dec!(15), dec!(25), "Moderate risk", "yellow", "Approve with enhanced monitoring"),
                RatingBand::new(RatingCode::B3, dec!(25), dec!(35), "Moderate-high risk", "amber", "Approve with reduced limits"),
                RatingBand::new(RatingCode::C1, dec!(35), dec!(50), "Elevated risk", "orange", "Require guarantees"),
                RatingBand::new(RatingCode::C2, dec!(50), dec!(65), "High risk", "dark_orange", "Restrict new credit"),
                RatingBand::new(RatingCode::C3, dec!(65), dec!(80), "Very high risk", "red", "Start active collection"),
                RatingBand::new(RatingCode::D, dec!(80), dec!(95), "Critical risk", "dark_red", "Decline; restructuring only"),
                RatingBand::new(RatingCode::Default, dec!(95), dec!(100), "Default", "black", "Move to recovery"),
            ],
        }
    }

    pub fn bands(&self) -> &[RatingBand] {
        &self.bands
    }

    /// The riskiest band on this scale.
    pub fn worst(&self) -> &RatingBand {
        // Validated scales are never empty.
        &self.bands[self.bands.len() - 1]
    }

    pub fn get_rating(&self, score: Score) -> RatingInfo {
        let score = clamp_decimal(score, Decimal::ZERO, MAX_SCORE);
        let last = self.bands.len() - 1;
        let band = self
            .bands
            .iter()
            .enumerate()
            .find(|(i, b)| score >= b.lower && (score < b.upper || (*i == last && score <= b.upper)))
            .map(|(_, b)| b)
            .unwrap_or_else(|| self.worst());

        RatingInfo {
            code: band.code,
            description: band.description.clone(),
            color: band.color.clone(),
            suggested_action: band.suggested_action.clone(),
            band: BandRange {
                lower: band.lower,
                upper: band.upper,
                upper_inclusive: band.code == self.worst().code,
            },
            score,
        }
    }
}

impl Default for RatingScale {
    fn default() -> Self {
        Self::standard()
    }
}

/// Rate a score on the standard scale.
pub fn get_rating(score: Score) -> RatingInfo {
    RatingScale::standard().get_rating(score)
}

fn validate_bands(bands: &[RatingBand]) -> PrinadResult<()> {
    let (first, last) = match (bands.first(), bands.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => {
            return Err(PrinadError::invalid(
                "bands",
                "A rating scale needs at least one band.",
            ))
        }
    };
    if first.lower != Decimal::ZERO {
        return Err(PrinadError::invalid(
            "bands",
            format!("First band must start at 0, starts at {}.", first.lower),
        ));
    }
    if last.upper != MAX_SCORE {
        return Err(PrinadError::invalid(
            "bands",
            format!("Last band must end at 100, ends at {}.", last.upper),
        ));
    }
    for band in bands {
        if band.lower >= band.upper {
            return Err(PrinadError::invalid(
                "bands",
                format!("Band {} is empty: [{}, {}).", band.code, band.lower, band.upper),
            ));
        }
    }
    for pair in bands.windows(2) {
        if pair[0].upper != pair[1].lower {
            return Err(PrinadError::invalid(
                "bands",
                format!(
                    "Bands {} and {} are not contiguous ({} vs {}).",
                    pair[0].code, pair[1].code, pair[0].upper, pair[1].lower
                ),
            ));
        }
        if pair[1].code.severity() < pair[0].code.severity() {
            return Err(PrinadError::invalid(
                "bands",
                format!(
                    "Band {} follows {} but is less severe.",
                    pair[1].code, pair[0].code
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matching_bands(scale: &RatingScale, score: Score) -> usize {
        let last = scale.bands().len() - 1;
        scale
            .bands()
            .iter()
            .enumerate()
            .filter(|(i, b)| score >= b.lower && (score < b.upper || (*i == last && score <= b.upper)))
            .count()
    }

    #[test]
    fn test_zero_is_a1_green() {
        let r = get_rating(dec!(0.0));
        assert_eq!(r.code, RatingCode::A1);
        assert_eq!(r.color, "green");
    }

    #[test]
    fn test_hundred_is_worst_black() {
        let r = get_rating(dec!(100.0));
        assert_eq!(r.code, RatingCode::D);
        assert_eq!(r.color, "black");
        assert!(r.band.upper_inclusive);

        let g = RatingScale::granular().get_rating(dec!(100));
        assert_eq!(g.code, RatingCode::Default);
        assert_eq!(g.color, "black");
    }

    #[test]
    fn test_out_of_range_saturates() {
        let low = get_rating(dec!(-5.0));
        assert_eq!(low.code, RatingCode::A1);
        assert_eq!(low.score, Decimal::ZERO);

        let high = get_rating(dec!(150.0));
        assert_eq!(high.code, RatingCode::D);
        assert_eq!(high.score, dec!(100));
    }

    #[test]
    fn test_band_edges_are_half_open() {
        assert_eq!(get_rating(dec!(4.9999)).code, RatingCode::A1);
        assert_eq!(get_rating(dec!(5)).code, RatingCode::A2);
        assert_eq!(get_rating(dec!(79.99)).code, RatingCode::C1);
        assert_eq!(get_rating(dec!(80)).code, RatingCode::D);
    }

    #[test]
    fn test_every_score_matches_exactly_one_band() {
        for scale in [RatingScale::standard(), RatingScale::granular()] {
            let mut s = Decimal::ZERO;
            while s <= dec!(100) {
                assert_eq!(matching_bands(&scale, s), 1, "score {}", s);
                s += dec!(0.25);
            }
        }
    }

    #[test]
    fn test_severity_is_monotonic_with_score() {
        for scale in [RatingScale::standard(), RatingScale::granular()] {
            let mut prev = RatingCode::A1;
            let mut s = Decimal::ZERO;
            while s <= dec!(100) {
                let code = scale.get_rating(s).code;
                assert!(code >= prev);
                prev = code;
                s += dec!(0.5);
            }
        }
    }

    #[test]
    fn test_builtin_scales_validate() {
        assert!(RatingScale::new(RatingScale::standard().bands().to_vec()).is_ok());
        assert!(RatingScale::new(RatingScale::granular().bands().to_vec()).is_ok());
    }

    #[test]
    fn test_reject_gap() {
        let mut bands = RatingScale::standard().bands().to_vec();
        bands[1].lower = dec!(6);
        assert!(RatingScale::new(bands).is_err());
    }

    #[test]
    fn test_reject_short_coverage() {
        let mut bands = RatingScale::standard().bands().to_vec();
        bands.pop();
        assert!(RatingScale::new(bands).is_err());
    }

    #[test]
    fn test_reject_decreasing_severity() {
        let mut bands = RatingScale::standard().bands().to_vec();
        bands.swap(0, 1);
        bands[0].lower = dec!(0);
        bands[0].upper = dec!(5);
        bands[1].lower = dec!(5);
        bands[1].upper = dec!(15);
        assert!(RatingScale::new(bands).is_err());
    }

    #[test]
    fn test_reject_empty_scale() {
        assert!(RatingScale::new(vec![]).is_err());
    }

    #[test]
    fn test_for_kind() {
        assert_eq!(RatingScale::for_kind(RatingScaleKind::Granular).bands().len(), 11);
        assert_eq!(RatingScale::for_kind(RatingScaleKind::Standard).bands().len(), 7);
    }

    #[test]
    fn test_deserialization_validates_bands() {
        let json = serde_json::to_string(&RatingScale::granular()).unwrap();
        let back: RatingScale = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RatingScale::granular());

        let mut bands = RatingScale::standard().bands().to_vec();
        bands[3].upper = dec!(41);
        let broken = serde_json::to_string(&bands).unwrap();
        assert!(serde_json::from_str::<RatingScale>(&broken).is_err());
    }

    #[test]
    fn test_code_serializes_upper_case_default() {
        let json = serde_json::to_string(&RatingCode::Default).unwrap();
        assert_eq!(json, "\"DEFAULT\"");
    }
}
