//! Delinquency history snapshots.
//!
//! A [`DelinquencyVector`] maps the fixed set of day buckets to the exposure
//! outstanding at that delinquency depth. Internal and bureau-reported
//! histories are kept as two parallel vectors in a [`BehavioralHistory`].

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PrinadError;
use crate::types::Money;
use crate::PrinadResult;

/// Delinquency depth buckets, ordered from shallowest to deepest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DelinquencyBucket {
    #[serde(rename = "30")]
    Days30,
    #[serde(rename = "60")]
    Days60,
    #[serde(rename = "90")]
    Days90,
    #[serde(rename = "120")]
    Days120,
    #[serde(rename = "150")]
    Days150,
    #[serde(rename = "180")]
    Days180,
    #[serde(rename = "270")]
    Days270,
    #[serde(rename = "360")]
    Days360,
}

impl DelinquencyBucket {
    pub const ALL: [DelinquencyBucket; 8] = [
        DelinquencyBucket::Days30,
        DelinquencyBucket::Days60,
        DelinquencyBucket::Days90,
        DelinquencyBucket::Days120,
        DelinquencyBucket::Days150,
        DelinquencyBucket::Days180,
        DelinquencyBucket::Days270,
        DelinquencyBucket::Days360,
    ];

    pub fn days(self) -> u32 {
        match self {
            DelinquencyBucket::Days30 => 30,
            DelinquencyBucket::Days60 => 60,
            DelinquencyBucket::Days90 => 90,
            DelinquencyBucket::Days120 => 120,
            DelinquencyBucket::Days150 => 150,
            DelinquencyBucket::Days180 => 180,
            DelinquencyBucket::Days270 => 270,
            DelinquencyBucket::Days360 => 360,
        }
    }
}

impl std::fmt::Display for DelinquencyBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}d", self.days())
    }
}

/// Exposure by delinquency bucket for one source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DelinquencyVector {
    #[serde(default)]
    pub exposures: BTreeMap<DelinquencyBucket, Money>,
    /// Months elapsed since the most recent delinquent observation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub months_since_last_delinquency: Option<u32>,
}

impl DelinquencyVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exposure(mut self, bucket: DelinquencyBucket, amount: Money) -> Self {
        self.exposures.insert(bucket, amount);
        self
    }

    pub fn with_months_since_last_delinquency(mut self, months: u32) -> Self {
        self.months_since_last_delinquency = Some(months);
        self
    }

    pub fn exposure(&self, bucket: DelinquencyBucket) -> Money {
        self.exposures.get(&bucket).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn total_exposure(&self) -> Money {
        self.exposures.values().copied().sum()
    }

    /// Deepest bucket carrying non-zero exposure.
    pub fn deepest_bucket(&self) -> Option<DelinquencyBucket> {
        self.exposures
            .iter()
            .rev()
            .find(|(_, amount)| **amount > Decimal::ZERO)
            .map(|(bucket, _)| *bucket)
    }

    pub fn max_delinquency_days(&self) -> u32 {
        self.deepest_bucket().map(DelinquencyBucket::days).unwrap_or(0)
    }

    pub fn is_clear(&self) -> bool {
        self.deepest_bucket().is_none()
    }

    /// Reject negative exposures; they are never clamped to zero.
    pub fn validate(&self, source: &str) -> PrinadResult<()> {
        for (bucket, amount) in &self.exposures {
            if *amount < Decimal::ZERO {
                return Err(PrinadError::InvalidInput {
                    field: format!("{}.{}", source, bucket),
                    reason: format!("Exposure cannot be negative, got {}.", amount),
                });
            }
        }
        Ok(())
    }
}

/// Internal and bureau delinquency histories evaluated together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehavioralHistory {
    #[serde(default)]
    pub internal: DelinquencyVector,
    #[serde(default)]
    pub external: DelinquencyVector,
}

impl BehavioralHistory {
    pub fn new(internal: DelinquencyVector, external: DelinquencyVector) -> Self {
        Self { internal, external }
    }

    pub fn validate(&self) -> PrinadResult<()> {
        self.internal.validate("internal")?;
        self.external.validate("external")
    }

    /// Deepest delinquency across both sources.
    pub fn max_delinquency_days(&self) -> u32 {
        self.internal
            .max_delinquency_days()
            .max(self.external.max_delinquency_days())
    }
}
