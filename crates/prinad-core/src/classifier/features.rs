//! Typed classification inputs and their flattening into a `FeatureRecord`.
//!
//! The service works with `RegistrationData` and `BehavioralData`. Only the
//! estimator adapter sees the generic name -> scalar map.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::behavioral::delinquency::{BehavioralHistory, DelinquencyBucket, DelinquencyVector};
use crate::error::PrinadError;
use crate::types::{Money, Rate};
use crate::PrinadResult;

/// Scalar feature value. Tagged on the wire so numeric-looking text such as
/// a contract id stays `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FeatureValue {
    Flag(bool),
    Number(Decimal),
    Text(String),
}

impl FeatureValue {
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            FeatureValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FeatureValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

pub type FeatureRecord = BTreeMap<String, FeatureValue>;

/// Feature name carrying the contract id inside a `FeatureRecord`.
pub const CONTRACT_ID_FEATURE: &str = "contract_id";

/// Application-time data about the borrower and the product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrationData {
    pub product_type: String,
    pub requested_amount: Money,
    pub term_months: u32,
    #[serde(default)]
    pub monthly_income: Option<Money>,
    #[serde(default)]
    pub age_years: Option<u32>,
    #[serde(default)]
    pub employment_months: Option<u32>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub has_collateral: bool,
}

/// Observed repayment behaviour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehavioralData {
    #[serde(default)]
    pub history: BehavioralHistory,
    #[serde(default)]
    pub months_on_book: u32,
    #[serde(default)]
    pub active_contracts: u32,
    #[serde(default)]
    pub missed_payments_12m: u32,
    /// Revolving utilisation in `[0, 1]`.
    #[serde(default)]
    pub utilization_rate: Option<Rate>,
}

impl RegistrationData {
    pub fn validate(&self) -> PrinadResult<()> {
        if self.product_type.trim().is_empty() {
            return Err(PrinadError::invalid(
                "registration.product_type",
                "Product type cannot be empty.",
            ));
        }
        if self.requested_amount < Decimal::ZERO {
            return Err(PrinadError::invalid(
                "registration.requested_amount",
                "Requested amount cannot be negative.",
            ));
        }
        if self.term_months == 0 {
            return Err(PrinadError::invalid(
                "registration.term_months",
                "Term must be at least one month.",
            ));
        }
        if let Some(income) = self.monthly_income {
            if income < Decimal::ZERO {
                return Err(PrinadError::invalid(
                    "registration.monthly_income",
                    "Monthly income cannot be negative.",
                ));
            }
        }
        Ok(())
    }
}

impl BehavioralData {
    pub fn validate(&self) -> PrinadResult<()> {
        self.history.validate()?;
        if let Some(u) = self.utilization_rate {
            if u < Decimal::ZERO || u > Decimal::ONE {
                return Err(PrinadError::invalid(
                    "behavioral.utilization_rate",
                    format!("Utilisation must be in [0, 1], got {}.", u),
                ));
            }
        }
        Ok(())
    }
}

/// Flatten the typed inputs into the estimator's feature map.
pub fn to_feature_record(
    contract_id: &str,
    registration: &RegistrationData,
    behavioral: &BehavioralData,
) -> FeatureRecord {
    let mut record = FeatureRecord::new();
    let mut put = |name: &str, value: FeatureValue| {
        record.insert(name.to_string(), value);
    };

    put(CONTRACT_ID_FEATURE, FeatureValue::Text(contract_id.to_string()));
    put("product_type", FeatureValue::Text(registration.product_type.clone()));
    put("requested_amount", FeatureValue::Number(registration.requested_amount));
    put("term_months", FeatureValue::Number(registration.term_months.into()));
    put("has_collateral", FeatureValue::Flag(registration.has_collateral));
    if let Some(v) = registration.monthly_income {
        put("monthly_income", FeatureValue::Number(v));
    }
    if let Some(v) = registration.age_years {
        put("age_years", FeatureValue::Number(v.into()));
    }
    if let Some(v) = registration.employment_months {
        put("employment_months", FeatureValue::Number(v.into()));
    }
    if let Some(v) = &registration.region {
        put("region", FeatureValue::Text(v.clone()));
    }

    put("months_on_book", FeatureValue::Number(behavioral.months_on_book.into()));
    put("active_contracts", FeatureValue::Number(behavioral.active_contracts.into()));
    put("missed_payments_12m", FeatureValue::Number(behavioral.missed_payments_12m.into()));
    if let Some(v) = behavioral.utilization_rate {
        put("utilization_rate", FeatureValue::Number(v));
    }
    put_delinquency(&mut put, "internal", &behavioral.history.internal);
    put_delinquency(&mut put, "external", &behavioral.history.external);

    record
}

fn put_delinquency(
    put: &mut impl FnMut(&str, FeatureValue),
    source: &str,
    vector: &DelinquencyVector,
) {
    for bucket in DelinquencyBucket::ALL {
        put(
            &format!("{}_{}d", source, bucket.days()),
            FeatureValue::Number(vector.exposure(bucket)),
        );
    }
    if let Some(months) = vector.months_since_last_delinquency {
        put(
            &format!("{}_months_since_delinquency", source),
            FeatureValue::Number(months.into()),
        );
    }
}
