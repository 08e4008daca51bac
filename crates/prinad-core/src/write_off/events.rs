use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteOffReason {
    ProlongedDefault,
    LegalPrescription,
    Other,
}

impl std::fmt::Display for WriteOffReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WriteOffReason::ProlongedDefault => "PROLONGED_DEFAULT",
            WriteOffReason::LegalPrescription => "LEGAL_PRESCRIPTION",
            WriteOffReason::Other => "OTHER",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOffEvent {
    pub contract_id: String,
    pub amount: Money,
    pub reason: WriteOffReason,
    /// Provision held against the contract at write-off.
    pub provision_held: Money,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryEvent {
    pub contract_id: String,
    pub amount: Money,
    pub date: NaiveDate,
}

/// One entry of the append-only log, as exported by `WriteOffLedger::events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    WriteOff(WriteOffEvent),
    Recovery(RecoveryEvent),
}

impl LedgerEvent {
    pub fn contract_id(&self) -> &str {
        match self {
            LedgerEvent::WriteOff(e) => &e.contract_id,
            LedgerEvent::Recovery(e) => &e.contract_id,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            LedgerEvent::WriteOff(e) => e.date,
            LedgerEvent::Recovery(e) => e.date,
        }
    }

    /// Write-offs sort before recoveries dated the same day.
    pub(crate) fn sort_key(&self) -> (NaiveDate, u8) {
        match self {
            LedgerEvent::WriteOff(e) => (e.date, 0),
            LedgerEvent::Recovery(e) => (e.date, 1),
        }
    }
}
