//! Append-only write-off and recovery ledger.
//!
//! Events are stored per contract in a `DashMap`. Every append goes through
//! the entry API, so the "no recovery without a prior write-off" check and
//! the append happen under the same shard lock: calls for one contract
//! serialise, calls for different contracts do not block each other.
//! Summaries are derived from the stored events on every call.

use chrono::{Duration, NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::events::{LedgerEvent, RecoveryEvent, WriteOffEvent, WriteOffReason};
use super::stats::{self, RecoveryStats};
use crate::config::RecoveryConfig;
use crate::error::PrinadError;
use crate::types::Money;
use crate::PrinadResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecoverySummary {
    pub contract_id: String,
    pub total_written_off: Money,
    pub total_recovered: Money,
    /// `total_recovered / total_written_off * 100`.
    pub recovery_rate: Decimal,
    pub recoveries: usize,
    pub last_write_off_date: NaiveDate,
    pub observation_end: NaiveDate,
    pub within_observation_window: bool,
    pub days_remaining: i64,
}

#[derive(Debug, Clone, Default)]
struct ContractLog {
    write_offs: Vec<WriteOffEvent>,
    recoveries: Vec<RecoveryEvent>,
}

impl ContractLog {
    fn last_write_off_date(&self) -> Option<NaiveDate> {
        self.write_offs.iter().map(|w| w.date).max()
    }

    fn first_write_off_date(&self) -> Option<NaiveDate> {
        self.write_offs.iter().map(|w| w.date).min()
    }

    fn sorted_write_offs(&self) -> Vec<WriteOffEvent> {
        let mut write_offs = self.write_offs.clone();
        write_offs.sort_by_key(|w| w.date);
        write_offs
    }
}

pub struct WriteOffLedger {
    logs: DashMap<String, ContractLog>,
    horizon_days: u32,
}

impl Default for WriteOffLedger {
    fn default() -> Self {
        Self {
            logs: DashMap::new(),
            horizon_days: RecoveryConfig::default().observation_horizon_days,
        }
    }
}

impl WriteOffLedger {
    pub fn new(config: &RecoveryConfig) -> PrinadResult<Self> {
        config.validate()?;
        Ok(Self {
            logs: DashMap::new(),
            horizon_days: config.observation_horizon_days,
        })
    }

    pub fn horizon_days(&self) -> u32 {
        self.horizon_days
    }

    /// Append a write-off. `date` defaults to today (UTC).
    pub fn register_write_off(
        &self,
        contract_id: &str,
        amount: Money,
        reason: WriteOffReason,
        provision_held: Money,
        date: Option<NaiveDate>,
    ) -> PrinadResult<WriteOffEvent> {
        validate_contract_id(contract_id)?;
        if amount <= Decimal::ZERO {
            return Err(PrinadError::invalid(
                "amount",
                "Write-off amount must be positive.",
            ));
        }
        if provision_held < Decimal::ZERO {
            return Err(PrinadError::invalid(
                "provision_held",
                "Provision held cannot be negative.",
            ));
        }

        let event = WriteOffEvent {
            contract_id: contract_id.to_string(),
            amount,
            reason,
            provision_held,
            date: date.unwrap_or_else(today),
        };
        self.logs
            .entry(contract_id.to_string())
            .or_default()
            .write_offs
            .push(event.clone());

        info!(
            contract_id,
            amount = %amount,
            reason = %reason,
            date = %event.date,
            "write-off registered"
        );
        Ok(event)
    }

    /// Append a recovery against a contract with a prior write-off.
    /// `date` defaults to today (UTC).
    pub fn register_recovery(
        &self,
        contract_id: &str,
        amount: Money,
        date: Option<NaiveDate>,
    ) -> PrinadResult<RecoveryEvent> {
        validate_contract_id(contract_id)?;
        if amount <= Decimal::ZERO {
            return Err(PrinadError::invalid(
                "amount",
                "Recovery amount must be positive.",
            ));
        }
        let date = date.unwrap_or_else(today);

        let mut log = match self.logs.entry(contract_id.to_string()) {
            Entry::Occupied(log) => log,
            Entry::Vacant(_) => return Err(PrinadError::NoPriorWriteOff(contract_id.to_string())),
        };
        let first = log
            .get()
            .first_write_off_date()
            .ok_or_else(|| PrinadError::NoPriorWriteOff(contract_id.to_string()))?;
        if date < first {
            return Err(PrinadError::invalid(
                "date",
                format!(
                    "Recovery on {} precedes the first write-off of '{}' on {}.",
                    date, contract_id, first
                ),
            ));
        }

        let event = RecoveryEvent {
            contract_id: contract_id.to_string(),
            amount,
            date,
        };
        log.get_mut().recoveries.push(event.clone());

        info!(contract_id, amount = %amount, date = %date, "recovery registered");
        Ok(event)
    }

    /// Summary of one contract as of today (UTC).
    pub fn contract_summary(&self, contract_id: &str) -> PrinadResult<ContractRecoverySummary> {
        self.contract_summary_as_of(contract_id, today())
    }

    pub fn contract_summary_as_of(
        &self,
        contract_id: &str,
        as_of: NaiveDate,
    ) -> PrinadResult<ContractRecoverySummary> {
        let log = self
            .logs
            .get(contract_id)
            .ok_or_else(|| PrinadError::ContractNotFound(contract_id.to_string()))?;
        self.summarise(contract_id, log.value(), as_of)
            .ok_or_else(|| PrinadError::ContractNotFound(contract_id.to_string()))
    }

    /// Contracts whose most recent write-off is within the observation
    /// horizon today (UTC), ordered by contract id.
    pub fn contracts_under_observation(&self) -> Vec<ContractRecoverySummary> {
        self.contracts_under_observation_as_of(today())
    }

    pub fn contracts_under_observation_as_of(&self, as_of: NaiveDate) -> Vec<ContractRecoverySummary> {
        let mut summaries: Vec<ContractRecoverySummary> = self
            .logs
            .iter()
            .filter_map(|log| self.summarise(log.key(), log.value(), as_of))
            .filter(|s| s.within_observation_window)
            .collect();
        summaries.sort_by(|a, b| a.contract_id.cmp(&b.contract_id));
        debug!(as_of = %as_of, contracts = summaries.len(), "observation list built");
        summaries
    }

    pub fn historical_recovery_stats(&self) -> RecoveryStats {
        let mut acc = RecoveryStats::default();
        for log in self.logs.iter() {
            stats::accumulate(&mut acc, &log.sorted_write_offs(), &log.recoveries);
        }
        stats::finish(acc)
    }

    /// The whole log in chronological order. Same-day write-offs precede
    /// recoveries; ties break on contract id.
    pub fn events(&self) -> Vec<LedgerEvent> {
        let mut events: Vec<LedgerEvent> = Vec::new();
        for log in self.logs.iter() {
            events.extend(log.write_offs.iter().cloned().map(LedgerEvent::WriteOff));
            events.extend(log.recoveries.iter().cloned().map(LedgerEvent::Recovery));
        }
        events.sort_by(|a, b| {
            a.sort_key()
                .cmp(&b.sort_key())
                .then_with(|| a.contract_id().cmp(b.contract_id()))
        });
        events
    }

    /// Rebuild a ledger from exported events, re-applying every append rule.
    pub fn replay(config: &RecoveryConfig, events: Vec<LedgerEvent>) -> PrinadResult<Self> {
        let ledger = Self::new(config)?;
        let mut events = events;
        events.sort_by_key(|e| e.sort_key());
        for event in events {
            match event {
                LedgerEvent::WriteOff(w) => {
                    ledger.register_write_off(
                        &w.contract_id,
                        w.amount,
                        w.reason,
                        w.provision_held,
                        Some(w.date),
                    )?;
                }
                LedgerEvent::Recovery(r) => {
                    ledger.register_recovery(&r.contract_id, r.amount, Some(r.date))?;
                }
            }
        }
        Ok(ledger)
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    fn summarise(
        &self,
        contract_id: &str,
        log: &ContractLog,
        as_of: NaiveDate,
    ) -> Option<ContractRecoverySummary> {
        let last = log.last_write_off_date()?;
        let total_written_off: Money = log.write_offs.iter().map(|w| w.amount).sum();
        let total_recovered: Money = log.recoveries.iter().map(|r| r.amount).sum();
        let horizon = i64::from(self.horizon_days);
        let elapsed = (as_of - last).num_days();

        Some(ContractRecoverySummary {
            contract_id: contract_id.to_string(),
            total_written_off,
            total_recovered,
            recovery_rate: stats::recovery_rate(total_recovered, total_written_off),
            recoveries: log.recoveries.len(),
            last_write_off_date: last,
            observation_end: last + Duration::days(horizon),
            within_observation_window: elapsed <= horizon,
            days_remaining: (horizon - elapsed.max(0)).max(0),
        })
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn validate_contract_id(contract_id: &str) -> PrinadResult<()> {
    if contract_id.trim().is_empty() {
        return Err(PrinadError::invalid(
            "contract_id",
            "Contract id cannot be empty.",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
