//! In-memory contract registry.
//!
//! Holds one `ContractState` per contract id and commits stage transitions
//! produced by the `StageEngine`. Contracts are never removed, only marked
//! written off. Each mutation goes through the `DashMap` entry API, so
//! observations for the same contract serialise while different contracts
//! proceed in parallel.

use std::collections::BTreeMap;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::engine::{ContractState, Observation, StageEngine, StageEvaluation};
use crate::config::StagingConfig;
use crate::error::PrinadError;
use crate::types::{Rate, Stage};
use crate::PrinadResult;

/// Count of live contracts per stage plus written-off contracts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDistribution {
    pub by_stage: BTreeMap<Stage, usize>,
    pub written_off: usize,
    pub total: usize,
}

pub struct ContractRegistry {
    contracts: DashMap<String, ContractState>,
    engine: StageEngine,
}

impl ContractRegistry {
    pub fn new(config: StagingConfig) -> PrinadResult<Self> {
        Ok(Self {
            contracts: DashMap::new(),
            engine: StageEngine::new(config)?,
        })
    }

    pub fn engine(&self) -> &StageEngine {
        &self.engine
    }

    /// Register a contract at origination (stage 1).
    pub fn open_contract(&self, contract_id: &str, pd_at_origination: Rate) -> PrinadResult<ContractState> {
        let state = ContractState::originate(contract_id, pd_at_origination)?;
        match self.contracts.entry(contract_id.to_string()) {
            Entry::Occupied(_) => Err(PrinadError::ContractAlreadyExists(contract_id.to_string())),
            Entry::Vacant(slot) => {
                info!(contract_id, pd_at_origination = %pd_at_origination, "contract opened");
                slot.insert(state.clone());
                Ok(state)
            }
        }
    }

    pub fn get(&self, contract_id: &str) -> Option<ContractState> {
        self.contracts.get(contract_id).map(|s| s.clone())
    }

    /// Evaluate an observation and commit the resulting state.
    pub fn observe(&self, contract_id: &str, observation: &Observation) -> PrinadResult<StageEvaluation> {
        let mut entry = self
            .contracts
            .get_mut(contract_id)
            .ok_or_else(|| PrinadError::ContractNotFound(contract_id.to_string()))?;
        let evaluation = self.engine.evaluate_stage(entry.value(), observation)?;
        *entry.value_mut() = evaluation.next_state.clone();
        Ok(evaluation)
    }

    /// Commit a cure recorded as eligible but not yet applied.
    pub fn apply_cure(&self, contract_id: &str) -> PrinadResult<StageEvaluation> {
        let mut entry = self
            .contracts
            .get_mut(contract_id)
            .ok_or_else(|| PrinadError::ContractNotFound(contract_id.to_string()))?;
        let evaluation = self.engine.apply_cure(entry.value())?;
        *entry.value_mut() = evaluation.next_state.clone();
        Ok(evaluation)
    }

    /// Mark a contract written off. The contract stays in the registry but
    /// no longer accepts observations.
    pub fn mark_written_off(&self, contract_id: &str) -> PrinadResult<ContractState> {
        let mut entry = self
            .contracts
            .get_mut(contract_id)
            .ok_or_else(|| PrinadError::ContractNotFound(contract_id.to_string()))?;
        if entry.written_off {
            return Err(PrinadError::ContractWrittenOff(contract_id.to_string()));
        }
        entry.written_off = true;
        info!(contract_id, stage = %entry.stage, "contract marked written off");
        Ok(entry.clone())
    }

    pub fn stage_distribution(&self) -> StageDistribution {
        let mut distribution = StageDistribution::default();
        for contract in self.contracts.iter() {
            distribution.total += 1;
            if contract.written_off {
                distribution.written_off += 1;
            } else {
                *distribution.by_stage.entry(contract.stage).or_default() += 1;
            }
        }
        distribution
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

impl Default for ContractRegistry {
    fn default() -> Self {
        Self {
            contracts: DashMap::new(),
            engine: StageEngine::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn obs(dpd: u32) -> Observation {
        Observation {
            days_past_due: Some(dpd),
            behavioral_pd: dec!(0.02),
            qualitative_default: false,
        }
    }

    #[test]
    fn test_open_and_observe() {
        let registry = ContractRegistry::default();
        registry.open_contract("C-1", dec!(0.02)).unwrap();
        let e = registry.observe("C-1", &obs(45)).unwrap();
        assert_eq!(e.new_stage, Stage::Stage2);
        assert_eq!(registry.get("C-1").unwrap().stage, Stage::Stage2);
    }

    #[test]
    fn test_duplicate_open_rejected() {
        let registry = ContractRegistry::default();
        registry.open_contract("C-1", dec!(0.02)).unwrap();
        assert!(matches!(
            registry.open_contract("C-1", dec!(0.03)),
            Err(PrinadError::ContractAlreadyExists(_))
        ));
    }

    #[test]
    fn test_unknown_contract() {
        let registry = ContractRegistry::default();
        assert!(matches!(
            registry.observe("missing", &obs(0)),
            Err(PrinadError::ContractNotFound(_))
        ));
    }

    #[test]
    fn test_written_off_contract_kept_but_frozen() {
        let registry = ContractRegistry::default();
        registry.open_contract("C-1", dec!(0.02)).unwrap();
        registry.observe("C-1", &obs(200)).unwrap();
        registry.mark_written_off("C-1").unwrap();

        assert_eq!(registry.len(), 1);
        assert!(matches!(
            registry.observe("C-1", &obs(0)),
            Err(PrinadError::ContractWrittenOff(_))
        ));
        assert!(registry.mark_written_off("C-1").is_err());
    }

    #[test]
    fn test_manual_cure_through_registry() {
        let config = StagingConfig {
            auto_apply_cure: false,
            ..StagingConfig::default()
        };
        let registry = ContractRegistry::new(config).unwrap();
        registry.open_contract("C-1", dec!(0.02)).unwrap();
        for dpd in [45, 0, 0, 0] {
            registry.observe("C-1", &obs(dpd)).unwrap();
        }
        assert_eq!(registry.get("C-1").unwrap().stage, Stage::Stage2);
        registry.apply_cure("C-1").unwrap();
        assert_eq!(registry.get("C-1").unwrap().stage, Stage::Stage1);
    }

    #[test]
    fn test_stage_distribution() {
        let registry = ContractRegistry::default();
        for (id, dpd) in [("A", 0), ("B", 45), ("C", 60), ("D", 120), ("E", 400)] {
            registry.open_contract(id, dec!(0.02)).unwrap();
            registry.observe(id, &obs(dpd)).unwrap();
        }
        registry.mark_written_off("E").unwrap();

        let d = registry.stage_distribution();
        assert_eq!(d.total, 5);
        assert_eq!(d.written_off, 1);
        assert_eq!(d.by_stage.get(&Stage::Stage1), Some(&1));
        assert_eq!(d.by_stage.get(&Stage::Stage2), Some(&2));
        assert_eq!(d.by_stage.get(&Stage::Stage3), Some(&1));
    }

    #[test]
    fn test_concurrent_observations_on_distinct_contracts() {
        let registry = Arc::new(ContractRegistry::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let id = format!("C-{}", i);
                    registry.open_contract(&id, dec!(0.02)).unwrap();
                    for _ in 0..10 {
                        registry.observe(&id, &obs(0)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.len(), 8);
        assert_eq!(registry.get("C-3").unwrap().consecutive_performing_periods, 10);
    }
}
