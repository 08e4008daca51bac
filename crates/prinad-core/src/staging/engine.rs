//! IFRS 9 stage and cure state machine.
//!
//! Transitions:
//! - STAGE_1 -> STAGE_2 when days past due exceed the stage 2 threshold or
//!   the behavioural PD has deteriorated significantly since origination.
//! - any stage -> STAGE_3 when days past due exceed the stage 3 threshold or
//!   a qualitative default indicator is present.
//! - STAGE_2 / STAGE_3 -> STAGE_1 only through cure: the contract must stay
//!   below the stage 2 trigger for `min_cure_periods` consecutive
//!   observations.
//!
//! A missing days-past-due figure never yields STAGE_1: the contract is held
//! at STAGE_2 or worse and the evaluation is tagged as degraded.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::StagingConfig;
use crate::error::PrinadError;
use crate::types::{Rate, Stage};
use crate::PrinadResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CureStatus {
    /// Contract is in stage 1; nothing to cure.
    #[default]
    NotApplicable,
    /// Performing, but the streak is shorter than the cure window.
    InProgress,
    /// Streak complete; cure not yet applied.
    Eligible,
    /// Cure applied in this evaluation.
    Applied,
    /// A stage 2 trigger was present, the streak restarts.
    Interrupted,
}

/// Cure flags attached to a contract after every evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CureFlags {
    pub cure_evaluated: bool,
    pub cure_status: CureStatus,
    pub cure_eligible: bool,
    pub cure_applied: bool,
    pub performing_periods: u32,
    pub required_periods: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractState {
    pub contract_id: String,
    pub stage: Stage,
    pub days_past_due: Option<u32>,
    pub pd_at_origination: Rate,
    pub behavioral_pd: Rate,
    /// Consecutive observations below the stage 2 trigger.
    pub consecutive_performing_periods: u32,
    pub cure: CureFlags,
    pub written_off: bool,
}

impl ContractState {
    /// A newly originated contract: stage 1, current PD equal to origination PD.
    pub fn originate(contract_id: &str, pd_at_origination: Rate) -> PrinadResult<Self> {
        if contract_id.trim().is_empty() {
            return Err(PrinadError::invalid("contract_id", "Contract id cannot be empty."));
        }
        validate_pd("pd_at_origination", pd_at_origination)?;
        Ok(Self {
            contract_id: contract_id.to_string(),
            stage: Stage::Stage1,
            days_past_due: Some(0),
            pd_at_origination,
            behavioral_pd: pd_at_origination,
            consecutive_performing_periods: 0,
            cure: CureFlags::default(),
            written_off: false,
        })
    }
}

/// One observation period for a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub days_past_due: Option<u32>,
    pub behavioral_pd: Rate,
    /// Bankruptcy, distressed restructuring or similar default evidence.
    #[serde(default)]
    pub qualitative_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum StageTrigger {
    DaysPastDue { days: u32, threshold: u32 },
    PdDeterioration { ratio: Option<Decimal>, increase: Decimal },
    QualitativeDefault,
    MissingDaysPastDue,
    Cure { periods: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvaluation {
    pub contract_id: String,
    pub previous_stage: Stage,
    pub new_stage: Stage,
    pub triggers: Vec<StageTrigger>,
    pub cure: CureFlags,
    /// Input was incomplete and the safer stage was assumed.
    pub data_degraded: bool,
    /// State to persist after this evaluation.
    pub next_state: ContractState,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct StageEngine {
    config: StagingConfig,
}

impl StageEngine {
    pub fn new(config: StagingConfig) -> PrinadResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StagingConfig {
        &self.config
    }

    /// Evaluate one observation against the current state.
    pub fn evaluate_stage(
        &self,
        state: &ContractState,
        observation: &Observation,
    ) -> PrinadResult<StageEvaluation> {
        if state.written_off {
            return Err(PrinadError::ContractWrittenOff(state.contract_id.clone()));
        }
        validate_pd("behavioral_pd", observation.behavioral_pd)?;

        let mut triggers = Vec::new();
        let data_degraded = observation.days_past_due.is_none();

        let (stage2_by_dpd, stage3_by_dpd) = match observation.days_past_due {
            Some(days) => {
                let s3 = days > self.config.stage3_dpd_threshold;
                let s2 = days > self.config.stage2_dpd_threshold;
                if s3 {
                    triggers.push(StageTrigger::DaysPastDue {
                        days,
                        threshold: self.config.stage3_dpd_threshold,
                    });
                } else if s2 {
                    triggers.push(StageTrigger::DaysPastDue {
                        days,
                        threshold: self.config.stage2_dpd_threshold,
                    });
                }
                (s2, s3)
            }
            None => {
                warn!(
                    contract_id = %state.contract_id,
                    "days past due missing, assuming stage 2 or worse"
                );
                triggers.push(StageTrigger::MissingDaysPastDue);
                (true, false)
            }
        };

        if let Some(trigger) = self.pd_deterioration(state.pd_at_origination, observation.behavioral_pd) {
            triggers.push(trigger);
        }
        let sicr = triggers
            .iter()
            .any(|t| matches!(t, StageTrigger::PdDeterioration { .. }));

        if observation.qualitative_default {
            triggers.push(StageTrigger::QualitativeDefault);
        }

        let stage3_trigger = stage3_by_dpd || observation.qualitative_default;
        let stage2_trigger = stage2_by_dpd || sicr || stage3_trigger;
        let performing = !stage2_trigger;

        let performing_periods = if performing {
            state.consecutive_performing_periods.saturating_add(1)
        } else {
            0
        };

        let escalated = if stage3_trigger {
            Stage::Stage3
        } else if stage2_trigger {
            state.stage.max(Stage::Stage2)
        } else {
            state.stage
        };

        let required_periods = self.config.min_cure_periods;
        let mut cure = CureFlags {
            cure_evaluated: false,
            cure_status: CureStatus::NotApplicable,
            cure_eligible: false,
            cure_applied: false,
            performing_periods,
            required_periods,
        };
        let mut new_stage = escalated;

        if state.stage != Stage::Stage1 {
            cure.cure_evaluated = true;
            if !performing {
                cure.cure_status = CureStatus::Interrupted;
            } else if performing_periods >= required_periods {
                cure.cure_eligible = true;
                if self.config.auto_apply_cure {
                    cure.cure_applied = true;
                    cure.cure_status = CureStatus::Applied;
                    new_stage = Stage::Stage1;
                    triggers.push(StageTrigger::Cure {
                        periods: performing_periods,
                    });
                } else {
                    cure.cure_status = CureStatus::Eligible;
                }
            } else {
                cure.cure_status = CureStatus::InProgress;
            }
        }

        if new_stage != state.stage {
            info!(
                contract_id = %state.contract_id,
                from = %state.stage,
                to = %new_stage,
                cure_applied = cure.cure_applied,
                "stage transition"
            );
        } else {
            debug!(contract_id = %state.contract_id, stage = %new_stage, "stage unchanged");
        }

        let next_state = ContractState {
            contract_id: state.contract_id.clone(),
            stage: new_stage,
            days_past_due: observation.days_past_due,
            pd_at_origination: state.pd_at_origination,
            behavioral_pd: observation.behavioral_pd,
            consecutive_performing_periods: performing_periods,
            cure: cure.clone(),
            written_off: false,
        };

        Ok(StageEvaluation {
            contract_id: state.contract_id.clone(),
            previous_stage: state.stage,
            new_stage,
            triggers,
            cure,
            data_degraded,
            next_state,
        })
    }

    /// Apply a cure previously recorded as eligible.
    pub fn apply_cure(&self, state: &ContractState) -> PrinadResult<StageEvaluation> {
        if state.written_off {
            return Err(PrinadError::ContractWrittenOff(state.contract_id.clone()));
        }
        if !state.cure.cure_eligible || state.stage == Stage::Stage1 {
            return Err(PrinadError::invalid(
                "cure",
                format!(
                    "Contract '{}' is not eligible for cure (stage {}, status {:?}).",
                    state.contract_id, state.stage, state.cure.cure_status
                ),
            ));
        }

        let cure = CureFlags {
            cure_evaluated: true,
            cure_status: CureStatus::Applied,
            cure_eligible: true,
            cure_applied: true,
            performing_periods: state.consecutive_performing_periods,
            required_periods: self.config.min_cure_periods,
        };
        info!(contract_id = %state.contract_id, from = %state.stage, "cure applied");

        let mut next_state = state.clone();
        next_state.stage = Stage::Stage1;
        next_state.cure = cure.clone();

        Ok(StageEvaluation {
            contract_id: state.contract_id.clone(),
            previous_stage: state.stage,
            new_stage: Stage::Stage1,
            triggers: vec![StageTrigger::Cure {
                periods: state.consecutive_performing_periods,
            }],
            cure,
            data_degraded: false,
            next_state,
        })
    }

    fn pd_deterioration(&self, origination: Rate, current: Rate) -> Option<StageTrigger> {
        let increase = current - origination;
        if increase < self.config.sicr_min_absolute_increase || increase <= Decimal::ZERO {
            return None;
        }
        if origination.is_zero() {
            return Some(StageTrigger::PdDeterioration { ratio: None, increase });
        }
        let ratio = current / origination;
        if ratio >= self.config.sicr_pd_ratio {
            Some(StageTrigger::PdDeterioration {
                ratio: Some(ratio),
                increase,
            })
        } else {
            None
        }
    }
}

fn validate_pd(field: &str, pd: Rate) -> PrinadResult<()> {
    if pd < Decimal::ZERO || pd > Decimal::ONE {
        return Err(PrinadError::invalid(
            field,
            format!("PD must be in [0, 1], got {}.", pd),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn engine() -> StageEngine {
        StageEngine::default()
    }

    fn obs(dpd: u32) -> Observation {
        Observation {
            days_past_due: Some(dpd),
            behavioral_pd: dec!(0.02),
            qualitative_default: false,
        }
    }

    fn fresh() -> ContractState {
        ContractState::originate("C-1", dec!(0.02)).unwrap()
    }

    fn run(engine: &StageEngine, mut state: ContractState, observations: &[Observation]) -> (ContractState, Vec<StageEvaluation>) {
        let mut evals = Vec::new();
        for o in observations {
            let e = engine.evaluate_stage(&state, o).unwrap();
            state = e.next_state.clone();
            evals.push(e);
        }
        (state, evals)
    }

    #[test]
    fn test_origination_is_stage_1() {
        let s = fresh();
        assert_eq!(s.stage, Stage::Stage1);
        assert!(!s.cure.cure_evaluated);
    }

    #[test]
    fn test_30_dpd_stays_stage_1() {
        let e = engine().evaluate_stage(&fresh(), &obs(30)).unwrap();
        assert_eq!(e.new_stage, Stage::Stage1);
    }

    #[test]
    fn test_31_dpd_moves_to_stage_2() {
        for dpd in [31, 45, 90] {
            let e = engine().evaluate_stage(&fresh(), &obs(dpd)).unwrap();
            assert_eq!(e.new_stage, Stage::Stage2, "dpd {}", dpd);
        }
    }

    #[test]
    fn test_91_dpd_moves_to_stage_3_directly() {
        let e = engine().evaluate_stage(&fresh(), &obs(91)).unwrap();
        assert_eq!(e.new_stage, Stage::Stage3);
        assert!(matches!(
            e.triggers[0],
            StageTrigger::DaysPastDue { threshold: 90, .. }
        ));
    }

    #[test]
    fn test_pd_deterioration_triggers_stage_2() {
        let o = Observation {
            days_past_due: Some(0),
            behavioral_pd: dec!(0.05),
            qualitative_default: false,
        };
        let e = engine().evaluate_stage(&fresh(), &o).unwrap();
        assert_eq!(e.new_stage, Stage::Stage2);
        assert!(e
            .triggers
            .iter()
            .any(|t| matches!(t, StageTrigger::PdDeterioration { .. })));
    }

    #[test]
    fn test_small_absolute_pd_change_ignored() {
        let state = ContractState::originate("C-2", dec!(0.001)).unwrap();
        let o = Observation {
            days_past_due: Some(0),
            behavioral_pd: dec!(0.004),
            qualitative_default: false,
        };
        // Ratio 4x but only +0.3pp.
        let e = engine().evaluate_stage(&state, &o).unwrap();
        assert_eq!(e.new_stage, Stage::Stage1);
    }

    #[test]
    fn test_qualitative_default_moves_to_stage_3() {
        let (state, _) = run(&engine(), fresh(), &[obs(45)]);
        let o = Observation {
            qualitative_default: true,
            ..obs(10)
        };
        let e = engine().evaluate_stage(&state, &o).unwrap();
        assert_eq!(e.previous_stage, Stage::Stage2);
        assert_eq!(e.new_stage, Stage::Stage3);
    }

    #[test]
    fn test_missing_dpd_never_stage_1() {
        let o = Observation {
            days_past_due: None,
            behavioral_pd: dec!(0.02),
            qualitative_default: false,
        };
        let e = engine().evaluate_stage(&fresh(), &o).unwrap();
        assert_eq!(e.new_stage, Stage::Stage2);
        assert!(e.data_degraded);
        assert!(e.triggers.contains(&StageTrigger::MissingDaysPastDue));
    }

    #[test]
    fn test_missing_dpd_keeps_stage_3() {
        let (state, _) = run(&engine(), fresh(), &[obs(120)]);
        let o = Observation {
            days_past_due: None,
            behavioral_pd: dec!(0.02),
            qualitative_default: false,
        };
        let e = engine().evaluate_stage(&state, &o).unwrap();
        assert_eq!(e.new_stage, Stage::Stage3);
    }

    #[test]
    fn test_single_good_period_does_not_cure() {
        let (state, evals) = run(&engine(), fresh(), &[obs(45), obs(0)]);
        assert_eq!(state.stage, Stage::Stage2);
        let last = evals.last().unwrap();
        assert!(last.cure.cure_evaluated);
        assert_eq!(last.cure.cure_status, CureStatus::InProgress);
        assert!(!last.cure.cure_eligible);
        assert!(!last.cure.cure_applied);
    }

    #[test]
    fn test_cure_after_sustained_improvement() {
        let (state, evals) = run(&engine(), fresh(), &[obs(45), obs(0), obs(0), obs(0)]);
        assert_eq!(state.stage, Stage::Stage1);
        let last = evals.last().unwrap();
        assert_eq!(last.previous_stage, Stage::Stage2);
        assert!(last.cure.cure_eligible);
        assert!(last.cure.cure_applied);
        assert_eq!(last.cure.cure_status, CureStatus::Applied);
        assert_eq!(last.cure.performing_periods, 3);
    }

    #[test]
    fn test_relapse_resets_cure_streak() {
        let (state, evals) = run(
            &engine(),
            fresh(),
            &[obs(45), obs(0), obs(0), obs(40), obs(0), obs(0)],
        );
        assert_eq!(state.stage, Stage::Stage2);
        assert_eq!(evals[3].cure.cure_status, CureStatus::Interrupted);
        assert_eq!(state.consecutive_performing_periods, 2);
    }

    #[test]
    fn test_performing_counter_saturates() {
        let mut state = fresh();
        state.stage = Stage::Stage2;
        state.consecutive_performing_periods = u32::MAX;
        let eval = engine().evaluate_stage(&state, &obs(0)).unwrap();
        assert_eq!(eval.cure.performing_periods, u32::MAX);
        assert!(eval.cure.cure_applied);
        assert_eq!(eval.new_stage, Stage::Stage1);
    }

    #[test]
    fn test_stage_3_can_cure() {
        let (state, _) = run(&engine(), fresh(), &[obs(120), obs(10), obs(10), obs(10)]);
        assert_eq!(state.stage, Stage::Stage1);
    }

    #[test]
    fn test_stage_3_does_not_step_down_without_cure() {
        let (state, _) = run(&engine(), fresh(), &[obs(120), obs(45)]);
        assert_eq!(state.stage, Stage::Stage3);
    }

    #[test]
    fn test_cure_applied_implies_eligible() {
        let patterns: [&[u32]; 4] = [
            &[45, 0, 0, 0, 0],
            &[95, 0, 50, 0, 0, 0],
            &[0, 31, 0, 0, 100, 0, 0, 0],
            &[60, 60, 0, 0, 0, 31],
        ];
        for pattern in patterns {
            let observations: Vec<Observation> = pattern.iter().map(|d| obs(*d)).collect();
            let (_, evals) = run(&engine(), fresh(), &observations);
            for e in evals {
                if e.cure.cure_applied {
                    assert!(e.cure.cure_eligible);
                }
            }
        }
    }

    #[test]
    fn test_manual_cure_mode() {
        let config = StagingConfig {
            auto_apply_cure: false,
            ..StagingConfig::default()
        };
        let engine = StageEngine::new(config).unwrap();
        let (state, evals) = run(&engine, fresh(), &[obs(45), obs(0), obs(0), obs(0)]);
        assert_eq!(state.stage, Stage::Stage2);
        assert_eq!(evals[3].cure.cure_status, CureStatus::Eligible);
        assert!(!evals[3].cure.cure_applied);

        let cured = engine.apply_cure(&state).unwrap();
        assert_eq!(cured.new_stage, Stage::Stage1);
        assert!(cured.cure.cure_applied && cured.cure.cure_eligible);
    }

    #[test]
    fn test_apply_cure_requires_eligibility() {
        let (state, _) = run(&engine(), fresh(), &[obs(45), obs(0)]);
        assert!(engine().apply_cure(&state).is_err());
    }

    #[test]
    fn test_configured_cure_window() {
        let config = StagingConfig {
            min_cure_periods: 1,
            ..StagingConfig::default()
        };
        let engine = StageEngine::new(config).unwrap();
        let (state, _) = run(&engine, fresh(), &[obs(45), obs(0)]);
        assert_eq!(state.stage, Stage::Stage1);
    }

    #[test]
    fn test_written_off_contract_rejected() {
        let mut state = fresh();
        state.written_off = true;
        assert!(matches!(
            engine().evaluate_stage(&state, &obs(0)),
            Err(PrinadError::ContractWrittenOff(_))
        ));
    }

    #[test]
    fn test_reject_invalid_pd() {
        assert!(ContractState::originate("C", dec!(1.5)).is_err());
        assert!(ContractState::originate(" ", dec!(0.1)).is_err());
        let o = Observation {
            behavioral_pd: dec!(-0.1),
            ..obs(0)
        };
        assert!(engine().evaluate_stage(&fresh(), &o).is_err());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let e = engine().evaluate_stage(&fresh(), &obs(95)).unwrap();
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("days_past_due"));
        let back: StageEvaluation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
