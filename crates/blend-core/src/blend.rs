//! Blend aggregation and state ledgers.
//!
//! Silo outcomes are folded in canonical silo-id order so every total is
//! independent of input order and of which thread finished first.

use std::collections::BTreeMap;

use blend_ledger::conservation::verify_state_ledgers;
use blend_ledger::{ConservationResult, lot_rows};
use blend_physics::{BlendAccumulator, SiloOutcome};
use blend_types::{QualityParam, RunResult};

use crate::error::BlendError;

/// Merge per-silo outcomes into a run result.
///
/// `outcomes` must already be in canonical silo-id order. Each silo ledger
/// and the combined state ledgers are checked for mass conservation.
///
/// # Errors
///
/// Returns [`BlendError::Computation`] on any conservation anomaly.
pub fn aggregate(outcomes: Vec<SiloOutcome>) -> Result<RunResult, BlendError> {
    let mut blend = BlendAccumulator::new();
    let mut segment_state_ledger = Vec::new();
    let mut silo_state_ledger = Vec::with_capacity(outcomes.len());
    let mut per_silo = BTreeMap::new();

    for outcome in outcomes {
        if let ConservationResult::Anomaly(anomaly) = outcome.ledger.verify_conservation() {
            return Err(anomaly.into());
        }
        blend.merge(&outcome.blend);
        segment_state_ledger.extend(outcome.ledger.segment_rows());
        silo_state_ledger.push(outcome.ledger.silo_row());
        per_silo.insert(outcome.silo_id, outcome.summary);
    }

    let lot_state_ledger = lot_rows(&segment_state_ledger);
    if let ConservationResult::Anomaly(anomaly) =
        verify_state_ledgers(&segment_state_ledger, &lot_state_ledger, &silo_state_ledger)
    {
        return Err(anomaly.into());
    }

    let total_discharged_mass_kg = silo_state_ledger
        .iter()
        .map(|r| r.balance.discharged_mass_kg)
        .sum();
    let total_remaining_mass_kg = silo_state_ledger
        .iter()
        .map(|r| r.balance.remaining_mass_kg)
        .sum();

    Ok(RunResult {
        total_discharged_mass_kg,
        total_remaining_mass_kg,
        total_blended_params: blend.finish(),
        per_silo,
        segment_state_ledger,
        lot_state_ledger,
        silo_state_ledger,
    })
}

/// The blend of `result` as plain numbers.
///
/// # Errors
///
/// Returns [`BlendError::UndefinedBlend`] when nothing was discharged.
pub fn defined_blend(result: &RunResult) -> Result<BTreeMap<QualityParam, f64>, BlendError> {
    result.defined_blend().ok_or(BlendError::UndefinedBlend)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn no_silos_gives_undefined_blend() {
        let result = aggregate(Vec::new()).unwrap();
        assert!(result.total_discharged_mass_kg.abs() < f64::EPSILON);
        assert!(matches!(defined_blend(&result), Err(BlendError::UndefinedBlend)));
    }
}
