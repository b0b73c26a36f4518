//! False-positive measurement check and TX output backoff.
//!
//! An implausibly low reflected-power reading can mean the level detector is
//! saturated rather than the antenna matched. The check perturbs the axis
//! that just moved and watches whether the reading reacts; a stuck reading
//! escalates into stepping the PA output down until the measurement becomes
//! trustworthy again.

use super::climb::clamp_step;
use super::consts::{
    BACKOFF_DECREMENTS_PER_LEVEL, BACKOFF_MARGIN, BACKOFF_MAX_LEVELS, MIN_OBJECTIVE_DIFF,
    SUSPICIOUS_OBJECTIVE,
};
use super::types::{CapAxis, CapacitorSetting};
use crate::frontend::{RfFrontend, TunerState};

/// Decide whether a suspiciously low objective is likely a false positive.
///
/// Perturbs the axis 1, 2 and 3 steps against the improving direction and
/// re-measures; a saturated detector barely reacts, so any counter-probe
/// whose reading differs from `objective` by less than
/// [`MIN_OBJECTIVE_DIFF`] flags the candidate. The axis is restored before
/// returning.
pub(crate) fn false_positive_check<F: RfFrontend>(
    fe: &mut F,
    state: &mut TunerState,
    caps: &CapacitorSetting,
    axis: CapAxis,
    direction: i8,
    objective: u16,
) -> bool {
    if objective >= SUSPICIOUS_OBJECTIVE {
        return false;
    }

    let max_cap = state.max_cap();
    let origin = caps.get(axis);
    let mut stuck = false;

    for offset in 1..=3i16 {
        let value = clamp_step(origin, -(direction as i16) * offset, max_cap);
        if value == origin {
            continue;
        }
        state.apply(fe, axis, value);
        let probed = fe.measure_objective();
        if probed.abs_diff(objective) < MIN_OBJECTIVE_DIFF {
            stuck = true;
        }
    }

    state.apply(fe, axis, origin);

    if stuck {
        debug!(
            "tuner: objective {} did not react to counter-probes, likely detector saturation",
            objective
        );
    }
    stuck
}

/// Step the PA output down until the suspicious reading either reacts
/// (artifact confirmed, reduced output kept) or the escalation budget runs
/// out (original output restored).
///
/// Each escalation level removes [`BACKOFF_DECREMENTS_PER_LEVEL`] output
/// steps, saturating at the lowest level, then re-measures. A reading above
/// the pre-backoff objective by more than [`BACKOFF_MARGIN`] confirms the
/// original reading as an artifact.
///
/// Returns `true` when the artifact was confirmed; the PA is then left at
/// the reduced level so subsequent measurements stay out of saturation.
pub(crate) fn tx_backoff<F: RfFrontend>(fe: &mut F, original_objective: u16) -> bool {
    let original_level = fe.tx_output_level();
    let mut level = original_level;

    for _ in 0..BACKOFF_MAX_LEVELS {
        for _ in 0..BACKOFF_DECREMENTS_PER_LEVEL {
            level = level.saturating_sub(1);
            fe.set_tx_output_level(level);
        }
        let objective = fe.measure_objective();
        if objective > original_objective.saturating_add(BACKOFF_MARGIN) {
            debug!(
                "tuner: PA output reduced {} -> {}, reading {} confirms artifact",
                original_level, level, objective
            );
            return true;
        }
    }

    fe.set_tx_output_level(original_level);
    false
}
