//! Multi-start searches over the tuner state space.
//!
//! Coordinate descent is greedy and can settle in a local reflected-power
//! minimum. Both variants here restart it from spread-out points: the
//! exhaustive variant descends from every grid combination, the
//! sample-then-refine variant probes a finer grid once per point and only
//! descends from the best few summits.

use super::consts::{
    ENHANCED_GRID_POINTS, ENHANCED_SUMMITS, MULTI_START_POINTS, MULTI_START_STEP_BUDGET,
};
use super::coordinate_descent;
use super::types::CapacitorSetting;
use crate::frontend::{RfFrontend, TunerState};

/// Evenly spaced starting values: the centers of `N` equal segments of
/// `[0, max_cap]`.
fn start_points<const N: usize>(max_cap: u8) -> [u8; N] {
    let mut points = [0u8; N];
    let span = max_cap as u32 + 1;
    let mut i = 0;
    while i < N {
        points[i] = ((2 * i as u32 + 1) * span / (2 * N as u32)) as u8;
        i += 1;
    }
    points
}

/// Exhaustive multi-start: full coordinate descent from every combination
/// of [`MULTI_START_POINTS`] per-axis starting values, plus the caller's
/// own starting point measured last as a baseline.
///
/// `caps` is updated to the globally best setting found; its objective is
/// returned.
pub fn multi_start_tune<F: RfFrontend>(
    fe: &mut F,
    state: &mut TunerState,
    caps: &mut CapacitorSetting,
    false_positive_detection: bool,
) -> u16 {
    let points: [u8; MULTI_START_POINTS] = start_points(state.max_cap());
    let baseline = *caps;
    let mut best_caps = baseline;
    let mut best_objective = u16::MAX;

    for &cin in &points {
        for &clen in &points {
            for &cout in &points {
                let mut candidate = CapacitorSetting::new(cin, clen, cout);
                let mut budget = MULTI_START_STEP_BUDGET;
                let objective = coordinate_descent(
                    fe,
                    state,
                    &mut candidate,
                    false_positive_detection,
                    &mut budget,
                );
                if objective < best_objective {
                    best_objective = objective;
                    best_caps = candidate;
                    trace!(
                        "multi-start: new best {} at cin={} clen={} cout={}",
                        objective,
                        candidate.cin,
                        candidate.clen,
                        candidate.cout
                    );
                }
            }
        }
    }

    // The caller's point always gets the last word as a baseline.
    state.apply_setting(fe, &baseline);
    let baseline_objective = fe.measure_objective();
    if baseline_objective < best_objective {
        best_objective = baseline_objective;
        best_caps = baseline;
    }

    *caps = best_caps;
    state.apply_setting(fe, caps);
    best_objective
}

#[derive(Clone, Copy)]
struct Summit {
    caps: CapacitorSetting,
    objective: u16,
}

/// Insert into the fixed-size best list, keeping it sorted ascending.
///
/// Strict comparison keeps the earlier find on ties, matching the scan
/// order contract.
fn insert_summit<const N: usize>(summits: &mut [Option<Summit>; N], candidate: Summit) {
    let mut pos = N;
    for (idx, slot) in summits.iter().enumerate() {
        match slot {
            Some(summit) if candidate.objective < summit.objective => {
                pos = idx;
                break;
            }
            None => {
                pos = idx;
                break;
            }
            _ => {}
        }
    }
    if pos == N {
        return;
    }
    let mut j = N - 1;
    while j > pos {
        summits[j] = summits[j - 1];
        j -= 1;
    }
    summits[pos] = Some(candidate);
}

/// Sample-then-refine multi-start: measure once at every combination of a
/// [`ENHANCED_GRID_POINTS`]-per-axis grid, keep the [`ENHANCED_SUMMITS`]
/// best summits, then run full coordinate descent from each summit only.
///
/// Far fewer climbs than the exhaustive variant, at the cost of a
/// single-sample approximation of the search landscape.
pub fn enhanced_multi_start_tune<F: RfFrontend>(
    fe: &mut F,
    state: &mut TunerState,
    caps: &mut CapacitorSetting,
    false_positive_detection: bool,
) -> u16 {
    let points: [u8; ENHANCED_GRID_POINTS] = start_points(state.max_cap());
    let mut summits: [Option<Summit>; ENHANCED_SUMMITS] = [None; ENHANCED_SUMMITS];

    for &cin in &points {
        for &clen in &points {
            for &cout in &points {
                let candidate = CapacitorSetting::new(cin, clen, cout);
                state.apply_setting(fe, &candidate);
                let objective = fe.measure_objective();
                insert_summit(&mut summits, Summit { caps: candidate, objective });
            }
        }
    }

    let mut best_caps = *caps;
    let mut best_objective = u16::MAX;
    for summit in summits.iter().flatten() {
        let mut candidate = summit.caps;
        let mut budget = MULTI_START_STEP_BUDGET;
        let objective = coordinate_descent(
            fe,
            state,
            &mut candidate,
            false_positive_detection,
            &mut budget,
        );
        if objective < best_objective {
            best_objective = objective;
            best_caps = candidate;
        }
    }

    *caps = best_caps;
    state.apply_setting(fe, caps);
    best_objective
}
