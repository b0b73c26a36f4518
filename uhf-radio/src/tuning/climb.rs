//! Single-axis hill climb towards a reflected-power minimum.

use super::consts::CLIMB_PATIENCE;
use super::types::{CapAxis, CapacitorSetting};
use crate::frontend::{RfFrontend, TunerState};

/// Outcome of one axis climb.
pub(crate) struct ClimbOutcome {
    /// Best objective observed on this axis.
    pub objective: u16,
    /// Whether the axis improved on the call's starting objective.
    pub improved: bool,
    /// Direction of the accepted move, if any (`+1` / `-1`).
    pub direction: Option<i8>,
}

/// Step `value` by `delta`, clamped to the axis range.
pub(crate) fn clamp_step(value: u8, delta: i16, max_cap: u8) -> u8 {
    let v = value as i16 + delta;
    v.clamp(0, max_cap as i16) as u8
}

/// Apply `value` to the axis and measure, spending one budget unit.
///
/// Returns `None` without touching the hardware once the budget is gone.
fn probe<F: RfFrontend>(
    fe: &mut F,
    state: &mut TunerState,
    axis: CapAxis,
    value: u8,
    budget: &mut u16,
) -> Option<u16> {
    if *budget == 0 {
        return None;
    }
    *budget -= 1;
    state.apply(fe, axis, value);
    Some(fe.measure_objective())
}

/// Walk one capacitor axis towards a reflected-power minimum.
///
/// Probes ±1 around the current value to pick a direction, lets a ±2 probe
/// override both the direction and the size of the first move, then keeps
/// stepping in the chosen direction with a lookahead patience of
/// [`CLIMB_PATIENCE`] non-improving steps. The axis is left at the best
/// value observed, which is not necessarily the last one probed. Every
/// measurement costs one unit of `budget`.
pub(crate) fn climb_axis<F: RfFrontend>(
    fe: &mut F,
    state: &mut TunerState,
    caps: &mut CapacitorSetting,
    axis: CapAxis,
    start_objective: u16,
    budget: &mut u16,
) -> ClimbOutcome {
    let max_cap = state.max_cap();
    let origin = caps.get(axis);
    let mut best_value = origin;
    let mut best_objective = start_objective;
    let mut direction: Option<i8> = None;

    // ±1 probes pick the initial direction.
    for dir in [-1i8, 1] {
        let value = clamp_step(origin, dir as i16, max_cap);
        if value == origin {
            continue;
        }
        let Some(objective) = probe(fe, state, axis, value, budget) else {
            break;
        };
        if objective < best_objective {
            best_objective = objective;
            best_value = value;
            direction = Some(dir);
        }
    }

    // ±2 probes may override the direction and take both steps in one move.
    for dir in [-1i8, 1] {
        let value = clamp_step(origin, dir as i16 * 2, max_cap);
        if value == origin {
            continue;
        }
        let Some(objective) = probe(fe, state, axis, value, budget) else {
            break;
        };
        if objective < best_objective {
            best_objective = objective;
            best_value = value;
            direction = Some(dir);
        }
    }

    // Walk on in the chosen direction. The patience counter lets the walk
    // cross a shallow plateau without permanently accepting worse values.
    if let Some(dir) = direction {
        state.apply(fe, axis, best_value);
        let mut patience = CLIMB_PATIENCE;
        let mut value = best_value;
        loop {
            let next = clamp_step(value, dir as i16, max_cap);
            if next == value {
                break; // boundary
            }
            let Some(objective) = probe(fe, state, axis, next, budget) else {
                break;
            };
            value = next;
            if objective < best_objective {
                best_objective = objective;
                best_value = value;
                patience = CLIMB_PATIENCE;
            } else {
                patience -= 1;
                if patience == 0 {
                    break;
                }
            }
        }
    }

    // Land on the best value observed.
    state.apply(fe, axis, best_value);
    caps.set(axis, best_value);

    ClimbOutcome {
        objective: best_objective,
        improved: best_objective < start_objective,
        direction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{BoardGeometry, TunerState};
    use crate::tuning::testutil::MockRf;

    fn climb_from(start: u8, landscape: fn(u8, u8, u8) -> u16) -> (u8, ClimbOutcome, u16) {
        let mut fe = MockRf::new(landscape);
        let mut state = TunerState::new(BoardGeometry::single_antenna(), 1);
        let mut caps = CapacitorSetting::new(start, 0, 0);
        state.apply_setting(&mut fe, &caps);
        let start_objective = fe.measure_objective();
        let mut budget = 64;
        let outcome = climb_axis(
            &mut fe,
            &mut state,
            &mut caps,
            CapAxis::Cin,
            start_objective,
            &mut budget,
        );
        (caps.cin, outcome, budget)
    }

    fn bowl_at_12(cin: u8, _clen: u8, _cout: u8) -> u16 {
        let d = cin as i32 - 12;
        (d * d) as u16
    }

    #[test]
    fn walks_to_the_minimum() {
        let (value, outcome, _) = climb_from(4, bowl_at_12);
        assert_eq!(value, 12);
        assert_eq!(outcome.objective, 0);
        assert!(outcome.improved);
        assert_eq!(outcome.direction, Some(1));
    }

    #[test]
    fn stays_put_at_the_minimum() {
        let (value, outcome, _) = climb_from(12, bowl_at_12);
        assert_eq!(value, 12);
        assert!(!outcome.improved);
        assert!(outcome.direction.is_none());
    }

    #[test]
    fn result_stays_in_range() {
        fn downhill(cin: u8, _clen: u8, _cout: u8) -> u16 {
            1000 - cin as u16 * 10
        }
        let (value, outcome, _) = climb_from(29, downhill);
        assert!(value <= 31);
        assert_eq!(value, 31);
        assert!(outcome.improved);
    }

    #[test]
    fn patience_crosses_a_shallow_plateau() {
        // Flat stretch between two basins; the deeper one lies past the
        // plateau and must still be reached.
        fn plateau(cin: u8, _clen: u8, _cout: u8) -> u16 {
            match cin {
                0..=4 => 100 - cin as u16 * 10, // slope into the plateau
                5..=6 => 60,                    // plateau
                _ => 10,                        // deeper basin
            }
        }
        let (value, outcome, _) = climb_from(2, plateau);
        assert!(value >= 7, "walk stopped on the plateau at {}", value);
        assert_eq!(outcome.objective, 10);
    }

    #[test]
    fn two_step_probe_overrides_direction() {
        // +1 looks best at first, but -2 reaches a far better basin.
        fn deceptive(cin: u8, _clen: u8, _cout: u8) -> u16 {
            match cin {
                8 => 50,
                9 => 45,  // +1: small gain
                6 => 5,   // -2: much better
                5 => 2,
                4 => 1,
                7 => 60,  // -1: worse
                _ => 80,
            }
        }
        let (value, outcome, _) = climb_from(8, deceptive);
        assert_eq!(value, 4);
        assert_eq!(outcome.direction, Some(-1));
        assert_eq!(outcome.objective, 1);
    }

    #[test]
    fn budget_zero_measures_nothing() {
        let mut fe = MockRf::new(bowl_at_12);
        let mut state = TunerState::new(BoardGeometry::single_antenna(), 1);
        let mut caps = CapacitorSetting::new(4, 0, 0);
        let mut budget = 0;
        let outcome = climb_axis(
            &mut fe,
            &mut state,
            &mut caps,
            CapAxis::Cin,
            64,
            &mut budget,
        );
        assert_eq!(fe.measurements, 0);
        assert!(!outcome.improved);
        assert_eq!(caps.cin, 4);
    }
}
