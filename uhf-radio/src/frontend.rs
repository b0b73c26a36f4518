//! Hardware capability seam for the antenna tuner.
//!
//! The search algorithms never touch registers directly; they drive an
//! [`RfFrontend`] implementation. Firmware implements the trait on the reader
//! chip driver, tests implement it over synthetic measurement landscapes.

use crate::tuning::{CapAxis, CapacitorSetting, ReflectedPower};

/// RF front-end operations the tuner consumes.
///
/// The caller powers the antenna before starting a search and serializes
/// tuner access against inventory operations — both drive the same
/// transmit/antenna hardware. Implementations do not retry: a saturated
/// level detector shows up as an implausibly low sample and is handled by
/// the false-positive check, not here.
pub trait RfFrontend {
    /// Apply one tuner capacitor register. Raw write, no readback.
    fn set_capacitor(&mut self, axis: CapAxis, value: u8);

    /// Sample the reflected-power level detector at the current settings.
    fn measure_reflected(&mut self) -> ReflectedPower;

    /// Current PA output level register value (0 = lowest output power).
    fn tx_output_level(&self) -> u8;

    /// Program the PA output level; must not return before the PA settled.
    fn set_tx_output_level(&mut self, level: u8);

    /// Antenna port power enable.
    fn set_antenna_power(&mut self, on: bool);

    /// Scalar objective for the search loops, `i² + q²`.
    fn measure_objective(&mut self) -> u16 {
        self.measure_reflected().objective()
    }
}

/// Per-board tuner geometry, selected at startup.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BoardGeometry {
    /// Populated antenna ports, `1..=MAX_ANTENNAS`.
    pub nb_antennas: u8,
    /// Upper bound of every capacitor axis.
    pub max_cap: u8,
}

impl BoardGeometry {
    /// Single-antenna reference design, 5-bit tuner DTCs.
    pub const fn single_antenna() -> Self {
        Self {
            nb_antennas: 1,
            max_cap: 31,
        }
    }

    /// Four-port reader, 5-bit tuner DTCs.
    pub const fn quad_antenna() -> Self {
        Self {
            nb_antennas: 4,
            max_cap: 31,
        }
    }

    /// Single antenna with the extended 7-bit tuner network option.
    pub const fn single_antenna_wide() -> Self {
        Self {
            nb_antennas: 1,
            max_cap: 127,
        }
    }
}

impl Default for BoardGeometry {
    fn default() -> Self {
        Self::single_antenna()
    }
}

/// xorshift64 PRNG for frequency-order shuffling.
///
/// Deterministic and dependency-free; the caller seeds it at session init
/// (e.g. from a hardware entropy register or a boot counter).
pub(crate) struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    pub(crate) const fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed },
        }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform draw in `[0, bound)`.
    pub(crate) fn next_below(&mut self, bound: u32) -> u32 {
        (self.next_u64() % bound as u64) as u32
    }
}

/// Mutable tuner session state, owned by the caller.
///
/// Carries the cross-call state the tuner needs: the last value written to
/// each capacitor register (so re-applying an identical setting issues no
/// hardware write) and the shuffle PRNG. Passed by `&mut` into every tuner
/// operation; no statics, so simulations can run several boards side by
/// side.
pub struct TunerState {
    geometry: BoardGeometry,
    applied: [Option<u8>; 3],
    rng: XorShift64,
}

impl TunerState {
    pub const fn new(geometry: BoardGeometry, seed: u64) -> Self {
        Self {
            geometry,
            applied: [None; 3],
            rng: XorShift64::new(seed),
        }
    }

    pub const fn geometry(&self) -> BoardGeometry {
        self.geometry
    }

    pub const fn max_cap(&self) -> u8 {
        self.geometry.max_cap
    }

    /// Write one capacitor register, suppressing redundant writes.
    pub fn apply<F: RfFrontend>(&mut self, fe: &mut F, axis: CapAxis, value: u8) {
        let slot = &mut self.applied[axis as usize];
        if *slot == Some(value) {
            return;
        }
        fe.set_capacitor(axis, value);
        *slot = Some(value);
    }

    /// Apply a full setting; each axis is write-suppressed independently.
    pub fn apply_setting<F: RfFrontend>(&mut self, fe: &mut F, caps: &CapacitorSetting) {
        for axis in CapAxis::ALL {
            self.apply(fe, axis, caps.get(axis));
        }
    }

    /// Forget remembered register values, e.g. after a chip reset performed
    /// outside the tuner.
    pub fn invalidate_applied(&mut self) {
        self.applied = [None; 3];
    }

    pub(crate) fn rng(&mut self) -> &mut XorShift64 {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::testutil::MockRf;

    #[test]
    fn redundant_setting_issues_no_second_write() {
        let mut fe = MockRf::flat(5);
        let mut state = TunerState::new(BoardGeometry::single_antenna(), 1);
        let caps = CapacitorSetting::new(3, 7, 11);

        state.apply_setting(&mut fe, &caps);
        assert_eq!(fe.cap_writes.len(), 3);

        state.apply_setting(&mut fe, &caps);
        assert_eq!(fe.cap_writes.len(), 3);

        state.apply(&mut fe, CapAxis::Clen, 8);
        assert_eq!(fe.cap_writes.len(), 4);
    }

    #[test]
    fn invalidate_forces_rewrite() {
        let mut fe = MockRf::flat(5);
        let mut state = TunerState::new(BoardGeometry::single_antenna(), 1);
        let caps = CapacitorSetting::new(1, 2, 3);

        state.apply_setting(&mut fe, &caps);
        state.invalidate_applied();
        state.apply_setting(&mut fe, &caps);
        assert_eq!(fe.cap_writes.len(), 6);
    }

    #[test]
    fn xorshift_draws_stay_below_bound() {
        let mut rng = XorShift64::new(0xC0FFEE);
        for _ in 0..1000 {
            assert!(rng.next_below(53) < 53);
        }
    }
}
