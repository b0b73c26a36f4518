//! Core tuner data types.

/// One axis of the Pi-network antenna tuner.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CapAxis {
    Cin,
    Clen,
    Cout,
}

impl CapAxis {
    /// Fixed axis order used by the coordinate descent.
    pub const ALL: [CapAxis; 3] = [CapAxis::Cin, CapAxis::Clen, CapAxis::Cout];
}

/// Tuner network capacitor values, in DTC register steps (not farads).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CapacitorSetting {
    pub cin: u8,
    pub clen: u8,
    pub cout: u8,
}

impl CapacitorSetting {
    pub const fn new(cin: u8, clen: u8, cout: u8) -> Self {
        Self { cin, clen, cout }
    }

    pub const fn get(&self, axis: CapAxis) -> u8 {
        match axis {
            CapAxis::Cin => self.cin,
            CapAxis::Clen => self.clen,
            CapAxis::Cout => self.cout,
        }
    }

    pub fn set(&mut self, axis: CapAxis, value: u8) {
        match axis {
            CapAxis::Cin => self.cin = value,
            CapAxis::Clen => self.clen = value,
            CapAxis::Cout => self.cout = value,
        }
    }
}

/// Raw sample from the reflected-power I/Q level detector.
///
/// A monotonic mismatch proxy, not a power in dBm.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReflectedPower {
    pub i: i16,
    pub q: i16,
}

impl ReflectedPower {
    pub const fn new(i: i16, q: i16) -> Self {
        Self { i, q }
    }

    /// Scalar search objective `i² + q²`; lower means a better match.
    ///
    /// The level detector delivers 8-bit I/Q, so the sum fits `u16`; wider
    /// samples saturate instead of wrapping.
    pub fn objective(&self) -> u16 {
        let i_sq = (self.i as i32 * self.i as i32) as u32;
        let q_sq = (self.q as i32 * self.q as i32) as u32;
        let sum = i_sq + q_sq;
        if sum > u16::MAX as u32 {
            u16::MAX
        } else {
            sum as u16
        }
    }
}

/// Tuning algorithm selected by the host `Tune` command.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TuneAlgorithm {
    /// No search: apply the given setting and measure once.
    None,
    /// Single coordinate descent from the given setting.
    Slow,
    /// Exhaustive multi-start coordinate descent.
    MultiStart,
    /// Sample the search space first, then refine the best summits.
    EnhancedMultiStart,
}

/// Result of a tune operation: the setting left applied to the hardware and
/// the reflected-power sample measured at it.
///
/// `objective` is the best scalar value seen by the search; `sample` is a
/// fresh I/Q measurement taken after the final setting was applied.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TuneResult {
    pub caps: CapacitorSetting,
    pub sample: ReflectedPower,
    pub objective: u16,
}
