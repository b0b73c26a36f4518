//! Automatic antenna tuning.
//!
//! The antenna matching network has three variable capacitors (cin, clen,
//! cout) whose optimum depends on frequency, antenna port, board build and
//! environment. This module implements the search for settings that minimize
//! reflected power:
//! - single-axis hill climb and coordinate descent over the three axes
//! - false-positive detection with TX output backoff for detector saturation
//! - exhaustive and sample-then-refine multi-start searches
//! - regulatory frequency profiles with factory default tables
//! - persistent tuning-table / channel-list stores on NOR flash
//!
//! A search runs to completion on the caller's thread and leaves capacitor
//! and TX-power hardware state behind; callers serialize tuning against
//! inventory and any other operation driving the antenna.

pub mod channel_list;
mod climb;
pub mod consts;
mod false_positive;
pub mod flash;
mod multi_start;
pub mod profile;
pub mod table;
mod types;

pub use multi_start::{enhanced_multi_start_tune, multi_start_tune};
pub use types::{CapAxis, CapacitorSetting, ReflectedPower, TuneAlgorithm, TuneResult};

use crate::frontend::{RfFrontend, TunerState};
use channel_list::ChannelList;
use embedded_storage::nor_flash::{NorFlash, ReadNorFlash};
use flash::TuningStore;
use table::TuningTable;

/// Antenna port capacity of the tables and the flash layout. Boards populate
/// `BoardGeometry::nb_antennas <= MAX_ANTENNAS` of them.
pub const MAX_ANTENNAS: usize = 4;

/// Host `Tune` command configuration: one algorithm selector plus the
/// false-positive-detection enable bit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TuneConfig {
    pub algorithm: TuneAlgorithm,
    pub false_positive_detection: bool,
}

/// Host `TuneChannel` command flags.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TuneChannelConfig {
    pub algorithm: TuneAlgorithm,
    pub false_positive_detection: bool,
    /// Persist the updated channel list after tuning.
    pub save: bool,
}

/// Run one tune operation at the currently programmed frequency.
///
/// Powers the antenna for the duration of the search, runs the selected
/// algorithm from `start`, leaves the best setting applied and returns it
/// together with a fresh reflected-power sample.
pub fn tune<F: RfFrontend>(
    fe: &mut F,
    state: &mut TunerState,
    cfg: &TuneConfig,
    start: CapacitorSetting,
) -> TuneResult {
    fe.set_antenna_power(true);
    state.apply_setting(fe, &start);

    let mut caps = start;
    let objective = match cfg.algorithm {
        TuneAlgorithm::None => fe.measure_objective(),
        TuneAlgorithm::Slow => {
            let mut budget = consts::SLOW_STEP_BUDGET;
            coordinate_descent(fe, state, &mut caps, cfg.false_positive_detection, &mut budget)
        }
        TuneAlgorithm::MultiStart => {
            multi_start_tune(fe, state, &mut caps, cfg.false_positive_detection)
        }
        TuneAlgorithm::EnhancedMultiStart => {
            enhanced_multi_start_tune(fe, state, &mut caps, cfg.false_positive_detection)
        }
    };

    state.apply_setting(fe, &caps);
    let sample = fe.measure_reflected();
    fe.set_antenna_power(false);

    debug!(
        "tune: cin={} clen={} cout={} objective={}",
        caps.cin, caps.clen, caps.cout, objective
    );
    TuneResult {
        caps,
        sample,
        objective,
    }
}

/// Tune one entry of a channel list and store the result in it.
///
/// The synthesizer is assumed locked to `list.items[index].frequency` by the
/// caller (PLL control sits outside the tuner). An unpopulated antenna port
/// or an out-of-range index is ignored and returns `None`.
pub fn tune_channel<F, FL>(
    fe: &mut F,
    state: &mut TunerState,
    store: &mut TuningStore<FL>,
    list: &mut ChannelList,
    index: u8,
    cfg: &TuneChannelConfig,
) -> Option<TuneResult>
where
    F: RfFrontend,
    FL: ReadNorFlash + NorFlash,
{
    if list.antenna >= state.geometry().nb_antennas {
        warn!("tune_channel: antenna {} not populated", list.antenna);
        return None;
    }
    if index >= list.n_frequencies {
        warn!("tune_channel: index {} beyond list size {}", index, list.n_frequencies);
        return None;
    }

    let start = list.items[index as usize].caps;
    let tune_cfg = TuneConfig {
        algorithm: cfg.algorithm,
        false_positive_detection: cfg.false_positive_detection,
    };
    let result = tune(fe, state, &tune_cfg, start);

    let item = &mut list.items[index as usize];
    item.caps = result.caps;
    item.tuned_iq = result.sample;

    if cfg.save {
        if store.save_channel_list(list).is_err() {
            warn!("tune_channel: channel list save failed, result kept in memory");
        }
    }
    Some(result)
}

/// Tune one frequency entry of a legacy tuning table for one antenna.
///
/// Same contract as [`tune_channel`]: the caller has already programmed the
/// synthesizer and selected the antenna port; invalid indices are ignored.
pub fn tune_table_entry<F: RfFrontend>(
    fe: &mut F,
    state: &mut TunerState,
    table: &mut TuningTable,
    entry: u8,
    antenna: u8,
    cfg: &TuneConfig,
) -> Option<TuneResult> {
    if antenna >= state.geometry().nb_antennas {
        warn!("tune_table_entry: antenna {} not populated", antenna);
        return None;
    }
    if entry >= table.table_size {
        return None;
    }

    let start = table.entries[entry as usize].caps[antenna as usize];
    let result = tune(fe, state, cfg, start);

    let slot = &mut table.entries[entry as usize];
    slot.caps[antenna as usize] = result.caps;
    slot.tuned_iq[antenna as usize] = result.sample;
    Some(result)
}

/// Coordinate descent over the three tuner axes.
///
/// Climbs cin, clen, cout in that fixed order; with detection enabled, a
/// flagged axis triggers the TX backoff and is climbed again until the
/// reading holds up. Passes repeat until none of the axes improves or the
/// remaining budget reaches exactly 1 (the reserved hard stop).
pub(crate) fn coordinate_descent<F: RfFrontend>(
    fe: &mut F,
    state: &mut TunerState,
    caps: &mut CapacitorSetting,
    false_positive_detection: bool,
    budget: &mut u16,
) -> u16 {
    state.apply_setting(fe, caps);
    let mut objective = fe.measure_objective();

    loop {
        let mut pass_improved = false;
        for axis in CapAxis::ALL {
            loop {
                let outcome = climb::climb_axis(fe, state, caps, axis, objective, budget);
                if outcome.improved {
                    pass_improved = true;
                }
                objective = outcome.objective;

                if !false_positive_detection || *budget <= 1 {
                    break;
                }
                // The check perturbs against the last climb direction;
                // a climb that made no move counter-probes downward.
                let direction = outcome.direction.unwrap_or(1);
                if !false_positive::false_positive_check(
                    fe, state, caps, axis, direction, objective,
                ) {
                    break;
                }
                false_positive::tx_backoff(fe, objective);
                objective = fe.measure_objective();
            }
            if *budget <= 1 {
                break;
            }
        }
        if !pass_improved || *budget <= 1 {
            return objective;
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    //! Mock RF front end and mock NOR flash for the search and store tests.

    use super::flash::{FLASH_PAGE_BYTES, PARTITION_BYTES};
    use super::types::{CapAxis, ReflectedPower};
    use crate::frontend::RfFrontend;
    use embedded_storage::nor_flash::{
        ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
    };

    pub(crate) struct MockRf {
        landscape: Box<dyn Fn([u8; 3], u8) -> u16>,
        /// Capacitor register values as the hardware sees them.
        pub hw: [u8; 3],
        pub tx_level: u8,
        pub antenna_on: bool,
        pub cap_writes: Vec<(CapAxis, u8)>,
        pub tx_writes: Vec<u8>,
        pub measurements: u32,
    }

    impl MockRf {
        pub fn with(landscape: impl Fn([u8; 3], u8) -> u16 + 'static) -> Self {
            Self {
                landscape: Box::new(landscape),
                hw: [0; 3],
                tx_level: 0,
                antenna_on: false,
                cap_writes: Vec::new(),
                tx_writes: Vec::new(),
                measurements: 0,
            }
        }

        /// Landscape over the three capacitor values.
        pub fn new(f: fn(u8, u8, u8) -> u16) -> Self {
            Self::with(move |hw, _| f(hw[0], hw[1], hw[2]))
        }

        /// Same reading regardless of settings.
        pub fn flat(objective: u16) -> Self {
            Self::with(move |_, _| objective)
        }

        /// Reading depends only on the PA output level.
        pub fn tx_dependent(f: impl Fn(u8) -> u16 + 'static) -> Self {
            Self::with(move |_, tx| f(tx))
        }

        fn eval(&self) -> u16 {
            (self.landscape)(self.hw, self.tx_level)
        }
    }

    impl RfFrontend for MockRf {
        fn set_capacitor(&mut self, axis: CapAxis, value: u8) {
            self.hw[axis as usize] = value;
            self.cap_writes.push((axis, value));
        }

        fn measure_reflected(&mut self) -> ReflectedPower {
            self.measurements += 1;
            // The search loops use the overridden scalar path below; this
            // I/Q decomposition only feeds the final sample of `tune`.
            let objective = self.eval() as i32;
            let mut i = 0i32;
            while (i + 1) * (i + 1) <= objective {
                i += 1;
            }
            ReflectedPower::new(i as i16, 0)
        }

        fn measure_objective(&mut self) -> u16 {
            self.measurements += 1;
            self.eval()
        }

        fn tx_output_level(&self) -> u8 {
            self.tx_level
        }

        fn set_tx_output_level(&mut self, level: u8) {
            self.tx_level = level;
            self.tx_writes.push(level);
        }

        fn set_antenna_power(&mut self, on: bool) {
            self.antenna_on = on;
        }
    }

    #[derive(Debug)]
    pub(crate) enum MockFlashError {
        NotAligned,
        OutOfBounds,
        /// Attempted 0 → 1 transition without an erase.
        BitSetWithoutErase,
    }

    impl NorFlashError for MockFlashError {
        fn kind(&self) -> NorFlashErrorKind {
            match self {
                MockFlashError::NotAligned => NorFlashErrorKind::NotAligned,
                MockFlashError::OutOfBounds => NorFlashErrorKind::OutOfBounds,
                MockFlashError::BitSetWithoutErase => NorFlashErrorKind::Other,
            }
        }
    }

    /// Array-backed NOR flash that enforces the real part's constraints:
    /// aligned accesses and monotonic 1 → 0 programming.
    pub(crate) struct MockFlash {
        pub mem: Vec<u8>,
        pub erases: u32,
        pub writes: u32,
    }

    impl MockFlash {
        pub fn erased() -> Self {
            Self {
                mem: vec![0xFF; PARTITION_BYTES],
                erases: 0,
                writes: 0,
            }
        }
    }

    impl ErrorType for MockFlash {
        type Error = MockFlashError;
    }

    impl ReadNorFlash for MockFlash {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            let end = start + bytes.len();
            if end > self.mem.len() {
                return Err(MockFlashError::OutOfBounds);
            }
            bytes.copy_from_slice(&self.mem[start..end]);
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.mem.len()
        }
    }

    impl NorFlash for MockFlash {
        const WRITE_SIZE: usize = 8;
        const ERASE_SIZE: usize = FLASH_PAGE_BYTES;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            if from as usize % Self::ERASE_SIZE != 0 || to as usize % Self::ERASE_SIZE != 0 {
                return Err(MockFlashError::NotAligned);
            }
            if to as usize > self.mem.len() || to < from {
                return Err(MockFlashError::OutOfBounds);
            }
            self.mem[from as usize..to as usize].fill(0xFF);
            self.erases += 1;
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            if offset as usize % Self::WRITE_SIZE != 0 || bytes.len() % Self::WRITE_SIZE != 0 {
                return Err(MockFlashError::NotAligned);
            }
            let start = offset as usize;
            if start + bytes.len() > self.mem.len() {
                return Err(MockFlashError::OutOfBounds);
            }
            for (cell, &value) in self.mem[start..].iter_mut().zip(bytes) {
                if value & !*cell != 0 {
                    return Err(MockFlashError::BitSetWithoutErase);
                }
                *cell &= value;
            }
            self.writes += 1;
            Ok(())
        }
    }
}
