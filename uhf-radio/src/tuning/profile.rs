//! Regulatory profiles, frequency plans and factory tuning defaults.

use super::table::{TuningTable, MAX_FREQUENCY_ENTRIES};
use super::types::CapacitorSetting;
use super::MAX_ANTENNAS;
use crate::frontend::{BoardGeometry, TunerState};

/// Regulatory / frequency-plan selector.
///
/// Legacy profiles each own one persistent tuning table. `NewTuning` is the
/// sentinel that switches the reader to the per-antenna channel-list
/// mechanism instead; it has no table page of its own and is excluded from
/// legacy load/save/clear.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Profile {
    Europe,
    Usa,
    Japan,
    China,
    China2,
    Custom,
    NewTuning,
}

impl Profile {
    pub const COUNT: usize = 7;

    pub const fn index(self) -> u8 {
        self as u8
    }

    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Profile::Europe),
            1 => Some(Profile::Usa),
            2 => Some(Profile::Japan),
            3 => Some(Profile::China),
            4 => Some(Profile::China2),
            5 => Some(Profile::Custom),
            6 => Some(Profile::NewTuning),
            _ => None,
        }
    }

    pub const fn is_legacy(self) -> bool {
        !matches!(self, Profile::NewTuning)
    }
}

/// Sentinel frequency selecting "all entries" in table replacement.
pub const FREQUENCY_ALL: u32 = 0xFFFF_FFFF;

/// `N` channel frequencies from `start` with fixed `step`, in kHz.
const fn freq_plan<const N: usize>(start: u32, step: u32) -> [u32; N] {
    let mut plan = [0u32; N];
    let mut i = 0;
    while i < N {
        plan[i] = start + step * i as u32;
        i += 1;
    }
    plan
}

/// ETSI lower band, 4 channels.
static EUROPE_FREQUENCIES: [u32; 4] = freq_plan(865_700, 600);
/// FCC part 15, 50 channels.
static USA_FREQUENCIES: [u32; 50] = freq_plan(902_750, 500);
/// ARIB STD-T107, 4 channels.
static JAPAN_FREQUENCIES: [u32; 4] = freq_plan(916_800, 1_200);
/// China 920 MHz band, 16 channels.
static CHINA_FREQUENCIES: [u32; 16] = freq_plan(920_625, 250);
/// China 840 MHz band, 16 channels.
static CHINA2_FREQUENCIES: [u32; 16] = freq_plan(840_625, 250);

/// Regulatory frequency plan of a profile, in kHz.
///
/// `Custom` starts from the Europe plan until the host replaces it;
/// `NewTuning` has no plan of its own (channel lists carry theirs).
pub fn frequencies(profile: Profile) -> &'static [u32] {
    match profile {
        Profile::Europe | Profile::Custom => &EUROPE_FREQUENCIES,
        Profile::Usa => &USA_FREQUENCIES,
        Profile::Japan => &JAPAN_FREQUENCIES,
        Profile::China => &CHINA_FREQUENCIES,
        Profile::China2 => &CHINA2_FREQUENCIES,
        Profile::NewTuning => &[],
    }
}

/// Factory default capacitor values for a board build.
pub const fn default_caps(geometry: BoardGeometry) -> CapacitorSetting {
    if geometry.max_cap >= 64 {
        CapacitorSetting::new(48, 60, 48)
    } else {
        CapacitorSetting::new(12, 15, 12)
    }
}

/// Build the factory default tuning table for a profile: the regulatory
/// frequency plan with board default capacitors on every antenna and no
/// tuned samples yet.
pub fn default_table(profile: Profile, geometry: BoardGeometry) -> TuningTable {
    let plan = frequencies(profile);
    let caps = default_caps(geometry);
    let mut table = TuningTable::empty(profile);
    table.table_size = plan.len() as u8;
    for (entry, &frequency) in plan.iter().enumerate() {
        let slot = &mut table.entries[entry];
        slot.frequency = frequency;
        slot.caps = [caps; MAX_ANTENNAS];
    }
    table
}

/// Shuffle the table's frequency ordering in place.
///
/// Unbiased and without replacement: each slot draws repeatedly from the
/// PRNG until an unused source entry comes up. Used to break
/// frequency-hopping predictability between inventory rounds.
pub fn shuffle_frequencies(table: &mut TuningTable, state: &mut TunerState) {
    let n = table.table_size as usize;
    if n <= 1 {
        return;
    }
    let original = table.entries;
    let mut used = [false; MAX_FREQUENCY_ENTRIES];
    for slot in 0..n {
        let pick = loop {
            let candidate = state.rng().next_below(n as u32) as usize;
            if !used[candidate] {
                break candidate;
            }
        };
        used[pick] = true;
        table.entries[slot] = original[pick];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plans_match_their_regulatory_shapes() {
        assert_eq!(frequencies(Profile::Europe).len(), 4);
        assert_eq!(frequencies(Profile::Europe)[3], 867_500);
        assert_eq!(frequencies(Profile::Usa).len(), 50);
        assert_eq!(frequencies(Profile::Usa)[49], 927_250);
        assert_eq!(frequencies(Profile::Japan)[0], 916_800);
        assert_eq!(frequencies(Profile::China)[15], 924_375);
        assert_eq!(frequencies(Profile::China2)[0], 840_625);
        assert!(frequencies(Profile::NewTuning).is_empty());
    }

    #[test]
    fn profile_index_roundtrips() {
        for index in 0..Profile::COUNT as u8 {
            let profile = Profile::from_index(index).unwrap();
            assert_eq!(profile.index(), index);
        }
        assert!(Profile::from_index(7).is_none());
        assert!(!Profile::NewTuning.is_legacy());
        assert!(Profile::Custom.is_legacy());
    }

    #[test]
    fn default_table_carries_plan_and_factory_caps() {
        let geometry = BoardGeometry::quad_antenna();
        let table = default_table(Profile::China, geometry);
        assert_eq!(table.table_size, 16);
        assert_eq!(table.entries[0].frequency, 920_625);
        for antenna in 0..geometry.nb_antennas as usize {
            assert_eq!(table.entries[5].caps[antenna], default_caps(geometry));
        }
    }

    #[test]
    fn wide_tuner_board_gets_scaled_defaults() {
        let caps = default_caps(BoardGeometry::single_antenna_wide());
        assert!(caps.cin > 31 && caps.clen > 31 && caps.cout > 31);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let geometry = BoardGeometry::single_antenna();
        let mut table = default_table(Profile::Usa, geometry);
        let mut state = TunerState::new(geometry, 0xDECAF);
        shuffle_frequencies(&mut table, &mut state);

        let mut seen: Vec<u32> = table.entries[..50].iter().map(|e| e.frequency).collect();
        seen.sort_unstable();
        let mut expected: Vec<u32> = frequencies(Profile::Usa).to_vec();
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }

    #[test]
    fn shuffle_changes_the_order() {
        let geometry = BoardGeometry::single_antenna();
        let mut table = default_table(Profile::Usa, geometry);
        let mut state = TunerState::new(geometry, 0xDECAF);
        shuffle_frequencies(&mut table, &mut state);
        let ordered: Vec<u32> = table.entries[..50].iter().map(|e| e.frequency).collect();
        assert_ne!(ordered, frequencies(Profile::Usa).to_vec());
    }
}
