//! Per-antenna channel list, the newer persistence mechanism.
//!
//! Under the `NewTuning` profile each antenna owns one channel list holding
//! frequency, capacitor setting and tuned sample per entry, persisted into
//! its own fixed-size block of the shared channel-list flash page.

use super::flash::CHANNEL_BLOCK_BYTES;
use super::profile::{default_caps, frequencies, Profile};
use super::types::{CapacitorSetting, ReflectedPower};
use crate::frontend::BoardGeometry;

/// Entry capacity of one channel list.
pub const MAX_CHANNEL_ITEMS: usize = 53;

/// Serialized sizes: an 8-byte header, then 12 bytes per active item.
pub const CHANNEL_HEADER_BYTES: usize = 8;
pub const CHANNEL_ITEM_BYTES: usize = 12;

/// Worst-case serialized channel list, rounded up to the 64-bit flash
/// program granularity.
pub const CHANNEL_IMAGE_BYTES: usize =
    (CHANNEL_HEADER_BYTES + MAX_CHANNEL_ITEMS * CHANNEL_ITEM_BYTES + 7) & !7;

// A full channel list must fit its per-antenna flash block.
const _: () = assert!(CHANNEL_IMAGE_BYTES <= CHANNEL_BLOCK_BYTES);

pub(crate) const CHANNEL_MAGIC: u32 = u32::from_le_bytes(*b"CHNL");

const FLAG_PERSISTENT: u8 = 1 << 0;

/// One channel: frequency plus the capacitor setting tuned for it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelItem {
    /// Channel frequency in kHz.
    pub frequency: u32,
    pub caps: CapacitorSetting,
    pub tuned_iq: ReflectedPower,
}

impl ChannelItem {
    pub const EMPTY: Self = Self {
        frequency: 0,
        caps: CapacitorSetting::new(0, 0, 0),
        tuned_iq: ReflectedPower::new(0, 0),
    };
}

/// Ordered channel list of one antenna.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChannelList {
    pub antenna: u8,
    /// Whether the host asked for this list to be kept in flash.
    pub persistent: bool,
    /// Hopping position, `< n_frequencies` whenever the list is non-empty.
    pub current_index: u8,
    pub n_frequencies: u8,
    pub items: [ChannelItem; MAX_CHANNEL_ITEMS],
}

impl ChannelList {
    pub const fn empty(antenna: u8) -> Self {
        Self {
            antenna,
            persistent: false,
            current_index: 0,
            n_frequencies: 0,
            items: [ChannelItem::EMPTY; MAX_CHANNEL_ITEMS],
        }
    }

    /// Seed a channel list from a profile's regulatory plan and the board's
    /// factory capacitor defaults.
    pub fn from_profile(antenna: u8, profile: Profile, geometry: BoardGeometry) -> Self {
        let plan = frequencies(profile);
        let caps = default_caps(geometry);
        let mut list = Self::empty(antenna);
        list.n_frequencies = plan.len().min(MAX_CHANNEL_ITEMS) as u8;
        for (slot, &frequency) in list.items.iter_mut().zip(plan) {
            slot.frequency = frequency;
            slot.caps = caps;
        }
        list
    }

    /// Item at the hopping position.
    pub fn current(&self) -> Option<&ChannelItem> {
        if self.n_frequencies == 0 {
            None
        } else {
            self.items.get(self.current_index as usize)
        }
    }

    /// Serialized length of the active part of the list.
    pub fn encoded_len(&self) -> usize {
        CHANNEL_HEADER_BYTES + self.n_frequencies as usize * CHANNEL_ITEM_BYTES
    }

    /// Encode the list into `buf` (at least [`encoded_len`](Self::encoded_len)
    /// bytes). Returns the number of bytes written.
    pub fn encode_into(&self, buf: &mut [u8]) -> usize {
        buf[0..4].copy_from_slice(&CHANNEL_MAGIC.to_le_bytes());
        buf[4] = self.antenna;
        buf[5] = if self.persistent { FLAG_PERSISTENT } else { 0 };
        buf[6] = self.current_index;
        buf[7] = self.n_frequencies;

        let mut cursor = CHANNEL_HEADER_BYTES;
        for item in &self.items[..self.n_frequencies as usize] {
            buf[cursor..cursor + 4].copy_from_slice(&item.frequency.to_le_bytes());
            buf[cursor + 4] = item.caps.cin;
            buf[cursor + 5] = item.caps.clen;
            buf[cursor + 6] = item.caps.cout;
            buf[cursor + 7] = 0xFF;
            buf[cursor + 8..cursor + 10].copy_from_slice(&item.tuned_iq.i.to_le_bytes());
            buf[cursor + 10..cursor + 12].copy_from_slice(&item.tuned_iq.q.to_le_bytes());
            cursor += CHANNEL_ITEM_BYTES;
        }
        cursor
    }

    /// Decode the list stored for `antenna`; `None` on absent/corrupt
    /// content (failed magic, foreign antenna tag, impossible counts).
    pub fn decode_from(antenna: u8, buf: &[u8]) -> Option<ChannelList> {
        if buf.len() < CHANNEL_HEADER_BYTES {
            return None;
        }
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if magic != CHANNEL_MAGIC || buf[4] != antenna {
            return None;
        }
        let n_frequencies = buf[7];
        if n_frequencies as usize > MAX_CHANNEL_ITEMS {
            return None;
        }
        if buf.len() < CHANNEL_HEADER_BYTES + n_frequencies as usize * CHANNEL_ITEM_BYTES {
            return None;
        }

        let mut list = ChannelList::empty(antenna);
        list.persistent = buf[5] & FLAG_PERSISTENT != 0;
        list.n_frequencies = n_frequencies;
        list.current_index = if buf[6] < n_frequencies { buf[6] } else { 0 };

        let mut cursor = CHANNEL_HEADER_BYTES;
        for item in &mut list.items[..n_frequencies as usize] {
            item.frequency = u32::from_le_bytes(buf[cursor..cursor + 4].try_into().unwrap());
            item.caps =
                CapacitorSetting::new(buf[cursor + 4], buf[cursor + 5], buf[cursor + 6]);
            item.tuned_iq = ReflectedPower::new(
                i16::from_le_bytes(buf[cursor + 8..cursor + 10].try_into().unwrap()),
                i16::from_le_bytes(buf[cursor + 10..cursor + 12].try_into().unwrap()),
            );
            cursor += CHANNEL_ITEM_BYTES;
        }
        Some(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_list() -> ChannelList {
        let mut list =
            ChannelList::from_profile(2, Profile::China, BoardGeometry::quad_antenna());
        list.persistent = true;
        list.current_index = 7;
        list.items[7].caps = CapacitorSetting::new(3, 4, 5);
        list.items[7].tuned_iq = ReflectedPower::new(-9, 2);
        list
    }

    #[test]
    fn roundtrip_reconstructs_the_list() {
        let list = sample_list();
        let mut buf = [0xFFu8; CHANNEL_IMAGE_BYTES];
        let len = list.encode_into(&mut buf);
        assert_eq!(len, list.encoded_len());
        let decoded = ChannelList::decode_from(2, &buf).unwrap();
        assert_eq!(decoded, list);
    }

    #[test]
    fn erased_block_decodes_to_none() {
        let buf = [0xFFu8; CHANNEL_IMAGE_BYTES];
        assert!(ChannelList::decode_from(0, &buf).is_none());
    }

    #[test]
    fn antenna_tag_mismatch_is_corrupt() {
        let list = sample_list();
        let mut buf = [0xFFu8; CHANNEL_IMAGE_BYTES];
        list.encode_into(&mut buf);
        assert!(ChannelList::decode_from(0, &buf).is_none());
    }

    #[test]
    fn out_of_range_hopping_index_resets_to_zero() {
        let mut list = sample_list();
        list.current_index = 40; // beyond the China plan's 16 channels
        let mut buf = [0xFFu8; CHANNEL_IMAGE_BYTES];
        list.encode_into(&mut buf);
        let decoded = ChannelList::decode_from(2, &buf).unwrap();
        assert_eq!(decoded.current_index, 0);
    }

    #[test]
    fn current_follows_the_hopping_index() {
        let list = sample_list();
        assert_eq!(list.current().unwrap().caps, CapacitorSetting::new(3, 4, 5));
        assert!(ChannelList::empty(0).current().is_none());
    }
}
