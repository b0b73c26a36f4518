//! Tuning partition layout and persistence.
//!
//! Layout, as offsets within the NOR region dedicated to tuning data:
//! one 4 KiB page per legacy profile in profile-index order, then one page
//! subdivided into [`MAX_ANTENNAS`] equal channel-list blocks:
//!
//! ```text
//! 0x0000  Europe table        0x4000  China2 table
//! 0x1000  Usa table           0x5000  Custom table
//! 0x2000  Japan table         0x6000  channel lists, 1 KiB per antenna
//! 0x3000  China table
//! ```
//!
//! Flash cells only clear bits (1 → 0); every rewrite erases the containing
//! page first, and all programming funnels through one helper that pads to
//! the 64-bit write granularity with the erased-state 0xFF.

use embedded_storage::nor_flash::{NorFlash, ReadNorFlash};

use super::channel_list::{ChannelList, CHANNEL_IMAGE_BYTES};
use super::profile::{default_table, Profile};
use super::table::{TuningTable, TABLE_ENTRY_BYTES, TABLE_HEADER_BYTES};
use super::MAX_ANTENNAS;
use crate::frontend::BoardGeometry;

/// Erase granularity of the tuning partition.
pub const FLASH_PAGE_BYTES: usize = 4096;

/// Program alignment enforced on every write.
pub const PROGRAM_ALIGN_BYTES: usize = 8;

/// Per-antenna channel-list block within the shared page.
pub const CHANNEL_BLOCK_BYTES: usize = FLASH_PAGE_BYTES / MAX_ANTENNAS;

/// Offset of the shared channel-list page (after the six legacy tables).
pub const CHANNEL_PAGE_OFFSET: u32 = 6 * FLASH_PAGE_BYTES as u32;

/// Total size of the tuning partition.
pub const PARTITION_BYTES: usize = 7 * FLASH_PAGE_BYTES;

/// Flash page of a legacy profile's tuning table; `NewTuning` has none.
pub fn profile_page_offset(profile: Profile) -> Option<u32> {
    if !profile.is_legacy() {
        return None;
    }
    Some(profile.index() as u32 * FLASH_PAGE_BYTES as u32)
}

/// Flash block of one antenna's channel list within the shared page.
pub fn channel_block_offset(antenna: u8) -> u32 {
    CHANNEL_PAGE_OFFSET + antenna as u32 * CHANNEL_BLOCK_BYTES as u32
}

/// Store operation errors.
///
/// Absent or corrupt stored content is not an error: loads return `Option`
/// and the caller falls back to the factory defaults.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Profile has no legacy flash page (`NewTuning`).
    InvalidProfile,
    /// Antenna index beyond the layout's block count.
    InvalidAntenna,
    /// Underlying flash driver failure.
    Flash,
}

/// Persistent store for tuning tables and channel lists.
///
/// Generic over the `embedded-storage` NOR traits; firmware hands in the
/// flash driver mapped at the tuning partition, tests an array-backed mock.
/// All operations are blocking and must not be preempted by another flash
/// user (an erase takes ~25 ms, each 64-bit program ~3 ms).
pub struct TuningStore<F> {
    flash: F,
}

impl<F: ReadNorFlash + NorFlash> TuningStore<F> {
    pub fn new(flash: F) -> Self {
        debug_assert!(flash.capacity() >= PARTITION_BYTES);
        Self { flash }
    }

    /// Release the underlying flash driver.
    pub fn free(self) -> F {
        self.flash
    }

    /// Persist a legacy tuning table into its profile's page.
    pub fn save_table(&mut self, table: &TuningTable) -> Result<(), StoreError> {
        let offset = profile_page_offset(table.profile).ok_or(StoreError::InvalidProfile)?;
        self.erase_page(offset)?;

        let mut header = [0u8; TABLE_HEADER_BYTES];
        table.encode_header(&mut header);
        self.program_aligned(offset, &header)?;

        let mut cursor = offset + TABLE_HEADER_BYTES as u32;
        for entry in 0..table.table_size as usize {
            let mut bytes = [0u8; TABLE_ENTRY_BYTES];
            table.encode_entry(entry, &mut bytes);
            self.program_aligned(cursor, &bytes)?;
            cursor += TABLE_ENTRY_BYTES as u32;
        }
        debug!(
            "tuning store: table saved, profile {} with {} entries",
            table.profile.index(),
            table.table_size
        );
        Ok(())
    }

    /// Load a legacy tuning table; `None` when the page is erased, corrupt
    /// or belongs to `NewTuning`. Callers fall back to the factory table.
    pub fn load_table(&mut self, profile: Profile) -> Option<TuningTable> {
        let offset = profile_page_offset(profile)?;

        let mut header = [0u8; TABLE_HEADER_BYTES];
        self.flash.read(offset, &mut header).ok()?;
        let table_size = TuningTable::decode_header(&header, profile)?;

        let mut table = TuningTable::empty(profile);
        table.table_size = table_size;
        let mut cursor = offset + TABLE_HEADER_BYTES as u32;
        for entry in 0..table_size as usize {
            let mut bytes = [0u8; TABLE_ENTRY_BYTES];
            self.flash.read(cursor, &mut bytes).ok()?;
            table.decode_entry(entry, &bytes);
            cursor += TABLE_ENTRY_BYTES as u32;
        }
        Some(table)
    }

    /// Erase a legacy profile's table page.
    pub fn clear_table(&mut self, profile: Profile) -> Result<(), StoreError> {
        let offset = profile_page_offset(profile).ok_or(StoreError::InvalidProfile)?;
        self.erase_page(offset)
    }

    /// Load the stored table for `profile`, falling back to the factory
    /// table when flash holds nothing usable for it.
    pub fn load_table_or_default(
        &mut self,
        profile: Profile,
        geometry: BoardGeometry,
    ) -> TuningTable {
        match self.load_table(profile) {
            Some(table) => table,
            None => {
                debug!(
                    "tuning store: no stored table for profile {}, using factory defaults",
                    profile.index()
                );
                default_table(profile, geometry)
            }
        }
    }

    /// Load the stored channel list for `antenna`, falling back to a list
    /// seeded from `profile`'s plan when its block holds nothing usable.
    pub fn load_channel_list_or_default(
        &mut self,
        antenna: u8,
        profile: Profile,
        geometry: BoardGeometry,
    ) -> ChannelList {
        match self.load_channel_list(antenna) {
            Some(list) => list,
            None => {
                debug!(
                    "tuning store: no stored channel list for antenna {}, using defaults",
                    antenna
                );
                ChannelList::from_profile(antenna, profile, geometry)
            }
        }
    }

    /// Persist one antenna's channel list.
    ///
    /// The sibling antennas share the erase page, so their stored lists are
    /// read out and cached first, the page erased, and all lists rewritten.
    /// This multi-step sequence is not atomic; it must not be preempted by
    /// another flash operation.
    pub fn save_channel_list(&mut self, list: &ChannelList) -> Result<(), StoreError> {
        if list.antenna as usize >= MAX_ANTENNAS {
            return Err(StoreError::InvalidAntenna);
        }

        let mut cached: [Option<ChannelList>; MAX_ANTENNAS] = Default::default();
        for antenna in 0..MAX_ANTENNAS as u8 {
            if antenna != list.antenna {
                cached[antenna as usize] = self.load_channel_list(antenna);
            }
        }

        self.erase_page(CHANNEL_PAGE_OFFSET)?;

        for antenna in 0..MAX_ANTENNAS as u8 {
            let slot = if antenna == list.antenna {
                Some(list)
            } else {
                cached[antenna as usize].as_ref()
            };
            if let Some(stored) = slot {
                self.program_channel_list(stored)?;
            }
        }
        debug!(
            "tuning store: channel list saved, antenna {} with {} channels",
            list.antenna, list.n_frequencies
        );
        Ok(())
    }

    /// Load one antenna's channel list; `None` when its block is erased or
    /// corrupt.
    pub fn load_channel_list(&mut self, antenna: u8) -> Option<ChannelList> {
        if antenna as usize >= MAX_ANTENNAS {
            return None;
        }
        let mut buf = [0u8; CHANNEL_IMAGE_BYTES];
        self.flash.read(channel_block_offset(antenna), &mut buf).ok()?;
        ChannelList::decode_from(antenna, &buf)
    }

    /// Erase the shared channel-list page (all antennas).
    pub fn clear_channel_lists(&mut self) -> Result<(), StoreError> {
        self.erase_page(CHANNEL_PAGE_OFFSET)
    }

    fn program_channel_list(&mut self, list: &ChannelList) -> Result<(), StoreError> {
        let mut buf = [0xFFu8; CHANNEL_IMAGE_BYTES];
        let used = list.encode_into(&mut buf);
        self.program_aligned(channel_block_offset(list.antenna), &buf[..used])
    }

    fn erase_page(&mut self, offset: u32) -> Result<(), StoreError> {
        self.flash
            .erase(offset, offset + FLASH_PAGE_BYTES as u32)
            .map_err(|_| StoreError::Flash)
    }

    /// Program `bytes` at an aligned `offset`, padding the tail with the
    /// erased state up to the 64-bit write granularity.
    fn program_aligned(&mut self, offset: u32, bytes: &[u8]) -> Result<(), StoreError> {
        debug_assert!(offset as usize % PROGRAM_ALIGN_BYTES == 0);
        let whole = bytes.len() - bytes.len() % PROGRAM_ALIGN_BYTES;
        if whole > 0 {
            self.flash
                .write(offset, &bytes[..whole])
                .map_err(|_| StoreError::Flash)?;
        }
        if whole < bytes.len() {
            let mut tail = [0xFFu8; PROGRAM_ALIGN_BYTES];
            tail[..bytes.len() - whole].copy_from_slice(&bytes[whole..]);
            self.flash
                .write(offset + whole as u32, &tail)
                .map_err(|_| StoreError::Flash)?;
        }
        Ok(())
    }
}
