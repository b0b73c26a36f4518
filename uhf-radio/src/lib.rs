#![cfg_attr(not(test), no_std)]
#![doc = "Antenna tuning stack for UHF RFID readers."]
#![doc = ""]
#![doc = "Provides the automatic tuner-network search algorithms, the false-positive"]
#![doc = "measurement safeguard, regulatory frequency profiles, and the persistent"]
#![doc = "tuning-table / channel-list stores. Hardware access goes through the"]
#![doc = "[`frontend::RfFrontend`] capability trait, implemented by the reader chip"]
#![doc = "driver."]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod frontend;
pub mod tuning;

pub use frontend::{BoardGeometry, RfFrontend, TunerState};
