//! LoRaWAN Class B timing
//!
//! This module covers the region-independent parts of Class B:
//! - Beacon period timing and GPS time tracking
//! - Beacon frame decoding and loss tracking
//! - Ping slot offset and slot scheduling
//!
//! Beacon and ping slot frequencies and data rates come from the region
//! through [`crate::lorawan::region::Region::get_phy_param`].

pub mod beacon;
pub mod ping_slot;
pub mod timing;

pub use beacon::{Beacon, BeaconError, BeaconFormat, BeaconState, BeaconTracker};
pub use ping_slot::{ping_offset, PingSlotConfig, PingSlotScheduler};
pub use timing::NetworkTime;
