//! LoRaWAN Class B Ping Slot Management
//!
//! Each beacon period holds `ping_nb` ping slots spaced `ping_period` slots
//! apart. The first slot is shifted by a pseudo-random offset derived from
//! the beacon time and the device address so devices do not collide:
//!
//! `Rand = aes128_encrypt(0x00..00, beacon_time | dev_addr | pad16)`
//! `ping_offset = (Rand[0] + Rand[1] * 256) mod ping_period`

use core::cmp::min;
use core::time::Duration;

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;

use super::timing::{BEACON_RESERVED, PING_SLOT_WINDOW};

/// Ping slots in a beacon window
pub const PING_SLOTS_PER_WINDOW: u16 = 4096;

/// Ping slot configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PingSlotConfig {
    /// Ping slot periodicity (0-7)
    periodicity: u8,
}

impl PingSlotConfig {
    /// Create new ping slot configuration
    pub fn new(periodicity: u8) -> Self {
        Self {
            periodicity: min(periodicity, 7),
        }
    }

    /// Set ping slot periodicity
    pub fn set_periodicity(&mut self, periodicity: u8) {
        self.periodicity = min(periodicity, 7);
    }

    /// Ping slot periodicity
    pub fn periodicity(&self) -> u8 {
        self.periodicity
    }

    /// Get number of ping slots per beacon period
    pub fn ping_nb(&self) -> u16 {
        1 << (7 - self.periodicity)
    }

    /// Slots between two consecutive ping slots
    pub fn ping_period(&self) -> u16 {
        1 << (5 + self.periodicity)
    }
}

/// Pseudo-random offset of the first ping slot of a beacon period
pub fn ping_offset(beacon_time: u32, dev_addr: u32, ping_period: u16) -> u16 {
    let mut block = [0u8; 16];
    block[..4].copy_from_slice(&beacon_time.to_le_bytes());
    block[4..8].copy_from_slice(&dev_addr.to_le_bytes());

    let cipher = Aes128::new(&GenericArray::from([0u8; 16]));
    let mut block = GenericArray::from(block);
    cipher.encrypt_block(&mut block);

    let rand = u16::from(block[0]) + u16::from(block[1]) * 256;
    rand % ping_period.max(1)
}

/// Ping slot schedule for one beacon period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingSlotScheduler {
    config: PingSlotConfig,
    offset: u16,
}

impl PingSlotScheduler {
    /// Schedule for the period starting at `beacon_time`
    pub fn new(config: PingSlotConfig, beacon_time: u32, dev_addr: u32) -> Self {
        let offset = ping_offset(beacon_time, dev_addr, config.ping_period());
        trace!(
            "ping offset {} for beacon {} period {}",
            offset,
            beacon_time,
            config.ping_period()
        );
        Self { config, offset }
    }

    /// Offset of the first slot, in slots
    pub fn offset(&self) -> u16 {
        self.offset
    }

    /// Start of slot `n` relative to the beacon start
    pub fn slot_start(&self, n: u16) -> Option<Duration> {
        if n >= self.config.ping_nb() {
            return None;
        }
        let slot = u32::from(self.offset) + u32::from(n) * u32::from(self.config.ping_period());
        Some(BEACON_RESERVED + PING_SLOT_WINDOW * slot)
    }

    /// All slot starts of the period
    pub fn slots(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.config.ping_nb()).filter_map(move |n| self.slot_start(n))
    }

    /// First slot starting at or after `since_beacon`
    pub fn next_slot(&self, since_beacon: Duration) -> Option<Duration> {
        self.slots().find(|&start| start >= since_beacon)
    }
}
