//! Channel plan and channel masks
//!
//! Channels of a fixed plan are generated from their raster. The only
//! mutable per-channel state is the enabled bit (held in a [`ChannelMask`])
//! and frequencies reprogrammed by the network.

use super::region::params::{DataRate, RegionParams};

/// Number of 16-bit words in a channel mask
pub const CHANNEL_MASK_WORDS: usize = 6;

/// Channel mask covering up to 96 channels, 16 per word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelMask(pub [u16; CHANNEL_MASK_WORDS]);

impl ChannelMask {
    /// Mask with no channel enabled
    pub const fn empty() -> Self {
        Self([0; CHANNEL_MASK_WORDS])
    }

    /// Mask enabling every channel of `params`
    pub fn all(params: &RegionParams) -> Self {
        let mut mask = Self::empty();
        for index in 0..params.max_channels {
            mask.set(index, true);
        }
        mask
    }

    /// Whether channel `index` is enabled
    pub fn is_enabled(&self, index: u8) -> bool {
        let word = index as usize / 16;
        word < CHANNEL_MASK_WORDS && self.0[word] & (1 << (index % 16)) != 0
    }

    /// Enable or disable channel `index`
    pub fn set(&mut self, index: u8, enabled: bool) {
        let word = index as usize / 16;
        if word >= CHANNEL_MASK_WORDS {
            return;
        }
        if enabled {
            self.0[word] |= 1 << (index % 16);
        } else {
            self.0[word] &= !(1 << (index % 16));
        }
    }

    /// Number of enabled channels in `start..end`
    pub fn count_range(&self, start: u8, end: u8) -> u8 {
        (start..end).filter(|&i| self.is_enabled(i)).count() as u8
    }

    /// Whether any channel in `start..end` is enabled
    pub fn any_in_range(&self, start: u8, end: u8) -> bool {
        (start..end).any(|i| self.is_enabled(i))
    }

    /// Keep only the channels enabled in both masks
    pub fn intersect(&mut self, other: &ChannelMask) {
        for (word, other) in self.0.iter_mut().zip(other.0.iter()) {
            *word &= *other;
        }
    }

    /// Copy the bits of `start..end` from `other`
    pub fn copy_range(&mut self, other: &ChannelMask, start: u8, end: u8) {
        for index in start..end {
            self.set(index, other.is_enabled(index));
        }
    }

    /// Whether any bit at or above `max_channels` is set
    pub fn has_bits_beyond(&self, max_channels: u8) -> bool {
        (max_channels..(CHANNEL_MASK_WORDS * 16) as u8).any(|i| self.is_enabled(i))
    }

    /// Mask from consecutive little-endian 16-bit words
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        let mut mask = Self::empty();
        for (word, chunk) in mask.0.iter_mut().zip(bytes.chunks_exact(2)) {
            *word = u16::from_le_bytes([chunk[0], chunk[1]]);
        }
        mask
    }
}

/// Inclusive data rate range supported by a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DrRange {
    /// Lowest data rate
    pub min: DataRate,
    /// Highest data rate
    pub max: DataRate,
}

impl DrRange {
    /// Whether `datarate` lies inside the range
    pub fn contains(&self, datarate: DataRate) -> bool {
        datarate >= self.min && datarate <= self.max
    }
}

/// Uplink channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel {
    /// Channel index
    pub index: u8,
    /// Uplink frequency in Hz
    pub frequency: u32,
    /// RX1 frequency in Hz
    pub rx1_frequency: u32,
    /// Usable data rates
    pub dr_range: DrRange,
    /// Band the channel belongs to
    pub band: u8,
}

/// Size of a CFList in bytes
pub const CF_LIST_SIZE: usize = 16;

/// Decoded CFList
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CfList {
    /// Five channel frequencies in Hz, zero meaning "unchanged"
    Frequencies([u32; 5]),
    /// Channel mask words for channels 0-79
    ChannelMask(ChannelMask),
}

/// Reason a CFList was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CfListError {
    /// Payload is not 16 bytes long
    InvalidLength(usize),
    /// Unknown CFList type byte
    InvalidType(u8),
}

impl CfList {
    /// Decode a join-accept CFList
    pub fn parse(payload: &[u8]) -> Result<Self, CfListError> {
        if payload.len() != CF_LIST_SIZE {
            return Err(CfListError::InvalidLength(payload.len()));
        }

        match payload[CF_LIST_SIZE - 1] {
            0x00 => {
                let mut frequencies = [0u32; 5];
                for (frequency, chunk) in frequencies.iter_mut().zip(payload[..15].chunks_exact(3)) {
                    *frequency = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], 0]) * 100;
                }
                Ok(CfList::Frequencies(frequencies))
            }
            0x01 => {
                let mut mask = ChannelMask::from_le_bytes(&payload[..10]);
                mask.0[5] = 0;
                Ok(CfList::ChannelMask(mask))
            }
            other => Err(CfListError::InvalidType(other)),
        }
    }
}
