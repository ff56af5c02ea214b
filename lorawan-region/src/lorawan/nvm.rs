//! Persisted region state
//!
//! The storage collaborator reads the context with
//! [`Region::nvm_context`](super::region::Region::nvm_context), stores the
//! bytes produced by [`NvmContext::to_bytes`] and hands them back at boot
//! through [`NvmContext::from_bytes`].
//!
//! Layout (little endian):
//!
//! | field | size |
//! |---|---|
//! | version | 1 |
//! | active, default, remaining masks | 3 x 12 |
//! | uplink dwell, downlink dwell | 2 |
//! | join trials | 2 |
//! | band count, bands (duty cycle 2, max power 1, 3 x timestamp 8) | 1 + n x 27 |
//! | RX1 override count, overrides (index 1, frequency 4) | 1 + n x 5 |
//! | CRC-32 of everything above | 4 |
//!
//! Timestamps are stored in microseconds.

use core::fmt;
use core::time::Duration;

use crc::{Crc, CRC_32_ISO_HDLC};
use heapless::Vec;

use super::band::Band;
use super::channels::{ChannelMask, CHANNEL_MASK_WORDS};
use super::region::params::RegionParams;

/// Layout version written by this crate
pub const NVM_CONTEXT_VERSION: u8 = 2;

/// Most bands a region can define
pub const MAX_BANDS: usize = 4;

/// Most channels a fixed plan can define
pub const MAX_CHANNELS: usize = 72;

const MASK_SIZE: usize = CHANNEL_MASK_WORDS * 2;
const BAND_SIZE: usize = 2 + 1 + 3 * 8;
const OVERRIDE_SIZE: usize = 1 + 4;

/// Largest encoded context
pub const NVM_CONTEXT_MAX_SIZE: usize =
    1 + 3 * MASK_SIZE + 2 + 2 + 1 + MAX_BANDS * BAND_SIZE + 1 + MAX_CHANNELS * OVERRIDE_SIZE + 4;

const NVM_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Context restore and encoding errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NvmError {
    /// Stored layout version differs from [`NVM_CONTEXT_VERSION`]
    VersionMismatch(u8),
    /// Data ends early or has trailing bytes
    InvalidLength,
    /// CRC does not match the content
    ChecksumMismatch,
    /// A field holds a value the region cannot represent
    InvalidValue,
    /// Output buffer too small
    BufferTooSmall,
}

impl fmt::Display for NvmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NvmError::VersionMismatch(found) => write!(
                f,
                "context version {} does not match {}",
                found, NVM_CONTEXT_VERSION
            ),
            NvmError::InvalidLength => f.write_str("context has an invalid length"),
            NvmError::ChecksumMismatch => f.write_str("context checksum mismatch"),
            NvmError::InvalidValue => f.write_str("context holds an invalid value"),
            NvmError::BufferTooSmall => f.write_str("buffer too small"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for NvmError {}

/// Mutable region state that survives a reboot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvmContext {
    /// Channels the network allows
    pub channels_mask: ChannelMask,
    /// Mask restored by `InitType::RestoreDefaultChannels`
    pub channels_default_mask: ChannelMask,
    /// Channels not used yet in the current hopping cycle
    pub channels_mask_remaining: ChannelMask,
    /// Duty cycle bookkeeping
    pub bands: Vec<Band, MAX_BANDS>,
    /// Uplink dwell time limit in force
    pub uplink_dwell_time: bool,
    /// Downlink dwell time limit in force
    pub downlink_dwell_time: bool,
    /// Join attempts counted by `alternate_dr`
    pub join_trials: u16,
    /// RX1 frequencies assigned by DlChannelReq, zero when unset
    pub rx1_frequencies: [u32; MAX_CHANNELS],
}

impl NvmContext {
    /// Context with every channel enabled and fresh bands
    pub fn defaults(params: &RegionParams) -> Self {
        let mask = ChannelMask::all(params);
        Self {
            channels_mask: mask,
            channels_default_mask: mask,
            channels_mask_remaining: mask,
            bands: params.bands.iter().take(MAX_BANDS).map(Band::new).collect(),
            uplink_dwell_time: params.default_uplink_dwell,
            downlink_dwell_time: params.default_downlink_dwell,
            join_trials: 0,
            rx1_frequencies: [0; MAX_CHANNELS],
        }
    }

    /// Encode the context
    pub fn to_bytes(&self) -> Result<Vec<u8, NVM_CONTEXT_MAX_SIZE>, NvmError> {
        let mut out: Vec<u8, NVM_CONTEXT_MAX_SIZE> = Vec::new();
        let mut put = |bytes: &[u8]| out.extend_from_slice(bytes).map_err(|_| NvmError::BufferTooSmall);

        put(&[NVM_CONTEXT_VERSION])?;
        for mask in [
            &self.channels_mask,
            &self.channels_default_mask,
            &self.channels_mask_remaining,
        ] {
            for word in mask.0 {
                put(&word.to_le_bytes())?;
            }
        }
        put(&[self.uplink_dwell_time as u8, self.downlink_dwell_time as u8])?;
        put(&self.join_trials.to_le_bytes())?;

        put(&[self.bands.len() as u8])?;
        for band in &self.bands {
            put(&band.duty_cycle.to_le_bytes())?;
            put(&[band.tx_max_power])?;
            for time in [band.last_join_tx_done, band.last_tx_done, band.time_off] {
                put(&(time.as_micros() as u64).to_le_bytes())?;
            }
        }

        let overrides = self.rx1_frequencies.iter().filter(|&&f| f != 0).count();
        put(&[overrides as u8])?;
        for (index, frequency) in self.rx1_frequencies.iter().enumerate() {
            if *frequency != 0 {
                put(&[index as u8])?;
                put(&frequency.to_le_bytes())?;
            }
        }

        let crc = NVM_CRC.checksum(&out);
        out.extend_from_slice(&crc.to_le_bytes())
            .map_err(|_| NvmError::BufferTooSmall)?;
        Ok(out)
    }

    /// Decode a context produced by [`NvmContext::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NvmError> {
        if bytes.len() < 5 {
            return Err(NvmError::InvalidLength);
        }
        if bytes[0] != NVM_CONTEXT_VERSION {
            return Err(NvmError::VersionMismatch(bytes[0]));
        }

        let (body, crc) = bytes.split_at(bytes.len() - 4);
        if NVM_CRC.checksum(body).to_le_bytes() != crc {
            return Err(NvmError::ChecksumMismatch);
        }

        let mut reader = Reader { data: &body[1..] };
        let channels_mask = reader.mask()?;
        let channels_default_mask = reader.mask()?;
        let channels_mask_remaining = reader.mask()?;
        let uplink_dwell_time = reader.flag()?;
        let downlink_dwell_time = reader.flag()?;
        let join_trials = reader.u16()?;

        let band_count = reader.u8()? as usize;
        if band_count > MAX_BANDS {
            return Err(NvmError::InvalidValue);
        }
        let mut bands = Vec::new();
        for _ in 0..band_count {
            let band = Band {
                duty_cycle: reader.u16()?,
                tx_max_power: reader.u8()?,
                last_join_tx_done: reader.micros()?,
                last_tx_done: reader.micros()?,
                time_off: reader.micros()?,
            };
            bands.push(band).map_err(|_| NvmError::InvalidValue)?;
        }

        let mut rx1_frequencies = [0u32; MAX_CHANNELS];
        for _ in 0..reader.u8()? {
            let index = reader.u8()? as usize;
            let frequency = reader.u32()?;
            *rx1_frequencies.get_mut(index).ok_or(NvmError::InvalidValue)? = frequency;
        }

        if !reader.data.is_empty() {
            return Err(NvmError::InvalidLength);
        }

        Ok(Self {
            channels_mask,
            channels_default_mask,
            channels_mask_remaining,
            bands,
            uplink_dwell_time,
            downlink_dwell_time,
            join_trials,
            rx1_frequencies,
        })
    }
}

struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], NvmError> {
        if self.data.len() < n {
            return Err(NvmError::InvalidLength);
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, NvmError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, NvmError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, NvmError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn micros(&mut self) -> Result<Duration, NvmError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(Duration::from_micros(u64::from_le_bytes(raw)))
    }

    fn flag(&mut self) -> Result<bool, NvmError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(NvmError::InvalidValue),
        }
    }

    fn mask(&mut self) -> Result<ChannelMask, NvmError> {
        Ok(ChannelMask::from_le_bytes(self.take(MASK_SIZE)?))
    }
}
