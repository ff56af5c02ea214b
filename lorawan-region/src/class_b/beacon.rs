//! LoRaWAN Class B beacon decoding and tracking
//!
//! Beacon layout for a region with `rfu1` and `rfu2` reserved bytes:
//!
//! | RFU1 | Time | CRC1 | GwSpecific | RFU2 | CRC2 |
//! |---|---|---|---|---|---|
//! | rfu1 | 4 | 2 | 7 | rfu2 | 2 |
//!
//! Both CRCs are CRC-16/XMODEM stored little endian. CRC1 covers RFU1 and
//! Time, CRC2 covers GwSpecific and RFU2.

use core::fmt;
use core::time::Duration;

use crc::{Crc, CRC_16_XMODEM};

use super::timing::{BEACON_INTERVAL, BEACON_INTERVAL_SECS};

const BEACON_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

const TIME_SIZE: usize = 4;
const CRC_SIZE: usize = 2;
const GW_SPECIFIC_SIZE: usize = 7;

/// Maximum beacons missed before declaring loss
const MAX_BEACON_MISSED: u8 = 3;

/// Beacon frame geometry of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BeaconFormat {
    /// Total frame size
    pub size: u8,
    /// First reserved field size
    pub rfu1_size: u8,
    /// Second reserved field size
    pub rfu2_size: u8,
}

/// Decoded beacon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Beacon {
    /// GPS time of the beacon in seconds
    pub time: u32,
    /// Gateway specific information, absent when CRC2 failed
    pub gw_specific: Option<[u8; GW_SPECIFIC_SIZE]>,
}

/// Beacon decoding errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BeaconError {
    /// Frame size does not match the region format
    InvalidLength(usize),
    /// Network common part failed its CRC
    CrcMismatch,
}

impl fmt::Display for BeaconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeaconError::InvalidLength(len) => write!(f, "beacon of {} bytes", len),
            BeaconError::CrcMismatch => f.write_str("beacon CRC mismatch"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BeaconError {}

impl BeaconFormat {
    /// Frame length implied by the reserved field sizes
    pub fn frame_len(&self) -> usize {
        self.rfu1_size as usize
            + TIME_SIZE
            + CRC_SIZE
            + GW_SPECIFIC_SIZE
            + self.rfu2_size as usize
            + CRC_SIZE
    }

    /// Decode a received beacon frame
    pub fn parse(&self, frame: &[u8]) -> Result<Beacon, BeaconError> {
        if frame.len() != self.size as usize || frame.len() != self.frame_len() {
            return Err(BeaconError::InvalidLength(frame.len()));
        }

        let common_len = self.rfu1_size as usize + TIME_SIZE;
        let (common, rest) = frame.split_at(common_len);
        let (crc1, rest) = rest.split_at(CRC_SIZE);
        if BEACON_CRC.checksum(common) != u16::from_le_bytes([crc1[0], crc1[1]]) {
            return Err(BeaconError::CrcMismatch);
        }

        let time_bytes = &common[self.rfu1_size as usize..];
        let time = u32::from_le_bytes([time_bytes[0], time_bytes[1], time_bytes[2], time_bytes[3]]);

        let (gw_part, crc2) = rest.split_at(rest.len() - CRC_SIZE);
        let gw_specific = if BEACON_CRC.checksum(gw_part) == u16::from_le_bytes([crc2[0], crc2[1]]) {
            let mut info = [0u8; GW_SPECIFIC_SIZE];
            info.copy_from_slice(&gw_part[..GW_SPECIFIC_SIZE]);
            Some(info)
        } else {
            debug!("beacon {} gateway specific part dropped", time);
            None
        };

        Ok(Beacon { time, gw_specific })
    }
}

/// Beacon tracking state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BeaconState {
    /// Not tracking beacons
    Idle,
    /// Searching for initial beacon
    Searching,
    /// Synchronized with network beacons
    Synchronized,
    /// Lost beacon synchronization
    Lost,
}

/// Beacon tracking information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconTracker {
    /// Current beacon state
    state: BeaconState,
    /// GPS time of last received beacon
    last_beacon_time: u32,
    /// Local time the last beacon was received
    last_beacon_rx: Duration,
    /// Number of consecutive missed beacons
    missed_beacons: u8,
}

impl Default for BeaconTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl BeaconTracker {
    /// Create new beacon tracker
    pub fn new() -> Self {
        Self {
            state: BeaconState::Idle,
            last_beacon_time: 0,
            last_beacon_rx: Duration::ZERO,
            missed_beacons: 0,
        }
    }

    /// Start beacon acquisition
    pub fn start_acquisition(&mut self) {
        self.state = BeaconState::Searching;
        self.missed_beacons = 0;
    }

    /// A beacon was received at `local_time`
    pub fn beacon_received(&mut self, beacon: &Beacon, local_time: Duration) {
        if beacon.time % BEACON_INTERVAL_SECS != 0 {
            warn!("beacon time {} not aligned on a beacon period", beacon.time);
            return;
        }
        if self.state != BeaconState::Synchronized {
            info!("beacon synchronised at {}", beacon.time);
        }
        self.last_beacon_time = beacon.time;
        self.last_beacon_rx = local_time;
        self.missed_beacons = 0;
        self.state = BeaconState::Synchronized;
    }

    /// The beacon window closed without a beacon
    pub fn beacon_missed(&mut self) {
        if self.state != BeaconState::Synchronized {
            return;
        }
        self.missed_beacons += 1;
        // keep the expected schedule running while beacons are missing
        self.last_beacon_time = self.last_beacon_time.wrapping_add(BEACON_INTERVAL_SECS);
        self.last_beacon_rx += BEACON_INTERVAL;
        if self.missed_beacons >= MAX_BEACON_MISSED {
            warn!("beacon lost after {} misses", self.missed_beacons);
            self.state = BeaconState::Lost;
        }
    }

    /// GPS time and local time at which the next beacon is expected
    pub fn next_beacon(&self) -> Option<(u32, Duration)> {
        (self.state == BeaconState::Synchronized).then(|| {
            (
                self.last_beacon_time.wrapping_add(BEACON_INTERVAL_SECS),
                self.last_beacon_rx + BEACON_INTERVAL,
            )
        })
    }

    /// Get current beacon state
    pub fn state(&self) -> BeaconState {
        self.state
    }

    /// Check if beacon is synchronized
    pub fn is_synchronized(&self) -> bool {
        self.state == BeaconState::Synchronized
    }

    /// Get last beacon time
    pub fn last_beacon_time(&self) -> u32 {
        self.last_beacon_time
    }
}
