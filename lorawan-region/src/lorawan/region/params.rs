//! Per-region constant descriptor
//!
//! Everything that distinguishes one fixed-channel band plan from another
//! lives in a [`RegionParams`] value. The engine in
//! [`super::fixed_plan`] only ever reads these tables.

use core::time::Duration;

use crate::radio::traits::Bandwidth;

/// Data rate index type (DR0-DR15)
pub type DataRate = u8;

/// DR0
pub const DR_0: DataRate = 0;
/// DR1
pub const DR_1: DataRate = 1;
/// DR2
pub const DR_2: DataRate = 2;
/// DR3
pub const DR_3: DataRate = 3;
/// DR4
pub const DR_4: DataRate = 4;
/// DR5
pub const DR_5: DataRate = 5;
/// DR6
pub const DR_6: DataRate = 6;
/// DR7
pub const DR_7: DataRate = 7;
/// DR8
pub const DR_8: DataRate = 8;
/// DR9
pub const DR_9: DataRate = 9;
/// DR10
pub const DR_10: DataRate = 10;
/// DR11
pub const DR_11: DataRate = 11;
/// DR12
pub const DR_12: DataRate = 12;
/// DR13
pub const DR_13: DataRate = 13;
/// DR14
pub const DR_14: DataRate = 14;
/// DR15
pub const DR_15: DataRate = 15;

/// Number of data rate slots in every region table
pub const DATARATE_SLOTS: usize = 16;

/// TX power index. Index 0 is the highest power, each step removes 2 dB.
pub type TxPower = u8;

/// Maximum EIRP
pub const TX_POWER_0: TxPower = 0;
/// Maximum EIRP - 10 dB
pub const TX_POWER_5: TxPower = 5;
/// Maximum EIRP - 20 dB
pub const TX_POWER_10: TxPower = 10;

/// Spreading factor and bandwidth behind a data rate index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DatarateParams {
    /// Spreading factor
    pub spreading_factor: u8,
    /// Bandwidth
    pub bandwidth: Bandwidth,
}

pub(crate) const fn lora(spreading_factor: u8, bandwidth: Bandwidth) -> Option<DatarateParams> {
    Some(DatarateParams {
        spreading_factor,
        bandwidth,
    })
}

/// Evenly spaced block of uplink channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UplinkRaster {
    /// Index of the first channel of the block
    pub first_index: u8,
    /// Number of channels in the block
    pub count: u8,
    /// Frequency of the first channel in Hz
    pub first_frequency: u32,
    /// Spacing between channels in Hz
    pub step: u32,
    /// Lowest data rate usable on these channels
    pub min_dr: DataRate,
    /// Highest data rate usable on these channels
    pub max_dr: DataRate,
    /// Band the channels belong to
    pub band: u8,
}

impl UplinkRaster {
    /// Whether `index` belongs to this block
    pub const fn contains(&self, index: u8) -> bool {
        index >= self.first_index && index < self.first_index + self.count
    }

    /// Frequency of channel `index`, which must belong to this block
    pub const fn frequency(&self, index: u8) -> u32 {
        self.first_frequency + (index - self.first_index) as u32 * self.step
    }

    /// Channel index sitting exactly on `frequency`, if any
    pub fn index_of(&self, frequency: u32) -> Option<u8> {
        let offset = frequency.checked_sub(self.first_frequency)?;
        if offset % self.step != 0 {
            return None;
        }
        let n = offset / self.step;
        (n < self.count as u32).then(|| self.first_index + n as u8)
    }
}

/// Downlink channel raster (RX1 channels and beacon channels)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownlinkRaster {
    /// Lowest frequency in Hz
    pub first_frequency: u32,
    /// Highest frequency in Hz
    pub last_frequency: u32,
    /// Spacing in Hz
    pub step: u32,
}

impl DownlinkRaster {
    /// Number of channels on the raster
    pub const fn count(&self) -> u32 {
        (self.last_frequency - self.first_frequency) / self.step + 1
    }

    /// Frequency of raster slot `n`, wrapping over the raster
    pub const fn frequency(&self, n: u32) -> u32 {
        self.first_frequency + (n % self.count()) * self.step
    }

    /// Whether `frequency` is inside the band covered by the raster
    pub const fn in_band(&self, frequency: u32) -> bool {
        frequency >= self.first_frequency && frequency <= self.last_frequency
    }

    /// Whether `frequency` sits exactly on a raster slot
    pub const fn on_raster(&self, frequency: u32) -> bool {
        self.in_band(frequency) && (frequency - self.first_frequency) % self.step == 0
    }
}

/// Class B beacon parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconParams {
    /// Beacon channel raster
    pub channels: DownlinkRaster,
    /// Number of beacon channels hopped over
    pub nb_channels: u8,
    /// Beacon data rate
    pub datarate: DataRate,
    /// Beacon frame size in bytes
    pub size: u8,
    /// Size of the first RFU field
    pub rfu1_size: u8,
    /// Size of the second RFU field
    pub rfu2_size: u8,
    /// Preamble length used by beacons
    pub preamble_len: u16,
}

/// Default band definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandParams {
    /// Duty cycle expressed as `1 / duty_cycle`
    pub duty_cycle: u16,
    /// Highest TX power index allowed (lowest index number)
    pub tx_max_power: TxPower,
}

/// Maximum application payload tables, indexed by data rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadTables {
    /// No dwell time limit
    pub dwell0: [u8; DATARATE_SLOTS],
    /// No dwell time limit, repeater compatible
    pub dwell0_repeater: [u8; DATARATE_SLOTS],
    /// 400 ms dwell time limit
    pub dwell1: [u8; DATARATE_SLOTS],
    /// 400 ms dwell time limit, repeater compatible
    pub dwell1_repeater: [u8; DATARATE_SLOTS],
}

impl PayloadTables {
    /// Table entry for `datarate`; zero means unsupported
    pub fn max_payload(&self, datarate: DataRate, dwell: bool, repeater: bool) -> u8 {
        let table = match (dwell, repeater) {
            (false, false) => &self.dwell0,
            (false, true) => &self.dwell0_repeater,
            (true, false) => &self.dwell1,
            (true, true) => &self.dwell1_repeater,
        };
        table.get(datarate as usize).copied().unwrap_or(0)
    }
}

/// Constant description of a fixed-channel region
#[derive(Debug)]
pub struct RegionParams {
    /// Region name
    pub name: &'static str,
    /// Total number of uplink channels
    pub max_channels: u8,
    /// 125 kHz uplink block
    pub uplink_125khz: UplinkRaster,
    /// 500 kHz uplink block
    pub uplink_500khz: UplinkRaster,
    /// RX1 downlink channels
    pub rx1_channels: DownlinkRaster,
    /// Lowest uplink data rate
    pub tx_min_dr: DataRate,
    /// Highest uplink data rate accepted from ADR
    pub tx_max_dr: DataRate,
    /// Lowest downlink data rate
    pub rx_min_dr: DataRate,
    /// Highest downlink data rate
    pub rx_max_dr: DataRate,
    /// Default uplink data rate
    pub default_dr: DataRate,
    /// Lowest data rate allowed while a dwell time limit applies
    pub dwell_limit_dr: DataRate,
    /// Highest RX1 data rate offset
    pub max_rx1_dr_offset: u8,
    /// Default RX1 data rate offset
    pub default_rx1_dr_offset: u8,
    /// Lowest power index (weakest)
    pub min_tx_power: TxPower,
    /// Highest power index (strongest)
    pub max_tx_power: TxPower,
    /// Default power index
    pub default_tx_power: TxPower,
    /// Default uplink dwell time setting
    pub default_uplink_dwell: bool,
    /// Default downlink dwell time setting
    pub default_downlink_dwell: bool,
    /// Default max EIRP in dBm
    pub default_max_eirp: f32,
    /// Default antenna gain in dBi
    pub default_antenna_gain: f32,
    /// ADR ACK limit
    pub adr_ack_limit: u16,
    /// ADR ACK delay
    pub adr_ack_delay: u16,
    /// Whether duty cycle is enforced
    pub duty_cycle_enabled: bool,
    /// Longest receive window
    pub max_rx_window: Duration,
    /// RX1 delay
    pub receive_delay1: Duration,
    /// RX2 delay
    pub receive_delay2: Duration,
    /// Join accept RX1 delay
    pub join_accept_delay1: Duration,
    /// Join accept RX2 delay
    pub join_accept_delay2: Duration,
    /// Maximum frame counter gap
    pub max_fcnt_gap: u32,
    /// Confirmed frame ACK timeout
    pub ack_timeout: Duration,
    /// Random spread applied around the ACK timeout
    pub ack_timeout_rnd: Duration,
    /// Default RX2 frequency in Hz
    pub rx2_frequency: u32,
    /// Default RX2 data rate
    pub rx2_dr: DataRate,
    /// Class B beacon parameters
    pub beacon: BeaconParams,
    /// Class B ping slot data rate
    pub ping_slot_dr: DataRate,
    /// Bands in use
    pub bands: &'static [BandParams],
    /// Data rate table
    pub datarates: [Option<DatarateParams>; DATARATE_SLOTS],
    /// RX1 data rate per uplink data rate (rows) and offset (columns)
    pub dr_offsets: &'static [[DataRate; 6]],
    /// Maximum payload sizes
    pub payloads: PayloadTables,
}

impl RegionParams {
    /// Spreading factor and bandwidth of `datarate`
    pub fn datarate(&self, datarate: DataRate) -> Option<DatarateParams> {
        self.datarates.get(datarate as usize).copied().flatten()
    }

    /// Lowest uplink data rate for the dwell setting
    pub fn min_tx_dr(&self, uplink_dwell: bool) -> DataRate {
        if uplink_dwell {
            self.dwell_limit_dr
        } else {
            self.tx_min_dr
        }
    }

    /// Lowest downlink data rate for the dwell setting
    pub fn min_rx_dr(&self, downlink_dwell: bool) -> DataRate {
        if downlink_dwell {
            self.dwell_limit_dr.max(self.rx_min_dr)
        } else {
            self.rx_min_dr
        }
    }

    /// Number of channels in the 125 kHz block
    pub fn nb_125khz_channels(&self) -> u8 {
        self.uplink_125khz.count
    }

    /// Uplink block containing channel `index`
    pub fn raster_of(&self, index: u8) -> Option<&UplinkRaster> {
        if self.uplink_125khz.contains(index) {
            Some(&self.uplink_125khz)
        } else if self.uplink_500khz.contains(index) {
            Some(&self.uplink_500khz)
        } else {
            None
        }
    }

    /// Channel index whose raster frequency is `frequency`
    pub fn uplink_index_of(&self, frequency: u32) -> Option<u8> {
        self.uplink_125khz
            .index_of(frequency)
            .or_else(|| self.uplink_500khz.index_of(frequency))
    }
}

/// Supported regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegionKind {
    /// Latin America 915 MHz
    La915,
}

impl RegionKind {
    /// Constant tables of the region
    pub fn params(self) -> &'static RegionParams {
        match self {
            RegionKind::La915 => &super::la915::LA915,
        }
    }
}
