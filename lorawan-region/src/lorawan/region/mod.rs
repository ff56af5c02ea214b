//! Regional parameters
//!
//! [`Region`] is the interface the MAC layer drives. [`FixedPlan`] implements
//! it for fixed-channel band plans described by a [`RegionParams`] table;
//! [`la915::LA915`] is the table shipped with this crate.

use core::fmt;
use core::time::Duration;

use rand_core::RngCore;

use super::channels::{CfListError, ChannelMask};
use super::commands::{
    CommandOutcome, DlChannelStatus, LinkAdrAns, NewChannelStatus, RxParamSetupStatus,
};
use super::nvm::NvmContext;
use super::phy::RxWindowParams;
use crate::class_b::beacon::BeaconFormat;
use crate::radio::traits::{Bandwidth, ContinuousWave, RxConfig, TxConfig};

pub mod fixed_plan;
pub mod la915;
pub mod params;

pub use fixed_plan::FixedPlan;
pub use params::{DataRate, RegionKind, RegionParams, TxPower};

/// Validation failures reported by the region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegionError {
    /// CFList payload is not 16 bytes
    InvalidCfListLength(usize),
    /// CFList type byte is unknown
    InvalidCfListType(u8),
    /// Frequency is not usable in this region
    InvalidFrequency(u32),
    /// Data rate is not usable for the request
    InvalidDatarate(DataRate),
    /// Channel index does not exist
    InvalidChannel(u8),
    /// Channel exists but is masked out
    ChannelDisabled(u8),
    /// Payload does not fit the data rate
    PayloadTooLong {
        /// Requested length
        len: u8,
        /// Largest allowed length
        max: u8,
    },
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionError::InvalidCfListLength(len) => write!(f, "CFList of {} bytes", len),
            RegionError::InvalidCfListType(kind) => write!(f, "unknown CFList type {}", kind),
            RegionError::InvalidFrequency(freq) => write!(f, "frequency {} Hz not allowed", freq),
            RegionError::InvalidDatarate(dr) => write!(f, "data rate DR{} not allowed", dr),
            RegionError::InvalidChannel(ch) => write!(f, "no channel {}", ch),
            RegionError::ChannelDisabled(ch) => write!(f, "channel {} is disabled", ch),
            RegionError::PayloadTooLong { len, max } => {
                write!(f, "payload of {} bytes exceeds {}", len, max)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RegionError {}

impl From<CfListError> for RegionError {
    fn from(err: CfListError) -> Self {
        match err {
            CfListError::InvalidLength(len) => RegionError::InvalidCfListLength(len),
            CfListError::InvalidType(kind) => RegionError::InvalidCfListType(kind),
        }
    }
}

/// Physical layer attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhyAttribute {
    /// Lowest downlink data rate for the dwell setting
    MinRxDr,
    /// Lowest uplink data rate for the dwell setting
    MinTxDr,
    /// Highest downlink data rate
    MaxRxDr,
    /// Highest uplink data rate
    MaxTxDr,
    /// Uplink data rate
    TxDr,
    /// Default uplink data rate
    DefTxDr,
    /// Downlink data rate
    RxDr,
    /// Next lower uplink data rate an enabled channel supports
    NextLowerTxDr,
    /// Strongest TX power index
    MaxTxPower,
    /// TX power index
    TxPower,
    /// Default TX power index
    DefTxPower,
    /// ADR ACK limit
    DefAdrAckLimit,
    /// ADR ACK delay
    DefAdrAckDelay,
    /// Maximum application payload
    MaxPayload,
    /// Maximum application payload behind a repeater
    MaxPayloadRepeater,
    /// Duty cycle enforcement
    DutyCycle,
    /// Longest receive window
    MaxRxWindow,
    /// RX1 delay
    ReceiveDelay1,
    /// RX2 delay
    ReceiveDelay2,
    /// Join accept RX1 delay
    JoinAcceptDelay1,
    /// Join accept RX2 delay
    JoinAcceptDelay2,
    /// Maximum frame counter gap
    MaxFcntGap,
    /// ACK timeout
    AckTimeout,
    /// Random spread of the ACK timeout
    AckTimeoutRnd,
    /// Default RX1 data rate offset
    DefDr1Offset,
    /// Default RX2 frequency
    DefRx2Frequency,
    /// Default RX2 data rate
    DefRx2Dr,
    /// Active channel mask
    ChannelsMask,
    /// Default channel mask
    ChannelsDefaultMask,
    /// Number of channels
    MaxNbChannels,
    /// Default uplink dwell time
    DefUplinkDwellTime,
    /// Default downlink dwell time
    DefDownlinkDwellTime,
    /// Default maximum EIRP
    DefMaxEirp,
    /// Default antenna gain
    DefAntennaGain,
    /// Join trials
    NbJoinTrials,
    /// Default join trials
    DefNbJoinTrials,
    /// Beacon period
    BeaconInterval,
    /// Beacon reserved interval
    BeaconReserved,
    /// Beacon guard interval
    BeaconGuard,
    /// Beacon window
    BeaconWindow,
    /// Ping slot length
    PingSlotWindow,
    /// Beacon frequency for a beacon time
    BeaconChannelFreq,
    /// Beacon frame geometry
    BeaconFormat,
    /// Beacon data rate
    BeaconChannelDr,
    /// Number of beacon channels
    BeaconNbChannels,
    /// Ping slot frequency for a beacon time and device address
    PingSlotChannelFreq,
    /// Ping slot data rate
    PingSlotChannelDr,
    /// Spreading factor of a data rate
    SfFromDr,
    /// Bandwidth of a data rate
    BwFromDr,
}

/// Inputs of [`Region::get_phy_param`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetPhyParams {
    /// Attribute to read
    pub attribute: PhyAttribute,
    /// Data rate the attribute depends on
    pub datarate: DataRate,
    /// Uplink dwell time in force
    pub uplink_dwell: bool,
    /// Downlink dwell time in force
    pub downlink_dwell: bool,
    /// GPS time of the beacon period, in seconds
    pub beacon_time: u32,
    /// Device address
    pub dev_addr: u32,
}

impl GetPhyParams {
    /// Request for `attribute` with every other input zeroed
    pub fn new(attribute: PhyAttribute) -> Self {
        Self {
            attribute,
            datarate: 0,
            uplink_dwell: false,
            downlink_dwell: false,
            beacon_time: 0,
            dev_addr: 0,
        }
    }

    /// Set the data rate input
    pub fn datarate(mut self, datarate: DataRate) -> Self {
        self.datarate = datarate;
        self
    }

    /// Set the dwell time inputs
    pub fn dwell(mut self, uplink: bool, downlink: bool) -> Self {
        self.uplink_dwell = uplink;
        self.downlink_dwell = downlink;
        self
    }

    /// Set the Class B inputs
    pub fn class_b(mut self, beacon_time: u32, dev_addr: u32) -> Self {
        self.beacon_time = beacon_time;
        self.dev_addr = dev_addr;
        self
    }
}

/// Value of a physical layer attribute
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhyParam {
    /// Data rate index
    Datarate(DataRate),
    /// TX power index
    TxPower(TxPower),
    /// Plain number
    Value(u32),
    /// Time span
    Duration(Duration),
    /// Frequency in Hz
    Frequency(u32),
    /// Flag
    Enabled(bool),
    /// dBm or dBi
    Decibels(f32),
    /// Channel mask
    ChannelsMask(ChannelMask),
    /// Beacon frame geometry
    BeaconFormat(BeaconFormat),
    /// Spreading factor
    SpreadingFactor(u8),
    /// Bandwidth
    Bandwidth(Bandwidth),
    /// Attribute has no value for the given inputs
    Unsupported,
}

/// Value checked by [`Region::verify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VerifyValue {
    /// Data rate index
    Datarate(DataRate),
    /// TX power index
    TxPower(TxPower),
    /// Duty cycle setting
    DutyCycle(bool),
    /// Number of join trials
    NbJoinTrials(u8),
}

/// Inputs of [`Region::verify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyParams {
    /// Value to check
    pub value: VerifyValue,
    /// Uplink dwell time in force
    pub uplink_dwell: bool,
    /// Downlink dwell time in force
    pub downlink_dwell: bool,
}

impl VerifyParams {
    /// Check `value` with no dwell time limit
    pub fn new(value: VerifyValue) -> Self {
        Self {
            value,
            uplink_dwell: false,
            downlink_dwell: false,
        }
    }
}

/// Initialization requested through [`Region::init_defaults`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitType {
    /// Reset everything to the region defaults
    Defaults,
    /// Replace the state with a persisted context
    RestoreContext(NvmContext),
    /// Reactivate the default channel mask
    RestoreDefaultChannels,
}

/// Inputs of [`Region::set_band_tx_done`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetBandTxDoneParams {
    /// Channel used for the transmission
    pub channel: u8,
    /// The transmission was a join request
    pub is_join_request: bool,
    /// End of the transmission, since start-up
    pub tx_done: Duration,
    /// Time-on-air of the transmission
    pub air_time: Duration,
}

/// Which stored mask [`Region::chan_mask_set`] replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelsMaskType {
    /// Mask in use
    Active,
    /// Mask restored by `InitType::RestoreDefaultChannels`
    Default,
}

/// Inputs of [`Region::chan_mask_set`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChanMaskSetParams {
    /// New mask
    pub mask: ChannelMask,
    /// Mask to replace
    pub mask_type: ChannelsMaskType,
    /// Uplink dwell time in force
    pub uplink_dwell: bool,
}

/// Receive slot to configure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxSlot {
    /// First window, derived from the uplink
    Rx1 {
        /// Uplink channel
        channel: u8,
        /// Uplink data rate
        uplink_datarate: DataRate,
        /// RX1 data rate offset
        dr_offset: u8,
    },
    /// Second window or Class B/C reception on explicit parameters
    Rx2 {
        /// Frequency in Hz
        frequency: u32,
        /// Data rate
        datarate: DataRate,
    },
}

/// Inputs of [`Region::rx_config`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxConfigParams {
    /// Slot to open
    pub slot: RxSlot,
    /// Window length in symbols, from [`Region::compute_rx_window_parameters`]
    pub window_timeout: u16,
    /// Keep listening (Class C)
    pub continuous: bool,
    /// Downlink dwell time in force
    pub downlink_dwell: bool,
}

/// Receive configuration produced by [`Region::rx_config`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxConfigured {
    /// Data rate the window uses
    pub datarate: DataRate,
    /// Radio settings
    pub radio: RxConfig,
}

/// Inputs of [`Region::tx_config`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxConfigParams {
    /// Channel to transmit on
    pub channel: u8,
    /// Data rate
    pub datarate: DataRate,
    /// Requested TX power index
    pub tx_power: TxPower,
    /// Uplink dwell time in force
    pub uplink_dwell: bool,
    /// Payload length in bytes
    pub payload_len: u8,
}

/// Transmission configuration produced by [`Region::tx_config`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxConfigured {
    /// TX power index actually used
    pub tx_power: TxPower,
    /// Time-on-air of the frame
    pub time_on_air: Duration,
    /// Radio settings
    pub radio: TxConfig,
}

/// Inputs of [`Region::link_adr_req`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkAdrReqParams<'a> {
    /// MAC command stream starting at the first LinkADRReq CID
    pub payload: &'a [u8],
    /// ADR enabled on the device
    pub adr_enabled: bool,
    /// Uplink dwell time in force
    pub uplink_dwell: bool,
    /// Data rate in use
    pub current_datarate: DataRate,
    /// TX power index in use
    pub current_tx_power: TxPower,
    /// Repetitions in use
    pub current_nb_rep: u8,
}

/// Inputs of [`Region::rx_param_setup_req`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxParamSetupReqParams {
    /// RX1 data rate offset
    pub dr_offset: u8,
    /// RX2 data rate
    pub datarate: DataRate,
    /// RX2 frequency in Hz
    pub frequency: u32,
}

/// Inputs of [`Region::new_channel_req`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewChannelReqParams {
    /// Channel index
    pub channel_id: u8,
    /// Frequency in Hz, zero to remove
    pub frequency: u32,
    /// Lowest data rate
    pub min_dr: DataRate,
    /// Highest data rate
    pub max_dr: DataRate,
}

/// Inputs of [`Region::tx_param_setup_req`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxParamSetupReqParams {
    /// Uplink dwell time requested
    pub uplink_dwell: bool,
    /// Downlink dwell time requested
    pub downlink_dwell: bool,
    /// Encoded maximum EIRP
    pub max_eirp: u8,
}

/// Inputs of [`Region::dl_channel_req`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DlChannelReqParams {
    /// Uplink channel whose RX1 frequency changes
    pub channel_id: u8,
    /// New RX1 frequency in Hz
    pub rx1_frequency: u32,
}

/// Direction of [`Region::alternate_dr`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlternateDrType {
    /// A new join request is about to be sent
    Alternate,
    /// Undo the last alternation
    Restore,
}

/// Inputs of [`Region::calc_back_off`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalcBackOffParams {
    /// Channel used for the last transmission
    pub channel: u8,
    /// Device has joined
    pub joined: bool,
    /// Time since start-up
    pub since_startup: Duration,
    /// Time-on-air of the last transmission
    pub tx_time_on_air: Duration,
}

/// Inputs of [`Region::next_channel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextChanParams {
    /// Aggregated time-off imposed by the MAC layer
    pub aggregated_time_off: Duration,
    /// End of the last transmission, since start-up
    pub last_aggregated_tx: Duration,
    /// Current time, since start-up
    pub now: Duration,
    /// Data rate of the next uplink
    pub datarate: DataRate,
    /// Device has joined
    pub joined: bool,
}

/// Channel picked by [`Region::next_channel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextChannel {
    /// Channel index
    pub channel: u8,
    /// Delay before the channel may be used
    pub wait: Duration,
    /// Aggregated time-off the MAC layer should keep
    pub aggregated_time_off: Duration,
}

/// Why no channel could be picked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextChannelError {
    /// Channels exist but all of them are blocked for this long
    DutyCycleRestricted(Duration),
    /// No enabled channel supports the data rate
    NoChannelFound,
}

impl fmt::Display for NextChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextChannelError::DutyCycleRestricted(wait) => {
                write!(f, "duty cycle restricted for {} ms", wait.as_millis())
            }
            NextChannelError::NoChannelFound => f.write_str("no channel found"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for NextChannelError {}

/// Inputs of [`Region::set_continuous_wave`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContinuousWaveParams {
    /// Channel to emit on
    pub channel: u8,
    /// Data rate, used to validate the channel
    pub datarate: DataRate,
    /// TX power index
    pub tx_power: TxPower,
    /// Maximum EIRP in dBm
    pub max_eirp: f32,
    /// Antenna gain in dBi
    pub antenna_gain: f32,
    /// Emission length
    pub timeout: Duration,
}

/// Inputs of [`Region::rx_beacon_setup`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxBeaconSetupParams {
    /// GPS time of the expected beacon, in seconds
    pub beacon_time: u32,
    /// Window length in symbols
    pub symbol_timeout: u16,
    /// Reception length, zero to listen until stopped
    pub rx_time: Duration,
}

/// Generic region trait
pub trait Region {
    /// Read a physical layer attribute
    fn get_phy_param(&self, request: &GetPhyParams) -> PhyParam;

    /// Record the end of a transmission on the channel's band
    fn set_band_tx_done(&mut self, params: &SetBandTxDoneParams);

    /// Reset or restore the region state
    fn init_defaults(&mut self, init: InitType);

    /// State to persist
    fn nvm_context(&self) -> &NvmContext;

    /// Check a value against an attribute's valid range
    fn verify(&self, params: &VerifyParams, attribute: PhyAttribute) -> bool;

    /// Apply the CFList of a join accept
    fn apply_cf_list(&mut self, payload: &[u8]) -> Result<(), RegionError>;

    /// Replace the active or default channel mask
    fn chan_mask_set(&mut self, params: &ChanMaskSetParams) -> bool;

    /// Receive window length and offset for a data rate
    fn compute_rx_window_parameters(
        &self,
        datarate: DataRate,
        min_rx_symbols: u8,
        rx_error: Duration,
    ) -> Result<RxWindowParams, RegionError>;

    /// Radio settings for a receive window
    fn rx_config(&self, params: &RxConfigParams) -> Result<RxConfigured, RegionError>;

    /// Radio settings and time-on-air for an uplink
    fn tx_config(&self, params: &TxConfigParams) -> Result<TxConfigured, RegionError>;

    /// Handle one or more LinkADRReq commands
    fn link_adr_req(&mut self, params: &LinkAdrReqParams<'_>) -> CommandOutcome<LinkAdrAns>;

    /// Validate a RXParamSetupReq
    fn rx_param_setup_req(&self, params: &RxParamSetupReqParams)
        -> CommandOutcome<RxParamSetupStatus>;

    /// Handle a NewChannelReq
    fn new_channel_req(&mut self, params: &NewChannelReqParams) -> CommandOutcome<NewChannelStatus>;

    /// Handle a TxParamSetupReq
    fn tx_param_setup_req(&mut self, params: &TxParamSetupReqParams) -> CommandOutcome<()>;

    /// Handle a DlChannelReq
    fn dl_channel_req(&mut self, params: &DlChannelReqParams) -> CommandOutcome<DlChannelStatus>;

    /// Data rate of the next join request
    fn alternate_dr(&mut self, current_dr: DataRate, kind: AlternateDrType) -> DataRate;

    /// Update band time-off after a transmission and return the aggregated
    /// time-off
    fn calc_back_off(&mut self, params: &CalcBackOffParams) -> Duration;

    /// Pick the channel of the next uplink
    fn next_channel<R: RngCore>(
        &mut self,
        params: &NextChanParams,
        rng: &mut R,
    ) -> Result<NextChannel, NextChannelError>;

    /// Add a channel
    fn channel_add(&mut self, params: &NewChannelReqParams) -> CommandOutcome<()>;

    /// Remove a channel
    fn channels_remove(&mut self, channel: u8) -> CommandOutcome<()>;

    /// Continuous wave emission settings
    fn set_continuous_wave(
        &self,
        params: &ContinuousWaveParams,
    ) -> Result<ContinuousWave, RegionError>;

    /// RX1 data rate for an uplink data rate and offset
    fn apply_dr_offset(&self, downlink_dwell: bool, datarate: DataRate, offset: u8) -> DataRate;

    /// Radio settings for a beacon reception
    fn rx_beacon_setup(&self, params: &RxBeaconSetupParams) -> Result<RxConfigured, RegionError>;
}
