//! Region-specific MAC commands
//!
//! Decoding of the downlink requests a region must validate, the answer
//! status bits, and the tagged outcome returned by every command handler.

use bitflags::bitflags;

use super::region::params::{DataRate, TxPower};
use super::region::{
    DlChannelReqParams, NewChannelReqParams, RxParamSetupReqParams, TxParamSetupReqParams,
};

/// MAC command identifiers handled by the region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommandIdentifier {
    LinkADRReq = 0x03,
    RXParamSetupReq = 0x05,
    NewChannelReq = 0x07,
    TxParamSetupReq = 0x09,
    DlChannelReq = 0x0A,
}

impl CommandIdentifier {
    /// Identifier from its CID byte
    pub fn from_cid(cid: u8) -> Option<Self> {
        match cid {
            0x03 => Some(Self::LinkADRReq),
            0x05 => Some(Self::RXParamSetupReq),
            0x07 => Some(Self::NewChannelReq),
            0x09 => Some(Self::TxParamSetupReq),
            0x0A => Some(Self::DlChannelReq),
            _ => None,
        }
    }
}

bitflags! {
    /// LinkADRAns status bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LinkAdrStatus: u8 {
        const CHANNEL_MASK_ACK = 0x01;
        const DATARATE_ACK = 0x02;
        const POWER_ACK = 0x04;
    }
}

bitflags! {
    /// RXParamSetupAns status bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RxParamSetupStatus: u8 {
        const CHANNEL_ACK = 0x01;
        const RX2_DATARATE_ACK = 0x02;
        const RX1_DR_OFFSET_ACK = 0x04;
    }
}

bitflags! {
    /// NewChannelAns status bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NewChannelStatus: u8 {
        const CHANNEL_FREQ_OK = 0x01;
        const DATARATE_RANGE_OK = 0x02;
    }
}

bitflags! {
    /// DlChannelAns status bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DlChannelStatus: u8 {
        const CHANNEL_FREQ_OK = 0x01;
        const UPLINK_FREQ_EXISTS = 0x02;
    }
}

/// Result of handing a MAC command to the region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome<T> {
    /// Every check passed and the change was applied
    Accepted(T),
    /// At least one check failed; nothing was applied
    Rejected(T),
    /// The region does not implement this command; ignore it
    NotSupported,
}

impl<T> CommandOutcome<T> {
    /// Answer payload, if the command is supported
    pub fn answer(&self) -> Option<&T> {
        match self {
            CommandOutcome::Accepted(answer) | CommandOutcome::Rejected(answer) => Some(answer),
            CommandOutcome::NotSupported => None,
        }
    }

    /// Whether the command was applied
    pub fn is_accepted(&self) -> bool {
        matches!(self, CommandOutcome::Accepted(_))
    }

    /// Whether the region does not implement the command
    pub fn is_not_supported(&self) -> bool {
        matches!(self, CommandOutcome::NotSupported)
    }
}

/// Answer to one or more consecutive LinkADRReq blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkAdrAns {
    /// Status bits
    pub status: LinkAdrStatus,
    /// Data rate to use from now on
    pub datarate: DataRate,
    /// TX power index to use from now on
    pub tx_power: TxPower,
    /// Number of transmissions per uplink
    pub nb_rep: u8,
    /// Bytes of the command stream consumed
    pub bytes_processed: u8,
}

impl LinkAdrAns {
    /// Encoded LinkADRAns command
    pub fn to_bytes(&self) -> [u8; 2] {
        [0x03, self.status.bits()]
    }
}

/// Size of a LinkADRReq including its CID
pub const LINK_ADR_REQ_SIZE: usize = 5;

/// Decoded MAC request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MacCommand {
    /// Link ADR request
    LinkADRReq {
        /// Data rate
        data_rate: DataRate,
        /// TX power index
        tx_power: TxPower,
        /// Channel mask
        ch_mask: u16,
        /// Channel mask control
        ch_mask_cntl: u8,
        /// Number of transmissions
        nb_rep: u8,
    },
    /// RX parameter setup request
    RXParamSetupReq {
        /// RX1 data rate offset
        rx1_dr_offset: u8,
        /// RX2 data rate
        rx2_data_rate: DataRate,
        /// RX2 frequency in Hz
        frequency: u32,
    },
    /// New channel request
    NewChannelReq {
        /// Channel index
        ch_index: u8,
        /// Frequency in Hz
        frequency: u32,
        /// Maximum data rate
        max_dr: DataRate,
        /// Minimum data rate
        min_dr: DataRate,
    },
    /// TX parameter setup request
    TxParamSetupReq {
        /// Downlink dwell time
        downlink_dwell_time: bool,
        /// Uplink dwell time
        uplink_dwell_time: bool,
        /// Encoded maximum EIRP
        max_eirp: u8,
    },
    /// Downlink channel request
    DlChannelReq {
        /// Channel index
        ch_index: u8,
        /// Frequency in Hz
        frequency: u32,
    },
}

impl MacCommand {
    /// Parse MAC command from bytes
    pub fn from_bytes(cid: u8, payload: &[u8]) -> Option<Self> {
        use CommandIdentifier::*;

        match CommandIdentifier::from_cid(cid)? {
            LinkADRReq if payload.len() >= 4 => Some(MacCommand::LinkADRReq {
                data_rate: payload[0] >> 4,
                tx_power: payload[0] & 0x0F,
                ch_mask: u16::from_le_bytes([payload[1], payload[2]]),
                ch_mask_cntl: (payload[3] >> 4) & 0x07,
                nb_rep: payload[3] & 0x0F,
            }),
            RXParamSetupReq if payload.len() >= 4 => Some(MacCommand::RXParamSetupReq {
                rx1_dr_offset: (payload[0] >> 4) & 0x07,
                rx2_data_rate: payload[0] & 0x0F,
                frequency: frequency_from_bytes(&payload[1..4]),
            }),
            NewChannelReq if payload.len() >= 5 => Some(MacCommand::NewChannelReq {
                ch_index: payload[0],
                frequency: frequency_from_bytes(&payload[1..4]),
                max_dr: payload[4] >> 4,
                min_dr: payload[4] & 0x0F,
            }),
            TxParamSetupReq if !payload.is_empty() => Some(MacCommand::TxParamSetupReq {
                downlink_dwell_time: (payload[0] & 0x20) != 0,
                uplink_dwell_time: (payload[0] & 0x10) != 0,
                max_eirp: payload[0] & 0x0F,
            }),
            DlChannelReq if payload.len() >= 4 => Some(MacCommand::DlChannelReq {
                ch_index: payload[0],
                frequency: frequency_from_bytes(&payload[1..4]),
            }),
            _ => None,
        }
    }

    /// Payload length in bytes, without the CID
    pub fn len(&self) -> usize {
        match self {
            MacCommand::LinkADRReq { .. } => 4,
            MacCommand::RXParamSetupReq { .. } => 4,
            MacCommand::NewChannelReq { .. } => 5,
            MacCommand::TxParamSetupReq { .. } => 1,
            MacCommand::DlChannelReq { .. } => 4,
        }
    }

    /// Commands never have an empty payload
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl TryFrom<MacCommand> for RxParamSetupReqParams {
    type Error = MacCommand;

    fn try_from(cmd: MacCommand) -> Result<Self, Self::Error> {
        match cmd {
            MacCommand::RXParamSetupReq {
                rx1_dr_offset,
                rx2_data_rate,
                frequency,
            } => Ok(Self {
                dr_offset: rx1_dr_offset,
                datarate: rx2_data_rate,
                frequency,
            }),
            other => Err(other),
        }
    }
}

impl TryFrom<MacCommand> for NewChannelReqParams {
    type Error = MacCommand;

    fn try_from(cmd: MacCommand) -> Result<Self, Self::Error> {
        match cmd {
            MacCommand::NewChannelReq {
                ch_index,
                frequency,
                max_dr,
                min_dr,
            } => Ok(Self {
                channel_id: ch_index,
                frequency,
                min_dr,
                max_dr,
            }),
            other => Err(other),
        }
    }
}

impl TryFrom<MacCommand> for TxParamSetupReqParams {
    type Error = MacCommand;

    fn try_from(cmd: MacCommand) -> Result<Self, Self::Error> {
        match cmd {
            MacCommand::TxParamSetupReq {
                downlink_dwell_time,
                uplink_dwell_time,
                max_eirp,
            } => Ok(Self {
                uplink_dwell: uplink_dwell_time,
                downlink_dwell: downlink_dwell_time,
                max_eirp,
            }),
            other => Err(other),
        }
    }
}

impl TryFrom<MacCommand> for DlChannelReqParams {
    type Error = MacCommand;

    fn try_from(cmd: MacCommand) -> Result<Self, Self::Error> {
        match cmd {
            MacCommand::DlChannelReq {
                ch_index,
                frequency,
            } => Ok(Self {
                channel_id: ch_index,
                rx1_frequency: frequency,
            }),
            other => Err(other),
        }
    }
}

/// Split consecutive LinkADRReq blocks off the front of a command stream
///
/// Stops at the first byte that does not start a complete LinkADRReq.
pub fn link_adr_blocks(payload: &[u8]) -> impl Iterator<Item = MacCommand> + '_ {
    payload
        .chunks_exact(LINK_ADR_REQ_SIZE)
        .map_while(|block| match MacCommand::from_bytes(block[0], &block[1..]) {
            Some(cmd @ MacCommand::LinkADRReq { .. }) => Some(cmd),
            _ => None,
        })
}

/// 24-bit little-endian frequency in 100 Hz steps
fn frequency_from_bytes(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]) * 100
}
