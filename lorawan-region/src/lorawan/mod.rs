//! LoRaWAN regional layer
//!
//! This module contains the region-dependent parts of a LoRaWAN stack:
//! - Channel plan, channel masks and CFList decoding
//! - Band time-off bookkeeping
//! - Region-specific MAC command decoding and answers
//! - PHY timing (time-on-air, receive windows, conducted power)
//! - Persisted region context
//! - The [`region::Region`] interface and its fixed-plan implementation

/// Band time-off bookkeeping
pub mod band;

/// Channel plan and channel masks
pub mod channels;

/// MAC command handling
pub mod commands;

/// Persisted region state
pub mod nvm;

/// PHY layer timing
pub mod phy;

/// Regional parameters and configurations
pub mod region;

pub use channels::{CfList, Channel, ChannelMask};
pub use commands::{CommandOutcome, LinkAdrAns, LinkAdrStatus, MacCommand};
pub use nvm::{NvmContext, NvmError};
pub use region::{FixedPlan, Region, RegionError};
