//! LoRaWAN regional parameters and link adaptation in Rust
//!
//! This crate provides the region-dependent half of a LoRaWAN end-device
//! stack for fixed-channel band plans. It ships the LA915 plan (Latin
//! America, 72 channels) and turns MAC-layer decisions into radio settings.
//!
//! # Features
//! - Channel masks, CFList handling and random channel hopping
//! - LinkADRReq, RXParamSetupReq and DlChannelReq validation
//! - RX window sizing, time-on-air and TX power computation
//! - Band time-off bookkeeping and join back-off
//! - Persistable, versioned region context
//! - Class B beacon and ping slot timing
//! - No unsafe code, no allocation
//!
//! # Example
//! ```
//! use lorawan_region::lorawan::region::{FixedPlan, NextChanParams, Region, TxConfigParams};
//! use core::time::Duration;
//! # use rand_core::{RngCore, impls};
//! # struct Counter(u32);
//! # impl RngCore for Counter {
//! #     fn next_u32(&mut self) -> u32 { self.0 += 1; self.0 }
//! #     fn next_u64(&mut self) -> u64 { impls::next_u64_via_u32(self) }
//! #     fn fill_bytes(&mut self, dest: &mut [u8]) { impls::fill_bytes_via_next(self, dest) }
//! #     fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
//! #         self.fill_bytes(dest);
//! #         Ok(())
//! #     }
//! # }
//! # let mut rng = Counter(0);
//!
//! let mut region = FixedPlan::la915();
//!
//! // Pick a channel for a DR2 uplink
//! let next = region
//!     .next_channel(
//!         &NextChanParams {
//!             aggregated_time_off: Duration::ZERO,
//!             last_aggregated_tx: Duration::ZERO,
//!             now: Duration::from_secs(1),
//!             datarate: 2,
//!             joined: true,
//!         },
//!         &mut rng,
//!     )
//!     .unwrap();
//!
//! // Radio settings for a 20 byte payload
//! let tx = region
//!     .tx_config(&TxConfigParams {
//!         channel: next.channel,
//!         datarate: 2,
//!         tx_power: 5,
//!         uplink_dwell: false,
//!         payload_len: 20,
//!     })
//!     .unwrap();
//! assert_eq!(tx.time_on_air, Duration::from_millis(371));
//! ```

#![warn(missing_docs)]
#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
mod fmt;

/// Class B beacon and ping slot timing
pub mod class_b;

/// Engine configuration
pub mod config;

/// LoRaWAN regional layer
pub mod lorawan;

/// Radio collaborator interface
pub mod radio;

pub use config::RegionConfig;
pub use lorawan::region::{FixedPlan, Region, RegionKind};
