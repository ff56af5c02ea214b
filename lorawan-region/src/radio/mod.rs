//! Radio collaborator interface
//!
//! The engine never drives a transceiver itself; it produces the values in
//! [`traits`] and a driver implementing [`Radio`] applies them.

pub mod traits;

pub use traits::{Bandwidth, ContinuousWave, ModulationParams, Radio, RxConfig, TxConfig};
