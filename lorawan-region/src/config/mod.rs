//! Engine configuration
//!
//! Runtime settings of the regional engine that are not part of the band
//! plan itself:
//! - Radio wake-up latency used to place receive windows
//! - Maximum EIRP and antenna gain
//! - Repeater compatibility and duty cycle test override

/// Region engine configuration
pub mod region;

pub use region::RegionConfig;
