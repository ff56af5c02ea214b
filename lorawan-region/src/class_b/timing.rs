//! Beacon period timing and network time tracking

use core::time::Duration;

/// Seconds between two beacons
pub const BEACON_INTERVAL_SECS: u32 = 128;

/// Beacon period
pub const BEACON_INTERVAL: Duration = Duration::from_secs(BEACON_INTERVAL_SECS as u64);
/// Start of the period kept free for the beacon itself
pub const BEACON_RESERVED: Duration = Duration::from_millis(2_120);
/// End of the period kept free before the next beacon
pub const BEACON_GUARD: Duration = Duration::from_millis(3_000);
/// Part of the period usable by ping slots
pub const BEACON_WINDOW: Duration = Duration::from_millis(122_880);
/// Length of one ping slot
pub const PING_SLOT_WINDOW: Duration = Duration::from_millis(30);

/// GPS epoch offset from Unix epoch (seconds)
pub const GPS_EPOCH_OFFSET: u32 = 315_964_800;

/// Start of the beacon period containing `gps_time` (seconds)
pub fn beacon_period_start(gps_time: u32) -> u32 {
    gps_time - gps_time % BEACON_INTERVAL_SECS
}

/// GPS time of the first beacon strictly after `gps_time`
pub fn next_beacon_time(gps_time: u32) -> u32 {
    beacon_period_start(gps_time).wrapping_add(BEACON_INTERVAL_SECS)
}

/// Whether an offset inside a beacon period falls in the reserved or guard
/// interval, where no ping slot may be opened
pub fn is_beacon_blackout(since_beacon: Duration) -> bool {
    since_beacon < BEACON_RESERVED || since_beacon >= BEACON_INTERVAL - BEACON_GUARD
}

/// Network (GPS) time derived from local time since start-up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkTime {
    /// GPS time minus local time at the last synchronisation
    offset: Option<Duration>,
}

impl NetworkTime {
    /// Create unsynchronised network time
    pub fn new() -> Self {
        Self { offset: None }
    }

    /// Synchronise on a beacon received at `local_time` carrying `gps_time`
    /// seconds
    pub fn update(&mut self, gps_time: u32, local_time: Duration) {
        let gps = Duration::from_secs(u64::from(gps_time));
        self.offset = Some(gps.saturating_sub(local_time));
        trace!("network time synchronised on beacon {}", gps_time);
    }

    /// Whether a beacon has been seen
    pub fn is_synchronized(&self) -> bool {
        self.offset.is_some()
    }

    /// GPS time at `local_time`
    pub fn current_time(&self, local_time: Duration) -> Option<Duration> {
        self.offset.map(|offset| offset + local_time)
    }

    /// Convert GPS seconds to Unix seconds
    pub fn gps_to_unix(gps_time: u32) -> u32 {
        gps_time.wrapping_add(GPS_EPOCH_OFFSET)
    }

    /// Convert Unix seconds to GPS seconds
    pub fn unix_to_gps(unix_time: u32) -> u32 {
        unix_time.wrapping_sub(GPS_EPOCH_OFFSET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_conversion() {
        let gps_time = 1_234_567_890;
        let unix_time = NetworkTime::gps_to_unix(gps_time);
        assert_eq!(NetworkTime::unix_to_gps(unix_time), gps_time);
    }

    #[test]
    fn test_beacon_period() {
        assert_eq!(beacon_period_start(1_000), 896);
        assert_eq!(next_beacon_time(1_000), 1_024);
        assert_eq!(next_beacon_time(1_024), 1_152);
        assert_eq!(BEACON_RESERVED + BEACON_WINDOW + BEACON_GUARD, BEACON_INTERVAL);
    }

    #[test]
    fn test_blackout() {
        assert!(is_beacon_blackout(Duration::from_millis(100)));
        assert!(!is_beacon_blackout(BEACON_RESERVED));
        assert!(is_beacon_blackout(Duration::from_millis(125_500)));
    }

    #[test]
    fn test_network_time_follows_local_clock() {
        let mut time = NetworkTime::new();
        assert!(time.current_time(Duration::from_secs(1)).is_none());

        time.update(1_280, Duration::from_secs(10));
        assert!(time.is_synchronized());
        assert_eq!(
            time.current_time(Duration::from_secs(15)),
            Some(Duration::from_secs(1_285))
        );
    }
}
