//! Band time-off bookkeeping
//!
//! All timestamps are durations since device start-up, supplied by the
//! caller.

use core::time::Duration;

use super::region::params::{BandParams, TxPower};

const ONE_HOUR: Duration = Duration::from_secs(3_600);
const ELEVEN_HOURS: Duration = Duration::from_secs(11 * 3_600);

/// Join duty cycle during the first hour after start-up
pub const JOIN_DUTY_CYCLE_FIRST_HOUR: u16 = 100;
/// Join duty cycle for the next ten hours
pub const JOIN_DUTY_CYCLE_FIRST_DAY: u16 = 1_000;
/// Join duty cycle once eleven hours have passed
pub const JOIN_DUTY_CYCLE_AFTER: u16 = 10_000;

/// Sub-band sharing one duty cycle budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    /// Duty cycle expressed as `1 / duty_cycle`
    pub duty_cycle: u16,
    /// Highest TX power index allowed
    pub tx_max_power: TxPower,
    /// End of the last join request
    pub last_join_tx_done: Duration,
    /// End of the last transmission
    pub last_tx_done: Duration,
    /// Time the band stays blocked after the last transmission
    pub time_off: Duration,
}

impl Band {
    /// Fresh band from its constant definition
    pub fn new(params: &BandParams) -> Self {
        Self {
            duty_cycle: params.duty_cycle,
            tx_max_power: params.tx_max_power,
            last_join_tx_done: Duration::ZERO,
            last_tx_done: Duration::ZERO,
            time_off: Duration::ZERO,
        }
    }

    /// Record the end of a transmission on this band
    pub fn record_tx_done(
        &mut self,
        is_join_request: bool,
        tx_done: Duration,
        air_time: Duration,
        duty_cycle_enabled: bool,
    ) {
        if is_join_request {
            self.last_join_tx_done = tx_done;
        }
        self.last_tx_done = tx_done;

        self.time_off = if duty_cycle_enabled {
            off_time(air_time, self.duty_cycle)
        } else {
            Duration::ZERO
        };
    }

    /// Recompute the time-off after a transmission of `air_time`
    pub fn back_off(
        &mut self,
        joined: bool,
        duty_cycle_enabled: bool,
        since_startup: Duration,
        air_time: Duration,
    ) {
        self.time_off = match (duty_cycle_enabled, joined) {
            (false, _) => Duration::ZERO,
            (true, true) => off_time(air_time, self.duty_cycle),
            (true, false) => {
                let factor = self.duty_cycle.max(join_duty_cycle(since_startup));
                off_time(air_time, factor)
            }
        };
    }

    /// Clear an expired time-off and return what is left of it
    pub fn refresh(&mut self, joined: bool, duty_cycle_enabled: bool, now: Duration) -> Duration {
        if !duty_cycle_enabled {
            self.time_off = Duration::ZERO;
            return Duration::ZERO;
        }

        let reference = if joined {
            self.last_tx_done
        } else {
            self.last_join_tx_done.max(self.last_tx_done)
        };
        let elapsed = now.saturating_sub(reference);
        if self.time_off <= elapsed {
            self.time_off = Duration::ZERO;
        }
        self.time_off.saturating_sub(elapsed)
    }

    /// Whether the band can transmit right now
    pub fn is_free(&self) -> bool {
        self.time_off.is_zero()
    }
}

/// Join request duty cycle factor for the time elapsed since start-up
pub fn join_duty_cycle(since_startup: Duration) -> u16 {
    if since_startup < ONE_HOUR {
        JOIN_DUTY_CYCLE_FIRST_HOUR
    } else if since_startup < ELEVEN_HOURS {
        JOIN_DUTY_CYCLE_FIRST_DAY
    } else {
        JOIN_DUTY_CYCLE_AFTER
    }
}

/// Refresh every band and return the shortest remaining time-off of the
/// blocked ones, or `None` when none is blocked
pub fn refresh_bands(
    bands: &mut [Band],
    joined: bool,
    duty_cycle_enabled: bool,
    now: Duration,
) -> Option<Duration> {
    bands
        .iter_mut()
        .map(|band| band.refresh(joined, duty_cycle_enabled, now))
        .filter(|left| !left.is_zero())
        .min()
}

fn off_time(air_time: Duration, duty_cycle: u16) -> Duration {
    air_time * u32::from(duty_cycle.saturating_sub(1))
}
