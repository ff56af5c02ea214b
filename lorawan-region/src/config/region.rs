use core::time::Duration;

use crate::lorawan::region::params::{RegionKind, RegionParams};

/// Default radio wake-up latency
pub const DEFAULT_RADIO_WAKEUP_TIME: Duration = Duration::from_millis(1);

/// Region engine configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionConfig {
    /// Region whose tables are used
    pub kind: RegionKind,
    /// Time the radio needs between being armed and listening
    pub radio_wakeup_time: Duration,
    /// Maximum EIRP in dBm
    pub max_eirp: f32,
    /// Antenna gain in dBi
    pub antenna_gain: f32,
    /// Restrict payloads so a repeater can forward them
    pub repeater_support: bool,
    /// Force duty cycle enforcement on or off (certification test mode)
    pub duty_cycle_override: Option<bool>,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self::new(RegionKind::La915)
    }
}

impl RegionConfig {
    /// Configuration with the region's defaults
    pub fn new(kind: RegionKind) -> Self {
        let params = kind.params();
        Self {
            kind,
            radio_wakeup_time: DEFAULT_RADIO_WAKEUP_TIME,
            max_eirp: params.default_max_eirp,
            antenna_gain: params.default_antenna_gain,
            repeater_support: false,
            duty_cycle_override: None,
        }
    }

    /// Set the radio wake-up latency
    pub fn with_radio_wakeup_time(mut self, wakeup: Duration) -> Self {
        self.radio_wakeup_time = wakeup;
        self
    }

    /// Set the maximum EIRP and antenna gain
    pub fn with_eirp(mut self, max_eirp: f32, antenna_gain: f32) -> Self {
        self.max_eirp = max_eirp;
        self.antenna_gain = antenna_gain;
        self
    }

    /// Enable repeater compatible payload sizes
    pub fn with_repeater_support(mut self, enabled: bool) -> Self {
        self.repeater_support = enabled;
        self
    }

    /// Override the region's duty cycle setting
    pub fn with_duty_cycle(mut self, enabled: bool) -> Self {
        self.duty_cycle_override = Some(enabled);
        self
    }

    /// Constant tables of the configured region
    pub fn params(&self) -> &'static RegionParams {
        self.kind.params()
    }

    /// Whether duty cycle restrictions apply
    pub fn duty_cycle_enabled(&self) -> bool {
        self.duty_cycle_override
            .unwrap_or(self.params().duty_cycle_enabled)
    }
}
