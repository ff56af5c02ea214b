//! PHY timing helpers
//!
//! Symbol durations, time-on-air, receive window sizing and conducted power.
//! Everything is computed with integer arithmetic in microseconds.

use core::time::Duration;

use super::region::params::{DataRate, TxPower};
use crate::radio::traits::ModulationParams;

/// Preamble length of LoRaWAN data frames
pub const DEFAULT_PREAMBLE_LEN: u16 = 8;

/// Coding rate denominator used for every LoRaWAN frame (4/5)
pub const LORA_CODING_RATE: u8 = 5;

/// MHDR + FHDR + FPort + MIC added on top of the application payload
pub const MAC_FRAME_OVERHEAD: u8 = 13;

/// Watchdog handed to the radio with every transmission
pub const TX_TIMEOUT: Duration = Duration::from_millis(4_000);

/// Symbol durations above this need low data rate optimisation
const LDRO_SYMBOL_TIME_US: u64 = 16_000;

/// Receive window computed for a data rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxWindowParams {
    /// Data rate the window is opened with
    pub datarate: DataRate,
    /// Window length in symbols
    pub window_timeout: u16,
    /// Offset in milliseconds to add to the nominal window start
    pub window_offset: i32,
}

/// Symbol duration in microseconds
pub fn symbol_time_us(modulation: &ModulationParams) -> u64 {
    (1u64 << modulation.spreading_factor) * 1_000_000 / u64::from(modulation.bandwidth.hz())
}

/// Whether the modem must run with low data rate optimisation
pub fn low_datarate_optimize(modulation: &ModulationParams) -> bool {
    symbol_time_us(modulation) >= LDRO_SYMBOL_TIME_US
}

/// Time-on-air of a LoRa frame, rounded up to whole milliseconds
///
/// `T = (preamble + 4.25) * Tsym + (8 + max(ceil((8PL - 4SF + 28 + 16CRC - 20IH)
/// / (4(SF - 2DE))) * (CR + 4), 0)) * Tsym`
///
/// The sum is accumulated in quarter symbols so the 4.25 symbol sync word
/// stays exact.
pub fn time_on_air(
    modulation: &ModulationParams,
    preamble_len: u16,
    payload_len: u8,
    explicit_header: bool,
    crc_on: bool,
) -> Duration {
    let sf = i64::from(modulation.spreading_factor);
    let de = i64::from(low_datarate_optimize(modulation));
    let ih = i64::from(!explicit_header);
    let crc = i64::from(crc_on);
    let cr = i64::from(modulation.coding_rate.saturating_sub(4));

    let numerator = 8 * i64::from(payload_len) - 4 * sf + 28 + 16 * crc - 20 * ih;
    let denominator = 4 * (sf - 2 * de);
    let payload_symbols = 8 + ceil_div(numerator, denominator).max(0) * (cr + 4);

    let quarter_symbols = (4 * i64::from(preamble_len) + 17 + 4 * payload_symbols) as u64;
    let scaled = quarter_symbols * (1u64 << sf) * 1_000;
    let per_ms = 4 * u64::from(modulation.bandwidth.hz());
    Duration::from_millis((scaled + per_ms - 1) / per_ms)
}

/// Size and placement of a receive window
///
/// The window is long enough to see `min_rx_symbols` preamble symbols even
/// when the wake-up drifts by `rx_error` in either direction, and it is
/// centred on the expected preamble arrival.
pub fn rx_window(
    modulation: &ModulationParams,
    datarate: DataRate,
    min_rx_symbols: u8,
    rx_error: Duration,
    wakeup_time: Duration,
) -> RxWindowParams {
    let t_sym = symbol_time_us(modulation) as i64;
    let min_rx = i64::from(min_rx_symbols);
    let drift = 2 * rx_error.as_micros() as i64;

    let timeout = (ceil_div(drift, t_sym) + min_rx).max(min_rx);
    let offset_us = 4 * t_sym - timeout * t_sym / 2 - wakeup_time.as_micros() as i64;

    RxWindowParams {
        datarate,
        window_timeout: timeout.min(i64::from(u16::MAX)) as u16,
        window_offset: ceil_div(offset_us, 1_000) as i32,
    }
}

/// Conducted power in dBm for a power index
///
/// `floor(max_eirp - 2 * index - antenna_gain)`
pub fn phy_tx_power(tx_power: TxPower, max_eirp: f32, antenna_gain: f32) -> i8 {
    let dbm = max_eirp - 2.0 * f32::from(tx_power) - antenna_gain;
    let truncated = dbm as i32;
    let floored = if truncated as f32 > dbm {
        truncated - 1
    } else {
        truncated
    };
    floored.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8
}

fn ceil_div(numerator: i64, denominator: i64) -> i64 {
    let quotient = numerator / denominator;
    if numerator % denominator > 0 {
        quotient + 1
    } else {
        quotient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::traits::Bandwidth;

    fn lora(spreading_factor: u8, bandwidth: Bandwidth) -> ModulationParams {
        ModulationParams {
            spreading_factor,
            bandwidth,
            coding_rate: LORA_CODING_RATE,
        }
    }

    #[test]
    fn test_symbol_time() {
        assert_eq!(symbol_time_us(&lora(7, Bandwidth::Khz125)), 1_024);
        assert_eq!(symbol_time_us(&lora(12, Bandwidth::Khz500)), 8_192);
        assert!(low_datarate_optimize(&lora(11, Bandwidth::Khz125)));
        assert!(!low_datarate_optimize(&lora(10, Bandwidth::Khz125)));
        assert!(!low_datarate_optimize(&lora(12, Bandwidth::Khz500)));
    }

    #[test]
    fn test_time_on_air() {
        let toa = time_on_air(&lora(10, Bandwidth::Khz125), 8, 20, true, true);
        assert_eq!(toa, Duration::from_millis(371));

        let toa = time_on_air(&lora(7, Bandwidth::Khz125), 8, 51, true, true);
        assert_eq!(toa, Duration::from_millis(103));

        // low data rate optimisation kicks in
        let toa = time_on_air(&lora(12, Bandwidth::Khz125), 8, 10, true, true);
        assert_eq!(toa, Duration::from_millis(992));
    }

    #[test]
    fn test_rx_window() {
        let window = rx_window(
            &lora(12, Bandwidth::Khz500),
            8,
            6,
            Duration::from_millis(10),
            Duration::from_millis(1),
        );
        assert_eq!(window.window_timeout, 9);
        assert_eq!(window.window_offset, -5);

        let window = rx_window(
            &lora(7, Bandwidth::Khz500),
            13,
            6,
            Duration::from_millis(10),
            Duration::from_millis(1),
        );
        assert_eq!(window.window_timeout, 85);
        assert_eq!(window.window_offset, -10);
    }

    #[test]
    fn test_rx_window_without_drift() {
        let window = rx_window(
            &lora(12, Bandwidth::Khz500),
            8,
            8,
            Duration::ZERO,
            Duration::ZERO,
        );
        assert_eq!(window.window_timeout, 8);
        // 4 * 8.192 - 8 * 8.192 / 2 = 0
        assert_eq!(window.window_offset, 0);
    }

    #[test]
    fn test_phy_tx_power() {
        assert_eq!(phy_tx_power(0, 30.0, 2.15), 27);
        assert_eq!(phy_tx_power(5, 30.0, 2.15), 17);
        assert_eq!(phy_tx_power(10, 30.0, 2.15), 7);
        assert_eq!(phy_tx_power(10, 10.0, 2.15), -13);
        assert_eq!(phy_tx_power(0, 14.0, 0.0), 14);
    }
}
