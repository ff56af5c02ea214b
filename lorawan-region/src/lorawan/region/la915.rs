//! LA915 band plan (Latin America, 915-928 MHz)
//!
//! 64 uplink channels of 125 kHz starting at 915.2 MHz, 8 uplink channels of
//! 500 kHz starting at 915.9 MHz and 8 downlink channels of 500 kHz starting
//! at 923.3 MHz.

use core::time::Duration;

use super::params::*;
use crate::radio::traits::Bandwidth::{Khz125, Khz500};

/// Band 0: no duty cycle restriction, full power
const LA915_BANDS: [BandParams; 1] = [BandParams {
    duty_cycle: 1,
    tx_max_power: TX_POWER_0,
}];

const LA915_DR_OFFSETS: [[DataRate; 6]; 7] = [
    [DR_8, DR_8, DR_8, DR_8, DR_8, DR_8],       // DR_0
    [DR_9, DR_8, DR_8, DR_8, DR_8, DR_8],       // DR_1
    [DR_10, DR_9, DR_8, DR_8, DR_8, DR_8],      // DR_2
    [DR_11, DR_10, DR_9, DR_8, DR_8, DR_8],     // DR_3
    [DR_12, DR_11, DR_10, DR_9, DR_8, DR_8],    // DR_4
    [DR_13, DR_12, DR_11, DR_10, DR_9, DR_8],   // DR_5
    [DR_13, DR_13, DR_12, DR_11, DR_10, DR_9],  // DR_6
];

/// LA915 constant tables
pub static LA915: RegionParams = RegionParams {
    name: "LA915",
    max_channels: 72,
    uplink_125khz: UplinkRaster {
        first_index: 0,
        count: 64,
        first_frequency: 915_200_000,
        step: 200_000,
        min_dr: DR_0,
        max_dr: DR_5,
        band: 0,
    },
    uplink_500khz: UplinkRaster {
        first_index: 64,
        count: 8,
        first_frequency: 915_900_000,
        step: 1_600_000,
        min_dr: DR_6,
        max_dr: DR_6,
        band: 0,
    },
    rx1_channels: DownlinkRaster {
        first_frequency: 923_300_000,
        last_frequency: 927_500_000,
        step: 600_000,
    },
    tx_min_dr: DR_0,
    tx_max_dr: DR_5,
    rx_min_dr: DR_8,
    rx_max_dr: DR_13,
    default_dr: DR_0,
    dwell_limit_dr: DR_2,
    max_rx1_dr_offset: 3,
    default_rx1_dr_offset: 0,
    min_tx_power: TX_POWER_10,
    max_tx_power: TX_POWER_0,
    default_tx_power: TX_POWER_5,
    default_uplink_dwell: false,
    default_downlink_dwell: false,
    default_max_eirp: 30.0,
    default_antenna_gain: 2.15,
    adr_ack_limit: 64,
    adr_ack_delay: 32,
    duty_cycle_enabled: false,
    max_rx_window: Duration::from_millis(1000),
    receive_delay1: Duration::from_millis(5000),
    receive_delay2: Duration::from_millis(6000),
    join_accept_delay1: Duration::from_millis(5000),
    join_accept_delay2: Duration::from_millis(6000),
    max_fcnt_gap: 16384,
    ack_timeout: Duration::from_millis(2000),
    ack_timeout_rnd: Duration::from_millis(1000),
    rx2_frequency: 923_300_000,
    rx2_dr: DR_8,
    beacon: BeaconParams {
        channels: DownlinkRaster {
            first_frequency: 923_300_000,
            last_frequency: 927_500_000,
            step: 600_000,
        },
        nb_channels: 8,
        datarate: DR_10,
        size: 19,
        rfu1_size: 3,
        rfu2_size: 1,
        preamble_len: 10,
    },
    ping_slot_dr: DR_10,
    bands: &LA915_BANDS,
    datarates: [
        lora(12, Khz125),
        lora(11, Khz125),
        lora(10, Khz125),
        lora(9, Khz125),
        lora(8, Khz125),
        lora(7, Khz125),
        lora(8, Khz500),
        None,
        lora(12, Khz500),
        lora(11, Khz500),
        lora(10, Khz500),
        lora(9, Khz500),
        lora(8, Khz500),
        lora(7, Khz500),
        None,
        None,
    ],
    dr_offsets: &LA915_DR_OFFSETS,
    payloads: PayloadTables {
        dwell0: [51, 51, 51, 115, 242, 242, 242, 0, 53, 129, 242, 242, 242, 242, 0, 0],
        dwell0_repeater: [51, 51, 51, 115, 222, 222, 222, 0, 33, 109, 222, 222, 222, 222, 0, 0],
        dwell1: [0, 0, 11, 53, 125, 242, 242, 0, 53, 129, 129, 242, 242, 242, 242, 0],
        dwell1_repeater: [0, 0, 11, 53, 125, 242, 242, 0, 33, 119, 129, 242, 242, 242, 242, 0],
    },
};
