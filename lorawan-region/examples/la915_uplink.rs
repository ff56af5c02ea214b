//! LA915 uplink walk-through
//!
//! Drives the region engine through what a MAC layer would do on a host:
//! - Join attempts alternating between 125 kHz and 500 kHz channels
//! - Applying the CFList of the join accept
//! - A LinkADRReq moving the device to the second sub-band
//! - Periodic uplinks with their RX1/RX2 windows
//! - Saving and restoring the region context
//!
//! Run with `cargo run --example la915_uplink --features std`.

use core::time::Duration;

use lorawan_region::{
    lorawan::{
        nvm::NvmContext,
        region::{
            AlternateDrType, InitType, LinkAdrReqParams, NextChanParams, Region, RxConfigParams,
            RxSlot, SetBandTxDoneParams, TxConfigParams,
        },
    },
    FixedPlan,
};
use rand::rngs::SmallRng;
use rand::SeedableRng;

const JOIN_ATTEMPTS: usize = 9;
const UPLINKS: usize = 5;
const PAYLOAD: &[u8] = b"Hello, LA915!";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut region = FixedPlan::la915();
    let mut rng = SmallRng::seed_from_u64(0x1A_915);
    let mut now = Duration::from_secs(1);

    println!("== join ==");
    for attempt in 1..=JOIN_ATTEMPTS {
        let datarate = region.alternate_dr(0, AlternateDrType::Alternate);
        let next = region.next_channel(&uplink(datarate, now, false), &mut rng)?;
        let tx = region.tx_config(&TxConfigParams {
            channel: next.channel,
            datarate,
            tx_power: 0,
            uplink_dwell: false,
            payload_len: 23,
        })?;
        println!(
            "attempt {}: channel {} at {} Hz DR{} ({} ms on air)",
            attempt,
            next.channel,
            tx.radio.frequency,
            datarate,
            tx.time_on_air.as_millis()
        );
        now += tx.time_on_air;
        region.set_band_tx_done(&SetBandTxDoneParams {
            channel: next.channel,
            is_join_request: true,
            tx_done: now,
            air_time: tx.time_on_air,
        });
        now += Duration::from_secs(10);
    }

    // accepted: CFList restricts the device to channels 8..15 and 65
    let mut cf_list = [0u8; 16];
    cf_list[1] = 0xFF;
    cf_list[8] = 0x02;
    cf_list[15] = 0x01;
    region.apply_cf_list(&cf_list)?;
    println!(
        "enabled channels: {:?}",
        region.enabled_channels().map(|c| c.index).collect::<Vec<_>>()
    );

    println!("== ADR ==");
    let outcome = region.link_adr_req(&LinkAdrReqParams {
        payload: &[0x03, 0x32, 0x00, 0x00, 0x70, 0x03, 0x32, 0x00, 0xFF, 0x01],
        adr_enabled: true,
        uplink_dwell: false,
        current_datarate: 0,
        current_tx_power: 5,
        current_nb_rep: 1,
    });
    println!("LinkADRReq: {:?}", outcome);
    let (datarate, tx_power) = outcome
        .answer()
        .filter(|_| outcome.is_accepted())
        .map_or((0, 5), |ans| (ans.datarate, ans.tx_power));

    println!("== uplinks ==");
    for _ in 0..UPLINKS {
        let next = region.next_channel(&uplink(datarate, now, true), &mut rng)?;
        let tx = region.tx_config(&TxConfigParams {
            channel: next.channel,
            datarate,
            tx_power,
            uplink_dwell: false,
            payload_len: PAYLOAD.len() as u8,
        })?;
        now += tx.time_on_air;
        region.set_band_tx_done(&SetBandTxDoneParams {
            channel: next.channel,
            is_join_request: false,
            tx_done: now,
            air_time: tx.time_on_air,
        });

        let window = region.compute_rx_window_parameters(8, 6, Duration::from_millis(10))?;
        let rx1 = region.rx_config(&RxConfigParams {
            slot: RxSlot::Rx1 {
                channel: next.channel,
                uplink_datarate: datarate,
                dr_offset: 0,
            },
            window_timeout: window.window_timeout,
            continuous: false,
            downlink_dwell: false,
        })?;
        let rx2 = region.rx_config(&RxConfigParams {
            slot: RxSlot::Rx2 {
                frequency: 923_300_000,
                datarate: 8,
            },
            window_timeout: window.window_timeout,
            continuous: false,
            downlink_dwell: false,
        })?;
        println!(
            "uplink on channel {} ({} Hz, {} dBm, {} ms), RX1 {} Hz DR{}, RX2 {} Hz DR{}",
            next.channel,
            tx.radio.frequency,
            tx.radio.power,
            tx.time_on_air.as_millis(),
            rx1.radio.frequency,
            rx1.datarate,
            rx2.radio.frequency,
            rx2.datarate
        );
        now += Duration::from_secs(60);
    }

    println!("== context ==");
    let bytes = region.nvm_context().to_bytes()?;
    println!("context is {} bytes", bytes.len());
    let mut restored = FixedPlan::la915();
    restored.init_defaults(InitType::RestoreContext(NvmContext::from_bytes(&bytes)?));
    println!(
        "restored context matches: {}",
        restored.nvm_context() == region.nvm_context()
    );

    Ok(())
}

fn uplink(datarate: u8, now: Duration, joined: bool) -> NextChanParams {
    NextChanParams {
        aggregated_time_off: Duration::ZERO,
        last_aggregated_tx: Duration::ZERO,
        now,
        datarate,
        joined,
    }
}
