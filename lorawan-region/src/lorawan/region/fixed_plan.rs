//! Fixed channel plan engine
//!
//! Regions like LA915 define their uplink channels as two rasters (a wide
//! block of 125 kHz channels and a small block of 500 kHz channels) and a
//! fixed RX1 downlink raster. Nothing about the plan can be renegotiated
//! except which channels are enabled and where RX1 listens.

use core::time::Duration;

use heapless::Vec;
use rand_core::RngCore;

use super::params::{DataRate, RegionParams, TxPower};
use super::{
    AlternateDrType, CalcBackOffParams, ChanMaskSetParams, ChannelsMaskType,
    ContinuousWaveParams, DlChannelReqParams, GetPhyParams, InitType, LinkAdrReqParams,
    NewChannelReqParams, NextChanParams, NextChannel, NextChannelError, PhyAttribute, PhyParam,
    Region, RegionError, RxBeaconSetupParams, RxConfigParams, RxConfigured, RxParamSetupReqParams,
    RxSlot, SetBandTxDoneParams, TxConfigParams, TxConfigured, TxParamSetupReqParams,
    VerifyParams, VerifyValue,
};
use crate::class_b::beacon::BeaconFormat;
use crate::class_b::timing::{
    BEACON_GUARD, BEACON_INTERVAL, BEACON_INTERVAL_SECS, BEACON_RESERVED, BEACON_WINDOW,
    PING_SLOT_WINDOW,
};
use crate::config::RegionConfig;
use crate::lorawan::band::refresh_bands;
use crate::lorawan::channels::{CfList, Channel, ChannelMask, DrRange};
use crate::lorawan::commands::{
    link_adr_blocks, CommandOutcome, DlChannelStatus, LinkAdrAns, LinkAdrStatus, MacCommand,
    NewChannelStatus, RxParamSetupStatus, LINK_ADR_REQ_SIZE,
};
use crate::lorawan::nvm::{NvmContext, MAX_CHANNELS};
use crate::lorawan::phy::{
    self, RxWindowParams, DEFAULT_PREAMBLE_LEN, LORA_CODING_RATE, MAC_FRAME_OVERHEAD, TX_TIMEOUT,
};
use crate::radio::traits::{ContinuousWave, ModulationParams, RxConfig, TxConfig};

/// Join trials required before giving up
const MIN_NB_JOIN_TRIALS: u8 = 2;

/// Every n-th join request goes out on the wide channels
const JOIN_WIDE_CHANNEL_PERIOD: u16 = 8;

/// Channels per mask word
const WORD_BITS: u8 = 16;

/// Region engine for fixed-channel band plans
#[derive(Debug, Clone)]
pub struct FixedPlan {
    params: &'static RegionParams,
    config: RegionConfig,
    ctx: NvmContext,
}

impl Default for FixedPlan {
    fn default() -> Self {
        Self::new(RegionConfig::default())
    }
}

impl FixedPlan {
    /// Engine with default state for the configured region
    pub fn new(config: RegionConfig) -> Self {
        let params = config.params();
        Self {
            params,
            config,
            ctx: NvmContext::defaults(params),
        }
    }

    /// LA915 engine with default configuration
    pub fn la915() -> Self {
        Self::default()
    }

    /// Constant tables in use
    pub fn params(&self) -> &'static RegionParams {
        self.params
    }

    /// Engine configuration
    pub fn config(&self) -> &RegionConfig {
        &self.config
    }

    /// Uplink channel `index`, enabled or not
    pub fn channel(&self, index: u8) -> Option<Channel> {
        let raster = self.params.raster_of(index)?;
        Some(Channel {
            index,
            frequency: raster.frequency(index),
            rx1_frequency: self.rx1_frequency(index),
            dr_range: DrRange {
                min: raster.min_dr,
                max: raster.max_dr,
            },
            band: raster.band,
        })
    }

    /// Channels enabled in the active mask
    pub fn enabled_channels(&self) -> impl Iterator<Item = Channel> + '_ {
        (0..self.params.max_channels)
            .filter(move |&i| self.ctx.channels_mask.is_enabled(i))
            .filter_map(move |i| self.channel(i))
    }

    fn rx1_frequency(&self, index: u8) -> u32 {
        match self.ctx.rx1_frequencies.get(index as usize) {
            Some(&frequency) if frequency != 0 => frequency,
            _ => self.params.rx1_channels.frequency(u32::from(index)),
        }
    }

    fn modulation(&self, datarate: DataRate) -> Result<ModulationParams, RegionError> {
        let dr = self
            .params
            .datarate(datarate)
            .ok_or(RegionError::InvalidDatarate(datarate))?;
        Ok(ModulationParams {
            spreading_factor: dr.spreading_factor,
            bandwidth: dr.bandwidth,
            coding_rate: LORA_CODING_RATE,
        })
    }

    fn channel_supports(&self, index: u8, datarate: DataRate) -> bool {
        self.params
            .raster_of(index)
            .map_or(false, |raster| datarate >= raster.min_dr && datarate <= raster.max_dr)
    }

    /// Whether an enabled channel of `mask` supports a data rate in `min..=max`
    fn any_channel_supports(&self, mask: &ChannelMask, min: DataRate, max: DataRate) -> bool {
        (0..self.params.max_channels).any(|i| {
            mask.is_enabled(i)
                && self
                    .params
                    .raster_of(i)
                    .map_or(false, |raster| raster.min_dr <= max && raster.max_dr >= min)
        })
    }

    fn tx_datarate_valid(&self, datarate: DataRate, uplink_dwell: bool) -> bool {
        datarate >= self.params.min_tx_dr(uplink_dwell)
            && datarate <= self.params.tx_max_dr
            && self.params.datarate(datarate).is_some()
    }

    fn rx_datarate_valid(&self, datarate: DataRate, downlink_dwell: bool) -> bool {
        datarate >= self.params.min_rx_dr(downlink_dwell)
            && datarate <= self.params.rx_max_dr
            && self.params.datarate(datarate).is_some()
    }

    fn limit_tx_power(&self, tx_power: TxPower, band: u8) -> TxPower {
        match self.ctx.bands.get(band as usize) {
            Some(band) => tx_power.max(band.tx_max_power),
            None => tx_power,
        }
    }

    fn next_lower_tx_dr(&self, datarate: DataRate, uplink_dwell: bool) -> DataRate {
        let min = self.params.min_tx_dr(uplink_dwell);
        if datarate <= min {
            return min;
        }
        let mut dr = datarate;
        loop {
            dr -= 1;
            if dr == min || self.any_channel_supports(&self.ctx.channels_mask, dr, dr) {
                return dr;
            }
        }
    }

    fn beacon_slot(&self, beacon_time: u32) -> u32 {
        beacon_time / BEACON_INTERVAL_SECS
    }

    fn beacon_frequency(&self, beacon_time: u32) -> u32 {
        let beacon = &self.params.beacon;
        let slot = self.beacon_slot(beacon_time) % u32::from(beacon.nb_channels.max(1));
        beacon.channels.frequency(slot)
    }

    fn ping_slot_frequency(&self, beacon_time: u32, dev_addr: u32) -> u32 {
        let beacon = &self.params.beacon;
        let slot = dev_addr.wrapping_add(self.beacon_slot(beacon_time))
            % u32::from(beacon.nb_channels.max(1));
        beacon.channels.frequency(slot)
    }

    /// Range of the 500 kHz channels
    fn wide_channels(&self) -> (u8, u8) {
        let raster = &self.params.uplink_500khz;
        (raster.first_index, raster.first_index + raster.count)
    }

    fn apply_frequency_list(&mut self, frequencies: &[u32; 5]) -> Result<(), RegionError> {
        let mut indexes: Vec<u8, 5> = Vec::new();
        for &frequency in frequencies.iter().filter(|&&f| f != 0) {
            let index = self
                .params
                .uplink_index_of(frequency)
                .ok_or(RegionError::InvalidFrequency(frequency))?;
            // at most five entries, capacity matches
            let _ = indexes.push(index);
        }

        for index in indexes {
            self.ctx.channels_mask.set(index, true);
            self.ctx.channels_mask_remaining.set(index, true);
        }
        Ok(())
    }
}

impl Region for FixedPlan {
    fn get_phy_param(&self, request: &GetPhyParams) -> PhyParam {
        use PhyAttribute as A;

        let p = self.params;
        match request.attribute {
            A::MinRxDr => PhyParam::Datarate(p.min_rx_dr(request.downlink_dwell)),
            A::MinTxDr => PhyParam::Datarate(p.min_tx_dr(request.uplink_dwell)),
            A::MaxRxDr => PhyParam::Datarate(p.rx_max_dr),
            A::MaxTxDr => PhyParam::Datarate(p.tx_max_dr),
            A::DefTxDr => PhyParam::Datarate(p.default_dr),
            A::NextLowerTxDr => {
                PhyParam::Datarate(self.next_lower_tx_dr(request.datarate, request.uplink_dwell))
            }
            A::MaxTxPower => PhyParam::TxPower(p.max_tx_power),
            A::DefTxPower => PhyParam::TxPower(p.default_tx_power),
            A::DefAdrAckLimit => PhyParam::Value(u32::from(p.adr_ack_limit)),
            A::DefAdrAckDelay => PhyParam::Value(u32::from(p.adr_ack_delay)),
            A::MaxPayload => PhyParam::Value(u32::from(p.payloads.max_payload(
                request.datarate,
                request.uplink_dwell,
                false,
            ))),
            A::MaxPayloadRepeater => PhyParam::Value(u32::from(p.payloads.max_payload(
                request.datarate,
                request.uplink_dwell,
                true,
            ))),
            A::DutyCycle => PhyParam::Enabled(self.config.duty_cycle_enabled()),
            A::MaxRxWindow => PhyParam::Duration(p.max_rx_window),
            A::ReceiveDelay1 => PhyParam::Duration(p.receive_delay1),
            A::ReceiveDelay2 => PhyParam::Duration(p.receive_delay2),
            A::JoinAcceptDelay1 => PhyParam::Duration(p.join_accept_delay1),
            A::JoinAcceptDelay2 => PhyParam::Duration(p.join_accept_delay2),
            A::MaxFcntGap => PhyParam::Value(p.max_fcnt_gap),
            A::AckTimeout => PhyParam::Duration(p.ack_timeout),
            A::AckTimeoutRnd => PhyParam::Duration(p.ack_timeout_rnd),
            A::DefDr1Offset => PhyParam::Value(u32::from(p.default_rx1_dr_offset)),
            A::DefRx2Frequency => PhyParam::Frequency(p.rx2_frequency),
            A::DefRx2Dr => PhyParam::Datarate(p.rx2_dr),
            A::ChannelsMask => PhyParam::ChannelsMask(self.ctx.channels_mask),
            A::ChannelsDefaultMask => PhyParam::ChannelsMask(self.ctx.channels_default_mask),
            A::MaxNbChannels => PhyParam::Value(u32::from(p.max_channels)),
            A::DefUplinkDwellTime => PhyParam::Enabled(p.default_uplink_dwell),
            A::DefDownlinkDwellTime => PhyParam::Enabled(p.default_downlink_dwell),
            A::DefMaxEirp => PhyParam::Decibels(p.default_max_eirp),
            A::DefAntennaGain => PhyParam::Decibels(p.default_antenna_gain),
            A::NbJoinTrials | A::DefNbJoinTrials => PhyParam::Value(u32::from(MIN_NB_JOIN_TRIALS)),
            A::BeaconInterval => PhyParam::Duration(BEACON_INTERVAL),
            A::BeaconReserved => PhyParam::Duration(BEACON_RESERVED),
            A::BeaconGuard => PhyParam::Duration(BEACON_GUARD),
            A::BeaconWindow => PhyParam::Duration(BEACON_WINDOW),
            A::PingSlotWindow => PhyParam::Duration(PING_SLOT_WINDOW),
            A::BeaconChannelFreq => PhyParam::Frequency(self.beacon_frequency(request.beacon_time)),
            A::BeaconFormat => PhyParam::BeaconFormat(BeaconFormat {
                size: p.beacon.size,
                rfu1_size: p.beacon.rfu1_size,
                rfu2_size: p.beacon.rfu2_size,
            }),
            A::BeaconChannelDr => PhyParam::Datarate(p.beacon.datarate),
            A::BeaconNbChannels => PhyParam::Value(u32::from(p.beacon.nb_channels)),
            A::PingSlotChannelFreq => PhyParam::Frequency(
                self.ping_slot_frequency(request.beacon_time, request.dev_addr),
            ),
            A::PingSlotChannelDr => PhyParam::Datarate(p.ping_slot_dr),
            A::SfFromDr => p
                .datarate(request.datarate)
                .map_or(PhyParam::Unsupported, |dr| {
                    PhyParam::SpreadingFactor(dr.spreading_factor)
                }),
            A::BwFromDr => p
                .datarate(request.datarate)
                .map_or(PhyParam::Unsupported, |dr| PhyParam::Bandwidth(dr.bandwidth)),
            A::TxDr | A::RxDr | A::TxPower => PhyParam::Unsupported,
        }
    }

    fn set_band_tx_done(&mut self, params: &SetBandTxDoneParams) {
        let duty_cycle = self.config.duty_cycle_enabled();
        let Some(band) = self.channel(params.channel).map(|c| c.band) else {
            debug!("tx done on unknown channel {}", params.channel);
            return;
        };
        if let Some(band) = self.ctx.bands.get_mut(band as usize) {
            band.record_tx_done(
                params.is_join_request,
                params.tx_done,
                params.air_time,
                duty_cycle,
            );
        }
    }

    fn init_defaults(&mut self, init: InitType) {
        match init {
            InitType::Defaults => {
                self.ctx = NvmContext::defaults(self.params);
                debug!("{} defaults loaded", self.params.name);
            }
            InitType::RestoreContext(ctx) => {
                self.ctx = ctx;
                info!("{} context restored", self.params.name);
            }
            InitType::RestoreDefaultChannels => {
                self.ctx.channels_mask = self.ctx.channels_default_mask;
                let active = self.ctx.channels_mask;
                self.ctx.channels_mask_remaining.intersect(&active);
                info!("default channels restored");
            }
        }
    }

    fn nvm_context(&self) -> &NvmContext {
        &self.ctx
    }

    fn verify(&self, params: &VerifyParams, attribute: PhyAttribute) -> bool {
        match (attribute, params.value) {
            (PhyAttribute::TxDr | PhyAttribute::DefTxDr, VerifyValue::Datarate(dr)) => {
                self.tx_datarate_valid(dr, params.uplink_dwell)
            }
            (PhyAttribute::RxDr, VerifyValue::Datarate(dr)) => {
                self.rx_datarate_valid(dr, params.downlink_dwell)
            }
            (PhyAttribute::TxPower | PhyAttribute::DefTxPower, VerifyValue::TxPower(power)) => {
                power >= self.params.max_tx_power && power <= self.params.min_tx_power
            }
            (PhyAttribute::DutyCycle, VerifyValue::DutyCycle(_)) => {
                self.config.duty_cycle_enabled()
            }
            (PhyAttribute::NbJoinTrials, VerifyValue::NbJoinTrials(trials)) => {
                trials >= MIN_NB_JOIN_TRIALS
            }
            _ => false,
        }
    }

    fn apply_cf_list(&mut self, payload: &[u8]) -> Result<(), RegionError> {
        let cf_list = CfList::parse(payload).map_err(|err| {
            debug!("CFList rejected");
            RegionError::from(err)
        })?;

        match cf_list {
            CfList::Frequencies(frequencies) => self.apply_frequency_list(&frequencies),
            CfList::ChannelMask(mut mask) => {
                let (_, end) = self.wide_channels();
                for index in end..(WORD_BITS * mask.0.len() as u8) {
                    mask.set(index, false);
                }

                self.ctx.channels_mask = mask;
                self.ctx.channels_mask_remaining.intersect(&mask);
                info!(
                    "CFList mask {:x} {:x} {:x} {:x} {:x}",
                    mask.0[0], mask.0[1], mask.0[2], mask.0[3], mask.0[4]
                );
                Ok(())
            }
        }
    }

    fn chan_mask_set(&mut self, params: &ChanMaskSetParams) -> bool {
        if params.mask.has_bits_beyond(self.params.max_channels) {
            debug!("channel mask has bits beyond {}", self.params.max_channels);
            return false;
        }
        let min_dr = self.params.min_tx_dr(params.uplink_dwell);
        if !self.any_channel_supports(&params.mask, min_dr, self.params.tx_max_dr) {
            debug!("channel mask leaves no usable channel");
            return false;
        }

        match params.mask_type {
            ChannelsMaskType::Active => {
                self.ctx.channels_mask = params.mask;
                self.ctx.channels_mask_remaining.intersect(&params.mask);
            }
            ChannelsMaskType::Default => self.ctx.channels_default_mask = params.mask,
        }
        true
    }

    fn compute_rx_window_parameters(
        &self,
        datarate: DataRate,
        min_rx_symbols: u8,
        rx_error: Duration,
    ) -> Result<RxWindowParams, RegionError> {
        let datarate = datarate.min(self.params.rx_max_dr);
        let modulation = self.modulation(datarate)?;
        Ok(phy::rx_window(
            &modulation,
            datarate,
            min_rx_symbols,
            rx_error,
            self.config.radio_wakeup_time,
        ))
    }

    fn rx_config(&self, params: &RxConfigParams) -> Result<RxConfigured, RegionError> {
        let (datarate, frequency) = match params.slot {
            RxSlot::Rx1 {
                channel,
                uplink_datarate,
                dr_offset,
            } => {
                if channel >= self.params.max_channels {
                    return Err(RegionError::InvalidChannel(channel));
                }
                let datarate = self.apply_dr_offset(params.downlink_dwell, uplink_datarate, dr_offset);
                (datarate, self.rx1_frequency(channel))
            }
            RxSlot::Rx2 {
                frequency,
                datarate,
            } => (datarate, frequency),
        };

        if !self.rx_datarate_valid(datarate, params.downlink_dwell) {
            debug!("rx datarate DR{} rejected", datarate);
            return Err(RegionError::InvalidDatarate(datarate));
        }
        let max_payload = self.params.payloads.max_payload(
            datarate,
            params.downlink_dwell,
            self.config.repeater_support,
        );
        if max_payload == 0 {
            return Err(RegionError::InvalidDatarate(datarate));
        }

        let modulation = self.modulation(datarate)?;
        trace!("rx on {} Hz DR{}", frequency, datarate);
        Ok(RxConfigured {
            datarate,
            radio: RxConfig {
                frequency,
                modulation,
                preamble_len: DEFAULT_PREAMBLE_LEN,
                symbol_timeout: params.window_timeout,
                implicit_header_len: None,
                crc_on: false,
                iq_inverted: true,
                continuous: params.continuous,
                max_payload_len: max_payload.saturating_add(MAC_FRAME_OVERHEAD),
            },
        })
    }

    fn tx_config(&self, params: &TxConfigParams) -> Result<TxConfigured, RegionError> {
        let channel = self
            .channel(params.channel)
            .ok_or(RegionError::InvalidChannel(params.channel))?;
        if !self.ctx.channels_mask.is_enabled(params.channel) {
            return Err(RegionError::ChannelDisabled(params.channel));
        }
        if !channel.dr_range.contains(params.datarate) {
            return Err(RegionError::InvalidDatarate(params.datarate));
        }

        let max = self.params.payloads.max_payload(
            params.datarate,
            params.uplink_dwell,
            self.config.repeater_support,
        );
        if max == 0 {
            return Err(RegionError::InvalidDatarate(params.datarate));
        }
        if params.payload_len > max {
            debug!("payload {} exceeds {} at DR{}", params.payload_len, max, params.datarate);
            return Err(RegionError::PayloadTooLong {
                len: params.payload_len,
                max,
            });
        }

        let modulation = self.modulation(params.datarate)?;
        let tx_power = self.limit_tx_power(params.tx_power, channel.band);
        let power = phy::phy_tx_power(tx_power, self.config.max_eirp, self.config.antenna_gain);
        let time_on_air = phy::time_on_air(
            &modulation,
            DEFAULT_PREAMBLE_LEN,
            params.payload_len,
            true,
            true,
        );

        trace!(
            "tx on {} Hz DR{} {} dBm",
            channel.frequency,
            params.datarate,
            power
        );
        Ok(TxConfigured {
            tx_power,
            time_on_air,
            radio: TxConfig {
                power,
                frequency: channel.frequency,
                modulation,
                preamble_len: DEFAULT_PREAMBLE_LEN,
                crc_on: true,
                timeout: TX_TIMEOUT,
            },
        })
    }

    fn link_adr_req(&mut self, params: &LinkAdrReqParams<'_>) -> CommandOutcome<LinkAdrAns> {
        let mut mask = self.ctx.channels_mask;
        let mut status = LinkAdrStatus::empty();
        let mut datarate = params.current_datarate;
        let mut tx_power = params.current_tx_power;
        let mut nb_rep = params.current_nb_rep;
        let mut bytes_processed = 0u8;

        let narrow_words = (self.params.nb_125khz_channels() / WORD_BITS) as usize;
        let wide_bits = (1u16 << self.params.uplink_500khz.count) - 1;

        for block in link_adr_blocks(params.payload) {
            let MacCommand::LinkADRReq {
                data_rate,
                tx_power: power,
                ch_mask,
                ch_mask_cntl,
                nb_rep: rep,
            } = block
            else {
                break;
            };
            bytes_processed = bytes_processed.saturating_add(LINK_ADR_REQ_SIZE as u8);
            datarate = data_rate;
            tx_power = power;
            nb_rep = rep;

            // only the last block's structure counts
            status = LinkAdrStatus::all();
            match ch_mask_cntl as usize {
                6 => {
                    mask.0[..narrow_words].fill(0xFFFF);
                    mask.0[narrow_words] = ch_mask & wide_bits;
                }
                7 => {
                    mask.0[..narrow_words].fill(0x0000);
                    mask.0[narrow_words] = ch_mask & wide_bits;
                }
                cntl if cntl == narrow_words && ch_mask & !wide_bits != 0 => {
                    status.remove(LinkAdrStatus::CHANNEL_MASK_ACK);
                }
                cntl if cntl <= narrow_words => mask.0[cntl] = ch_mask,
                _ => status.remove(LinkAdrStatus::CHANNEL_MASK_ACK),
            }
        }

        if bytes_processed == 0 {
            debug!("no LinkADRReq in command stream");
            return CommandOutcome::Rejected(LinkAdrAns {
                status,
                datarate,
                tx_power,
                nb_rep,
                bytes_processed,
            });
        }

        // FCC 15.247: hopping over at least two 125 kHz channels
        let narrow_end = self.params.uplink_125khz.first_index + self.params.nb_125khz_channels();
        if datarate <= self.params.uplink_125khz.max_dr
            && mask.count_range(self.params.uplink_125khz.first_index, narrow_end) < 2
        {
            status.remove(LinkAdrStatus::CHANNEL_MASK_ACK);
        }

        if !params.adr_enabled {
            datarate = params.current_datarate;
            tx_power = params.current_tx_power;
            nb_rep = params.current_nb_rep;
        }

        if !self.tx_datarate_valid(datarate, params.uplink_dwell) {
            status.remove(LinkAdrStatus::DATARATE_ACK);
        } else if !self.any_channel_supports(&mask, datarate, datarate) {
            status.remove(LinkAdrStatus::CHANNEL_MASK_ACK);
        }

        if tx_power > self.params.min_tx_power {
            status.remove(LinkAdrStatus::POWER_ACK);
        } else {
            tx_power = tx_power.max(self.params.max_tx_power);
        }

        let ans = |status, nb_rep| LinkAdrAns {
            status,
            datarate,
            tx_power,
            nb_rep,
            bytes_processed,
        };

        if status != LinkAdrStatus::all() {
            debug!("LinkADRReq rejected, status {:x}", status.bits());
            return CommandOutcome::Rejected(ans(status, nb_rep));
        }

        self.ctx.channels_mask = mask;
        self.ctx.channels_mask_remaining.intersect(&mask);
        info!(
            "LinkADRReq DR{} power {} mask {:x} {:x} {:x} {:x} {:x}",
            datarate, tx_power, mask.0[0], mask.0[1], mask.0[2], mask.0[3], mask.0[4]
        );
        CommandOutcome::Accepted(ans(status, nb_rep.max(1)))
    }

    fn rx_param_setup_req(
        &self,
        params: &RxParamSetupReqParams,
    ) -> CommandOutcome<RxParamSetupStatus> {
        let mut status = RxParamSetupStatus::empty();
        if self.params.rx1_channels.on_raster(params.frequency) {
            status |= RxParamSetupStatus::CHANNEL_ACK;
        }
        if self.rx_datarate_valid(params.datarate, false) {
            status |= RxParamSetupStatus::RX2_DATARATE_ACK;
        }
        if params.dr_offset <= self.params.max_rx1_dr_offset {
            status |= RxParamSetupStatus::RX1_DR_OFFSET_ACK;
        }

        if status.is_all() {
            CommandOutcome::Accepted(status)
        } else {
            debug!("RXParamSetupReq rejected, status {:x}", status.bits());
            CommandOutcome::Rejected(status)
        }
    }

    fn new_channel_req(&mut self, _params: &NewChannelReqParams) -> CommandOutcome<NewChannelStatus> {
        CommandOutcome::NotSupported
    }

    fn tx_param_setup_req(&mut self, _params: &TxParamSetupReqParams) -> CommandOutcome<()> {
        CommandOutcome::NotSupported
    }

    fn dl_channel_req(&mut self, params: &DlChannelReqParams) -> CommandOutcome<DlChannelStatus> {
        let mut status = DlChannelStatus::empty();
        if self.params.rx1_channels.in_band(params.rx1_frequency) {
            status |= DlChannelStatus::CHANNEL_FREQ_OK;
        }
        if self.channel(params.channel_id).is_some() {
            status |= DlChannelStatus::UPLINK_FREQ_EXISTS;
        }

        if !status.is_all() {
            debug!("DlChannelReq rejected, status {:x}", status.bits());
            return CommandOutcome::Rejected(status);
        }
        match self.ctx.rx1_frequencies.get_mut(params.channel_id as usize) {
            Some(slot) => {
                *slot = params.rx1_frequency;
                CommandOutcome::Accepted(status)
            }
            None => CommandOutcome::Rejected(DlChannelStatus::CHANNEL_FREQ_OK),
        }
    }

    fn alternate_dr(&mut self, current_dr: DataRate, kind: AlternateDrType) -> DataRate {
        let narrow_dr = self.params.min_tx_dr(self.ctx.uplink_dwell_time);
        self.ctx.join_trials = match kind {
            AlternateDrType::Alternate => self.ctx.join_trials.wrapping_add(1),
            AlternateDrType::Restore => match self.ctx.join_trials.checked_sub(1) {
                Some(trials) => trials,
                None => {
                    trace!("no join trial to restore, DR{} -> DR{}", current_dr, narrow_dr);
                    return narrow_dr;
                }
            },
        };

        let next = if self.ctx.join_trials % JOIN_WIDE_CHANNEL_PERIOD == 0 {
            let (first, end) = self.wide_channels();
            for index in first..end {
                self.ctx.channels_mask.set(index, true);
                self.ctx.channels_mask_remaining.set(index, true);
            }
            self.params.uplink_500khz.min_dr
        } else {
            narrow_dr
        };

        trace!(
            "join trial {}: DR{} -> DR{}",
            self.ctx.join_trials,
            current_dr,
            next
        );
        next
    }

    fn calc_back_off(&mut self, params: &CalcBackOffParams) -> Duration {
        let duty_cycle = self.config.duty_cycle_enabled();
        if let Some(band) = self
            .channel(params.channel)
            .and_then(|c| self.ctx.bands.get_mut(c.band as usize))
        {
            band.back_off(
                params.joined,
                duty_cycle,
                params.since_startup,
                params.tx_time_on_air,
            );
        }

        self.ctx
            .bands
            .iter()
            .map(|band| band.time_off)
            .max()
            .unwrap_or(Duration::ZERO)
    }

    fn next_channel<R: RngCore>(
        &mut self,
        params: &NextChanParams,
        rng: &mut R,
    ) -> Result<NextChannel, NextChannelError> {
        let narrow = self.params.uplink_125khz;
        let narrow_end = narrow.first_index + narrow.count;
        let (wide_first, wide_end) = self.wide_channels();
        let active = self.ctx.channels_mask;

        if !self
            .ctx
            .channels_mask_remaining
            .any_in_range(narrow.first_index, narrow_end)
        {
            self.ctx
                .channels_mask_remaining
                .copy_range(&active, narrow.first_index, narrow_end);
        }
        if params.datarate >= self.params.uplink_500khz.min_dr
            && !self.ctx.channels_mask_remaining.any_in_range(wide_first, wide_end)
        {
            self.ctx
                .channels_mask_remaining
                .copy_range(&active, wide_first, wide_end);
        }

        let elapsed = params.now.saturating_sub(params.last_aggregated_tx);
        if params.aggregated_time_off > elapsed {
            return Err(NextChannelError::DutyCycleRestricted(
                params.aggregated_time_off - elapsed,
            ));
        }

        let duty_cycle = self.config.duty_cycle_enabled();
        let band_wait = refresh_bands(&mut self.ctx.bands, params.joined, duty_cycle, params.now);

        let mut candidates: Vec<u8, MAX_CHANNELS> = Vec::new();
        let mut blocked = false;
        for index in 0..self.params.max_channels {
            if !active.is_enabled(index)
                || !self.ctx.channels_mask_remaining.is_enabled(index)
                || !self.channel_supports(index, params.datarate)
            {
                continue;
            }
            let band_free = self
                .params
                .raster_of(index)
                .and_then(|raster| self.ctx.bands.get(raster.band as usize))
                .map_or(true, |band| band.is_free());
            if band_free {
                let _ = candidates.push(index);
            } else {
                blocked = true;
            }
        }

        if candidates.is_empty() {
            return match band_wait {
                Some(wait) if blocked => {
                    debug!("all channels blocked for {} ms", wait.as_millis() as u32);
                    Err(NextChannelError::DutyCycleRestricted(wait))
                }
                _ => {
                    warn!("no channel for DR{}", params.datarate);
                    Err(NextChannelError::NoChannelFound)
                }
            };
        }

        let channel = candidates[rng.next_u32() as usize % candidates.len()];
        if channel < narrow_end {
            self.ctx.channels_mask_remaining.set(channel, false);
        }
        trace!("next channel {}", channel);

        Ok(NextChannel {
            channel,
            wait: Duration::ZERO,
            aggregated_time_off: Duration::ZERO,
        })
    }

    fn channel_add(&mut self, _params: &NewChannelReqParams) -> CommandOutcome<()> {
        CommandOutcome::NotSupported
    }

    fn channels_remove(&mut self, _channel: u8) -> CommandOutcome<()> {
        CommandOutcome::NotSupported
    }

    fn set_continuous_wave(
        &self,
        params: &ContinuousWaveParams,
    ) -> Result<ContinuousWave, RegionError> {
        let channel = self
            .channel(params.channel)
            .ok_or(RegionError::InvalidChannel(params.channel))?;
        if !channel.dr_range.contains(params.datarate) {
            return Err(RegionError::InvalidDatarate(params.datarate));
        }

        let tx_power = self.limit_tx_power(params.tx_power, channel.band);
        Ok(ContinuousWave {
            frequency: channel.frequency,
            power: phy::phy_tx_power(tx_power, params.max_eirp, params.antenna_gain),
            timeout: params.timeout,
        })
    }

    fn apply_dr_offset(&self, downlink_dwell: bool, datarate: DataRate, offset: u8) -> DataRate {
        let rows = self.params.dr_offsets;
        let row = rows.get(datarate as usize).or_else(|| rows.last());
        let dr = row.map_or(self.params.rx_min_dr, |row| {
            row[(offset as usize).min(row.len() - 1)]
        });
        dr.max(self.params.min_rx_dr(downlink_dwell))
    }

    fn rx_beacon_setup(&self, params: &RxBeaconSetupParams) -> Result<RxConfigured, RegionError> {
        let beacon = &self.params.beacon;
        let modulation = self.modulation(beacon.datarate)?;
        let frequency = self.beacon_frequency(params.beacon_time);
        trace!("beacon window on {} Hz", frequency);

        Ok(RxConfigured {
            datarate: beacon.datarate,
            radio: RxConfig {
                frequency,
                modulation,
                preamble_len: beacon.preamble_len,
                symbol_timeout: params.symbol_timeout,
                implicit_header_len: Some(beacon.size),
                crc_on: false,
                iq_inverted: false,
                continuous: params.rx_time.is_zero(),
                max_payload_len: beacon.size,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lorawan::region::params::{DR_0, DR_10, DR_13, DR_2, DR_5, DR_6, DR_8, DR_9};
    use crate::lorawan::region::RegionKind;
    use crate::radio::traits::Bandwidth;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn plan() -> FixedPlan {
        FixedPlan::la915()
    }

    fn link_adr(plan: &mut FixedPlan, payload: &[u8]) -> CommandOutcome<LinkAdrAns> {
        plan.link_adr_req(&LinkAdrReqParams {
            payload,
            adr_enabled: true,
            uplink_dwell: false,
            current_datarate: DR_0,
            current_tx_power: 5,
            current_nb_rep: 1,
        })
    }

    fn pick(
        plan: &mut FixedPlan,
        datarate: DataRate,
        rng: &mut SmallRng,
    ) -> Result<NextChannel, NextChannelError> {
        plan.next_channel(
            &NextChanParams {
                aggregated_time_off: Duration::ZERO,
                last_aggregated_tx: Duration::ZERO,
                now: Duration::from_secs(1),
                datarate,
                joined: true,
            },
            rng,
        )
    }

    #[test]
    fn test_channel_generation() {
        let plan = plan();
        let ch = plan.channel(9).unwrap();
        assert_eq!(ch.frequency, 917_000_000);
        assert_eq!(ch.rx1_frequency, 923_900_000);
        assert_eq!(ch.dr_range, DrRange { min: DR_0, max: DR_5 });

        let wide = plan.channel(70).unwrap();
        assert_eq!(wide.frequency, 925_500_000);
        assert_eq!(wide.dr_range, DrRange { min: DR_6, max: DR_6 });
        assert!(plan.channel(72).is_none());
        assert_eq!(plan.enabled_channels().count(), 72);
    }

    #[test]
    fn test_phy_params() {
        let plan = plan();
        let get = |attr| plan.get_phy_param(&GetPhyParams::new(attr));
        assert_eq!(get(PhyAttribute::ReceiveDelay1), PhyParam::Duration(Duration::from_secs(5)));
        assert_eq!(get(PhyAttribute::JoinAcceptDelay2), PhyParam::Duration(Duration::from_secs(6)));
        assert_eq!(get(PhyAttribute::DefRx2Frequency), PhyParam::Frequency(923_300_000));
        assert_eq!(get(PhyAttribute::DefRx2Dr), PhyParam::Datarate(DR_8));
        assert_eq!(get(PhyAttribute::MaxNbChannels), PhyParam::Value(72));
        assert_eq!(get(PhyAttribute::DutyCycle), PhyParam::Enabled(false));
        assert_eq!(get(PhyAttribute::DefTxPower), PhyParam::TxPower(5));
        assert_eq!(get(PhyAttribute::DefNbJoinTrials), PhyParam::Value(2));
        assert_eq!(get(PhyAttribute::TxDr), PhyParam::Unsupported);

        let dwell = GetPhyParams::new(PhyAttribute::MinTxDr).dwell(true, false);
        assert_eq!(plan.get_phy_param(&dwell), PhyParam::Datarate(DR_2));

        let payload = GetPhyParams::new(PhyAttribute::MaxPayloadRepeater).datarate(DR_9);
        assert_eq!(plan.get_phy_param(&payload), PhyParam::Value(109));

        let sf = GetPhyParams::new(PhyAttribute::SfFromDr).datarate(DR_6);
        assert_eq!(plan.get_phy_param(&sf), PhyParam::SpreadingFactor(8));
        let bw = GetPhyParams::new(PhyAttribute::BwFromDr).datarate(7);
        assert_eq!(plan.get_phy_param(&bw), PhyParam::Unsupported);
    }

    #[test]
    fn test_beacon_and_ping_slot_hopping() {
        let plan = plan();
        let beacon = GetPhyParams::new(PhyAttribute::BeaconChannelFreq).class_b(3 * 128, 0);
        assert_eq!(plan.get_phy_param(&beacon), PhyParam::Frequency(925_100_000));
        let beacon = GetPhyParams::new(PhyAttribute::BeaconChannelFreq).class_b(9 * 128, 0);
        assert_eq!(plan.get_phy_param(&beacon), PhyParam::Frequency(923_900_000));

        let ping = GetPhyParams::new(PhyAttribute::PingSlotChannelFreq).class_b(2 * 128, 1);
        assert_eq!(plan.get_phy_param(&ping), PhyParam::Frequency(925_100_000));

        match plan.get_phy_param(&GetPhyParams::new(PhyAttribute::BeaconFormat)) {
            PhyParam::BeaconFormat(format) => {
                assert_eq!((format.size, format.rfu1_size, format.rfu2_size), (19, 3, 1))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_next_lower_tx_dr() {
        let mut plan = plan();
        let lower = |plan: &FixedPlan, dr, dwell| {
            plan.get_phy_param(&GetPhyParams::new(PhyAttribute::NextLowerTxDr).datarate(dr).dwell(dwell, false))
        };
        assert_eq!(lower(&plan, DR_5, false), PhyParam::Datarate(4));
        assert_eq!(lower(&plan, DR_0, false), PhyParam::Datarate(DR_0));
        assert_eq!(lower(&plan, DR_2, true), PhyParam::Datarate(DR_2));

        // with only 125 kHz channels, DR6 has nowhere to go but DR5
        let mut mask = ChannelMask::empty();
        mask.0[0] = 0x00FF;
        assert!(plan.chan_mask_set(&ChanMaskSetParams {
            mask,
            mask_type: ChannelsMaskType::Active,
            uplink_dwell: false,
        }));
        assert_eq!(lower(&plan, 7, false), PhyParam::Datarate(DR_5));
    }

    #[test]
    fn test_verify() {
        let plan = plan();
        let check = |value, attr| plan.verify(&VerifyParams::new(value), attr);
        assert!(check(VerifyValue::Datarate(DR_5), PhyAttribute::TxDr));
        assert!(!check(VerifyValue::Datarate(DR_6), PhyAttribute::TxDr));
        assert!(check(VerifyValue::Datarate(DR_13), PhyAttribute::RxDr));
        assert!(!check(VerifyValue::Datarate(7), PhyAttribute::RxDr));
        assert!(check(VerifyValue::TxPower(10), PhyAttribute::TxPower));
        assert!(!check(VerifyValue::TxPower(11), PhyAttribute::DefTxPower));
        assert!(!check(VerifyValue::DutyCycle(true), PhyAttribute::DutyCycle));
        assert!(check(VerifyValue::NbJoinTrials(2), PhyAttribute::NbJoinTrials));
        assert!(!check(VerifyValue::NbJoinTrials(1), PhyAttribute::NbJoinTrials));
        assert!(!check(VerifyValue::Datarate(DR_0), PhyAttribute::MaxPayload));

        let dwell = VerifyParams {
            value: VerifyValue::Datarate(DR_0),
            uplink_dwell: true,
            downlink_dwell: false,
        };
        assert!(!plan.verify(&dwell, PhyAttribute::TxDr));
    }

    #[test]
    fn test_cf_list_mask() {
        let mut plan = plan();
        let mut payload = [0u8; 16];
        payload[2] = 0xFF; // channels 16..23
        payload[8] = 0x03; // channels 64, 65
        payload[9] = 0xFF; // beyond channel 71, dropped
        payload[15] = 0x01;
        plan.apply_cf_list(&payload).unwrap();

        assert_eq!(plan.nvm_context().channels_mask.0, [0, 0x00FF, 0, 0, 0x0003, 0]);
        assert_eq!(plan.nvm_context().channels_mask_remaining.0, [0, 0x00FF, 0, 0, 0x0003, 0]);
    }

    #[test]
    fn test_cf_list_frequencies() {
        let mut plan = plan();
        let mut mask = ChannelMask::empty();
        mask.0[0] = 0x0003;
        assert!(plan.chan_mask_set(&ChanMaskSetParams {
            mask,
            mask_type: ChannelsMaskType::Active,
            uplink_dwell: false,
        }));

        let mut payload = [0u8; 16];
        // 916.0 MHz is channel 4
        payload[..3].copy_from_slice(&9_160_000u32.to_le_bytes()[..3]);
        plan.apply_cf_list(&payload).unwrap();
        assert_eq!(plan.nvm_context().channels_mask.0[0], 0x0013);

        // 916.1 MHz is off raster: nothing applied
        let before = plan.nvm_context().clone();
        payload[3..6].copy_from_slice(&9_161_000u32.to_le_bytes()[..3]);
        payload[..3].copy_from_slice(&9_162_000u32.to_le_bytes()[..3]);
        assert_eq!(
            plan.apply_cf_list(&payload),
            Err(RegionError::InvalidFrequency(916_100_000))
        );
        assert_eq!(plan.nvm_context(), &before);
    }

    #[test]
    fn test_cf_list_bad_input() {
        let mut plan = plan();
        assert_eq!(plan.apply_cf_list(&[0u8; 17]), Err(RegionError::InvalidCfListLength(17)));
        let mut payload = [0u8; 16];
        payload[15] = 0x02;
        assert_eq!(plan.apply_cf_list(&payload), Err(RegionError::InvalidCfListType(2)));
        assert_eq!(plan.nvm_context(), &NvmContext::defaults(plan.params()));
    }

    #[test]
    fn test_chan_mask_set() {
        let mut plan = plan();
        let mut wide_only = ChannelMask::empty();
        wide_only.0[4] = 0x00FF;
        let params = ChanMaskSetParams {
            mask: wide_only,
            mask_type: ChannelsMaskType::Active,
            uplink_dwell: false,
        };
        assert!(!plan.chan_mask_set(&params));

        let mut beyond = ChannelMask::all(plan.params());
        beyond.0[5] = 0x0001;
        assert!(!plan.chan_mask_set(&ChanMaskSetParams { mask: beyond, ..params }));
        assert_eq!(plan.nvm_context().channels_mask, ChannelMask::all(plan.params()));

        let mut narrow = ChannelMask::empty();
        narrow.0[3] = 0xF000;
        assert!(plan.chan_mask_set(&ChanMaskSetParams {
            mask: narrow,
            mask_type: ChannelsMaskType::Default,
            uplink_dwell: true,
        }));
        assert_eq!(plan.nvm_context().channels_default_mask, narrow);
        assert_eq!(plan.nvm_context().channels_mask, ChannelMask::all(plan.params()));

        plan.init_defaults(InitType::RestoreDefaultChannels);
        assert_eq!(plan.nvm_context().channels_mask, narrow);
        assert_eq!(plan.nvm_context().channels_mask_remaining, narrow);
    }

    #[test]
    fn test_link_adr_accepted() {
        let mut plan = plan();
        let payload = [
            0x03, 0x50, 0x00, 0x00, 0x70, // all 125 kHz off
            0x03, 0x53, 0xFF, 0x00, 0x00, // channels 0..7, DR5, power 3
        ];
        let outcome = link_adr(&mut plan, &payload);
        assert_eq!(
            outcome,
            CommandOutcome::Accepted(LinkAdrAns {
                status: LinkAdrStatus::all(),
                datarate: DR_5,
                tx_power: 3,
                nb_rep: 1,
                bytes_processed: 10,
            })
        );
        assert_eq!(plan.nvm_context().channels_mask.0, [0x00FF, 0, 0, 0, 0, 0]);
        assert_eq!(plan.nvm_context().channels_mask_remaining.0, [0x00FF, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_link_adr_cntl_6_enables_all_narrow() {
        let mut plan = plan();
        let outcome = link_adr(&mut plan, &[0x03, 0x20, 0x0F, 0x00, 0x61]);
        assert!(outcome.is_accepted());
        assert_eq!(plan.nvm_context().channels_mask.0, [0xFFFF, 0xFFFF, 0xFFFF, 0xFFFF, 0x000F, 0]);
    }

    #[test]
    fn test_link_adr_rejections_leave_mask() {
        let mut plan = plan();
        let before = plan.nvm_context().channels_mask;

        // DR6 is not an ADR data rate
        let outcome = link_adr(&mut plan, &[0x03, 0x60, 0xFF, 0x00, 0x01]);
        assert_eq!(
            outcome.answer().unwrap().status,
            LinkAdrStatus::CHANNEL_MASK_ACK | LinkAdrStatus::POWER_ACK
        );

        // FCC rule: a single 125 kHz channel
        let outcome = link_adr(
            &mut plan,
            &[0x03, 0x00, 0x00, 0x00, 0x70, 0x03, 0x00, 0x01, 0x00, 0x01],
        );
        assert_eq!(
            outcome.answer().unwrap().status,
            LinkAdrStatus::DATARATE_ACK | LinkAdrStatus::POWER_ACK
        );

        // power index beyond the weakest
        let outcome = link_adr(&mut plan, &[0x03, 0x0B, 0xFF, 0x00, 0x01]);
        assert_eq!(
            outcome.answer().unwrap().status,
            LinkAdrStatus::CHANNEL_MASK_ACK | LinkAdrStatus::DATARATE_ACK
        );

        // RFU mask control
        let outcome = link_adr(&mut plan, &[0x03, 0x00, 0xFF, 0x00, 0x51]);
        assert!(!outcome.answer().unwrap().status.contains(LinkAdrStatus::CHANNEL_MASK_ACK));

        // bits above the eight 500 kHz channels
        let outcome = link_adr(&mut plan, &[0x03, 0x00, 0x00, 0x01, 0x41]);
        assert!(!outcome.is_accepted());

        assert_eq!(plan.nvm_context().channels_mask, before);
    }

    #[test]
    fn test_link_adr_adr_disabled_keeps_current() {
        let mut plan = plan();
        let outcome = plan.link_adr_req(&LinkAdrReqParams {
            payload: &[0x03, 0x53, 0xFF, 0xFF, 0x03],
            adr_enabled: false,
            uplink_dwell: false,
            current_datarate: DR_2,
            current_tx_power: 1,
            current_nb_rep: 2,
        });
        let ans = *outcome.answer().unwrap();
        assert!(outcome.is_accepted());
        assert_eq!((ans.datarate, ans.tx_power, ans.nb_rep), (DR_2, 1, 2));
    }

    #[test]
    fn test_link_adr_without_block() {
        let mut plan = plan();
        let outcome = link_adr(&mut plan, &[0x05, 0x00, 0x00, 0x00, 0x00]);
        match outcome {
            CommandOutcome::Rejected(ans) => assert_eq!(ans.bytes_processed, 0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rx_param_setup() {
        let plan = plan();
        let ok = plan.rx_param_setup_req(&RxParamSetupReqParams {
            dr_offset: 3,
            datarate: DR_8,
            frequency: 926_900_000,
        });
        assert_eq!(ok, CommandOutcome::Accepted(RxParamSetupStatus::all()));

        let bad = plan.rx_param_setup_req(&RxParamSetupReqParams {
            dr_offset: 4,
            datarate: 7,
            frequency: 923_400_000,
        });
        assert_eq!(bad, CommandOutcome::Rejected(RxParamSetupStatus::empty()));
    }

    #[test]
    fn test_unsupported_commands() {
        let mut plan = plan();
        let req = NewChannelReqParams {
            channel_id: 3,
            frequency: 915_800_000,
            min_dr: DR_0,
            max_dr: DR_5,
        };
        assert!(plan.new_channel_req(&req).is_not_supported());
        assert!(plan.channel_add(&req).is_not_supported());
        assert!(plan.channels_remove(3).is_not_supported());
        assert!(plan
            .tx_param_setup_req(&TxParamSetupReqParams {
                uplink_dwell: true,
                downlink_dwell: true,
                max_eirp: 5,
            })
            .is_not_supported());
        assert_eq!(plan.nvm_context(), &NvmContext::defaults(plan.params()));
    }

    #[test]
    fn test_dl_channel() {
        let mut plan = plan();
        let outcome = plan.dl_channel_req(&DlChannelReqParams {
            channel_id: 3,
            rx1_frequency: 926_300_000,
        });
        assert!(outcome.is_accepted());
        assert_eq!(plan.channel(3).unwrap().rx1_frequency, 926_300_000);

        let rx = plan
            .rx_config(&RxConfigParams {
                slot: RxSlot::Rx1 {
                    channel: 3,
                    uplink_datarate: DR_0,
                    dr_offset: 0,
                },
                window_timeout: 8,
                continuous: false,
                downlink_dwell: false,
            })
            .unwrap();
        assert_eq!(rx.radio.frequency, 926_300_000);

        let outcome = plan.dl_channel_req(&DlChannelReqParams {
            channel_id: 72,
            rx1_frequency: 926_300_000,
        });
        assert_eq!(outcome, CommandOutcome::Rejected(DlChannelStatus::CHANNEL_FREQ_OK));

        let outcome = plan.dl_channel_req(&DlChannelReqParams {
            channel_id: 4,
            rx1_frequency: 915_000_000,
        });
        assert_eq!(outcome, CommandOutcome::Rejected(DlChannelStatus::UPLINK_FREQ_EXISTS));
        assert_eq!(plan.channel(4).unwrap().rx1_frequency, 925_700_000);
    }

    #[test]
    fn test_alternate_dr() {
        let mut plan = plan();
        let mut mask = ChannelMask::empty();
        mask.0[0] = 0x00FF;
        plan.chan_mask_set(&ChanMaskSetParams {
            mask,
            mask_type: ChannelsMaskType::Active,
            uplink_dwell: false,
        });

        for _ in 0..7 {
            assert_eq!(plan.alternate_dr(DR_0, AlternateDrType::Alternate), DR_0);
        }
        assert_eq!(plan.alternate_dr(DR_0, AlternateDrType::Alternate), DR_6);
        assert_eq!(plan.nvm_context().channels_mask.0[4], 0x00FF);
        assert_eq!(plan.nvm_context().join_trials, 8);

        assert_eq!(plan.alternate_dr(DR_6, AlternateDrType::Restore), DR_0);
        assert_eq!(plan.nvm_context().join_trials, 7);
    }

    #[test]
    fn test_restore_without_join_trials() {
        let mut plan = plan();
        let mut mask = ChannelMask::empty();
        mask.0[1] = 0xFF00;
        plan.chan_mask_set(&ChanMaskSetParams {
            mask,
            mask_type: ChannelsMaskType::Active,
            uplink_dwell: false,
        });
        let before = plan.nvm_context().clone();

        assert_eq!(plan.alternate_dr(DR_6, AlternateDrType::Restore), DR_0);
        assert_eq!(plan.nvm_context(), &before);
        assert_eq!(plan.nvm_context().channels_mask.0[4], 0);
        assert_eq!(plan.nvm_context().join_trials, 0);
    }

    #[test]
    fn test_rx_window_parameters() {
        let plan = plan();
        let window = plan
            .compute_rx_window_parameters(DR_8, 6, Duration::from_millis(10))
            .unwrap();
        assert_eq!((window.window_timeout, window.window_offset), (9, -5));

        // clamped to DR13
        let window = plan
            .compute_rx_window_parameters(15, 6, Duration::from_millis(10))
            .unwrap();
        assert_eq!(window.datarate, DR_13);
        assert_eq!((window.window_timeout, window.window_offset), (85, -10));
    }

    #[test]
    fn test_rx1_config() {
        let plan = plan();
        let rx = plan
            .rx_config(&RxConfigParams {
                slot: RxSlot::Rx1 {
                    channel: 9,
                    uplink_datarate: DR_2,
                    dr_offset: 1,
                },
                window_timeout: 12,
                continuous: false,
                downlink_dwell: false,
            })
            .unwrap();
        assert_eq!(rx.datarate, DR_9);
        assert_eq!(rx.radio.frequency, 923_900_000);
        assert_eq!(rx.radio.modulation.spreading_factor, 11);
        assert_eq!(rx.radio.modulation.bandwidth, Bandwidth::Khz500);
        assert_eq!(rx.radio.max_payload_len, 129 + 13);
        assert_eq!(rx.radio.symbol_timeout, 12);
        assert!(rx.radio.iq_inverted);
    }

    #[test]
    fn test_rx2_config_rejects_bad_datarate() {
        let plan = plan();
        let rx2 = |datarate| {
            plan.rx_config(&RxConfigParams {
                slot: RxSlot::Rx2 {
                    frequency: 923_300_000,
                    datarate,
                },
                window_timeout: 8,
                continuous: true,
                downlink_dwell: false,
            })
        };
        assert!(rx2(DR_8).unwrap().radio.continuous);
        assert_eq!(rx2(7), Err(RegionError::InvalidDatarate(7)));
        assert_eq!(rx2(14), Err(RegionError::InvalidDatarate(14)));
        assert_eq!(rx2(DR_2), Err(RegionError::InvalidDatarate(DR_2)));
    }

    #[test]
    fn test_tx_config() {
        let plan = plan();
        let tx = plan
            .tx_config(&TxConfigParams {
                channel: 0,
                datarate: DR_2,
                tx_power: 5,
                uplink_dwell: false,
                payload_len: 20,
            })
            .unwrap();
        assert_eq!(tx.time_on_air, Duration::from_millis(371));
        assert_eq!(tx.tx_power, 5);
        assert_eq!(tx.radio.power, 17);
        assert_eq!(tx.radio.frequency, 915_200_000);
        assert_eq!(tx.radio.preamble_len, 8);
    }

    #[test]
    fn test_tx_config_payload_limit() {
        let plan = plan();
        let tx = |datarate, uplink_dwell, payload_len| {
            plan.tx_config(&TxConfigParams {
                channel: 1,
                datarate,
                tx_power: 0,
                uplink_dwell,
                payload_len,
            })
        };
        assert!(tx(DR_0, false, 51).is_ok());
        assert_eq!(tx(DR_0, false, 52), Err(RegionError::PayloadTooLong { len: 52, max: 51 }));
        assert_eq!(tx(DR_0, true, 1), Err(RegionError::InvalidDatarate(DR_0)));
        assert!(tx(DR_2, true, 11).is_ok());

        let repeater = FixedPlan::new(RegionConfig::new(RegionKind::La915).with_repeater_support(true));
        let tx = repeater.tx_config(&TxConfigParams {
            channel: 1,
            datarate: 4,
            tx_power: 0,
            uplink_dwell: false,
            payload_len: 223,
        });
        assert_eq!(tx, Err(RegionError::PayloadTooLong { len: 223, max: 222 }));
    }

    #[test]
    fn test_tx_config_channel_checks() {
        let mut plan = plan();
        let tx = |plan: &FixedPlan, channel, datarate| {
            plan.tx_config(&TxConfigParams {
                channel,
                datarate,
                tx_power: 0,
                uplink_dwell: false,
                payload_len: 10,
            })
        };
        assert_eq!(tx(&plan, 72, DR_0), Err(RegionError::InvalidChannel(72)));
        assert_eq!(tx(&plan, 64, DR_0), Err(RegionError::InvalidDatarate(DR_0)));
        assert!(tx(&plan, 64, DR_6).is_ok());

        let mut mask = ChannelMask::all(plan.params());
        mask.set(5, false);
        assert!(plan.chan_mask_set(&ChanMaskSetParams {
            mask,
            mask_type: ChannelsMaskType::Active,
            uplink_dwell: false,
        }));
        assert_eq!(tx(&plan, 5, DR_0), Err(RegionError::ChannelDisabled(5)));
    }

    #[test]
    fn test_apply_dr_offset() {
        let plan = plan();
        assert_eq!(plan.apply_dr_offset(false, DR_5, 0), DR_13);
        assert_eq!(plan.apply_dr_offset(false, DR_6, 5), DR_9);
        assert_eq!(plan.apply_dr_offset(false, DR_6, 9), DR_9);
        assert_eq!(plan.apply_dr_offset(false, 12, 0), DR_13);
        assert_eq!(plan.apply_dr_offset(true, DR_0, 0), DR_8);
    }

    #[test]
    fn test_next_channel_hops_through_mask() {
        let mut plan = plan();
        let mut mask = ChannelMask::empty();
        mask.0[1] = 0x00FF;
        assert!(plan.chan_mask_set(&ChanMaskSetParams {
            mask,
            mask_type: ChannelsMaskType::Active,
            uplink_dwell: false,
        }));

        let mut rng = SmallRng::seed_from_u64(7);
        let mut seen = [false; 8];
        for _ in 0..8 {
            let next = pick(&mut plan, DR_0, &mut rng).unwrap();
            assert!((16..24).contains(&next.channel));
            assert_eq!(next.wait, Duration::ZERO);
            let slot = &mut seen[(next.channel - 16) as usize];
            assert!(!*slot);
            *slot = true;
        }
        assert!(!plan.nvm_context().channels_mask_remaining.any_in_range(0, 64));

        // the cycle restarts
        assert!(pick(&mut plan, DR_0, &mut rng).is_ok());
        assert_eq!(plan.nvm_context().channels_mask_remaining.count_range(0, 64), 7);
    }

    #[test]
    fn test_next_channel_wide_datarate() {
        let mut plan = plan();
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..20 {
            let next = pick(&mut plan, DR_6, &mut rng).unwrap();
            assert!((64..72).contains(&next.channel));
        }
    }

    #[test]
    fn test_next_channel_not_found() {
        let mut plan = plan();
        let mut ctx = NvmContext::defaults(plan.params());
        ctx.channels_mask.0 = [0, 0, 0, 0, 0x00FF, 0];
        ctx.channels_mask_remaining = ctx.channels_mask;
        plan.init_defaults(InitType::RestoreContext(ctx));

        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(pick(&mut plan, DR_0, &mut rng), Err(NextChannelError::NoChannelFound));
    }

    #[test]
    fn test_next_channel_duty_cycle() {
        let mut plan = FixedPlan::new(RegionConfig::default().with_duty_cycle(true));
        let mut rng = SmallRng::seed_from_u64(3);

        let restricted = plan.next_channel(
            &NextChanParams {
                aggregated_time_off: Duration::from_secs(1),
                last_aggregated_tx: Duration::ZERO,
                now: Duration::from_millis(400),
                datarate: DR_0,
                joined: false,
            },
            &mut rng,
        );
        assert_eq!(
            restricted,
            Err(NextChannelError::DutyCycleRestricted(Duration::from_millis(600)))
        );

        plan.set_band_tx_done(&SetBandTxDoneParams {
            channel: 0,
            is_join_request: true,
            tx_done: Duration::from_secs(10),
            air_time: Duration::from_secs(1),
        });
        let aggregated = plan.calc_back_off(&CalcBackOffParams {
            channel: 0,
            joined: false,
            since_startup: Duration::from_secs(10),
            tx_time_on_air: Duration::from_secs(1),
        });
        assert_eq!(aggregated, Duration::from_secs(99));

        let blocked = plan.next_channel(
            &NextChanParams {
                aggregated_time_off: Duration::ZERO,
                last_aggregated_tx: Duration::from_secs(10),
                now: Duration::from_secs(20),
                datarate: DR_0,
                joined: false,
            },
            &mut rng,
        );
        assert_eq!(
            blocked,
            Err(NextChannelError::DutyCycleRestricted(Duration::from_secs(89)))
        );
    }

    #[test]
    fn test_back_off_disabled() {
        let mut plan = plan();
        let aggregated = plan.calc_back_off(&CalcBackOffParams {
            channel: 0,
            joined: false,
            since_startup: Duration::from_secs(10),
            tx_time_on_air: Duration::from_secs(1),
        });
        assert_eq!(aggregated, Duration::ZERO);
        assert!(plan.nvm_context().bands.iter().all(|b| b.is_free()));
    }

    #[test]
    fn test_init_defaults_resets_state() {
        let mut plan = plan();
        link_adr(&mut plan, &[0x03, 0x50, 0x00, 0x00, 0x70, 0x03, 0x53, 0xFF, 0x00, 0x00]);
        plan.alternate_dr(DR_0, AlternateDrType::Alternate);
        plan.init_defaults(InitType::Defaults);
        let once = plan.nvm_context().clone();
        plan.init_defaults(InitType::Defaults);
        assert_eq!(plan.nvm_context(), &once);
        assert_eq!(once, NvmContext::defaults(plan.params()));
    }

    #[test]
    fn test_continuous_wave() {
        let plan = plan();
        let cw = plan
            .set_continuous_wave(&ContinuousWaveParams {
                channel: 65,
                datarate: DR_6,
                tx_power: 0,
                max_eirp: 30.0,
                antenna_gain: 2.15,
                timeout: Duration::from_secs(60),
            })
            .unwrap();
        assert_eq!(cw.frequency, 917_500_000);
        assert_eq!(cw.power, 27);
        assert_eq!(cw.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_beacon_setup() {
        let plan = plan();
        let rx = plan
            .rx_beacon_setup(&RxBeaconSetupParams {
                beacon_time: 256,
                symbol_timeout: 8,
                rx_time: Duration::ZERO,
            })
            .unwrap();
        assert_eq!(rx.datarate, DR_10);
        assert_eq!(rx.radio.frequency, 924_500_000);
        assert_eq!(rx.radio.modulation.spreading_factor, 10);
        assert_eq!(rx.radio.implicit_header_len, Some(19));
        assert_eq!(rx.radio.preamble_len, 10);
        assert!(!rx.radio.crc_on);
        assert!(!rx.radio.iq_inverted);
        assert!(rx.radio.continuous);
    }
}
