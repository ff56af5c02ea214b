use core::time::Duration;

/// LoRa channel bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bandwidth {
    /// 125 kHz
    Khz125,
    /// 250 kHz
    Khz250,
    /// 500 kHz
    Khz500,
}

impl Bandwidth {
    /// Bandwidth in Hz
    pub const fn hz(self) -> u32 {
        match self {
            Bandwidth::Khz125 => 125_000,
            Bandwidth::Khz250 => 250_000,
            Bandwidth::Khz500 => 500_000,
        }
    }
}

/// Radio modulation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModulationParams {
    /// Spreading factor (SF7-SF12)
    pub spreading_factor: u8,
    /// Channel bandwidth
    pub bandwidth: Bandwidth,
    /// Coding rate denominator (5 for 4/5 up to 8 for 4/8)
    pub coding_rate: u8,
}

/// Radio transmission parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxConfig {
    /// Conducted transmission power in dBm
    pub power: i8,
    /// Frequency in Hz
    pub frequency: u32,
    /// Modulation parameters
    pub modulation: ModulationParams,
    /// Preamble length in symbols
    pub preamble_len: u16,
    /// Payload CRC enabled
    pub crc_on: bool,
    /// Transmission watchdog
    pub timeout: Duration,
}

/// Radio receive parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxConfig {
    /// Frequency in Hz
    pub frequency: u32,
    /// Modulation parameters
    pub modulation: ModulationParams,
    /// Preamble length in symbols
    pub preamble_len: u16,
    /// Single reception timeout in symbols
    pub symbol_timeout: u16,
    /// Fixed payload length for implicit header frames (beacons)
    pub implicit_header_len: Option<u8>,
    /// Payload CRC expected
    pub crc_on: bool,
    /// Inverted IQ (downlinks)
    pub iq_inverted: bool,
    /// Keep receiving until stopped
    pub continuous: bool,
    /// Maximum accepted payload length in bytes
    pub max_payload_len: u8,
}

/// Continuous wave test transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuousWave {
    /// Frequency in Hz
    pub frequency: u32,
    /// Conducted power in dBm
    pub power: i8,
    /// How long to keep the carrier on
    pub timeout: Duration,
}

#[cfg(feature = "defmt")]
impl defmt::Format for ContinuousWave {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "ContinuousWave {{ frequency: {=u32}, power: {=i8}, timeout_ms: {=u64} }}",
            self.frequency,
            self.power,
            self.timeout.as_millis() as u64
        )
    }
}

/// Generic radio interface trait
pub trait Radio {
    /// Error type for radio operations
    type Error;

    /// Configure the radio for transmission
    fn configure_tx(&mut self, config: TxConfig) -> Result<(), Self::Error>;

    /// Configure the radio for reception
    fn configure_rx(&mut self, config: RxConfig) -> Result<(), Self::Error>;

    /// Emit an unmodulated carrier
    fn set_tx_continuous_wave(&mut self, cw: ContinuousWave) -> Result<(), Self::Error>;

    /// Transmit data
    fn transmit(&mut self, buffer: &[u8]) -> Result<(), Self::Error>;

    /// Receive data into the provided buffer
    /// Returns the number of bytes received
    fn receive(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error>;

    /// Put the radio into sleep mode
    fn sleep(&mut self) -> Result<(), Self::Error>;
}
