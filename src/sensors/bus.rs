//! # I2C Bus Sensor Reader
//!
//! Reads the HYT939 humidity/temperature chip and the HP206C
//! pressure/altitude chip and converts their raw registers into physical
//! units.
//!
//! ## HYT939 (default address 0x28)
//!
//! Trigger a measurement, wait, read 4 bytes:
//! ```text
//! Byte 0: [S1 S0 H13..H8]   status bits masked with 0x3F
//! Byte 1: [H7..H0]
//! Byte 2: [T13..T6]
//! Byte 3: [T5..T0 x x]      low 2 bits masked with 0xFC
//! ```
//!
//! ## HP206C (default address 0x76)
//!
//! Pressure/temperature conversion returns 6 bytes, altitude conversion
//! returns 3. Every value is 20 bits big-endian in 3 bytes, the top nibble of
//! the first byte being the most significant, in hundredths of a unit.
//!
//! The bus handle is acquired at the start of [`BusSensorReader::read`] and
//! dropped before it returns, on success and failure alike.

use embedded_hal::i2c::{Error as I2cError, I2c};
use linux_embedded_hal::I2cdev;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use crate::blocking::run_blocking;
use crate::config::BusConfig;
use crate::error::{Result, SensorBridgeError};
use crate::record::RawBusReading;

/// HYT939 14-bit full scale
const HYT939_FULL_SCALE: f64 = 16383.0;

/// HYT939 temperature span (-40..+125 °C)
const HYT939_TEMP_SPAN_C: f64 = 165.0;

/// HYT939 temperature offset
const HYT939_TEMP_OFFSET_C: f64 = -40.0;

/// HP206C values are reported in hundredths
const HP206C_SCALE: f64 = 100.0;

/// Source of bus handles, opened once per read
pub trait BusProvider: Send + Sync {
    /// Concrete bus handle type
    type Bus: I2c + Send;

    /// Open a bus handle
    fn acquire(&self) -> Result<Self::Bus>;
}

/// Opens `/dev/i2c-N` through linux-embedded-hal
#[derive(Debug, Clone)]
pub struct LinuxI2cProvider {
    device: PathBuf,
}

impl LinuxI2cProvider {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

impl BusProvider for LinuxI2cProvider {
    type Bus = I2cdev;

    fn acquire(&self) -> Result<I2cdev> {
        I2cdev::new(&self.device).map_err(|e| {
            SensorBridgeError::Bus(format!("Failed to open {}: {}", self.device.display(), e))
        })
    }
}

/// Addresses, commands and registers of the two chips
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusLayout {
    pub humidity_address: u8,
    pub humidity_trigger: u8,
    pub humidity_register: u8,
    pub pressure_address: u8,
    pub pressure_command: u8,
    pub pressure_register: u8,
    pub altitude_command: u8,
    pub altitude_register: u8,
}

impl From<&BusConfig> for BusLayout {
    fn from(config: &BusConfig) -> Self {
        Self {
            humidity_address: config.humidity_address,
            humidity_trigger: config.humidity_trigger,
            humidity_register: config.humidity_register,
            pressure_address: config.pressure_address,
            pressure_command: config.pressure_command,
            pressure_register: config.pressure_register,
            altitude_command: config.altitude_command,
            altitude_register: config.altitude_register,
        }
    }
}

impl Default for BusLayout {
    fn default() -> Self {
        Self::from(&BusConfig::default())
    }
}

/// Reader for the I2C chip set
///
/// [`read`](Self::read) never fails: any fault yields a reading with all
/// five fields absent.
pub struct BusSensorReader<P: BusProvider> {
    provider: P,
    layout: BusLayout,
    settle: Duration,
}

impl<P: BusProvider> BusSensorReader<P> {
    /// Create a reader
    ///
    /// # Arguments
    ///
    /// * `provider` - Opens a bus handle for each read
    /// * `layout` - Chip addresses, commands and registers
    /// * `settle` - Wait between a conversion command and its result
    pub fn new(provider: P, layout: BusLayout, settle: Duration) -> Self {
        Self {
            provider,
            layout,
            settle,
        }
    }

    /// Sample both chips
    ///
    /// Opens the bus, runs the three conversions and releases the bus.
    /// On any failure every field is `None`.
    pub async fn read(&self) -> RawBusReading {
        let mut bus = match run_blocking(|| self.provider.acquire()) {
            Ok(bus) => bus,
            Err(e) => {
                warn!("I2C bus unavailable: {}", e);
                return RawBusReading::absent();
            }
        };

        let result = self.sample(&mut bus).await;
        drop(bus);

        match result {
            Ok(reading) => {
                debug!("I2C reading: {:?}", reading);
                reading
            }
            Err(e) => {
                warn!("I2C read failed, reporting absent values: {}", e);
                RawBusReading::absent()
            }
        }
    }

    async fn sample(&self, bus: &mut P::Bus) -> Result<RawBusReading> {
        let layout = &self.layout;

        send_command(bus, layout.humidity_address, layout.humidity_trigger)?;
        tokio::time::sleep(self.settle).await;
        let mut hyt = [0u8; 4];
        read_register(bus, layout.humidity_address, layout.humidity_register, &mut hyt)?;
        let (humidity_pct, temperature_c) = decode_hyt939(&hyt);

        send_command(bus, layout.pressure_address, layout.pressure_command)?;
        tokio::time::sleep(self.settle).await;
        let mut hp = [0u8; 6];
        read_register(bus, layout.pressure_address, layout.pressure_register, &mut hp)?;
        let (pressure_mbar, temperature2_c) = decode_hp206c(&hp);

        send_command(bus, layout.pressure_address, layout.altitude_command)?;
        tokio::time::sleep(self.settle).await;
        let mut alt = [0u8; 3];
        read_register(bus, layout.pressure_address, layout.altitude_register, &mut alt)?;
        let altitude_m = decode_altitude(&alt);

        Ok(RawBusReading {
            humidity_pct: Some(humidity_pct),
            temperature_c: Some(temperature_c),
            pressure_mbar: Some(pressure_mbar),
            temperature2_c: Some(temperature2_c),
            altitude_m: Some(altitude_m),
        })
    }
}

fn send_command<B: I2c>(bus: &mut B, address: u8, command: u8) -> Result<()> {
    run_blocking(|| bus.write(address, &[command]))
        .map_err(|e| bus_error("write", address, command, e))
}

fn read_register<B: I2c>(bus: &mut B, address: u8, register: u8, buf: &mut [u8]) -> Result<()> {
    run_blocking(|| bus.write_read(address, &[register], buf))
        .map_err(|e| bus_error("read", address, register, e))
}

fn bus_error<E: I2cError>(op: &str, address: u8, byte: u8, e: E) -> SensorBridgeError {
    SensorBridgeError::Bus(format!(
        "{} 0x{:02X} at address 0x{:02X}: {:?}",
        op,
        byte,
        address,
        e.kind()
    ))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Decode an HYT939 measurement block
///
/// # Returns
///
/// * `(humidity %, temperature °C)`, rounded to two decimals
pub fn decode_hyt939(raw: &[u8; 4]) -> (f64, f64) {
    let humidity_raw = (u16::from(raw[0] & 0x3F) << 8) | u16::from(raw[1]);
    let humidity = f64::from(humidity_raw) * (100.0 / HYT939_FULL_SCALE);

    let temperature_raw = ((u16::from(raw[2]) << 8) | u16::from(raw[3] & 0xFC)) >> 2;
    let temperature =
        f64::from(temperature_raw) * (HYT939_TEMP_SPAN_C / HYT939_FULL_SCALE) + HYT939_TEMP_OFFSET_C;

    (round2(humidity), round2(temperature))
}

/// Unpack a 20-bit big-endian value from 3 bytes
///
/// Only the low nibble of the first byte is used.
pub fn unpack_20bit(raw: &[u8; 3]) -> u32 {
    (u32::from(raw[0] & 0x0F) << 16) | (u32::from(raw[1]) << 8) | u32::from(raw[2])
}

/// Decode an HP206C pressure/temperature block
///
/// # Returns
///
/// * `(pressure mbar, temperature °C)`, rounded to two decimals
pub fn decode_hp206c(raw: &[u8; 6]) -> (f64, f64) {
    let temperature = f64::from(unpack_20bit(&[raw[0], raw[1], raw[2]])) / HP206C_SCALE;
    let pressure = f64::from(unpack_20bit(&[raw[3], raw[4], raw[5]])) / HP206C_SCALE;
    (round2(pressure), round2(temperature))
}

/// Decode an HP206C altitude block into meters
pub fn decode_altitude(raw: &[u8; 3]) -> f64 {
    round2(f64::from(unpack_20bit(raw)) / HP206C_SCALE)
}
