//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all, see [`Config::default`]) describes the reference hardware: HYT939 and
//! HP206C on `/dev/i2c-1`, anemometer on `/dev/ttyUSB0`, relay on
//! `/dev/ttyUSB1`.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, SensorBridgeError};

/// Baud rates accepted for either serial link
pub const SUPPORTED_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200, 230400];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_anemometer_port")]
    pub anemometer_port: String,

    #[serde(default = "default_baud_rate")]
    pub anemometer_baud: u32,

    #[serde(default = "default_relay_port")]
    pub relay_port: String,

    #[serde(default = "default_baud_rate")]
    pub relay_baud: u32,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_max_line_attempts")]
    pub max_line_attempts: usize,

    /// Longest anemometer line kept; longer lines are dropped
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

/// I2C bus configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BusConfig {
    #[serde(default = "default_bus_device")]
    pub device: String,

    #[serde(default = "default_humidity_address")]
    pub humidity_address: u8,

    #[serde(default = "default_humidity_trigger")]
    pub humidity_trigger: u8,

    #[serde(default = "default_humidity_register")]
    pub humidity_register: u8,

    #[serde(default = "default_pressure_address")]
    pub pressure_address: u8,

    #[serde(default = "default_pressure_command")]
    pub pressure_command: u8,

    #[serde(default = "default_pressure_register")]
    pub pressure_register: u8,

    #[serde(default = "default_altitude_command")]
    pub altitude_command: u8,

    #[serde(default = "default_altitude_register")]
    pub altitude_register: u8,

    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

/// Acquisition loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AcquisitionConfig {
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,

    #[serde(default = "default_max_points")]
    pub max_points: usize,

    #[serde(default = "default_status_interval_cycles")]
    pub status_interval_cycles: u64,
}

/// CSV record log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

/// Diagnostic logging configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for daily rolling diagnostic logs; stdout only when unset
    #[serde(default)]
    pub diagnostics_dir: Option<String>,
}

// Default value functions
fn default_anemometer_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_relay_port() -> String { "/dev/ttyUSB1".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_read_timeout_ms() -> u64 { 1000 }
fn default_max_line_attempts() -> usize { 10 }
fn default_max_line_bytes() -> usize { 256 }

fn default_bus_device() -> String { "/dev/i2c-1".to_string() }
fn default_humidity_address() -> u8 { 0x28 }
fn default_humidity_trigger() -> u8 { 0x80 }
fn default_humidity_register() -> u8 { 0x00 }
fn default_pressure_address() -> u8 { 0x76 }
fn default_pressure_command() -> u8 { 0x44 }
fn default_pressure_register() -> u8 { 0x10 }
fn default_altitude_command() -> u8 { 0x45 }
fn default_altitude_register() -> u8 { 0x31 }
fn default_settle_ms() -> u64 { 100 }

fn default_period_ms() -> u64 { 100 }
fn default_max_points() -> usize { 50 }
fn default_status_interval_cycles() -> u64 { 100 }

fn default_log_dir() -> String { "./logs".to_string() }
fn default_file_prefix() -> String { "sensorlog".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            anemometer_port: default_anemometer_port(),
            anemometer_baud: default_baud_rate(),
            relay_port: default_relay_port(),
            relay_baud: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            max_line_attempts: default_max_line_attempts(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            device: default_bus_device(),
            humidity_address: default_humidity_address(),
            humidity_trigger: default_humidity_trigger(),
            humidity_register: default_humidity_register(),
            pressure_address: default_pressure_address(),
            pressure_command: default_pressure_command(),
            pressure_register: default_pressure_register(),
            altitude_command: default_altitude_command(),
            altitude_register: default_altitude_register(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            max_points: default_max_points(),
            status_interval_cycles: default_status_interval_cycles(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            file_prefix: default_file_prefix(),
        }
    }
}

impl SerialConfig {
    /// Timeout applied to a single anemometer line read
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl BusConfig {
    /// Wait between a conversion command and reading its result
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl AcquisitionConfig {
    /// Sampling period of the acquisition loop
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

fn invalid(message: impl std::fmt::Display) -> SensorBridgeError {
    SensorBridgeError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sensor_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Serial links
        if self.serial.anemometer_port.is_empty() {
            return Err(invalid("anemometer_port cannot be empty"));
        }

        if self.serial.relay_port.is_empty() {
            return Err(invalid("relay_port cannot be empty"));
        }

        if self.serial.anemometer_port == self.serial.relay_port {
            return Err(invalid("anemometer_port and relay_port must be different devices"));
        }

        for (name, baud) in [
            ("anemometer_baud", self.serial.anemometer_baud),
            ("relay_baud", self.serial.relay_baud),
        ] {
            if !SUPPORTED_BAUD_RATES.contains(&baud) {
                return Err(invalid(format!(
                    "{} must be one of: {:?}",
                    name, SUPPORTED_BAUD_RATES
                )));
            }
        }

        if self.serial.read_timeout_ms == 0 || self.serial.read_timeout_ms > 10000 {
            return Err(invalid("read_timeout_ms must be between 1 and 10000"));
        }

        if self.serial.max_line_attempts == 0 || self.serial.max_line_attempts > 100 {
            return Err(invalid("max_line_attempts must be between 1 and 100"));
        }

        if self.serial.max_line_bytes < 16 || self.serial.max_line_bytes > 65536 {
            return Err(invalid("max_line_bytes must be between 16 and 65536"));
        }

        // I2C bus
        if self.bus.device.is_empty() {
            return Err(invalid("bus device cannot be empty"));
        }

        for (name, address) in [
            ("humidity_address", self.bus.humidity_address),
            ("pressure_address", self.bus.pressure_address),
        ] {
            if address > 0x7F {
                return Err(invalid(format!(
                    "{} 0x{:02X} is not a 7-bit I2C address",
                    name, address
                )));
            }
        }

        if self.bus.humidity_address == self.bus.pressure_address {
            return Err(invalid("humidity_address and pressure_address must differ"));
        }

        if self.bus.settle_ms == 0 || self.bus.settle_ms > 5000 {
            return Err(invalid("settle_ms must be between 1 and 5000"));
        }

        // Acquisition
        if self.acquisition.period_ms == 0 || self.acquisition.period_ms > 60000 {
            return Err(invalid("period_ms must be between 1 and 60000"));
        }

        if self.acquisition.max_points == 0 {
            return Err(invalid("max_points must be greater than 0"));
        }

        if self.acquisition.status_interval_cycles == 0 {
            return Err(invalid("status_interval_cycles must be greater than 0"));
        }

        // Record log
        if self.log.dir.is_empty() {
            return Err(invalid("log dir cannot be empty"));
        }

        if self.log.file_prefix.is_empty() {
            return Err(invalid("log file_prefix cannot be empty"));
        }

        if matches!(&self.logging.diagnostics_dir, Some(dir) if dir.is_empty()) {
            return Err(invalid("diagnostics_dir cannot be empty when set"));
        }

        Ok(())
    }
}
