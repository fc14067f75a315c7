//! # Error Types
//!
//! Custom error types for Sensor Bridge using `thiserror`.

use thiserror::Error;

/// Main error type for Sensor Bridge
#[derive(Debug, Error)]
pub enum SensorBridgeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Serial port errors (open, read, write)
    #[error("Serial error: {0}")]
    Serial(String),

    /// I2C bus transaction errors
    #[error("I2C bus error: {0}")]
    Bus(String),

    /// Record log errors
    #[error("Record log error: {0}")]
    Log(#[from] csv::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Sensor Bridge
pub type Result<T> = std::result::Result<T, SensorBridgeError>;
