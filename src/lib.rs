//! # Sensor Bridge Library
//!
//! Samples an I2C sensor set and a serial anemometer, combines their readings
//! into timestamped records, logs every record to CSV, relays a summary line
//! over a second serial port and keeps a bounded window of recent records for
//! live dashboards.

pub mod acquisition;
pub mod blocking;
pub mod config;
pub mod error;
pub mod record;
pub mod relay;
pub mod sensors;
pub mod serial;
pub mod telemetry;
