//! # Record Types
//!
//! Readings produced by the two sensor sources and the combined record that
//! is stored, logged and relayed once per acquisition cycle.
//!
//! Every physical value is an `Option<f64>`: `None` means "no valid reading
//! this cycle" and is distinct from zero.

use chrono::{DateTime, Local, SubsecRound};

/// Rendering of an absent value in the CSV log and the relay frame
pub const ABSENT_FIELD: &str = "";

/// Readings from the I2C chip set
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawBusReading {
    /// HYT939 relative humidity (%)
    pub humidity_pct: Option<f64>,

    /// HYT939 temperature (°C)
    pub temperature_c: Option<f64>,

    /// HP206C pressure (mbar)
    pub pressure_mbar: Option<f64>,

    /// HP206C temperature (°C)
    pub temperature2_c: Option<f64>,

    /// HP206C altitude (m)
    pub altitude_m: Option<f64>,
}

impl RawBusReading {
    /// Reading with every field absent
    pub fn absent() -> Self {
        Self::default()
    }

    /// True when no field carries a value
    pub fn is_absent(&self) -> bool {
        *self == Self::absent()
    }
}

/// Readings from one anemometer line
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineReading {
    /// Temperature (°C), label `T`
    pub temperature_c: Option<f64>,

    /// Relative humidity (%), label `H`
    pub humidity_pct: Option<f64>,

    /// Pressure (mbar), label `P`
    pub pressure_mbar: Option<f64>,

    /// Wind speed (m/s), label `S`
    pub wind_speed_ms: Option<f64>,
}

impl LineReading {
    /// Reading with every field absent
    pub fn absent() -> Self {
        Self::default()
    }

    /// True when no field carries a value
    pub fn is_absent(&self) -> bool {
        *self == Self::absent()
    }
}

/// One timestamped union of a bus reading and a line reading
///
/// Fields are private; a record cannot change after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRecord {
    timestamp: DateTime<Local>,
    bus: RawBusReading,
    line: LineReading,
}

impl CombinedRecord {
    /// Build a record, truncating the timestamp to whole seconds
    pub fn new(timestamp: DateTime<Local>, bus: RawBusReading, line: LineReading) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(0),
            bus,
            line,
        }
    }

    /// Build a record stamped with the current wall-clock time
    pub fn now(bus: RawBusReading, line: LineReading) -> Self {
        Self::new(Local::now(), bus, line)
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn bus(&self) -> &RawBusReading {
        &self.bus
    }

    pub fn line(&self) -> &LineReading {
        &self.line
    }

    /// The eight relayed/logged values in their fixed order
    ///
    /// bus humidity, bus temperature, bus pressure, bus altitude,
    /// line humidity, line temperature, line pressure, line wind speed.
    pub fn values(&self) -> [Option<f64>; 8] {
        [
            self.bus.humidity_pct,
            self.bus.temperature_c,
            self.bus.pressure_mbar,
            self.bus.altitude_m,
            self.line.humidity_pct,
            self.line.temperature_c,
            self.line.pressure_mbar,
            self.line.wind_speed_ms,
        ]
    }
}

/// Render a value for a text field, absent as [`ABSENT_FIELD`]
pub fn render_value(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => ABSENT_FIELD.to_string(),
    }
}
