//! # Telemetry Window
//!
//! Bounded FIFO of the most recent combined records, shared between the
//! acquisition task (single writer) and any number of readers.
//!
//! The handle is cheap to clone; every clone refers to the same buffer.
//! Appending takes the write lock once for the eviction and the push, so a
//! reader never sees more than `capacity` records or a half-applied append.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::record::CombinedRecord;

/// Chart label format of the query view
pub const PLOT_TIMESTAMP_FORMAT: &str = "%H:%M:%S";

/// Shared sliding window of combined records
#[derive(Debug, Clone)]
pub struct TelemetryWindow {
    records: Arc<RwLock<VecDeque<CombinedRecord>>>,
    capacity: usize,
}

impl TelemetryWindow {
    /// Create an empty window
    ///
    /// A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Append a record, evicting the oldest one when full
    pub fn append(&self, record: CombinedRecord) {
        let mut records = self.write();
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<CombinedRecord> {
        self.read().iter().cloned().collect()
    }

    /// Current contents as index-aligned series
    pub fn plot_data(&self) -> PlotData {
        PlotData::from_records(self.read().iter())
    }

    /// Most recently appended record
    pub fn latest(&self) -> Option<CombinedRecord> {
        self.read().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // A panicking holder cannot leave the deque half-updated, so poisoning
    // is ignored.
    fn read(&self) -> RwLockReadGuard<'_, VecDeque<CombinedRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, VecDeque<CombinedRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// I2C series of the query view
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BusSeries {
    pub humidity: Vec<Option<f64>>,
    pub temperature: Vec<Option<f64>>,
    pub pressure: Vec<Option<f64>>,
    pub altitude: Vec<Option<f64>>,
}

/// Anemometer series of the query view
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LineSeries {
    pub humidity: Vec<Option<f64>>,
    pub temperature: Vec<Option<f64>>,
    pub pressure: Vec<Option<f64>>,
    pub windspeed: Vec<Option<f64>>,
}

/// Window contents as parallel, index-aligned sequences
///
/// Serializes to the JSON shape the dashboard charts consume:
///
/// ```json
/// {
///   "timestamps": ["14:03:09", ...],
///   "i2c":  { "humidity": [...], "temperature": [...], "pressure": [...], "altitude": [...] },
///   "anem": { "humidity": [...], "temperature": [...], "pressure": [...], "windspeed": [...] }
/// }
/// ```
///
/// Absent values serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlotData {
    pub timestamps: Vec<String>,
    pub i2c: BusSeries,
    pub anem: LineSeries,
}

impl PlotData {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a CombinedRecord>) -> Self {
        let mut data = PlotData::default();
        for record in records {
            data.push(record);
        }
        data
    }

    fn push(&mut self, record: &CombinedRecord) {
        self.timestamps.push(format_plot_timestamp(record.timestamp()));

        let bus = record.bus();
        self.i2c.humidity.push(bus.humidity_pct);
        self.i2c.temperature.push(bus.temperature_c);
        self.i2c.pressure.push(bus.pressure_mbar);
        self.i2c.altitude.push(bus.altitude_m);

        let line = record.line();
        self.anem.humidity.push(line.humidity_pct);
        self.anem.temperature.push(line.temperature_c);
        self.anem.pressure.push(line.pressure_mbar);
        self.anem.windspeed.push(line.wind_speed_ms);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

fn format_plot_timestamp(timestamp: DateTime<Local>) -> String {
    timestamp.format(PLOT_TIMESTAMP_FORMAT).to_string()
}
