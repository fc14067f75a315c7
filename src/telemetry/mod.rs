//! # Telemetry Module
//!
//! Where combined records go once they are built.
//!
//! This module handles:
//! - The shared sliding window read by status queries
//! - The query view (parallel series for charting)
//! - The append-only CSV record log

pub mod logger;
pub mod window;

pub use logger::{CsvRecordLog, RecordSink};
pub use window::{PlotData, TelemetryWindow};
