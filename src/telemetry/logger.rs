//! # CSV Record Log
//!
//! Append-only CSV log of every combined record. The header is written once
//! when the file is created; each row is flushed and synced to disk before
//! `append` returns, so an interrupted process loses at most the record in
//! flight.

use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::record::{render_value, CombinedRecord};

/// Column names, in row order
pub const CSV_HEADER: [&str; 9] = [
    "timestamp",
    "i2c_humidity",
    "i2c_temperature",
    "i2c_pressure",
    "i2c_altitude",
    "anem_humidity",
    "anem_temperature",
    "anem_pressure",
    "anem_windspeed",
];

/// Timestamp format of the `timestamp` column
pub const CSV_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Write-only consumer of combined records
pub trait RecordSink: Send {
    /// Persist one record
    fn append(&mut self, record: &CombinedRecord) -> Result<()>;
}

/// Build the log file path for a run started at `started`
///
/// `<dir>/<prefix>_YYYYmmdd_HHMMSS.csv`
pub fn log_file_path(dir: impl AsRef<Path>, prefix: &str, started: DateTime<Local>) -> PathBuf {
    dir.as_ref()
        .join(format!("{}_{}.csv", prefix, started.format("%Y%m%d_%H%M%S")))
}

/// CSV file sink
pub struct CsvRecordLog {
    path: PathBuf,
    writer: csv::Writer<File>,
    records: u64,
}

impl std::fmt::Debug for CsvRecordLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvRecordLog")
            .field("path", &self.path)
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl CsvRecordLog {
    /// Create the log file and write the header
    ///
    /// Missing parent directories are created. An existing file at `path` is
    /// truncated.
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created or the
    /// header cannot be written
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(&path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(CSV_HEADER)?;
        writer.flush()?;
        writer.get_ref().sync_data()?;

        info!("Logging records to {}", path.display());
        Ok(Self {
            path,
            writer,
            records: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records written so far
    pub fn records(&self) -> u64 {
        self.records
    }
}

impl RecordSink for CsvRecordLog {
    fn append(&mut self, record: &CombinedRecord) -> Result<()> {
        let mut row = Vec::with_capacity(CSV_HEADER.len());
        row.push(record.timestamp().format(CSV_TIMESTAMP_FORMAT).to_string());
        row.extend(record.values().iter().map(|v| render_value(*v)));

        self.writer.write_record(&row)?;
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.records += 1;
        Ok(())
    }
}
