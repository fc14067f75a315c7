//! Trait abstraction for serial port operations to enable testing

use async_trait::async_trait;
use std::io;

/// Trait for serial port write operations (relay link)
#[async_trait]
pub trait SerialPortIO: Send {
    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;
}

/// Trait for line-oriented serial reads (anemometer link)
#[async_trait]
pub trait LineSource: Send {
    /// Read one line, trimmed
    ///
    /// Returns an empty string when no complete line arrived in time.
    async fn read_line(&mut self) -> io::Result<String>;
}
