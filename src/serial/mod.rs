//! # Serial Communication Module
//!
//! Handles the two serial links.
//!
//! This module handles:
//! - Opening serial ports at 8N1, no flow control
//! - Reading newline-terminated lines from the anemometer with a timeout
//! - Writing flushed relay frames to the downstream consumer

pub mod port_trait;

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::error::{Result, SensorBridgeError};
pub use port_trait::{LineSource, SerialPortIO};

/// Open a serial port with 8N1 settings
///
/// # Arguments
///
/// * `path` - Device path (e.g., "/dev/ttyUSB0")
/// * `baud_rate` - Line speed
///
/// # Errors
///
/// Returns `Serial` error if the device is missing, busy or cannot be
/// configured
pub fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
    use tokio_serial::SerialPortBuilderExt;

    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| SensorBridgeError::Serial(format!("Failed to open {}: {}", path, e)))?;

    info!("Opened serial port {} at {} baud", path, baud_rate);
    Ok(port)
}

/// Default limit on the length of one anemometer line, terminator included
pub const DEFAULT_MAX_LINE_BYTES: usize = 256;

/// Line reader over any async byte stream
///
/// Bytes of a line that is still incomplete when a read times out are kept
/// and completed by the next read. A line that grows past `max_line_bytes`
/// without a terminator is dropped up to and including its next `\n`, so
/// `pending` never holds more than `max_line_bytes`.
pub struct SerialLineReader<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    timeout: Duration,
    max_line_bytes: usize,
    discarding: bool,
}

impl<R> std::fmt::Debug for SerialLineReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLineReader")
            .field("pending", &self.pending.len())
            .field("timeout", &self.timeout)
            .field("max_line_bytes", &self.max_line_bytes)
            .field("discarding", &self.discarding)
            .finish_non_exhaustive()
    }
}

impl SerialLineReader<tokio_serial::SerialStream> {
    /// Open the anemometer port
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sensor_bridge::serial::SerialLineReader;
    /// use std::time::Duration;
    ///
    /// let reader = SerialLineReader::open("/dev/ttyUSB0", 115200, Duration::from_secs(1))?
    ///     .with_max_line_bytes(512);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        Ok(Self::new(open_port(path, baud_rate)?, timeout))
    }
}

impl<R: AsyncRead + Unpin + Send> SerialLineReader<R> {
    pub fn new(inner: R, timeout: Duration) -> Self {
        Self {
            reader: BufReader::new(inner),
            pending: Vec::new(),
            timeout,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            discarding: false,
        }
    }

    /// Replace the line length limit (at least one byte)
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes.max(1);
        self
    }

    /// Move buffered bytes into `pending` until a `\n` is stored
    ///
    /// Returns `false` at end of stream. Only `fill_buf` awaits, and bytes
    /// are consumed in the same poll they are copied, so a timeout that
    /// drops this future loses nothing.
    async fn fill_line(&mut self) -> io::Result<bool> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(false);
            }

            let newline = available.iter().position(|&b| b == b'\n');
            let take = newline.map_or(available.len(), |i| i + 1);

            if self.discarding {
                self.reader.consume(take);
                if newline.is_some() {
                    self.discarding = false;
                }
                continue;
            }

            if self.pending.len() + take > self.max_line_bytes {
                warn!(
                    "Anemometer line exceeds {} bytes, dropping it",
                    self.max_line_bytes
                );
                self.pending.clear();
                self.reader.consume(take);
                self.discarding = newline.is_none();
                continue;
            }

            self.pending.extend_from_slice(&available[..take]);
            self.reader.consume(take);
            if newline.is_some() {
                return Ok(true);
            }
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> LineSource for SerialLineReader<R> {
    async fn read_line(&mut self) -> io::Result<String> {
        let timeout = self.timeout;
        match tokio::time::timeout(timeout, self.fill_line()).await {
            Err(_) => {
                debug!("Line read timed out ({} bytes pending)", self.pending.len());
                Ok(String::new())
            }
            Ok(Err(e)) => {
                self.pending.clear();
                Err(e)
            }
            Ok(Ok(false)) if self.pending.is_empty() => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "serial stream closed",
            )),
            Ok(Ok(_)) => {
                let line = String::from_utf8_lossy(&self.pending).trim().to_string();
                self.pending.clear();
                Ok(line)
            }
        }
    }
}

/// Relay port writer over any async byte sink
pub struct SerialWriter<W> {
    port: W,
}

impl SerialWriter<tokio_serial::SerialStream> {
    /// Open the relay port
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        Ok(Self::new(open_port(path, baud_rate)?))
    }
}

impl<W: AsyncWrite + Unpin + Send> SerialWriter<W> {
    pub fn new(port: W) -> Self {
        Self { port }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> SerialPortIO for SerialWriter<W> {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.port.flush().await
    }
}
