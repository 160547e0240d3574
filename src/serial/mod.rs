//! # Serial Communication Module
//!
//! Handles the serial link to the flight computer's telemetry radio.
//!
//! This module handles:
//! - Opening the serial port (8N1, no flow control)
//! - Timed, non-failing reads of newline-terminated text frames
//! - Single-byte command writes
//! - Detecting a dropped device and reopening it

pub mod port_trait;

use async_trait::async_trait;
use bytes::BytesMut;
use std::io;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::error::{GroundStationError, Result};
use crate::telemetry::protocol::FRAME_PREFIX;
use port_trait::{LinkTransport, ReadFormat};

/// Initial size of the receive buffer
const READ_BUFFER_CAPACITY: usize = 512;

/// Unterminated bytes kept while waiting for a newline, several frames' worth
const MAX_PENDING_BYTES: usize = 4096;

/// Telemetry radio serial link
///
/// Keeps bytes that arrived after a complete frame for the next read.
pub struct SerialLink {
    /// Serial port handle, `None` once the device has dropped
    port: Option<tokio_serial::SerialStream>,
    /// Device path of the open (or last open) port
    device_path: String,
    /// Paths tried when reconnecting
    candidates: Vec<String>,
    baud_rate: u32,
    reconnect_interval: Duration,
    last_attempt: Option<Instant>,
    pending: BytesMut,
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("device_path", &self.device_path)
            .field("baud_rate", &self.baud_rate)
            .field("connected", &self.port.is_some())
            .finish_non_exhaustive()
    }
}

impl SerialLink {
    /// Open the link described by `config`
    ///
    /// Tries the primary port first, then each fallback.
    ///
    /// # Errors
    ///
    /// Returns `SerialPortNotFound` if no candidate device could be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ground_monitor::config::LinkConfig;
    /// use ground_monitor::serial::SerialLink;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let link = SerialLink::open(&LinkConfig::default())?;
    ///     println!("Connected to: {}", link.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(config: &LinkConfig) -> Result<Self> {
        Self::open_with_paths(
            &config.candidate_ports(),
            config.baud_rate,
            config.reconnect_interval(),
        )
    }

    /// Link with no open device that keeps retrying `config`'s ports
    ///
    /// Used when the radio is not plugged in at startup.
    pub fn detached(config: &LinkConfig) -> Self {
        Self {
            port: None,
            device_path: config.port.clone(),
            candidates: config.candidate_ports().into_iter().map(String::from).collect(),
            baud_rate: config.baud_rate,
            reconnect_interval: config.reconnect_interval(),
            last_attempt: None,
            pending: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
        }
    }

    /// Open the first device in `paths` that accepts the settings
    pub fn open_with_paths(paths: &[&str], baud_rate: u32, reconnect_interval: Duration) -> Result<Self> {
        let (port, device_path) = Self::open_first(paths, baud_rate)?;
        Ok(Self {
            port: Some(port),
            device_path,
            candidates: paths.iter().map(|p| p.to_string()).collect(),
            baud_rate,
            reconnect_interval,
            last_attempt: None,
            pending: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
        })
    }

    fn open_first(paths: &[&str], baud_rate: u32) -> Result<(tokio_serial::SerialStream, String)> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened telemetry link at {} ({} baud)", path, baud_rate);
                    return Ok((port, path.to_string()));
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(GroundStationError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open a specific serial port with 8N1 settings
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| GroundStationError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Mark the device as gone after a fatal I/O error
    fn drop_port(&mut self, error: &io::Error) {
        if self.port.take().is_some() {
            warn!("Telemetry link at {} dropped: {}", self.device_path, error);
            self.pending.clear();
        }
    }

    /// Take the next complete frame out of the receive buffer
    fn take_frame(&mut self, format: ReadFormat) -> Option<String> {
        match format {
            ReadFormat::Line => {
                let end = self.pending.iter().position(|&b| b == b'\n')?;
                let line = self.pending.split_to(end + 1);
                Some(String::from_utf8_lossy(&line).trim_end().to_string())
            }
            ReadFormat::Available => None,
        }
    }

    /// Discard unterminated bytes once they exceed [`MAX_PENDING_BYTES`]
    ///
    /// Keeps the buffer from the last frame start if there is one, so a
    /// frame still in transit survives.
    fn trim_stale(&mut self) {
        if self.pending.len() <= MAX_PENDING_BYTES {
            return;
        }

        let prefix = FRAME_PREFIX.as_bytes();
        let start = self
            .pending
            .windows(prefix.len())
            .rposition(|window| window == prefix);

        let dropped = match start {
            Some(pos) if pos > 0 && self.pending.len() - pos <= MAX_PENDING_BYTES => {
                self.pending.split_to(pos).len()
            }
            _ => {
                let len = self.pending.len();
                self.pending.clear();
                len
            }
        };
        warn!(
            "Discarded {} unterminated bytes from {}",
            dropped, self.device_path
        );
    }

    fn take_all(&mut self) -> String {
        let bytes = self.pending.split();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Errors after which the device is considered unplugged
fn is_fatal(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::PermissionDenied
            | io::ErrorKind::NotFound
    )
}

#[async_trait]
impl LinkTransport for SerialLink {
    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn try_reconnect(&mut self) -> bool {
        if self.port.is_some() {
            return true;
        }
        if self
            .last_attempt
            .is_some_and(|at| at.elapsed() < self.reconnect_interval)
        {
            return false;
        }
        self.last_attempt = Some(Instant::now());

        let paths: Vec<&str> = self.candidates.iter().map(String::as_str).collect();
        match Self::open_first(&paths, self.baud_rate) {
            Ok((port, device_path)) => {
                info!("Telemetry link reconnected at {}", device_path);
                self.port = Some(port);
                self.device_path = device_path;
                true
            }
            Err(e) => {
                debug!("Reconnect failed: {}", e);
                false
            }
        }
    }

    async fn read(&mut self, timeout: Duration, format: ReadFormat) -> io::Result<String> {
        if let Some(frame) = self.take_frame(format) {
            return Ok(frame);
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let Some(port) = self.port.as_mut() else {
                return Err(io::Error::new(io::ErrorKind::NotConnected, "link not connected"));
            };

            let received = tokio::time::timeout_at(deadline, port.read_buf(&mut self.pending)).await;
            match received {
                // Timed out: a partial line stays buffered for the next cycle
                Err(_) => {
                    return Ok(match format {
                        ReadFormat::Line => String::new(),
                        ReadFormat::Available => self.take_all(),
                    });
                }
                Ok(Ok(0)) => {
                    let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "serial device closed");
                    self.drop_port(&eof);
                    return Err(eof);
                }
                Ok(Ok(n)) => {
                    debug!("Received {} bytes", n);
                    if let Some(frame) = self.take_frame(format) {
                        return Ok(frame);
                    }
                    if format == ReadFormat::Line {
                        self.trim_stale();
                    }
                }
                Ok(Err(e)) => {
                    if is_fatal(&e) {
                        self.drop_port(&e);
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "link not connected"))?;

        let result = async {
            port.write_all(&[byte]).await?;
            port.flush().await
        }
        .await;

        match result {
            Ok(()) => {
                debug!("Sent command byte {:?}", byte as char);
                Ok(())
            }
            Err(e) => {
                if is_fatal(&e) {
                    self.drop_port(&e);
                }
                Err(e)
            }
        }
    }
}
