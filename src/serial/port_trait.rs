//! Trait abstraction for the telemetry link to enable testing

use async_trait::async_trait;
use serde::Deserialize;
use std::io;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

/// How a read decides that a frame is complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadFormat {
    /// Return as soon as a newline-terminated line has arrived
    #[default]
    Line,
    /// Collect everything that arrives before the timeout
    Available,
}

/// Link transport consumed by the acquisition cycle
///
/// Reads never fail on timeout: an empty string means nothing arrived.
/// Anything returned may be partial or garbled; rejecting it is the
/// decoder's job.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LinkTransport: Send {
    /// Whether the device is currently open
    fn is_connected(&self) -> bool;

    /// Try to reopen a dropped link, returning whether it is now connected
    ///
    /// Transports that cannot reconnect keep the default.
    fn try_reconnect(&mut self) -> bool {
        false
    }

    /// Read one frame's worth of text, waiting at most `timeout`
    async fn read(&mut self, timeout: Duration, format: ReadFormat) -> io::Result<String>;

    /// Send a single command byte
    async fn write_byte(&mut self, byte: u8) -> io::Result<()>;
}
