//! # Command Dispatch
//!
//! Pending operator intents and the dispatch-then-read step of an
//! acquisition cycle.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::serial::port_trait::{LinkTransport, ReadFormat};
use crate::telemetry::protocol::{CMD_CANCEL_RELEASE, CMD_RELEASE_PAYLOAD};

/// Bitmask of outbound intents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Intents(u8);

impl Intents {
    pub const NONE: Intents = Intents(0);
    /// Send `r`: enable payload release
    pub const RELEASE_PAYLOAD: Intents = Intents(0x01);
    /// Send `u`: cancel payload release
    pub const CANCEL_RELEASE: Intents = Intents(0x02);
    /// Read one frame; implied by every cycle
    pub const READ_TELEMETRY: Intents = Intents(0x04);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Intents) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Intents) -> Intents {
        Intents(self.0 | other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Intents {
    type Output = Intents;

    fn bitor(self, rhs: Intents) -> Intents {
        self.union(rhs)
    }
}

/// Intent mask shared between the display loop and the acquisition task
///
/// The display loop only ORs bits in; a cycle snapshots the mask when it
/// starts and clears exactly the bits it consumed once its result is taken.
/// Bits raised while a cycle runs therefore wait for the next one.
#[derive(Debug, Clone, Default)]
pub struct IntentMask {
    bits: Arc<AtomicU8>,
}

impl IntentMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, intents: Intents) {
        self.bits.fetch_or(intents.bits(), Ordering::AcqRel);
    }

    pub fn request_release(&self) {
        self.request(Intents::RELEASE_PAYLOAD);
    }

    pub fn request_cancel(&self) {
        self.request(Intents::CANCEL_RELEASE);
    }

    /// Pending intents plus the always-on read
    pub fn snapshot(&self) -> Intents {
        Intents(self.bits.load(Ordering::Acquire)).union(Intents::READ_TELEMETRY)
    }

    pub fn clear(&self, consumed: Intents) {
        self.bits.fetch_and(!consumed.bits(), Ordering::AcqRel);
    }

    /// Currently pending operator intents
    pub fn pending(&self) -> Intents {
        Intents(self.bits.load(Ordering::Acquire))
    }
}

/// Turns pending intents into command bytes and performs the cycle's read
#[derive(Debug, Clone, Copy)]
pub struct CommandDispatcher {
    read_timeout: Duration,
    format: ReadFormat,
}

impl CommandDispatcher {
    pub fn new(read_timeout: Duration, format: ReadFormat) -> Self {
        Self { read_timeout, format }
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Write pending commands, then read once
    ///
    /// Release is written before cancel when both are pending; neither is
    /// suppressed. Write failures are logged and do not stop the read. A read
    /// error is logged and reported as empty text.
    pub async fn run_pending(&self, link: &mut dyn LinkTransport, intents: Intents) -> String {
        if intents.contains(Intents::RELEASE_PAYLOAD) {
            send(link, CMD_RELEASE_PAYLOAD).await;
        }
        if intents.contains(Intents::CANCEL_RELEASE) {
            send(link, CMD_CANCEL_RELEASE).await;
        }

        match link.read(self.read_timeout, self.format).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Telemetry read failed: {}", e);
                String::new()
            }
        }
    }
}

async fn send(link: &mut dyn LinkTransport, byte: u8) {
    match link.write_byte(byte).await {
        Ok(()) => debug!("Command {:?} sent", byte as char),
        Err(e) => warn!("Failed to send command {:?}: {}", byte as char, e),
    }
}
