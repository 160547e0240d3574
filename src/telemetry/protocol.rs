//! # Telemetry Protocol Constants and Types
//!
//! Wire constants and decoded sample types for the flight computer's
//! colon-delimited text frames.

use serde::Serialize;
use std::time::Instant;

/// Leading tag of every inbound text frame
pub const FRAME_PREFIX: &str = "Data";

/// Field separator in inbound text frames
pub const FIELD_SEPARATOR: char = ':';

/// Minimum number of separators a frame must carry to be considered
pub const MIN_SEPARATORS: usize = 13;

/// Number of separator positions the decoder locates
pub const SEPARATOR_SLOTS: usize = 16;

/// Outbound command byte: enable payload release
pub const CMD_RELEASE_PAYLOAD: u8 = b'r';

/// Outbound command byte: cancel payload release
pub const CMD_CANCEL_RELEASE: u8 = b'u';

/// Frame shown before anything has been received
pub const PLACEHOLDER_FRAME: &str = "Data:00:00:00:00:00:00:00:00:00:00:00:00:";

/// Three-axis sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Mission phases reported in the state byte, high bit first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissionPhase {
    OnPad,
    Launched,
    Apogee,
    Ascending,
    Descending,
    DrogueDeployed,
    MainDeployed,
    Landed,
}

impl MissionPhase {
    /// All phases in wire order (bit 7 down to bit 0)
    pub const ALL: [MissionPhase; 8] = [
        MissionPhase::OnPad,
        MissionPhase::Launched,
        MissionPhase::Apogee,
        MissionPhase::Ascending,
        MissionPhase::Descending,
        MissionPhase::DrogueDeployed,
        MissionPhase::MainDeployed,
        MissionPhase::Landed,
    ];

    /// Bit mask of this phase in the state byte
    pub const fn mask(self) -> u8 {
        match self {
            MissionPhase::OnPad => 0x80,
            MissionPhase::Launched => 0x40,
            MissionPhase::Apogee => 0x20,
            MissionPhase::Ascending => 0x10,
            MissionPhase::Descending => 0x08,
            MissionPhase::DrogueDeployed => 0x04,
            MissionPhase::MainDeployed => 0x02,
            MissionPhase::Landed => 0x01,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            MissionPhase::OnPad => "On Pad",
            MissionPhase::Launched => "Launched",
            MissionPhase::Apogee => "Apogee",
            MissionPhase::Ascending => "Ascending",
            MissionPhase::Descending => "Descending",
            MissionPhase::DrogueDeployed => "Drogue Deployed",
            MissionPhase::MainDeployed => "Main Deployed",
            MissionPhase::Landed => "Landed",
        }
    }
}

/// Mission state byte
///
/// Each bit is an independent flag. The flight computer does not keep them
/// mutually exclusive, so any combination is representable and rendered as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct MissionState(u8);

impl MissionState {
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, phase: MissionPhase) -> bool {
        self.0 & phase.mask() != 0
    }

    pub fn set(&mut self, phase: MissionPhase, active: bool) {
        if active {
            self.0 |= phase.mask();
        } else {
            self.0 &= !phase.mask();
        }
    }

    /// Every phase with its own active flag, high bit first
    pub fn phases(self) -> impl Iterator<Item = (MissionPhase, bool)> {
        MissionPhase::ALL
            .into_iter()
            .map(move |phase| (phase, self.contains(phase)))
    }

    /// Phases currently flagged
    pub fn active(self) -> impl Iterator<Item = MissionPhase> {
        self.phases().filter_map(|(phase, on)| on.then_some(phase))
    }
}

/// One decoded telemetry observation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TelemetrySample {
    /// Monotonic seconds since the monitor started
    pub timestamp: f64,

    pub orientation: Vector3,

    pub acceleration: Vector3,

    pub magnetic: Vector3,

    pub force: f64,

    pub temperature: f64,

    /// Elapsed time reported by the flight computer
    pub mission_time: f64,

    pub altitude: f64,

    pub state_flags: MissionState,
}

impl TelemetrySample {
    /// Same sample stamped with a new receive time
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Monotonic clock started with the monitor
#[derive(Debug, Clone, Copy)]
pub struct MissionClock {
    start: Instant,
}

impl MissionClock {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    /// Seconds since the clock started
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for MissionClock {
    fn default() -> Self {
        Self::start()
    }
}
