//! # Error Types
//!
//! Custom error types for the ground monitor using `thiserror`.

use thiserror::Error;

/// Main error type for the ground monitor
#[derive(Debug, Error)]
pub enum GroundStationError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("No serial device found (tried: {0})")]
    SerialPortNotFound(String),

    /// Telemetry frame could not be decoded
    #[error("Frame decode error: {0}")]
    Decode(#[from] DecodeError),

    /// An acquisition cycle is already running
    #[error("Acquisition cycle already in flight")]
    CycleInFlight,

    /// The previous cycle's result has not been taken yet
    #[error("Acquisition result not yet drained")]
    ResultPending,

    /// The background cycle died and took the transport with it
    #[error("Link transport lost by acquisition task")]
    TransportLost,

    /// Rolling window span must be finite and positive
    #[error("Invalid window span: {0} s")]
    InvalidWindowSpan(f64),

    /// Session log serialization errors
    #[error("Session log error: {0}")]
    SessionLog(#[from] serde_json::Error),
}

/// Reasons a raw telemetry frame is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Frame has fewer separators than the minimum layout needs
    #[error("too few fields: found {found} separators")]
    TooFewFields { found: usize },

    /// A field is missing or is not a decimal integer
    #[error("malformed field {field}: {value:?}")]
    MalformedField { field: &'static str, value: String },
}

/// Result type alias for the ground monitor
pub type Result<T> = std::result::Result<T, GroundStationError>;
