//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{GroundStationError, Result};
use crate::serial::port_trait::ReadFormat;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub session_log: SessionLogConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_fallback_ports")]
    pub fallback_ports: Vec<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    #[serde(default)]
    pub frame_format: ReadFormat,
}

/// Display loop and rolling channel configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_window_span_s")]
    pub window_span_s: f64,

    #[serde(default = "default_frame_rate_hz")]
    pub frame_rate_hz: u32,

    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default = "default_status_interval_frames")]
    pub status_interval_frames: u64,
}

/// Session log sink configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SessionLogConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default)]
    pub format: SessionLogFormat,
}

/// Application (tracing) log configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for the daily rolling log file; empty means console only
    #[serde(default)]
    pub directory: String,
}

/// On-disk format of the session log
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionLogFormat {
    #[default]
    Csv,
    Jsonl,
}

impl SessionLogFormat {
    /// File extension used for session log files
    pub fn extension(self) -> &'static str {
        match self {
            SessionLogFormat::Csv => "csv",
            SessionLogFormat::Jsonl => "jsonl",
        }
    }
}

/// Baud rates accepted for the telemetry radio
const VALID_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

// Default value functions
fn default_serial_port() -> String { "/dev/ttyACM0".to_string() }
fn default_fallback_ports() -> Vec<String> { vec!["/dev/ttyUSB0".to_string()] }
fn default_baud_rate() -> u32 { 9600 }
fn default_timeout_ms() -> u64 { 250 }
fn default_reconnect_interval_ms() -> u64 { 1000 }

fn default_window_span_s() -> f64 { 20.0 }
fn default_frame_rate_hz() -> u32 { 60 }
fn default_channel_capacity() -> usize { 2000 }
fn default_status_interval_frames() -> u64 { 300 }

fn default_log_dir() -> String { "./logs".to_string() }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            fallback_ports: default_fallback_ports(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            frame_format: ReadFormat::default(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            window_span_s: default_window_span_s(),
            frame_rate_hz: default_frame_rate_hz(),
            channel_capacity: default_channel_capacity(),
            status_interval_frames: default_status_interval_frames(),
        }
    }
}

impl Default for SessionLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_log_dir(),
            format: SessionLogFormat::default(),
        }
    }
}

impl LinkConfig {
    /// Candidate device paths, primary port first
    pub fn candidate_ports(&self) -> Vec<&str> {
        std::iter::once(self.port.as_str())
            .chain(self.fallback_ports.iter().map(String::as_str))
            .collect()
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

impl DisplayConfig {
    /// Period of one display frame
    pub fn frame_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.frame_rate_hz))
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ground_monitor::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.link.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if self.link.fallback_ports.iter().any(String::is_empty) {
            return Err(invalid("fallback_ports cannot contain empty paths"));
        }

        if !VALID_BAUD_RATES.contains(&self.link.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {:?}",
                VALID_BAUD_RATES
            )));
        }

        // Timing fields
        if self.link.timeout_ms == 0 || self.link.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if self.link.reconnect_interval_ms == 0 || self.link.reconnect_interval_ms > 60000 {
            return Err(invalid("reconnect_interval_ms must be between 1 and 60000"));
        }

        // Display
        let span = self.display.window_span_s;
        if !span.is_finite() || span <= 0.0 || span > 3600.0 {
            return Err(invalid("window_span_s must be greater than 0 and at most 3600"));
        }

        if self.display.frame_rate_hz == 0 || self.display.frame_rate_hz > 240 {
            return Err(invalid("frame_rate_hz must be between 1 and 240"));
        }

        if self.display.channel_capacity == 0 {
            return Err(invalid("channel_capacity must be greater than 0"));
        }

        if self.display.status_interval_frames == 0 {
            return Err(invalid("status_interval_frames must be greater than 0"));
        }

        // Session log directory is needed even when logging starts disabled,
        // since it can be switched on at runtime
        if self.session_log.log_dir.is_empty() {
            return Err(invalid("session_log log_dir cannot be empty"));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> GroundStationError {
    GroundStationError::Config(toml::de::Error::custom(msg))
}
