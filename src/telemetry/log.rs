//! # Session Log
//!
//! Append-only record of accepted samples. One row per sample, opened once
//! at startup and flushed at shutdown.
//!
//! Record schema (CSV header order):
//!
//! | Column | Source |
//! |--------|--------|
//! | `orientation_x..z` | sample orientation |
//! | `acceleration_x..z` | sample acceleration |
//! | `velocity_x..z` | reserved, always empty (not on the wire) |
//! | `time` | receive timestamp, seconds |

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use super::protocol::TelemetrySample;
use crate::config::{SessionLogConfig, SessionLogFormat};
use crate::error::Result;

/// CSV header line
pub const CSV_HEADER: &str = "orientation_x,orientation_y,orientation_z,\
acceleration_x,acceleration_y,acceleration_z,\
velocity_x,velocity_y,velocity_z,time";

/// Sink receiving accepted samples
pub trait SessionLog: Send {
    /// Append one record
    fn append(&mut self, sample: &TelemetrySample) -> Result<()>;

    /// Push buffered records to the underlying writer
    fn flush(&mut self) -> Result<()>;
}

/// One session log row
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionRecord {
    pub orientation: [f64; 3],
    pub acceleration: [f64; 3],
    /// Reserved until the flight computer reports velocity
    pub velocity: Option<[f64; 3]>,
    pub time: f64,
}

impl From<&TelemetrySample> for SessionRecord {
    fn from(sample: &TelemetrySample) -> Self {
        let o = sample.orientation;
        let a = sample.acceleration;
        Self {
            orientation: [o.x, o.y, o.z],
            acceleration: [a.x, a.y, a.z],
            velocity: None,
            time: sample.timestamp,
        }
    }
}

/// Comma-separated session log
pub struct CsvSessionLog<W: Write> {
    writer: W,
}

impl<W: Write> CsvSessionLog<W> {
    /// Wrap a writer and emit the header line
    pub fn new(mut writer: W) -> Result<Self> {
        writeln!(writer, "{}", CSV_HEADER)?;
        Ok(Self { writer })
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> SessionLog for CsvSessionLog<W> {
    fn append(&mut self, sample: &TelemetrySample) -> Result<()> {
        let record = SessionRecord::from(sample);
        let [ox, oy, oz] = record.orientation;
        let [ax, ay, az] = record.acceleration;
        let velocity = match record.velocity {
            Some([vx, vy, vz]) => format!("{},{},{}", vx, vy, vz),
            None => ",,".to_string(),
        };
        writeln!(
            self.writer,
            "{},{},{},{},{},{},{},{:.3}",
            ox, oy, oz, ax, ay, az, velocity, record.time
        )?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// JSON Lines session log, one [`SessionRecord`] object per line
pub struct JsonlSessionLog<W: Write> {
    writer: W,
}

impl<W: Write> JsonlSessionLog<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> SessionLog for JsonlSessionLog<W> {
    fn append(&mut self, sample: &TelemetrySample) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &SessionRecord::from(sample))?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// File name for a session started at `started`
pub fn session_file_name(started: DateTime<Local>, format: SessionLogFormat) -> String {
    format!("session_{}.{}", started.format("%Y%m%d_%H%M%S"), format.extension())
}

/// Create the log directory if needed and open a fresh session file
///
/// # Returns
///
/// * `Result<(Box<dyn SessionLog>, PathBuf)>` - The sink and the file it writes to
pub fn open_session_log(config: &SessionLogConfig) -> Result<(Box<dyn SessionLog>, PathBuf)> {
    open_session_log_at(Path::new(&config.log_dir), config.format, Local::now())
}

fn open_session_log_at(
    dir: &Path,
    format: SessionLogFormat,
    started: DateTime<Local>,
) -> Result<(Box<dyn SessionLog>, PathBuf)> {
    fs::create_dir_all(dir)?;
    let path = dir.join(session_file_name(started, format));
    let writer = BufWriter::new(File::create(&path)?);

    let sink: Box<dyn SessionLog> = match format {
        SessionLogFormat::Csv => Box::new(CsvSessionLog::new(writer)?),
        SessionLogFormat::Jsonl => Box::new(JsonlSessionLog::new(writer)),
    };

    info!("Session log opened at {}", path.display());
    Ok((sink, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::protocol::Vector3;
    use chrono::TimeZone;

    fn sample() -> TelemetrySample {
        TelemetrySample {
            timestamp: 4.25,
            orientation: Vector3::new(1.0, 2.0, 3.0),
            acceleration: Vector3::new(-4.0, 5.0, 6.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_csv_header_and_row() {
        let mut log = CsvSessionLog::new(Vec::new()).unwrap();
        log.append(&sample()).unwrap();
        log.flush().unwrap();

        let text = String::from_utf8(log.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "1,2,3,-4,5,6,,,,4.250");
        assert_eq!(lines[0].split(',').count(), lines[1].split(',').count());
    }

    #[test]
    fn test_jsonl_record() {
        let mut log = JsonlSessionLog::new(Vec::new());
        log.append(&sample()).unwrap();
        log.append(&sample()).unwrap();

        let text = String::from_utf8(log.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 2);

        let value: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(value["orientation"], serde_json::json!([1.0, 2.0, 3.0]));
        assert_eq!(value["acceleration"][0], -4.0);
        assert!(value["velocity"].is_null());
        assert_eq!(value["time"], 4.25);
    }

    #[test]
    fn test_session_file_name() {
        let started = Local.with_ymd_and_hms(2024, 6, 1, 9, 5, 7).unwrap();
        assert_eq!(
            session_file_name(started, SessionLogFormat::Csv),
            "session_20240601_090507.csv"
        );
        assert_eq!(
            session_file_name(started, SessionLogFormat::Jsonl),
            "session_20240601_090507.jsonl"
        );
    }

    #[test]
    fn test_open_session_log_creates_directory_and_header() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("nested").join("logs");
        let started = Local.with_ymd_and_hms(2024, 6, 1, 9, 5, 7).unwrap();

        let (mut sink, path) =
            open_session_log_at(&log_dir, SessionLogFormat::Csv, started).unwrap();
        sink.append(&sample()).unwrap();
        sink.flush().unwrap();
        drop(sink);

        assert!(path.starts_with(&log_dir));
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with(CSV_HEADER));
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_open_session_log_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionLogConfig {
            enabled: true,
            log_dir: dir.path().to_string_lossy().into_owned(),
            format: SessionLogFormat::Jsonl,
        };

        let (_sink, path) = open_session_log(&config).unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("jsonl"));
        assert!(path.exists());
    }
}
