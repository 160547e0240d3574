//! # Ground Station Monitor
//!
//! Consumption side of acquisition: takes cycle outcomes on the display
//! loop, feeds accepted samples into the channel store and session log, and
//! keeps the last good sample on screen when frames are missing or corrupt.

use std::fmt::Write as _;
use tracing::{debug, info, warn};

use crate::acquisition::{AcquisitionOutcome, AcquisitionTask};
use crate::error::{DecodeError, Result};
use crate::telemetry::decoder::decode;
use crate::telemetry::encoder::encode_frame;
use crate::telemetry::log::SessionLog;
use crate::telemetry::protocol::{MissionState, TelemetrySample, PLACEHOLDER_FRAME};
use crate::telemetry::store::{ChannelId, ChannelStore};

/// Counters over the life of the link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub accepted: u64,
    pub rejected: u64,
    pub empty_reads: u64,
    pub absent_cycles: u64,
}

/// Display-side state of the ground station
pub struct GroundStation {
    store: ChannelStore,
    last_sample: Option<TelemetrySample>,
    last_frame: String,
    link_present: bool,
    session_log: Option<Box<dyn SessionLog>>,
    logging_enabled: bool,
    stats: LinkStats,
}

impl GroundStation {
    pub fn new(store: ChannelStore) -> Self {
        Self {
            store,
            last_sample: None,
            last_frame: PLACEHOLDER_FRAME.to_string(),
            link_present: true,
            session_log: None,
            logging_enabled: false,
            stats: LinkStats::default(),
        }
    }

    /// Attach the session log sink; `enabled` sets the initial toggle
    pub fn with_session_log(mut self, sink: Box<dyn SessionLog>, enabled: bool) -> Self {
        self.session_log = Some(sink);
        self.logging_enabled = enabled;
        self
    }

    /// Run one display frame's worth of acquisition work
    ///
    /// Returns `true` if a cycle completed this frame. Never blocks; if the
    /// running cycle is not done, everything on screen stays as it was.
    pub fn tick(&mut self, task: &mut AcquisitionTask) -> Result<bool> {
        match task.poll()? {
            Some(outcome) => {
                self.consume(outcome);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Apply one cycle outcome
    pub fn consume(&mut self, outcome: AcquisitionOutcome) {
        match outcome {
            AcquisitionOutcome::NoData => {
                self.mark_link(true);
                self.stats.empty_reads += 1;
            }
            AcquisitionOutcome::Sample(sample) => {
                self.mark_link(true);
                self.accept(sample);
            }
            AcquisitionOutcome::Rejected { raw, error } => {
                self.mark_link(true);
                self.reject(&raw, &error);
            }
            AcquisitionOutcome::LinkAbsent => {
                self.mark_link(false);
                self.stats.absent_cycles += 1;
            }
        }
    }

    /// Decode and ingest a raw frame received at `timestamp`
    ///
    /// A frame that fails to decode leaves every channel untouched.
    pub fn ingest_frame(&mut self, raw: &str, timestamp: f64) -> std::result::Result<(), DecodeError> {
        match decode(raw) {
            Ok(sample) => {
                self.accept(sample.with_timestamp(timestamp));
                Ok(())
            }
            Err(error) => {
                self.reject(raw, &error);
                Err(error)
            }
        }
    }

    fn accept(&mut self, sample: TelemetrySample) {
        self.store.ingest(&sample);

        if self.logging_enabled {
            if let Some(sink) = self.session_log.as_mut() {
                if let Err(e) = sink.append(&sample) {
                    warn!("Session log write failed, logging disabled: {}", e);
                    self.logging_enabled = false;
                }
            }
        }

        self.last_frame = encode_frame(&sample);
        self.last_sample = Some(sample);
        self.stats.accepted += 1;
    }

    fn reject(&mut self, raw: &str, error: &DecodeError) {
        self.stats.rejected += 1;
        warn!("Discarding telemetry frame ({}): {:?}", error, raw.trim_end());
    }

    fn mark_link(&mut self, present: bool) {
        if present != self.link_present {
            if present {
                info!("Telemetry link present");
            } else {
                warn!("Telemetry link absent");
            }
            self.link_present = present;
        }
    }

    /// Turn session logging on or off
    ///
    /// Has no effect without a sink.
    pub fn set_logging(&mut self, enabled: bool) {
        if self.session_log.is_none() {
            debug!("No session log attached, ignoring logging toggle");
            return;
        }
        self.logging_enabled = enabled;
        info!("Session logging {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn logging_enabled(&self) -> bool {
        self.logging_enabled
    }

    pub fn set_window_span(&mut self, seconds: f64) -> Result<()> {
        self.store.set_window_span(seconds)?;
        info!("Window span set to {} s", seconds);
        Ok(())
    }

    pub fn store(&self) -> &ChannelStore {
        &self.store
    }

    pub fn last_sample(&self) -> Option<&TelemetrySample> {
        self.last_sample.as_ref()
    }

    /// Last accepted frame in wire layout
    ///
    /// Re-encoded from the decoded sample rather than kept verbatim, so the
    /// reserved field always reads `0` and stray whitespace is gone.
    pub fn last_frame(&self) -> &str {
        &self.last_frame
    }

    pub fn link_present(&self) -> bool {
        self.link_present
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Mission state of the last accepted sample
    pub fn mission_state(&self) -> MissionState {
        self.last_sample.map(|s| s.state_flags).unwrap_or_default()
    }

    /// One-line summary for the status log
    pub fn status_line(&self) -> String {
        if !self.link_present {
            return format!("link absent ({} cycles)", self.stats.absent_cycles);
        }

        let mut line = String::new();
        let value = |id: ChannelId| self.store.latest(id).map_or(0.0, |p| p.value);
        let _ = write!(
            line,
            "alt {:.0} | accel {:.1} | temp {:.0} | t+{:.0}",
            value(ChannelId::Altitude),
            value(ChannelId::AccelerationMagnitude),
            value(ChannelId::Temperature),
            value(ChannelId::MissionTime),
        );

        let phases: Vec<&str> = self.mission_state().active().map(|p| p.label()).collect();
        if !phases.is_empty() {
            let _ = write!(line, " | {}", phases.join(", "));
        }

        let _ = write!(
            line,
            " | frames ok {} bad {} empty {}",
            self.stats.accepted, self.stats.rejected, self.stats.empty_reads
        );
        if self.logging_enabled {
            line.push_str(" | logging");
        }
        line
    }

    /// Flush the session log
    pub fn close(&mut self) {
        if let Some(sink) = self.session_log.as_mut() {
            if let Err(e) = sink.flush() {
                warn!("Failed to flush session log: {}", e);
            }
        }
    }
}

impl Drop for GroundStation {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GroundStationError;
    use crate::telemetry::channel::ChannelPoint;
    use crate::telemetry::log::CsvSessionLog;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    const FRAME: &str = "Data:1:2:3:4:5:6:7:8:9:10:11:12:0:99:";

    /// Writer that can be inspected after the sink is boxed
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailingLog;

    impl SessionLog for FailingLog {
        fn append(&mut self, _sample: &TelemetrySample) -> Result<()> {
            Err(GroundStationError::Io(io::Error::from(io::ErrorKind::Other)))
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn station() -> GroundStation {
        GroundStation::new(ChannelStore::new(10.0).unwrap())
    }

    fn last_points(station: &GroundStation) -> Vec<Option<ChannelPoint>> {
        ChannelId::ALL.iter().map(|&id| station.store().latest(id)).collect()
    }

    #[test]
    fn test_initial_state() {
        let station = station();
        assert_eq!(station.last_frame(), PLACEHOLDER_FRAME);
        assert!(station.last_sample().is_none());
        assert_eq!(station.mission_state(), MissionState::empty());
        assert_eq!(station.stats(), LinkStats::default());
    }

    #[test]
    fn test_accepted_frame_updates_store_and_last_frame() {
        let mut station = station();
        station.ingest_frame(FRAME, 2.0).unwrap();

        assert_eq!(station.last_frame(), FRAME);
        assert_eq!(station.last_sample().unwrap().timestamp, 2.0);
        assert_eq!(station.store().latest(ChannelId::Altitude).unwrap().value, 99.0);
        assert_eq!(station.stats().accepted, 1);
    }

    #[test]
    fn test_rejected_frame_never_mutates_channels() {
        let mut station = station();
        station.ingest_frame(FRAME, 2.0).unwrap();
        let before = last_points(&station);

        let result = station.ingest_frame("Data:1:2:3:4:", 3.0);

        assert_eq!(result, Err(DecodeError::TooFewFields { found: 5 }));
        assert_eq!(last_points(&station), before);

        // Enough separators, but the altitude is not an integer
        let result = station.ingest_frame("Data:1:2:3:4:5:6:7:8:9:10:11:12:0:9x:", 4.0);

        assert!(matches!(
            result,
            Err(DecodeError::MalformedField { field: "altitude", .. })
        ));
        assert_eq!(last_points(&station), before);
        assert_eq!(station.last_frame(), FRAME);
        assert_eq!(station.last_sample().unwrap().timestamp, 2.0);
        assert_eq!(station.stats().rejected, 2);
    }

    #[test]
    fn test_last_frame_is_normalized() {
        let mut station = station();
        station.ingest_frame(" Data: 1:2:3:4:5:6:7:8:9:10:11:12:42:99\r\n", 1.0).unwrap();
        assert_eq!(station.last_frame(), "Data:1:2:3:4:5:6:7:8:9:10:11:12:0:99:");
    }

    #[test]
    fn test_rejected_outcome_retains_last_sample() {
        let mut station = station();
        station.ingest_frame(FRAME, 2.0).unwrap();
        let before = last_points(&station);

        station.consume(AcquisitionOutcome::Rejected {
            raw: "Data:x:".to_string(),
            error: DecodeError::TooFewFields { found: 2 },
        });
        station.consume(AcquisitionOutcome::NoData);

        assert_eq!(last_points(&station), before);
        assert_eq!(station.last_sample().unwrap().altitude, 99.0);
        assert_eq!(station.stats().empty_reads, 1);
    }

    #[test]
    fn test_link_absent_and_return() {
        let mut station = station();
        station.consume(AcquisitionOutcome::LinkAbsent);
        assert!(!station.link_present());
        assert!(station.status_line().starts_with("link absent"));

        station.consume(AcquisitionOutcome::NoData);
        assert!(station.link_present());
        assert_eq!(station.stats().absent_cycles, 1);
    }

    #[test]
    fn test_sample_outcome_ingested() {
        let mut station = station();
        let sample = decode(FRAME).unwrap().with_timestamp(4.0);
        station.consume(AcquisitionOutcome::Sample(sample));

        let magnitude = station.store().latest(ChannelId::AccelerationMagnitude).unwrap();
        assert_eq!(magnitude.phase, 4.0);
        assert!((magnitude.value - (16.0f64 + 25.0 + 36.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_logging_toggle_controls_records() {
        let buffer = SharedBuffer::default();
        let sink = CsvSessionLog::new(buffer.clone()).unwrap();
        let mut station = station().with_session_log(Box::new(sink), false);

        station.ingest_frame(FRAME, 1.0).unwrap();
        assert_eq!(buffer.text().lines().count(), 1, "header only");

        station.set_logging(true);
        station.ingest_frame(FRAME, 2.0).unwrap();
        // Rejected frames are never logged
        let _ = station.ingest_frame("garbage", 3.0);
        station.close();

        let text = buffer.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "1,2,3,4,5,6,,,,2.000");
    }

    #[test]
    fn test_logging_toggle_without_sink_is_ignored() {
        let mut station = station();
        station.set_logging(true);
        assert!(!station.logging_enabled());
    }

    #[test]
    fn test_sink_failure_disables_logging() {
        let mut station = station().with_session_log(Box::new(FailingLog), true);
        station.ingest_frame(FRAME, 1.0).unwrap();

        assert!(!station.logging_enabled());
        // The sample itself was still accepted
        assert_eq!(station.stats().accepted, 1);
    }

    #[test]
    fn test_window_span_change() {
        let mut station = station();
        assert!(station.set_window_span(0.0).is_err());
        station.set_window_span(30.0).unwrap();
        assert_eq!(station.store().window_span(), 30.0);
    }

    #[test]
    fn test_status_line_contents() {
        let mut station = station();
        station.ingest_frame(FRAME, 1.0).unwrap();
        let line = station.status_line();
        assert!(line.contains("alt 99"), "{}", line);
        assert!(line.contains("frames ok 1 bad 0"), "{}", line);
    }
}
