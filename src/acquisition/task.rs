//! # Acquisition Task
//!
//! Runs one dispatch-then-read cycle in the background and hands the result
//! back to the display loop through a non-blocking poll.
//!
//! ```text
//!   Idle ──launch()──▶ Running ──is_complete()──▶ Completed
//!    ▲                                               │
//!    └──────────────────take_result()────────────────┘
//! ```
//!
//! The link transport moves into the spawned cycle and comes back with its
//! result, so at most one cycle can ever touch the link.

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, error, warn};

use super::command::{CommandDispatcher, IntentMask, Intents};
use crate::error::{DecodeError, GroundStationError, Result};
use crate::serial::port_trait::LinkTransport;
use crate::telemetry::decoder::decode;
use crate::telemetry::protocol::{MissionClock, TelemetrySample};

/// Result of one acquisition cycle
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionOutcome {
    /// Link present but nothing arrived before the read timeout
    NoData,
    /// A frame decoded cleanly
    Sample(TelemetrySample),
    /// Text arrived but did not decode
    Rejected { raw: String, error: DecodeError },
    /// The transport reports no device
    LinkAbsent,
}

/// Observable state of the task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running,
    Completed,
    /// The cycle died without returning the transport
    Lost,
}

struct CycleReport {
    link: Box<dyn LinkTransport>,
    outcome: AcquisitionOutcome,
    consumed: Intents,
}

enum Slot {
    Idle(Box<dyn LinkTransport>),
    Running(oneshot::Receiver<CycleReport>),
    Completed(CycleReport),
    Lost,
}

/// Background acquisition with at most one cycle in flight
pub struct AcquisitionTask {
    slot: Slot,
    dispatcher: CommandDispatcher,
    intents: IntentMask,
    clock: MissionClock,
}

impl std::fmt::Debug for AcquisitionTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionTask")
            .field("state", &self.state())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl AcquisitionTask {
    pub fn new(
        link: Box<dyn LinkTransport>,
        dispatcher: CommandDispatcher,
        intents: IntentMask,
        clock: MissionClock,
    ) -> Self {
        Self {
            slot: Slot::Idle(link),
            dispatcher,
            intents,
            clock,
        }
    }

    pub fn state(&self) -> TaskState {
        match self.slot {
            Slot::Idle(_) => TaskState::Idle,
            Slot::Running(_) => TaskState::Running,
            Slot::Completed(_) => TaskState::Completed,
            Slot::Lost => TaskState::Lost,
        }
    }

    /// Start the next cycle on the tokio runtime
    ///
    /// # Errors
    ///
    /// - `CycleInFlight` if a cycle is already running (state is unchanged)
    /// - `ResultPending` if the previous result has not been taken
    /// - `TransportLost` if a previous cycle died with the transport
    pub fn launch(&mut self) -> Result<()> {
        let link = match std::mem::replace(&mut self.slot, Slot::Lost) {
            Slot::Idle(link) => link,
            Slot::Running(rx) => {
                self.slot = Slot::Running(rx);
                return Err(GroundStationError::CycleInFlight);
            }
            Slot::Completed(report) => {
                self.slot = Slot::Completed(report);
                return Err(GroundStationError::ResultPending);
            }
            Slot::Lost => return Err(GroundStationError::TransportLost),
        };

        let intents = self.intents.snapshot();
        let dispatcher = self.dispatcher;
        let clock = self.clock;
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let report = run_cycle(link, dispatcher, intents, clock).await;
            // Receiver gone means the monitor is shutting down
            let _ = tx.send(report);
        });

        self.slot = Slot::Running(rx);
        Ok(())
    }

    /// Non-blocking completion check
    pub fn is_complete(&mut self) -> bool {
        if let Slot::Running(rx) = &mut self.slot {
            match rx.try_recv() {
                Ok(report) => self.slot = Slot::Completed(report),
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Closed) => {
                    error!("Acquisition cycle terminated without returning the link");
                    self.slot = Slot::Lost;
                    return false;
                }
            }
        }
        matches!(self.slot, Slot::Completed(_))
    }

    /// Take the completed result, returning the task to `Idle`
    ///
    /// Clears the intents the finished cycle consumed.
    pub fn take_result(&mut self) -> Option<AcquisitionOutcome> {
        match std::mem::replace(&mut self.slot, Slot::Lost) {
            Slot::Completed(report) => {
                self.intents.clear(report.consumed);
                self.slot = Slot::Idle(report.link);
                Some(report.outcome)
            }
            other => {
                self.slot = other;
                None
            }
        }
    }

    /// Poll once; on completion take the result and relaunch immediately
    ///
    /// Launches the first cycle if the task is idle. Never blocks.
    pub fn poll(&mut self) -> Result<Option<AcquisitionOutcome>> {
        if self.state() == TaskState::Idle {
            self.launch()?;
            return Ok(None);
        }
        if !self.is_complete() {
            return match self.slot {
                Slot::Lost => Err(GroundStationError::TransportLost),
                _ => Ok(None),
            };
        }
        let outcome = self.take_result();
        self.launch()?;
        Ok(outcome)
    }

    /// Wait for the in-flight cycle, if any, and hand back the transport
    ///
    /// Bounded by the read timeout of the running cycle.
    pub async fn shutdown(self) -> Option<Box<dyn LinkTransport>> {
        match self.slot {
            Slot::Idle(link) => Some(link),
            Slot::Completed(report) => Some(report.link),
            Slot::Running(rx) => rx.await.ok().map(|report| report.link),
            Slot::Lost => None,
        }
    }
}

async fn run_cycle(
    mut link: Box<dyn LinkTransport>,
    dispatcher: CommandDispatcher,
    intents: Intents,
    clock: MissionClock,
) -> CycleReport {
    if !link.is_connected() && !link.try_reconnect() {
        if intents.contains(Intents::RELEASE_PAYLOAD) || intents.contains(Intents::CANCEL_RELEASE) {
            warn!("Link absent, discarding pending commands");
        }
        // Pace absent-link cycles like a timed-out read
        tokio::time::sleep(dispatcher.read_timeout()).await;
        return CycleReport {
            link,
            outcome: AcquisitionOutcome::LinkAbsent,
            consumed: intents,
        };
    }

    let raw = dispatcher.run_pending(link.as_mut(), intents).await;
    let outcome = classify(raw, clock.elapsed_secs());
    CycleReport { link, outcome, consumed: intents }
}

fn classify(raw: String, timestamp: f64) -> AcquisitionOutcome {
    if raw.trim().is_empty() {
        return AcquisitionOutcome::NoData;
    }
    match decode(&raw) {
        Ok(sample) => AcquisitionOutcome::Sample(sample.with_timestamp(timestamp)),
        Err(error) => {
            debug!("Frame rejected ({}): {:?}", error, raw);
            AcquisitionOutcome::Rejected { raw, error }
        }
    }
}
