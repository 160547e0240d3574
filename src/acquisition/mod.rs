//! # Acquisition Module
//!
//! Background telemetry acquisition over the serial link.
//!
//! This module handles:
//! - Collecting operator intents (payload release / cancel) into a shared mask
//! - Writing pending command bytes ahead of each read
//! - Running exactly one dispatch-then-read cycle at a time
//! - Non-blocking completion polling from the display loop

pub mod command;
pub mod task;

pub use command::{CommandDispatcher, IntentMask, Intents};
pub use task::{AcquisitionOutcome, AcquisitionTask, TaskState};
