//! # Telemetry Module
//!
//! Decoding and buffering of flight computer telemetry.
//!
//! This module handles:
//! - Decoding colon-delimited text frames into samples
//! - Rolling, fixed-span plot channels per field
//! - The derived acceleration-magnitude channel
//! - Appending accepted samples to the session log (CSV or JSONL)

pub mod protocol;
pub mod decoder;
pub mod encoder;
pub mod channel;
pub mod store;
pub mod log;
