//! # Ground Monitor Library
//!
//! Ground-station telemetry monitor for a rocket flight computer.
//!
//! This library provides the acquisition and buffering core: reading telemetry
//! frames from a serial radio link without blocking the display loop,
//! decoding them defensively, and keeping fixed-span rolling channels ready
//! for plotting and logging, while payload release commands go out over the
//! same link.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod serial;
pub mod acquisition;
pub mod monitor;
