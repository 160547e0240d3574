//! # Telemetry Frame Encoder
//!
//! Renders a sample back into wire layout, for display of the last good
//! frame and for building test traffic.

use super::protocol::*;

/// Encode a sample as a colon-delimited text frame
///
/// Values are written as integers, matching the wire; the reserved field is
/// written as `0` and state flags are not part of the frame.
///
/// # Examples
///
/// ```
/// use ground_monitor::telemetry::encoder::encode_frame;
/// use ground_monitor::telemetry::protocol::TelemetrySample;
///
/// let frame = encode_frame(&TelemetrySample::default());
/// assert_eq!(frame, "Data:0:0:0:0:0:0:0:0:0:0:0:0:0:0:");
/// ```
pub fn encode_frame(sample: &TelemetrySample) -> String {
    let fields = [
        sample.orientation.x,
        sample.orientation.y,
        sample.orientation.z,
        sample.acceleration.x,
        sample.acceleration.y,
        sample.acceleration.z,
        sample.magnetic.x,
        sample.magnetic.y,
        sample.magnetic.z,
        sample.force,
        sample.temperature,
        sample.mission_time,
        0.0,
        sample.altitude,
    ];

    let mut frame = String::from(FRAME_PREFIX);
    for value in fields {
        frame.push(FIELD_SEPARATOR);
        frame.push_str(&(value.round() as i64).to_string());
    }
    frame.push(FIELD_SEPARATOR);
    frame
}
