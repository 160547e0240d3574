//! # Telemetry Frame Decoder
//!
//! Decodes colon-delimited text frames into [`TelemetrySample`]s.
//!
//! ## Frame Layout
//!
//! ```text
//! Data:<o_x>:<o_y>:<o_z>:<a_x>:<a_y>:<a_z>:<m_x>:<m_y>:<m_z>:<force>:<temp>:<mission_time>:<reserved>:<altitude>:
//! ```
//!
//! Field `k` is the text between separator `k` and separator `k + 1`,
//! counting from the first separator. The reserved field is stepped over
//! without being parsed.

use super::protocol::*;
use crate::error::DecodeError;

/// Field index of the reserved slot between mission time and altitude
const RESERVED_FIELD: usize = 12;

/// Field names in wire order
const FIELD_NAMES: [&str; 14] = [
    "orientation_x",
    "orientation_y",
    "orientation_z",
    "acceleration_x",
    "acceleration_y",
    "acceleration_z",
    "magnetic_x",
    "magnetic_y",
    "magnetic_z",
    "force",
    "temperature",
    "mission_time",
    "reserved",
    "altitude",
];

/// Decode one raw telemetry frame
///
/// # Arguments
///
/// * `raw` - Frame text as read from the link (any text is accepted)
///
/// # Returns
///
/// * `Result<TelemetrySample, DecodeError>` - Decoded sample with a zero
///   timestamp and empty state flags, or the reason the frame was rejected
///
/// # Errors
///
/// Returns error if:
/// - The frame has fewer than 13 separators (`TooFewFields`)
/// - Any field is missing or not a decimal integer (`MalformedField`)
///
/// # Examples
///
/// ```
/// use ground_monitor::telemetry::decoder::decode;
///
/// let sample = decode("Data:1:2:3:4:5:6:7:8:9:10:11:12:0:99:").unwrap();
/// assert_eq!(sample.altitude, 99.0);
/// ```
pub fn decode(raw: &str) -> Result<TelemetrySample, DecodeError> {
    let found = raw.matches(FIELD_SEPARATOR).count();
    if found < MIN_SEPARATORS {
        return Err(DecodeError::TooFewFields { found });
    }

    let separators = separator_positions(raw);
    let field = |index: usize| parse_field(raw, &separators, index);

    Ok(TelemetrySample {
        timestamp: 0.0,
        orientation: Vector3::new(field(0)?, field(1)?, field(2)?),
        acceleration: Vector3::new(field(3)?, field(4)?, field(5)?),
        magnetic: Vector3::new(field(6)?, field(7)?, field(8)?),
        force: field(9)?,
        temperature: field(10)?,
        mission_time: field(11)?,
        altitude: field(RESERVED_FIELD + 1)?,
        state_flags: MissionState::empty(),
    })
}

/// Byte offsets of up to [`SEPARATOR_SLOTS`] separators, left to right
fn separator_positions(raw: &str) -> Vec<usize> {
    raw.match_indices(FIELD_SEPARATOR)
        .take(SEPARATOR_SLOTS)
        .map(|(index, _)| index)
        .collect()
}

/// Parse field `index` as a decimal integer
///
/// A missing closing separator lets the field run to the end of the text.
fn parse_field(raw: &str, separators: &[usize], index: usize) -> Result<f64, DecodeError> {
    let name = FIELD_NAMES[index];

    let start = match separators.get(index) {
        Some(&pos) => pos + FIELD_SEPARATOR.len_utf8(),
        None => {
            return Err(DecodeError::MalformedField { field: name, value: String::new() });
        }
    };
    let end = separators.get(index + 1).copied().unwrap_or(raw.len());

    let text = raw[start..end].trim();
    text.parse::<i64>()
        .map(|value| value as f64)
        .map_err(|_| DecodeError::MalformedField { field: name, value: text.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: &str = "Data:1:2:3:4:5:6:7:8:9:10:11:12:0:99:";

    #[test]
    fn test_decode_reference_frame() {
        let sample = decode(FRAME).unwrap();
        assert_eq!(sample.orientation, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(sample.acceleration, Vector3::new(4.0, 5.0, 6.0));
        assert_eq!(sample.magnetic, Vector3::new(7.0, 8.0, 9.0));
        assert_eq!(sample.force, 10.0);
        assert_eq!(sample.temperature, 11.0);
        assert_eq!(sample.mission_time, 12.0);
        assert_eq!(sample.altitude, 99.0);
        assert_eq!(sample.timestamp, 0.0);
        assert_eq!(sample.state_flags, MissionState::empty());
    }

    #[test]
    fn test_decode_negative_values() {
        let sample = decode("Data:-1:-2:-3:0:0:-981:1:1:1:-4:-15:300:7:-12:").unwrap();
        assert_eq!(sample.orientation, Vector3::new(-1.0, -2.0, -3.0));
        assert_eq!(sample.acceleration.z, -981.0);
        assert_eq!(sample.temperature, -15.0);
        assert_eq!(sample.altitude, -12.0);
    }

    #[test]
    fn test_reserved_field_is_not_parsed() {
        let sample = decode("Data:1:2:3:4:5:6:7:8:9:10:11:12:garbage:99:").unwrap();
        assert_eq!(sample.mission_time, 12.0);
        assert_eq!(sample.altitude, 99.0);
    }

    #[test]
    fn test_altitude_runs_to_end_without_trailing_separator() {
        let sample = decode("Data:1:2:3:4:5:6:7:8:9:10:11:12:0:99\r\n").unwrap();
        assert_eq!(sample.altitude, 99.0);
    }

    #[test]
    fn test_line_terminator_after_trailing_separator() {
        let sample = decode("Data:1:2:3:4:5:6:7:8:9:10:11:12:0:99:\r\n").unwrap();
        assert_eq!(sample.altitude, 99.0);
    }

    #[test]
    fn test_extra_trailing_fields_ignored() {
        let sample = decode("Data:1:2:3:4:5:6:7:8:9:10:11:12:0:99:5:6:7:").unwrap();
        assert_eq!(sample.altitude, 99.0);
    }

    #[test]
    fn test_too_few_fields() {
        let result = decode("Data:1:2:3:4:");
        assert_eq!(result, Err(DecodeError::TooFewFields { found: 5 }));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(decode(""), Err(DecodeError::TooFewFields { found: 0 }));
    }

    #[test]
    fn test_thirteen_separators_lacks_altitude() {
        // Count check passes, but there is no separator opening the altitude field
        let result = decode("Data:1:2:3:4:5:6:7:8:9:10:11:12:");
        assert_eq!(
            result,
            Err(DecodeError::MalformedField { field: "altitude", value: String::new() })
        );
    }

    #[test]
    fn test_non_integer_field_rejects_whole_frame() {
        let result = decode("Data:1:2:3:4:5.5:6:7:8:9:10:11:12:0:99:");
        assert_eq!(
            result,
            Err(DecodeError::MalformedField { field: "acceleration_y", value: "5.5".to_string() })
        );
    }

    #[test]
    fn test_empty_field_is_malformed() {
        let result = decode("Data:1::3:4:5:6:7:8:9:10:11:12:0:99:");
        assert!(matches!(
            result,
            Err(DecodeError::MalformedField { field: "orientation_y", .. })
        ));
    }

    #[test]
    fn test_garbled_prefix_is_tolerated() {
        // Scanning starts at the first separator whatever precedes it
        let sample = decode("\u{fffd}ta:1:2:3:4:5:6:7:8:9:10:11:12:0:99:").unwrap();
        assert_eq!(sample.orientation.x, 1.0);
    }

    #[test]
    fn test_separator_positions_are_capped() {
        let raw = ":".repeat(20);
        let positions = separator_positions(&raw);
        assert_eq!(positions.len(), SEPARATOR_SLOTS);
        assert_eq!(positions[0], 0);
        assert_eq!(positions[15], 15);
    }
}
