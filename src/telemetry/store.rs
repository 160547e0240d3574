//! # Channel Store
//!
//! Owns one [`RollingChannel`] per telemetry field plus the derived
//! acceleration-magnitude channel. All channels share one window span.

use super::channel::{ChannelPoint, RollingChannel, DEFAULT_CHANNEL_CAPACITY};
use super::protocol::{TelemetrySample, Vector3};
use crate::error::{GroundStationError, Result};

/// Identifier of a plotted channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    OrientationX,
    OrientationY,
    OrientationZ,
    AccelerationX,
    AccelerationY,
    AccelerationZ,
    MagneticX,
    MagneticY,
    MagneticZ,
    Force,
    Temperature,
    MissionTime,
    Altitude,
    /// Derived: Euclidean norm of the three acceleration channels
    AccelerationMagnitude,
}

/// Number of channels in a store
pub const CHANNEL_COUNT: usize = 14;

impl ChannelId {
    pub const ALL: [ChannelId; CHANNEL_COUNT] = [
        ChannelId::OrientationX,
        ChannelId::OrientationY,
        ChannelId::OrientationZ,
        ChannelId::AccelerationX,
        ChannelId::AccelerationY,
        ChannelId::AccelerationZ,
        ChannelId::MagneticX,
        ChannelId::MagneticY,
        ChannelId::MagneticZ,
        ChannelId::Force,
        ChannelId::Temperature,
        ChannelId::MissionTime,
        ChannelId::Altitude,
        ChannelId::AccelerationMagnitude,
    ];

    const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            ChannelId::OrientationX => "X Orientation",
            ChannelId::OrientationY => "Y Orientation",
            ChannelId::OrientationZ => "Z Orientation",
            ChannelId::AccelerationX => "X Acceleration",
            ChannelId::AccelerationY => "Y Acceleration",
            ChannelId::AccelerationZ => "Z Acceleration",
            ChannelId::MagneticX => "X Magnetic",
            ChannelId::MagneticY => "Y Magnetic",
            ChannelId::MagneticZ => "Z Magnetic",
            ChannelId::Force => "Force",
            ChannelId::Temperature => "Temperature",
            ChannelId::MissionTime => "Mission Time",
            ChannelId::Altitude => "Altitude",
            ChannelId::AccelerationMagnitude => "Acceleration",
        }
    }

    /// Whether the channel is computed rather than read off the wire
    pub fn is_derived(self) -> bool {
        self == ChannelId::AccelerationMagnitude
    }
}

/// Named set of rolling channels sharing one window span
///
/// Mutated only from the display loop; snapshots borrow the store, so no
/// point can change while a plot is being drawn from it.
#[derive(Debug, Clone)]
pub struct ChannelStore {
    window_span: f64,
    channels: Vec<RollingChannel>,
}

impl ChannelStore {
    /// Create a store with every channel seeded at phase 0
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindowSpan` if `window_span` is not finite and positive
    pub fn new(window_span: f64) -> Result<Self> {
        Self::with_capacity(window_span, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(window_span: f64, capacity: usize) -> Result<Self> {
        check_span(window_span)?;
        let channels = ChannelId::ALL
            .iter()
            .map(|_| RollingChannel::with_capacity(window_span, capacity))
            .collect();
        Ok(Self { window_span, channels })
    }

    /// Append every field of `sample` at `sample.timestamp`
    ///
    /// The magnitude channel is fed right after the acceleration channels,
    /// from their just-appended values, so all four share a phase.
    pub fn ingest(&mut self, sample: &TelemetrySample) {
        let t = sample.timestamp;

        self.add(ChannelId::OrientationX, t, sample.orientation.x);
        self.add(ChannelId::OrientationY, t, sample.orientation.y);
        self.add(ChannelId::OrientationZ, t, sample.orientation.z);

        self.add(ChannelId::AccelerationX, t, sample.acceleration.x);
        self.add(ChannelId::AccelerationY, t, sample.acceleration.y);
        self.add(ChannelId::AccelerationZ, t, sample.acceleration.z);
        let magnitude = self.latest_acceleration_magnitude();
        self.add(ChannelId::AccelerationMagnitude, t, magnitude);

        self.add(ChannelId::MagneticX, t, sample.magnetic.x);
        self.add(ChannelId::MagneticY, t, sample.magnetic.y);
        self.add(ChannelId::MagneticZ, t, sample.magnetic.z);

        self.add(ChannelId::Force, t, sample.force);
        self.add(ChannelId::Temperature, t, sample.temperature);
        self.add(ChannelId::MissionTime, t, sample.mission_time);
        self.add(ChannelId::Altitude, t, sample.altitude);
    }

    fn add(&mut self, id: ChannelId, time: f64, value: f64) {
        self.channels[id.index()].add_point(time, value);
    }

    fn latest_acceleration_magnitude(&self) -> f64 {
        let last = |id: ChannelId| self.latest(id).map_or(0.0, |p| p.value);
        Vector3::new(
            last(ChannelId::AccelerationX),
            last(ChannelId::AccelerationY),
            last(ChannelId::AccelerationZ),
        )
        .magnitude()
    }

    /// Change the span used by every channel from its next append on
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindowSpan` if `seconds` is not finite and positive;
    /// the current span is kept.
    pub fn set_window_span(&mut self, seconds: f64) -> Result<()> {
        check_span(seconds)?;
        self.window_span = seconds;
        for channel in &mut self.channels {
            channel.set_span(seconds);
        }
        Ok(())
    }

    pub fn window_span(&self) -> f64 {
        self.window_span
    }

    pub fn channel(&self, id: ChannelId) -> &RollingChannel {
        &self.channels[id.index()]
    }

    /// Read-only points of one channel, oldest first
    pub fn snapshot(&self, id: ChannelId) -> &[ChannelPoint] {
        self.channel(id).points()
    }

    pub fn latest(&self, id: ChannelId) -> Option<ChannelPoint> {
        self.channel(id).last()
    }

    /// All channels with their identifiers, in [`ChannelId::ALL`] order
    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &RollingChannel)> {
        ChannelId::ALL.into_iter().zip(self.channels.iter())
    }
}

fn check_span(seconds: f64) -> Result<()> {
    if seconds.is_finite() && seconds > 0.0 {
        Ok(())
    } else {
        Err(GroundStationError::InvalidWindowSpan(seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_at(timestamp: f64, acceleration: Vector3) -> TelemetrySample {
        TelemetrySample {
            timestamp,
            orientation: Vector3::new(1.0, 2.0, 3.0),
            acceleration,
            magnetic: Vector3::new(7.0, 8.0, 9.0),
            force: 10.0,
            temperature: 11.0,
            mission_time: 12.0,
            altitude: 99.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_channel_ids_index_in_order() {
        for (i, id) in ChannelId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
        assert_eq!(ChannelId::ALL.iter().filter(|id| id.is_derived()).count(), 1);
    }

    #[test]
    fn test_new_store_seeds_every_channel() {
        let store = ChannelStore::new(10.0).unwrap();
        assert_eq!(store.iter().count(), CHANNEL_COUNT);
        for (_, channel) in store.iter() {
            assert_eq!(channel.points(), &[ChannelPoint { phase: 0.0, value: 0.0 }]);
        }
    }

    #[test]
    fn test_invalid_span_rejected() {
        assert!(matches!(
            ChannelStore::new(0.0),
            Err(GroundStationError::InvalidWindowSpan(_))
        ));
        assert!(ChannelStore::new(f64::NAN).is_err());

        let mut store = ChannelStore::new(10.0).unwrap();
        assert!(store.set_window_span(-1.0).is_err());
        assert_eq!(store.window_span(), 10.0);
    }

    #[test]
    fn test_ingest_updates_every_channel() {
        let mut store = ChannelStore::new(10.0).unwrap();
        store.ingest(&sample_at(2.0, Vector3::new(4.0, 5.0, 6.0)));

        let value = |id: ChannelId| store.latest(id).unwrap().value;
        assert_eq!(value(ChannelId::OrientationX), 1.0);
        assert_eq!(value(ChannelId::OrientationZ), 3.0);
        assert_eq!(value(ChannelId::AccelerationY), 5.0);
        assert_eq!(value(ChannelId::MagneticZ), 9.0);
        assert_eq!(value(ChannelId::Force), 10.0);
        assert_eq!(value(ChannelId::Temperature), 11.0);
        assert_eq!(value(ChannelId::MissionTime), 12.0);
        assert_eq!(value(ChannelId::Altitude), 99.0);

        for (_, channel) in store.iter() {
            assert_eq!(channel.len(), 2);
            assert_eq!(channel.last().unwrap().phase, 2.0);
        }
    }

    #[test]
    fn test_derived_magnitude_matches_acceleration_phase() {
        let mut store = ChannelStore::new(10.0).unwrap();
        store.ingest(&sample_at(13.0, Vector3::new(3.0, 4.0, 0.0)));

        let magnitude = store.latest(ChannelId::AccelerationMagnitude).unwrap();
        assert_eq!(magnitude.value, 5.0);
        for id in [ChannelId::AccelerationX, ChannelId::AccelerationY, ChannelId::AccelerationZ] {
            assert_eq!(store.latest(id).unwrap().phase, magnitude.phase);
        }
        assert_eq!(magnitude.phase, 3.0);
    }

    #[test]
    fn test_set_window_span_applies_to_all_channels() {
        let mut store = ChannelStore::new(10.0).unwrap();
        store.ingest(&sample_at(8.0, Vector3::default()));
        store.set_window_span(5.0).unwrap();

        // Existing points stay put
        assert_eq!(store.latest(ChannelId::Altitude).unwrap().phase, 8.0);

        store.ingest(&sample_at(9.0, Vector3::default()));
        for (id, channel) in store.iter() {
            assert_eq!(channel.span(), 5.0);
            assert_eq!(store.snapshot(id).len(), 1, "{} should have wrapped", id.name());
        }
    }
}
