//! # Rolling Channel
//!
//! Fixed-span time series used for live plotting. Points are stored by
//! phase (`timestamp mod span`); once the phase wraps, the buffer restarts so
//! a channel only ever shows the most recent span.

/// Default reserved capacity, comfortably above one span of samples
pub const DEFAULT_CHANNEL_CAPACITY: usize = 2000;

/// One plotted point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelPoint {
    /// Timestamp reduced modulo the window span
    pub phase: f64,
    pub value: f64,
}

/// One named rolling time series
#[derive(Debug, Clone)]
pub struct RollingChannel {
    span: f64,
    points: Vec<ChannelPoint>,
}

impl RollingChannel {
    /// Create a channel seeded with a single point at phase 0
    ///
    /// `span` must be finite and positive; [`ChannelStore`](super::store::ChannelStore)
    /// checks this before it reaches a channel.
    pub fn new(span: f64) -> Self {
        Self::with_capacity(span, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(span: f64, capacity: usize) -> Self {
        let mut points = Vec::with_capacity(capacity);
        points.push(ChannelPoint { phase: 0.0, value: 0.0 });
        Self { span, points }
    }

    /// Append a point, restarting the buffer if the phase wrapped
    pub fn add_point(&mut self, time: f64, value: f64) {
        let phase = time % self.span;
        if self.points.last().is_some_and(|last| phase < last.phase) {
            // clear() keeps the reserved allocation
            self.points.clear();
        }
        self.points.push(ChannelPoint { phase, value });
    }

    /// Takes effect on the next [`add_point`](Self::add_point); existing
    /// points are not rescaled.
    pub fn set_span(&mut self, span: f64) {
        self.span = span;
    }

    pub fn span(&self) -> f64 {
        self.span
    }

    pub fn points(&self) -> &[ChannelPoint] {
        &self.points
    }

    pub fn last(&self) -> Option<ChannelPoint> {
        self.points.last().copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.points.capacity()
    }
}
