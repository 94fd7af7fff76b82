//! Exponential moving-average smoothing, scaled to the device frame rate.

/// Exponential smoothing filter whose decay is expressed as a time constant
/// rather than a per-frame fraction, so animation speed stays the same when
/// the frame period changes.
///
/// The decay factor follows the standard EMA relation `alpha = 2 / (n + 1)`
/// with `n = time_constant / frame_period`. Filtering itself is a pure
/// function of `(previous, sample, alpha)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledAverage {
    time_constant_ms: f64,
    frame_period_ms: f64,
    alpha: f64,
}

impl ScaledAverage {
    /// Creates a filter for the given time constant and frame period, both
    /// in milliseconds. A non-positive time constant disables smoothing
    /// (every sample passes through unchanged).
    pub fn new(time_constant_ms: f64, frame_period_ms: f64) -> Self {
        let mut filter = Self {
            time_constant_ms,
            frame_period_ms,
            alpha: 1.0,
        };
        filter.recompute_alpha();
        filter
    }

    /// Returns the configured time constant in milliseconds.
    pub fn time_constant(&self) -> f64 {
        self.time_constant_ms
    }

    /// Adjusts the time constant, e.g. when algorithmic smoothing control
    /// retargets the filter from the running average intensity.
    pub fn set_time_constant(&mut self, time_constant_ms: f64) {
        self.time_constant_ms = time_constant_ms;
        self.recompute_alpha();
    }

    /// Returns the effective per-frame decay factor.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Blends a new sample into the running average. Deterministic and free
    /// of side effects; the result always lies between `previous` and
    /// `sample`.
    pub fn filter(&self, previous: f64, sample: f64) -> f64 {
        previous + (sample - previous) * self.alpha
    }

    fn recompute_alpha(&mut self) {
        if self.time_constant_ms <= 0.0 || self.frame_period_ms <= 0.0 {
            self.alpha = 1.0;
            return;
        }
        let n = self.time_constant_ms / self.frame_period_ms;
        self.alpha = (2.0 / (n + 1.0)).clamp(0.0, 1.0);
    }
}
