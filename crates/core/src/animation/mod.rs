use std::sync::{Arc, Mutex, MutexGuard};

use crate::{AudioFeatures, DeviceConfig, FeatureExtractor, Frame, ProcessedBand};

/// Byte ceiling for a color channel.
pub const COLOR_MAX: u8 = u8::MAX;
/// Byte floor for a color channel.
pub const COLOR_MIN: u8 = u8::MIN;

/// Which channel of the shifting color is currently falling toward zero.
/// The next channel in Red→Green→Blue→Red order rises at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftChannel {
    Red,
    Green,
    Blue,
}

impl ShiftChannel {
    fn next(self) -> Self {
        match self {
            Self::Red => Self::Green,
            Self::Green => Self::Blue,
            Self::Blue => Self::Red,
        }
    }
}

/// Cyclic three-state color rotation shared by several animation styles.
///
/// Each advance lowers the falling channel and raises the rising one by the
/// caller's step; when the pair reaches (0, 255) the active channel moves to
/// the next in the cycle. There is no terminal state. The channel enum is
/// exhaustive, so an out-of-range state cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorShift {
    red: u8,
    green: u8,
    blue: u8,
    channel: ShiftChannel,
}

impl Default for ColorShift {
    fn default() -> Self {
        Self {
            red: COLOR_MAX,
            green: COLOR_MIN,
            blue: COLOR_MIN,
            channel: ShiftChannel::Red,
        }
    }
}

impl ColorShift {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current shifting color as an `(r, g, b)` triple.
    pub fn rgb(&self) -> (u8, u8, u8) {
        (self.red, self.green, self.blue)
    }

    /// Channel currently being ramped down.
    pub fn channel(&self) -> ShiftChannel {
        self.channel
    }

    /// Moves the rotation forward by `step`, clamping both channels to the
    /// byte range.
    pub fn advance(&mut self, step: u8) {
        match self.channel {
            ShiftChannel::Red => {
                self.red = self.red.saturating_sub(step);
                self.green = self.green.saturating_add(step);
                if self.red == COLOR_MIN && self.green == COLOR_MAX {
                    self.channel = self.channel.next();
                }
            }
            ShiftChannel::Green => {
                self.green = self.green.saturating_sub(step);
                self.blue = self.blue.saturating_add(step);
                if self.green == COLOR_MIN && self.blue == COLOR_MAX {
                    self.channel = self.channel.next();
                }
            }
            ShiftChannel::Blue => {
                self.blue = self.blue.saturating_sub(step);
                self.red = self.red.saturating_add(step);
                if self.blue == COLOR_MIN && self.red == COLOR_MAX {
                    self.channel = self.channel.next();
                }
            }
        }
    }
}

/// Seam implemented by concrete animations. The core never stores
/// animation-specific state; it only asks for the next frame.
pub trait Animation: Send {
    /// Renders the next frame. Must return exactly the configured light
    /// count.
    fn next_frame(&mut self) -> Frame;

    /// Whether the renderer should fade from the previously shown frame
    /// instead of cutting over.
    fn requests_smooth_crossfade(&self) -> bool {
        false
    }
}

struct ReactiveInner {
    extractor: FeatureExtractor,
    features: AudioFeatures,
    processed: ProcessedBand,
    color_shift: ColorShift,
}

/// Shared foundation for audio-reactive animations: the latest extractor
/// outputs plus the color-shift rotation, behind a single lock so a reader
/// never observes a half-updated feature set.
#[derive(Clone)]
pub struct ReactiveBase {
    shared: Arc<Mutex<ReactiveInner>>,
}

impl ReactiveBase {
    pub fn new(config: DeviceConfig) -> Self {
        let meter_count = config.meter_count();
        let inner = ReactiveInner {
            extractor: FeatureExtractor::new(config),
            features: AudioFeatures::default(),
            processed: vec![0.0; meter_count],
            color_shift: ColorShift::new(),
        };
        Self {
            shared: Arc::new(Mutex::new(inner)),
        }
    }

    /// Recomputes both feature sets from a fresh spectrum snapshot. Holding
    /// the lock across both updates keeps the pair consistent for readers.
    pub fn update_audio_snapshot(&self, snapshot: &[f64]) {
        let mut inner = self.lock();
        let (features, processed) = inner.extractor.process(snapshot);
        inner.features = features;
        inner.processed = processed;
    }

    /// Latest device-independent audio signals.
    pub fn features(&self) -> AudioFeatures {
        self.lock().features
    }

    /// Caller-owned copy of the latest meter band; never aliases extractor
    /// state.
    pub fn processed_band(&self) -> ProcessedBand {
        self.lock().processed.clone()
    }

    /// Advances the color rotation and returns the resulting color.
    pub fn advance_color_shift(&self, step: u8) -> (u8, u8, u8) {
        let mut inner = self.lock();
        inner.color_shift.advance(step);
        inner.color_shift.rgb()
    }

    /// Current shifting color without advancing.
    pub fn color_shift(&self) -> ColorShift {
        self.lock().color_shift
    }

    /// Enables or disables intensity-driven smoothing control.
    pub fn set_algorithmic_smoothing(&self, enabled: bool) {
        self.lock().extractor.set_algorithmic_smoothing(enabled);
    }

    fn lock(&self) -> MutexGuard<'_, ReactiveInner> {
        // A poisoned lock means a panic mid-update; the feature state can no
        // longer be trusted, so abort loudly.
        self.shared
            .lock()
            .expect("reactive animation state lock poisoned")
    }
}

impl std::fmt::Debug for ReactiveBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveBase").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_shift_cycles_through_all_channels() {
        let mut shift = ColorShift::new();
        assert_eq!(shift.rgb(), (255, 0, 0));

        // 17 divides 255 evenly, so channels land exactly on the limits.
        let steps_per_channel = 255 / 17;
        for _ in 0..steps_per_channel {
            shift.advance(17);
        }
        assert_eq!(shift.channel(), ShiftChannel::Green);
        assert_eq!(shift.rgb(), (0, 255, 0));

        for _ in 0..steps_per_channel {
            shift.advance(17);
        }
        assert_eq!(shift.channel(), ShiftChannel::Blue);
        assert_eq!(shift.rgb(), (0, 0, 255));

        for _ in 0..steps_per_channel {
            shift.advance(17);
        }
        // Three full thirds of the cycle return to the initial state.
        assert_eq!(shift.channel(), ShiftChannel::Red);
        assert_eq!(shift.rgb(), (255, 0, 0));
    }

    #[test]
    fn color_shift_clamps_to_byte_range() {
        let mut shift = ColorShift::new();
        shift.advance(200);
        let (red, green, _) = shift.rgb();
        assert_eq!(red, 55);
        assert_eq!(green, 200);

        shift.advance(200);
        // Both channels clamp rather than wrapping.
        assert_eq!(shift.rgb(), (0, 255, 0));
        assert_eq!(shift.channel(), ShiftChannel::Green);
    }

    #[test]
    fn snapshot_update_refreshes_both_feature_sets() {
        let base = ReactiveBase::new(DeviceConfig::new(8));
        base.update_audio_snapshot(&[0.5; 32]);

        let features = base.features();
        assert!(features.realtime_intensity > 0.0);
        assert_eq!(base.processed_band().len(), 4);
    }

    #[test]
    fn processed_band_is_a_detached_copy() {
        let base = ReactiveBase::new(DeviceConfig::new(8));
        base.update_audio_snapshot(&[0.5; 32]);

        let mut copy = base.processed_band();
        copy[0] = 42.0;
        assert_ne!(base.processed_band()[0], 42.0);
    }
}
