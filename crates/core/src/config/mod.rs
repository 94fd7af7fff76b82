use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{AuroralError, Result};

/// Default frame period in milliseconds (20 frames per second).
pub const DEFAULT_FRAME_PERIOD_MS: f64 = 50.0;

/// Default audio averaging time constant in milliseconds. Equivalent to a
/// smoothing amount of 0.3 at 50 ms per frame: `((2 / 0.3) - 1) * 50`.
pub const DEFAULT_AUDIO_TIME_CONSTANT_MS: f64 = 283.0;

/// Proportional positions of the band boundaries within a spectrum
/// snapshot. A bin at index `i` of `n` belongs to the low band when
/// `i / n < mid`, the mid band when `mid <= i / n < high`, and the high
/// band otherwise.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BandBoundaries {
    pub mid: f64,
    pub high: f64,
}

impl Default for BandBoundaries {
    fn default() -> Self {
        Self {
            mid: 0.33,
            high: 0.66,
        }
    }
}

/// How spectrum bins are bucketed onto meter segments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FrequencyScale {
    /// One bin per segment, walking boundaries by a fixed step.
    Linear,
    /// Boundaries advance multiplicatively so low frequencies get finer
    /// resolution. When `multiplier` is `None` (or a no-op value of 1) it is
    /// recomputed for each snapshot so that boundaries land exactly on the
    /// segment count by the end of the scan.
    Geometric {
        start: f64,
        multiplier: Option<f64>,
    },
}

impl Default for FrequencyScale {
    fn default() -> Self {
        Self::Geometric {
            start: 1.0,
            multiplier: None,
        }
    }
}

/// Immutable description of the attached light strand plus audio processing
/// parameters. Read-only for the lifetime of the pipeline; create a fresh
/// config and rebuild the pipeline to change it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Number of physical lights on the strand.
    pub light_count: usize,
    /// When `true`, meter segments cover half the strand so layouts can be
    /// mirrored symmetrically from one computed half.
    pub mirror_meters: bool,
    /// Time between output frames in milliseconds.
    pub frame_period_ms: f64,
    /// Time constant for the audio averaging filter in milliseconds.
    pub audio_time_constant_ms: f64,
    pub band_boundaries: BandBoundaries,
    pub frequency_scale: FrequencyScale,
}

impl DeviceConfig {
    /// Creates a configuration for the given strand size with default audio
    /// parameters.
    pub fn new(light_count: usize) -> Self {
        Self {
            light_count,
            mirror_meters: true,
            frame_period_ms: DEFAULT_FRAME_PERIOD_MS,
            audio_time_constant_ms: DEFAULT_AUDIO_TIME_CONSTANT_MS,
            band_boundaries: BandBoundaries::default(),
            frequency_scale: FrequencyScale::default(),
        }
    }

    /// Number of meter segments the processed band should hold: half the
    /// strand when mirroring, otherwise the full strand.
    pub fn meter_count(&self) -> usize {
        if self.mirror_meters {
            (self.light_count / 2).max(1)
        } else {
            self.light_count
        }
    }

    /// Checks the configuration for values that cannot produce a working
    /// pipeline. Queue and backend constructors call this, so an invalid
    /// config never makes it past setup.
    pub fn validate(&self) -> Result<()> {
        if self.light_count == 0 {
            return Err(AuroralError::invalid_config("light count must be nonzero"));
        }
        if self.frame_period_ms <= 0.0 {
            return Err(AuroralError::invalid_config(
                "frame period must be positive",
            ));
        }
        if self.audio_time_constant_ms < 0.0 {
            return Err(AuroralError::invalid_config(
                "audio time constant must not be negative",
            ));
        }
        let bounds = &self.band_boundaries;
        if !(0.0..=1.0).contains(&bounds.mid)
            || !(0.0..=1.0).contains(&bounds.high)
            || bounds.mid > bounds.high
        {
            return Err(AuroralError::invalid_config(
                "band boundaries must be ordered percentages within [0, 1]",
            ));
        }
        if let FrequencyScale::Geometric {
            start,
            multiplier: Some(multiplier),
        } = self.frequency_scale
        {
            if start <= 0.0 {
                return Err(AuroralError::invalid_config(
                    "geometric scale start must be positive",
                ));
            }
            if multiplier == 0.0 {
                return Err(AuroralError::invalid_config(
                    "geometric scale multiplier must be nonzero",
                ));
            }
        }
        Ok(())
    }

    /// Loads a configuration from a JSON file and validates it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|err| AuroralError::invalid_config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration to a JSON file.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|err| AuroralError::invalid_config(err.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
