use serde::{Deserialize, Serialize};

use crate::{DeviceConfig, FrequencyScale, ScaledAverage};

/// Lower bound for the algorithmic smoothing amount. Loud audio never drops
/// below this, keeping some smoothing even during sustained peaks.
const SMOOTHING_AMOUNT_MIN: f64 = 0.1;
/// Upper bound for the algorithmic smoothing amount during quiet audio.
const SMOOTHING_AMOUNT_MAX: f64 = 0.75;

/// Device-independent audio signals recomputed once per spectrum snapshot.
/// All normalized fields are clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    /// Peak intensity of the low frequency band.
    pub low_intensity: f64,
    /// Peak intensity of the middle frequency band.
    pub mid_intensity: f64,
    /// Peak intensity of the high frequency band.
    pub high_intensity: f64,
    /// Where the energy sits in the spectrum; biased toward 1 when high
    /// frequencies dominate.
    pub frequency_distribution: f64,
    pub average_frequency_distribution: f64,
    pub delta_frequency_distribution: f64,
    /// Unsmoothed weighted intensity of the whole snapshot.
    pub realtime_intensity: f64,
    pub average_intensity: f64,
    pub delta_intensity: f64,
    /// Filter time constant in milliseconds derived from the average
    /// intensity, so quiet audio animates slowly and loud audio snaps.
    pub smoothing_constant_ms: f64,
}

/// One clamped intensity value per logical meter segment, bucketed from a
/// spectrum snapshot of arbitrary resolution.
pub type ProcessedBand = Vec<f64>;

/// Turns raw spectrum snapshots into [`AudioFeatures`] and a
/// light-count-aligned [`ProcessedBand`].
///
/// The extractor owns the running averages between snapshots; everything
/// else is recomputed from scratch each cycle. Snapshots are consumed
/// wholesale, never partially.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: DeviceConfig,
    smoothing_filter: ScaledAverage,
    algorithmic_smoothing: bool,
    average_frequency_distribution: f64,
    average_intensity: f64,
    smoothing_constant_ms: f64,
}

impl FeatureExtractor {
    pub fn new(config: DeviceConfig) -> Self {
        let smoothing_filter =
            ScaledAverage::new(config.audio_time_constant_ms, config.frame_period_ms);
        let smoothing_constant_ms =
            smoothing_constant_from_amount(SMOOTHING_AMOUNT_MAX, config.frame_period_ms);
        Self {
            config,
            smoothing_filter,
            algorithmic_smoothing: true,
            // Middle of range, so the first delta is not a full-scale jump.
            average_frequency_distribution: 0.5,
            average_intensity: 0.0,
            smoothing_constant_ms,
        }
    }

    /// Enables or disables deriving the smoothing constant from the running
    /// average intensity. On by default.
    pub fn set_algorithmic_smoothing(&mut self, enabled: bool) {
        self.algorithmic_smoothing = enabled;
    }

    /// Consumes one spectrum snapshot and produces the feature record plus
    /// the bucketed meter band.
    ///
    /// A snapshot with no bins or no energy is routine (audio dropouts
    /// happen constantly) and yields zeroed outputs without touching the
    /// running averages.
    pub fn process(&mut self, snapshot: &[f64]) -> (AudioFeatures, ProcessedBand) {
        if snapshot.is_empty() || snapshot.iter().all(|value| *value <= 0.0) {
            return (
                AudioFeatures::default(),
                vec![0.0; self.config.meter_count()],
            );
        }

        let (low, mid, high) = self.band_maxima(snapshot);
        let features = self.update_intensity(low, mid, high);
        let processed = self.bucket_band(snapshot);
        (features, processed)
    }

    /// Splits the snapshot into three bands by proportional index position
    /// and takes the maximum within each, so a single loud bin registers.
    fn band_maxima(&self, snapshot: &[f64]) -> (f64, f64, f64) {
        let bin_count = snapshot.len();
        let bounds = &self.config.band_boundaries;
        let mid_start = (bounds.mid * bin_count as f64).floor() as usize;
        let high_start = (bounds.high * bin_count as f64).floor() as usize;

        let mut low = 0.0_f64;
        let mut mid = 0.0_f64;
        let mut high = 0.0_f64;
        for (index, &value) in snapshot.iter().enumerate() {
            if index < mid_start {
                low = low.max(value);
            } else if index < high_start {
                mid = mid.max(value);
            } else {
                high = high.max(value);
            }
        }
        (low, mid, high)
    }

    fn update_intensity(&mut self, low: f64, mid: f64, high: f64) -> AudioFeatures {
        let frequency_distribution =
            (((1.0 - low) + (mid * 0.3 + high * 0.6)) / 2.0).clamp(0.0, 1.0);
        let delta_frequency_distribution =
            frequency_distribution - self.average_frequency_distribution;
        self.average_frequency_distribution = self
            .smoothing_filter
            .filter(self.average_frequency_distribution, frequency_distribution);

        let realtime_intensity = (low * 0.25 + mid * 0.45 + high * 0.5).clamp(0.0, 1.0);
        let delta_intensity = realtime_intensity - self.average_intensity;
        self.average_intensity = self
            .smoothing_filter
            .filter(self.average_intensity, realtime_intensity);

        if self.algorithmic_smoothing {
            let amount = (1.0 - self.average_intensity)
                .clamp(SMOOTHING_AMOUNT_MIN, SMOOTHING_AMOUNT_MAX);
            self.smoothing_constant_ms =
                smoothing_constant_from_amount(amount, self.config.frame_period_ms);
        }

        AudioFeatures {
            low_intensity: low,
            mid_intensity: mid,
            high_intensity: high,
            frequency_distribution,
            average_frequency_distribution: self.average_frequency_distribution,
            delta_frequency_distribution,
            realtime_intensity,
            average_intensity: self.average_intensity,
            delta_intensity,
            smoothing_constant_ms: self.smoothing_constant_ms,
        }
    }

    /// Buckets snapshot bins into one running-max value per meter segment.
    /// Boundaries advance linearly or geometrically; the geometric
    /// multiplier is recomputed per snapshot whenever it is unset or a
    /// no-op 1, so boundaries land on the segment count regardless of the
    /// audio source's resolution.
    fn bucket_band(&self, snapshot: &[f64]) -> ProcessedBand {
        let meter_count = self.config.meter_count();
        let bin_count = snapshot.len();
        let mut processed = Vec::with_capacity(meter_count);

        let (mut next_step, step): (f64, Step) = match self.config.frequency_scale {
            FrequencyScale::Linear => (1.0, Step::Linear),
            FrequencyScale::Geometric { start, multiplier } => {
                let start = start.max(1.0);
                let multiplier = match multiplier {
                    Some(value) if value != 1.0 => value,
                    _ => frequency_step_multiplier(bin_count, start, meter_count),
                };
                (start, Step::Geometric(multiplier))
            }
        };

        let mut current_max = 0.0_f64;
        for (index, &value) in snapshot.iter().enumerate() {
            if (index as f64) < next_step {
                current_max = current_max.max(value).clamp(0.0, 1.0);
            } else {
                processed.push(current_max);
                current_max = value.clamp(0.0, 1.0);
                if processed.len() >= meter_count {
                    break;
                }
                match step {
                    Step::Linear => next_step += 1.0,
                    Step::Geometric(multiplier) => next_step *= multiplier,
                }
            }
        }
        if processed.len() < meter_count {
            processed.push(current_max);
        }
        processed.resize(meter_count, 0.0);
        processed
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Linear,
    Geometric(f64),
}

/// Multiplier chosen so that `start * m^meter_count == bin_count`, i.e. the
/// boundary scan finishes exactly at the end of the snapshot.
fn frequency_step_multiplier(bin_count: usize, start: f64, meter_count: usize) -> f64 {
    if bin_count == 0 || meter_count == 0 {
        return 1.0;
    }
    let ratio = bin_count as f64 / start;
    if ratio <= 1.0 {
        return 1.0;
    }
    (ratio).powf(1.0 / meter_count as f64).max(1.0)
}

fn smoothing_constant_from_amount(amount: f64, frame_period_ms: f64) -> f64 {
    ((2.0 / (1.0 - amount)) - 1.0) * frame_period_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor(light_count: usize) -> FeatureExtractor {
        FeatureExtractor::new(DeviceConfig::new(light_count))
    }

    #[test]
    fn silent_snapshot_yields_zero_features() {
        let mut extractor = extractor(8);
        let (features, processed) = extractor.process(&[0.0; 64]);

        assert_eq!(features, AudioFeatures::default());
        assert_eq!(processed, vec![0.0; 4]);
    }

    #[test]
    fn empty_snapshot_is_not_an_error() {
        let mut extractor = extractor(8);
        let (features, processed) = extractor.process(&[]);

        assert_eq!(features.realtime_intensity, 0.0);
        assert_eq!(processed.len(), 4);
    }

    #[test]
    fn band_maxima_follow_boundary_percentages() {
        let mut extractor = extractor(4);
        let snapshot = [0.1, 0.9, 0.2, 0.8, 0.05, 0.95, 0.15, 0.85];
        let (features, _) = extractor.process(&snapshot);

        assert!((features.low_intensity - 0.9).abs() < 1e-9);
        assert!((features.mid_intensity - 0.8).abs() < 1e-9);
        assert!((features.high_intensity - 0.95).abs() < 1e-9);
        // 0.9*0.25 + 0.8*0.45 + 0.95*0.5 = 1.06, clamped.
        assert_eq!(features.realtime_intensity, 1.0);
    }

    #[test]
    fn deltas_track_running_averages() {
        let mut extractor = extractor(8);
        let quiet = [0.1; 32];
        let loud = [0.9; 32];

        let (first, _) = extractor.process(&quiet);
        assert!(first.delta_intensity > 0.0);

        let (second, _) = extractor.process(&loud);
        assert!(second.delta_intensity > 0.0);
        assert!(second.average_intensity < second.realtime_intensity);
        assert!(second.average_intensity > first.average_intensity);
    }

    #[test]
    fn algorithmic_smoothing_speeds_up_with_loud_audio() {
        let mut extractor = extractor(8);
        let (quiet, _) = extractor.process(&[0.05; 32]);
        for _ in 0..50 {
            extractor.process(&[1.0; 32]);
        }
        let (loud, _) = extractor.process(&[1.0; 32]);

        assert!(loud.smoothing_constant_ms < quiet.smoothing_constant_ms);
    }

    #[test]
    fn processed_band_matches_meter_count() {
        let mut config = DeviceConfig::new(10);
        config.mirror_meters = true;
        let mut extractor = FeatureExtractor::new(config);
        let snapshot: Vec<f64> = (0..128).map(|i| (i % 7) as f64 / 10.0).collect();
        let (_, processed) = extractor.process(&snapshot);

        assert_eq!(processed.len(), 5);
        assert!(processed.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn unmirrored_band_covers_full_strand() {
        let mut config = DeviceConfig::new(10);
        config.mirror_meters = false;
        let mut extractor = FeatureExtractor::new(config);
        let snapshot = vec![0.5; 64];
        let (_, processed) = extractor.process(&snapshot);

        assert_eq!(processed.len(), 10);
    }

    #[test]
    fn linear_scale_takes_one_bin_per_segment() {
        let mut config = DeviceConfig::new(8);
        config.mirror_meters = false;
        config.frequency_scale = FrequencyScale::Linear;
        let mut extractor = FeatureExtractor::new(config);
        let snapshot = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8];
        let (_, processed) = extractor.process(&snapshot);

        assert_eq!(processed, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8]);
    }

    #[test]
    fn step_multiplier_reaches_bin_count() {
        let multiplier = frequency_step_multiplier(512, 1.0, 25);
        let reached = 1.0 * multiplier.powi(25);
        assert!((reached - 512.0).abs() < 1e-6);
    }
}
