use serde::{Deserialize, Serialize};

use crate::core::fir::{validate_filter_length, DEFAULT_AA_LENGTH};
use crate::core::types::InterpolationAlgorithm;
use crate::error::StretchError;

/// Default overlap between spliced sequences, in milliseconds.
pub const DEFAULT_OVERLAP_MS: u32 = 8;

/// Sample rate assumed by a stretcher that has not been configured yet.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Automatic sequence length runs linearly from 90 ms at tempo 0.5 down to
/// 40 ms at tempo 2.0 and is clamped to that range outside it.
const AUTOSEQ_TEMPO_LOW: f64 = 0.5;
const AUTOSEQ_TEMPO_TOP: f64 = 2.0;
const AUTOSEQ_AT_MIN: f64 = 90.0;
const AUTOSEQ_AT_MAX: f64 = 40.0;
const AUTOSEEK_AT_MIN: f64 = 20.0;
const AUTOSEEK_AT_MAX: f64 = 15.0;

/// Smallest overlap in frames.
const MIN_OVERLAP_FRAMES: usize = 16;

fn auto_ms(tempo: f64, at_low_tempo: f64, at_top_tempo: f64) -> u32 {
    let k = (at_top_tempo - at_low_tempo) / (AUTOSEQ_TEMPO_TOP - AUTOSEQ_TEMPO_LOW);
    let c = at_low_tempo - k * AUTOSEQ_TEMPO_LOW;
    let ms = (c + k * tempo).clamp(at_top_tempo, at_low_tempo);
    (ms + 0.5) as u32
}

/// Sequence length chosen for `tempo` in automatic mode, in milliseconds.
pub fn auto_sequence_ms(tempo: f64) -> u32 {
    auto_ms(tempo, AUTOSEQ_AT_MIN, AUTOSEQ_AT_MAX)
}

/// Seek window length chosen for `tempo` in automatic mode, in milliseconds.
pub fn auto_seek_window_ms(tempo: f64) -> u32 {
    auto_ms(tempo, AUTOSEEK_AT_MIN, AUTOSEEK_AT_MAX)
}

/// Overlap in frames for `overlap_ms`: at least 16 and a multiple of 8.
pub fn overlap_frames(sample_rate: u32, overlap_ms: u32) -> usize {
    let frames = ((sample_rate as u64 * overlap_ms as u64) / 1000) as usize;
    let frames = frames.max(MIN_OVERLAP_FRAMES);
    frames - frames % 8
}

/// Frame counts the stretcher derives from its millisecond settings and the
/// current tempo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceParams {
    /// Resolved sequence length in milliseconds.
    pub sequence_ms: u32,
    /// Resolved seek window length in milliseconds.
    pub seek_window_ms: u32,
    /// Cross-fade length.
    pub overlap_length: usize,
    /// Length of one processing sequence, including both overlaps.
    pub seek_window_length: usize,
    /// Number of candidate splice offsets searched.
    pub seek_length: usize,
    /// Input frames advanced per sequence (fractional).
    pub nominal_skip: f64,
    /// Input frames needed before a sequence can be processed.
    pub sample_req: usize,
}

impl SequenceParams {
    /// Derives frame counts. `None` for the sequence or seek window selects
    /// the tempo-dependent automatic value.
    pub fn derive(
        sample_rate: u32,
        sequence_ms: Option<u32>,
        seek_window_ms: Option<u32>,
        overlap_length: usize,
        tempo: f64,
    ) -> Self {
        let sequence_ms = sequence_ms.unwrap_or_else(|| auto_sequence_ms(tempo));
        let seek_window_ms = seek_window_ms.unwrap_or_else(|| auto_seek_window_ms(tempo));

        let sr = sample_rate as u64;
        let seek_window_length =
            (((sr * sequence_ms as u64) / 1000) as usize).max(2 * overlap_length);
        let seek_length = ((sr * seek_window_ms as u64) / 1000) as usize;

        let nominal_skip = tempo * (seek_window_length - overlap_length) as f64;
        let int_skip = (nominal_skip + 0.5) as usize;
        let sample_req = int_skip
            .saturating_add(overlap_length)
            .max(seek_window_length)
            .saturating_add(seek_length);

        Self {
            sequence_ms,
            seek_window_ms,
            overlap_length,
            seek_window_length,
            seek_length,
            nominal_skip,
            sample_req,
        }
    }

    /// Frames produced per processed sequence.
    pub fn output_batch_size(&self) -> usize {
        self.seek_window_length - self.overlap_length
    }

    /// Input frames consumed per processed sequence, rounded.
    pub fn input_batch_size(&self) -> usize {
        (self.nominal_skip + 0.5) as usize
    }
}

/// Construction-time settings of a [`StreamProcessor`](crate::StreamProcessor).
///
/// Sample rate and channel count have no defaults; processing fails until
/// both are known.
///
/// # Example
/// ```
/// use voxstretch::{InterpolationAlgorithm, StretchConfig};
///
/// let config = StretchConfig::new()
///     .with_sample_rate(48000)
///     .with_channels(2)
///     .with_interpolation(InterpolationAlgorithm::Shannon)
///     .with_quick_seek(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StretchConfig {
    pub sample_rate: Option<u32>,
    pub channels: Option<usize>,
    pub interpolation: InterpolationAlgorithm,
    /// Sequence length in ms, `None` for automatic.
    pub sequence_ms: Option<u32>,
    /// Seek window length in ms, `None` for automatic.
    pub seek_window_ms: Option<u32>,
    pub overlap_ms: u32,
    pub quick_seek: bool,
    pub aa_filter: bool,
    /// Anti-alias filter tap count, a multiple of 8.
    pub aa_filter_length: usize,
}

impl Default for StretchConfig {
    fn default() -> Self {
        Self {
            sample_rate: None,
            channels: None,
            interpolation: InterpolationAlgorithm::default(),
            sequence_ms: None,
            seek_window_ms: None,
            overlap_ms: DEFAULT_OVERLAP_MS,
            quick_seek: false,
            aa_filter: true,
            aa_filter_length: DEFAULT_AA_LENGTH,
        }
    }
}

impl StretchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn with_interpolation(mut self, algorithm: InterpolationAlgorithm) -> Self {
        self.interpolation = algorithm;
        self
    }

    /// Fixes the sequence length. Zero selects automatic mode.
    pub fn with_sequence_ms(mut self, ms: u32) -> Self {
        self.sequence_ms = (ms > 0).then_some(ms);
        self
    }

    /// Fixes the seek window length. Zero selects automatic mode.
    pub fn with_seek_window_ms(mut self, ms: u32) -> Self {
        self.seek_window_ms = (ms > 0).then_some(ms);
        self
    }

    pub fn with_overlap_ms(mut self, ms: u32) -> Self {
        self.overlap_ms = ms;
        self
    }

    pub fn with_quick_seek(mut self, enabled: bool) -> Self {
        self.quick_seek = enabled;
        self
    }

    pub fn with_aa_filter(mut self, enabled: bool) -> Self {
        self.aa_filter = enabled;
        self
    }

    pub fn with_aa_filter_length(mut self, length: usize) -> Self {
        self.aa_filter_length = length;
        self
    }

    /// Checks the values that would be rejected at construction.
    pub fn validate(&self) -> Result<(), StretchError> {
        if self.sample_rate == Some(0) {
            return Err(StretchError::InvalidParameter(
                "sample rate must be positive".into(),
            ));
        }
        if self.channels == Some(0) {
            return Err(StretchError::InvalidParameter(
                "channel count must be at least 1".into(),
            ));
        }
        validate_filter_length(self.aa_filter_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_sequence_endpoints() {
        assert_eq!(auto_sequence_ms(0.5), 90);
        assert_eq!(auto_sequence_ms(2.0), 40);
        assert_eq!(auto_sequence_ms(0.1), 90);
        assert_eq!(auto_sequence_ms(4.0), 40);
        assert_eq!(auto_sequence_ms(1.0), 73);
    }

    #[test]
    fn test_auto_seek_window_endpoints() {
        assert_eq!(auto_seek_window_ms(0.5), 20);
        assert_eq!(auto_seek_window_ms(2.0), 15);
        assert_eq!(auto_seek_window_ms(1.0), 18);
        assert_eq!(auto_seek_window_ms(10.0), 15);
    }

    #[test]
    fn test_overlap_rounding() {
        assert_eq!(overlap_frames(44100, 8), 352);
        assert_eq!(overlap_frames(48000, 8), 384);
        assert_eq!(overlap_frames(8000, 1), 16);
        assert_eq!(overlap_frames(22050, 3), 64);
    }

    #[test]
    fn test_fixed_parameters_at_tempo_1_2() {
        let p = SequenceParams::derive(44100, Some(40), Some(15), 352, 1.2);
        assert_eq!(p.seek_window_length, 1764);
        assert_eq!(p.seek_length, 661);
        assert!((p.nominal_skip - 1694.4).abs() < 1e-9);
        assert_eq!(p.sample_req, 2707);
        assert_eq!(p.output_batch_size(), 1412);
        assert_eq!(p.input_batch_size(), 1694);
    }

    #[test]
    fn test_seek_window_at_least_two_overlaps() {
        let p = SequenceParams::derive(8000, Some(1), Some(1), 64, 1.0);
        assert_eq!(p.seek_window_length, 128);
    }

    #[test]
    fn test_config_builder_and_validate() {
        let cfg = StretchConfig::new()
            .with_sample_rate(44100)
            .with_channels(2)
            .with_sequence_ms(0)
            .with_seek_window_ms(25);
        assert_eq!(cfg.sequence_ms, None);
        assert_eq!(cfg.seek_window_ms, Some(25));
        assert!(cfg.validate().is_ok());

        assert!(cfg.clone().with_channels(0).validate().is_err());
        assert_eq!(
            cfg.with_aa_filter_length(20).validate(),
            Err(StretchError::InvalidFilterLength(20))
        );
    }
}
