//! Streaming rate, tempo and pitch transformation for interleaved PCM audio.
//!
//! `voxstretch` changes tempo without touching pitch, pitch without touching
//! tempo, or both together (rate), on a live stream of frames. Tempo is
//! changed by overlap-add splicing of waveform sequences at best-matching
//! offsets; rate is changed by fractional resampling behind an anti-alias
//! low-pass filter. Pitch shifting combines the two.
//!
//! All processing is synchronous and single-threaded. Push frames in, pull
//! frames out; nothing touches files or devices.
//!
//! # Quick Start
//!
//! ```
//! use voxstretch::StreamProcessor;
//!
//! let input: Vec<f32> = (0..44100)
//!     .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
//!     .collect();
//!
//! let mut proc = StreamProcessor::<f32>::new();
//! proc.set_sample_rate(44100).unwrap();
//! proc.set_channels(1).unwrap();
//! proc.set_tempo(0.5).unwrap();
//!
//! let output = voxstretch::process_all(&mut proc, &input).unwrap();
//! assert!(output.len() > input.len() * 3 / 2); // about twice as long
//! ```
//!
//! # Configuration
//!
//! [`StretchConfig`] gathers construction-time settings and can be loaded
//! with serde:
//!
//! ```
//! use voxstretch::{InterpolationAlgorithm, StreamProcessor, StretchConfig};
//!
//! let config = StretchConfig::new()
//!     .with_sample_rate(48000)
//!     .with_channels(2)
//!     .with_interpolation(InterpolationAlgorithm::Linear)
//!     .with_sequence_ms(40);
//! let proc = StreamProcessor::<i16>::with_config(config).unwrap();
//! assert_eq!(proc.get_setting(voxstretch::Setting::SequenceMs.id()), 40);
//! ```

#![forbid(unsafe_code)]

pub mod core;
pub mod error;
pub mod stream;
pub mod stretch;

pub use crate::core::sample_buffer::{SampleBuffer, SamplePipe};
pub use crate::core::types::{InterpolationAlgorithm, Sample, Setting};
pub use error::{Result, StretchError};
pub use stream::{PipelineOrder, StreamProcessor};
pub use stretch::{RateTransposer, StretchConfig, TdStretch};

/// Crate version string.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Pushes a whole signal through `proc`, flushes it and returns every
/// processed frame.
///
/// The processor must already have its sample rate and channel count set.
/// Frames that were ready before the call are included at the front.
pub fn process_all<S: Sample>(proc: &mut StreamProcessor<S>, input: &[S]) -> Result<Vec<S>> {
    proc.put_samples(input)?;
    proc.flush()?;
    let channels = proc.channels();
    let mut output = vec![S::ZERO; proc.num_samples() * channels];
    let frames = proc.receive_samples(&mut output, usize::MAX);
    output.truncate(frames * channels);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_matches_manifest() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
        assert!(!version().is_empty());
    }

    #[test]
    fn test_process_all_requires_configuration() {
        let mut proc = StreamProcessor::<f32>::new();
        assert!(matches!(
            process_all(&mut proc, &[0.0; 16]),
            Err(StretchError::Configuration(_))
        ));
    }
}
