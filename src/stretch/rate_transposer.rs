//! Resampling stage: interpolation kernel plus anti-alias low-pass.

use crate::core::fir::AaFilter;
use crate::core::interpolate::Interpolator;
use crate::core::sample_buffer::{SampleBuffer, SamplePipe};
use crate::core::types::{InterpolationAlgorithm, Sample};
use crate::error::{Result, StretchError};

/// Accepted rate range; the fixed-point kernel's step must stay within 32 bits.
const MIN_RATE: f64 = 1.0 / 65536.0;
const MAX_RATE: f64 = 65536.0;

/// Changes playback rate (and with it pitch) by fractional resampling.
///
/// When the anti-alias filter is enabled it runs on whichever side of the
/// interpolator keeps content above the new Nyquist limit from folding
/// back: after interpolation when slowing down, before it when speeding up.
#[derive(Debug, Clone)]
pub struct RateTransposer<S: Sample> {
    rate: f64,
    channels: usize,
    interpolator: Interpolator,
    aa_filter: AaFilter<S>,
    use_aa_filter: bool,
    input: SampleBuffer<S>,
    mid: SampleBuffer<S>,
    output: SampleBuffer<S>,
}

impl<S: Sample> RateTransposer<S> {
    /// Creates a mono transposer at unit rate with a 64-tap anti-alias filter.
    pub fn new(algorithm: InterpolationAlgorithm) -> Self {
        Self::from_parts(algorithm, AaFilter::default())
    }

    /// Creates a mono transposer with a custom anti-alias tap count.
    pub fn with_filter_length(algorithm: InterpolationAlgorithm, aa_length: usize) -> Result<Self> {
        Ok(Self::from_parts(algorithm, AaFilter::new(aa_length)?))
    }

    fn from_parts(algorithm: InterpolationAlgorithm, aa_filter: AaFilter<S>) -> Self {
        Self {
            rate: 1.0,
            channels: 1,
            interpolator: Interpolator::new(algorithm),
            aa_filter,
            use_aa_filter: true,
            input: SampleBuffer::new(1),
            mid: SampleBuffer::new(1),
            output: SampleBuffer::new(1),
        }
    }

    pub fn algorithm(&self) -> InterpolationAlgorithm {
        self.interpolator.algorithm()
    }

    /// Sets the rate: above 1.0 consumes input faster (higher pitch).
    ///
    /// # Errors
    /// [`StretchError::InvalidParameter`] unless `rate` lies in
    /// `[1/65536, 65536]`. The transposer is unchanged on error.
    pub fn set_rate(&mut self, rate: f64) -> Result<()> {
        Self::check_rate(rate)?;
        self.rate = rate;
        self.interpolator.set_rate(rate);
        let cutoff = if rate > 1.0 { 0.5 / rate } else { 0.5 * rate };
        self.aa_filter.set_cutoff_freq(cutoff)
    }

    /// Checks `rate` without applying it.
    pub fn check_rate(rate: f64) -> Result<()> {
        if !(MIN_RATE..=MAX_RATE).contains(&rate) {
            return Err(StretchError::InvalidParameter(format!(
                "rate must be between {} and {}, got {}",
                MIN_RATE, MAX_RATE, rate
            )));
        }
        Ok(())
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn set_channels(&mut self, channels: usize) -> Result<()> {
        if channels == 0 {
            return Err(StretchError::InvalidParameter(
                "channel count must be at least 1".into(),
            ));
        }
        if channels == self.channels {
            return Ok(());
        }
        self.channels = channels;
        self.input.set_channels(channels)?;
        self.mid.set_channels(channels)?;
        self.output.set_channels(channels)?;
        self.clear();
        Ok(())
    }

    pub fn enable_aa_filter(&mut self, enabled: bool) {
        self.use_aa_filter = enabled;
    }

    pub fn is_aa_filter_enabled(&self) -> bool {
        self.use_aa_filter
    }

    pub fn aa_filter(&self) -> &AaFilter<S> {
        &self.aa_filter
    }

    /// Changes the anti-alias tap count; see [`AaFilter::set_length`].
    pub fn set_aa_filter_length(&mut self, length: usize) -> Result<()> {
        self.aa_filter.set_length(length)
    }

    /// Frames waiting in the input buffer.
    pub fn num_unprocessed_samples(&self) -> usize {
        self.input.num_samples()
    }

    pub fn input_buffer_mut(&mut self) -> &mut SampleBuffer<S> {
        &mut self.input
    }

    pub fn output_buffer(&self) -> &SampleBuffer<S> {
        &self.output
    }

    pub fn output_buffer_mut(&mut self) -> &mut SampleBuffer<S> {
        &mut self.output
    }

    /// Appends interleaved frames and transposes as much as possible.
    pub fn put_samples(&mut self, samples: &[S]) -> Result<()> {
        self.input.put_samples(samples)?;
        self.process_samples()
    }

    /// Runs the buffered input through the filter and interpolator.
    pub fn process_samples(&mut self) -> Result<()> {
        if self.input.is_empty() {
            return Ok(());
        }
        if !self.use_aa_filter {
            self.interpolator
                .transpose_buffers(&mut self.output, &mut self.input)?;
            return Ok(());
        }
        if self.rate < 1.0 {
            self.interpolator
                .transpose_buffers(&mut self.mid, &mut self.input)?;
            self.aa_filter
                .evaluate_buffers(&mut self.output, &mut self.mid)?;
        } else {
            self.aa_filter
                .evaluate_buffers(&mut self.mid, &mut self.input)?;
            self.interpolator
                .transpose_buffers(&mut self.output, &mut self.mid)?;
        }
        Ok(())
    }

    /// Drops all buffered audio and resets the interpolation phase.
    pub fn clear(&mut self) {
        self.output.clear();
        self.clear_input();
    }

    /// Drops pending input and the filter stage and resets the interpolation
    /// phase. Output is kept.
    pub fn clear_input(&mut self) {
        self.mid.clear();
        self.input.clear();
        self.interpolator.reset();
    }
}

impl<S: Sample> Default for RateTransposer<S> {
    fn default() -> Self {
        Self::new(InterpolationAlgorithm::default())
    }
}

impl<S: Sample> SamplePipe<S> for RateTransposer<S> {
    fn channels(&self) -> usize {
        self.channels
    }

    fn num_samples(&self) -> usize {
        self.output.num_samples()
    }

    /// Empty only once both the output and the pending input are drained.
    fn is_empty(&self) -> bool {
        self.output.is_empty() && self.input.is_empty()
    }

    fn receive_samples(&mut self, out: &mut [S], max_frames: usize) -> usize {
        self.output.receive_samples(out, max_frames)
    }

    fn discard_samples(&mut self, max_frames: usize) -> usize {
        self.output.discard_samples(max_frames)
    }

    fn clear(&mut self) {
        RateTransposer::clear(self)
    }
}
