use std::f64::consts::LN_2;

use log::{debug, warn};

use crate::core::sample_buffer::{SampleBuffer, SamplePipe};
use crate::core::types::{Sample, Setting};
use crate::error::{Result, StretchError};
use crate::stretch::params::StretchConfig;
use crate::stretch::rate_transposer::RateTransposer;
use crate::stretch::tdstretch::TdStretch;

/// Re-parameterize a stage only when its effective value moves by at least this.
const PARAM_EPSILON: f64 = 1e-10;

/// Frames per zero block pushed by [`StreamProcessor::flush`].
const FLUSH_BLOCK_FRAMES: usize = 64;

/// Upper bound on zero blocks pushed by [`StreamProcessor::flush`].
const FLUSH_MAX_BLOCKS: usize = 128;

/// Which stage currently produces the processor's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOrder {
    /// Effective rate at most 1.0: transpose first, then stretch.
    OutputIsStretch,
    /// Effective rate above 1.0: stretch first, then transpose.
    OutputIsTransposer,
}

/// Streaming rate, tempo and pitch processor.
///
/// Feed interleaved frames with [`put_samples`](Self::put_samples) and poll
/// processed frames with [`receive_samples`](SamplePipe::receive_samples).
/// Pitch, rate and tempo combine into an effective resampling rate and an
/// effective tempo; the resampler runs before the stretcher while the rate
/// is at most 1.0 and after it otherwise, so the stretcher always works on
/// the shorter signal.
///
/// # Example
/// ```
/// use voxstretch::{SamplePipe, StreamProcessor};
///
/// let mut proc = StreamProcessor::<f32>::new();
/// proc.set_sample_rate(44100).unwrap();
/// proc.set_channels(1).unwrap();
/// proc.set_pitch_semitones(3.0).unwrap();
///
/// let input = vec![0.0f32; 8192];
/// proc.put_samples(&input).unwrap();
/// proc.flush().unwrap();
///
/// let mut out = vec![0.0f32; proc.num_samples()];
/// let n = proc.receive_samples(&mut out, usize::MAX);
/// assert_eq!(n, out.len());
/// ```
#[derive(Debug, Clone)]
pub struct StreamProcessor<S: Sample = f32> {
    rate_transposer: RateTransposer<S>,
    tdstretch: TdStretch<S>,
    virtual_rate: f64,
    virtual_tempo: f64,
    virtual_pitch: f64,
    /// Effective resampling rate.
    rate: f64,
    /// Effective stretch tempo.
    tempo: f64,
    channels: Option<usize>,
    sample_rate: Option<u32>,
    order: PipelineOrder,
}

impl<S: Sample> Default for StreamProcessor<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Sample> StreamProcessor<S> {
    /// Creates a processor with default settings. Sample rate and channel
    /// count must be set before samples are pushed.
    pub fn new() -> Self {
        Self::from_stages(RateTransposer::default(), TdStretch::new())
    }

    /// Creates a processor from a [`StretchConfig`].
    pub fn with_config(config: StretchConfig) -> Result<Self> {
        config.validate()?;
        let mut rate_transposer =
            RateTransposer::with_filter_length(config.interpolation, config.aa_filter_length)?;
        rate_transposer.enable_aa_filter(config.aa_filter);

        let mut tdstretch = TdStretch::new();
        tdstretch.enable_quick_seek(config.quick_seek);
        let (default_rate, ..) = tdstretch.parameters();
        tdstretch.set_parameters(
            config.sample_rate.unwrap_or(default_rate),
            config.sequence_ms,
            config.seek_window_ms,
            config.overlap_ms,
        )?;

        let mut proc = Self::from_stages(rate_transposer, tdstretch);
        proc.sample_rate = config.sample_rate;
        if let Some(channels) = config.channels {
            proc.set_channels(channels)?;
        }
        Ok(proc)
    }

    fn from_stages(rate_transposer: RateTransposer<S>, tdstretch: TdStretch<S>) -> Self {
        Self {
            rate_transposer,
            tdstretch,
            virtual_rate: 1.0,
            virtual_tempo: 1.0,
            virtual_pitch: 1.0,
            rate: 1.0,
            tempo: 1.0,
            channels: None,
            sample_rate: None,
            order: PipelineOrder::OutputIsStretch,
        }
    }

    /// Sets the playback rate: changes tempo and pitch together.
    pub fn set_rate(&mut self, rate: f64) -> Result<()> {
        let rate = check_ratio("rate", rate)?;
        self.apply_controls(rate, self.virtual_tempo, self.virtual_pitch)
    }

    /// Sets the rate as a percentage change, e.g. `-50.0` for half rate.
    pub fn set_rate_change(&mut self, percent: f64) -> Result<()> {
        self.set_rate(1.0 + 0.01 * percent)
    }

    /// Sets the tempo without affecting pitch.
    pub fn set_tempo(&mut self, tempo: f64) -> Result<()> {
        let tempo = check_ratio("tempo", tempo)?;
        self.apply_controls(self.virtual_rate, tempo, self.virtual_pitch)
    }

    /// Sets the tempo as a percentage change.
    pub fn set_tempo_change(&mut self, percent: f64) -> Result<()> {
        self.set_tempo(1.0 + 0.01 * percent)
    }

    /// Sets the pitch as a frequency ratio without affecting tempo.
    pub fn set_pitch(&mut self, pitch: f64) -> Result<()> {
        let pitch = check_ratio("pitch", pitch)?;
        self.apply_controls(self.virtual_rate, self.virtual_tempo, pitch)
    }

    pub fn set_pitch_octaves(&mut self, octaves: f64) -> Result<()> {
        self.set_pitch((LN_2 * octaves).exp())
    }

    /// Sets the pitch in (possibly fractional) semitones.
    pub fn set_pitch_semitones(&mut self, semitones: f64) -> Result<()> {
        self.set_pitch_octaves(semitones / 12.0)
    }

    pub fn set_channels(&mut self, channels: usize) -> Result<()> {
        if channels == 0 {
            return Err(StretchError::InvalidParameter(
                "channel count must be at least 1".into(),
            ));
        }
        self.rate_transposer.set_channels(channels)?;
        self.tdstretch.set_channels(channels)?;
        self.channels = Some(channels);
        Ok(())
    }

    /// Sets the sample rate, keeping the stretcher's other timing settings.
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<()> {
        let (_, sequence_ms, seek_window_ms, overlap_ms) = self.tdstretch.parameters();
        self.tdstretch
            .set_parameters(sample_rate, sequence_ms, seek_window_ms, overlap_ms)?;
        self.sample_rate = Some(sample_rate);
        Ok(())
    }

    /// Effective resampling rate (`pitch * rate`).
    pub fn effective_rate(&self) -> f64 {
        self.rate
    }

    /// Effective stretch tempo (`tempo / pitch`).
    pub fn effective_tempo(&self) -> f64 {
        self.tempo
    }

    pub fn pipeline_order(&self) -> PipelineOrder {
        self.order
    }

    /// Frames waiting in the stretcher's input.
    pub fn num_unprocessed_samples(&self) -> usize {
        self.tdstretch.num_unprocessed_samples()
    }

    /// Pushes interleaved frames through the pipeline.
    ///
    /// # Errors
    /// [`StretchError::Configuration`] until both sample rate and channel
    /// count are set.
    pub fn put_samples(&mut self, samples: &[S]) -> Result<()> {
        if self.sample_rate.is_none() {
            return Err(StretchError::Configuration("sample rate not set".into()));
        }
        if self.channels.is_none() {
            return Err(StretchError::Configuration("channel count not set".into()));
        }
        match self.order {
            PipelineOrder::OutputIsStretch => {
                self.rate_transposer.put_samples(samples)?;
                self.tdstretch
                    .input_buffer_mut()
                    .append_from(self.rate_transposer.output_buffer_mut())?;
                self.tdstretch.process_samples()
            }
            PipelineOrder::OutputIsTransposer => {
                self.tdstretch.put_samples(samples)?;
                self.rate_transposer
                    .input_buffer_mut()
                    .append_from(self.tdstretch.output_buffer_mut())?;
                self.rate_transposer.process_samples()
            }
        }
    }

    /// Pushes the tail of the stream out of the pipeline.
    ///
    /// Feeds blocks of silence until the output holds the number of frames
    /// the buffered input should produce, then trims any excess and drops
    /// the stages' input buffers. Processed output is kept.
    pub fn flush(&mut self) -> Result<()> {
        let channels = self
            .channels
            .ok_or_else(|| StretchError::Configuration("channel count not set".into()))?;

        let unprocessed = self.num_unprocessed_samples() as f64;
        let expected_tail = (unprocessed / (self.tempo * self.rate) + 0.5) as usize;
        let target = self.num_samples() + expected_tail;

        let silence = vec![S::ZERO; FLUSH_BLOCK_FRAMES * channels];
        let mut reached = false;
        for _ in 0..FLUSH_MAX_BLOCKS {
            self.put_samples(&silence)?;
            if self.num_samples() >= target {
                self.output_buffer_mut().truncate(target);
                reached = true;
                break;
            }
        }
        if !reached {
            warn!(
                "flush stopped after {} blocks with {} of {} frames",
                FLUSH_MAX_BLOCKS,
                self.num_samples(),
                target
            );
        } else {
            debug!("flush complete with {} frames ready", target);
        }

        self.rate_transposer.clear_input();
        self.tdstretch.clear_input();
        Ok(())
    }

    /// Changes a setting by integer id.
    ///
    /// Returns `Ok(false)` for unknown and read-only ids.
    ///
    /// # Errors
    /// [`StretchError::InvalidFilterLength`] for an anti-alias length that is
    /// not a positive multiple of 8.
    pub fn set_setting(&mut self, id: i32, value: i32) -> Result<bool> {
        let Some(setting) = Setting::from_id(id) else {
            return Ok(false);
        };
        let (sample_rate, sequence_ms, seek_window_ms, overlap_ms) = self.tdstretch.parameters();
        let as_ms = |v: i32| u32::try_from(v).ok().filter(|&ms| ms > 0);

        match setting {
            Setting::UseAaFilter => self.rate_transposer.enable_aa_filter(value != 0),
            Setting::AaFilterLength => {
                let length = usize::try_from(value).unwrap_or(0);
                if let Err(e) = self.rate_transposer.set_aa_filter_length(length) {
                    warn!("rejected anti-alias filter length {}", value);
                    return Err(e);
                }
            }
            Setting::UseQuickSeek => self.tdstretch.enable_quick_seek(value != 0),
            Setting::SequenceMs => {
                self.tdstretch
                    .set_parameters(sample_rate, as_ms(value), seek_window_ms, overlap_ms)?;
            }
            Setting::SeekWindowMs => {
                self.tdstretch
                    .set_parameters(sample_rate, sequence_ms, as_ms(value), overlap_ms)?;
            }
            Setting::OverlapMs => {
                let overlap = as_ms(value).unwrap_or(overlap_ms);
                self.tdstretch
                    .set_parameters(sample_rate, sequence_ms, seek_window_ms, overlap)?;
            }
            Setting::NominalInputSequence | Setting::NominalOutputSequence => return Ok(false),
        }
        Ok(true)
    }

    /// Reads a setting by integer id. Unknown ids read as 0, as do the
    /// sequence and seek window lengths in automatic mode.
    pub fn get_setting(&self, id: i32) -> i32 {
        let Some(setting) = Setting::from_id(id) else {
            return 0;
        };
        let (_, sequence_ms, seek_window_ms, overlap_ms) = self.tdstretch.parameters();
        let clamp = |v: usize| i32::try_from(v).unwrap_or(i32::MAX);
        match setting {
            Setting::UseAaFilter => self.rate_transposer.is_aa_filter_enabled() as i32,
            Setting::AaFilterLength => clamp(self.rate_transposer.aa_filter().length()),
            Setting::UseQuickSeek => self.tdstretch.is_quick_seek_enabled() as i32,
            Setting::SequenceMs => sequence_ms.map_or(0, |ms| ms as i32),
            Setting::SeekWindowMs => seek_window_ms.map_or(0, |ms| ms as i32),
            Setting::OverlapMs => overlap_ms as i32,
            Setting::NominalInputSequence => clamp(self.tdstretch.input_sample_req()),
            Setting::NominalOutputSequence => clamp(self.tdstretch.output_batch_size()),
        }
    }

    /// Drops all buffered audio. Settings are kept.
    pub fn clear(&mut self) {
        self.rate_transposer.clear();
        self.tdstretch.clear();
    }

    fn output_buffer_mut(&mut self) -> &mut SampleBuffer<S> {
        match self.order {
            PipelineOrder::OutputIsStretch => self.tdstretch.output_buffer_mut(),
            PipelineOrder::OutputIsTransposer => self.rate_transposer.output_buffer_mut(),
        }
    }

    /// Derives the effective rate and tempo from the virtual controls and
    /// re-parameterizes the stages whose value moved. Nothing is changed
    /// unless both stages accept their new value.
    fn apply_controls(
        &mut self,
        virtual_rate: f64,
        virtual_tempo: f64,
        virtual_pitch: f64,
    ) -> Result<()> {
        let rate = virtual_pitch * virtual_rate;
        let tempo = virtual_tempo / virtual_pitch;
        let rate_moved = !((rate - self.rate).abs() < PARAM_EPSILON);
        let tempo_moved = !((tempo - self.tempo).abs() < PARAM_EPSILON);

        if rate_moved {
            RateTransposer::<S>::check_rate(rate)?;
        }
        if tempo_moved {
            self.tdstretch.set_tempo(tempo)?;
        }
        if rate_moved {
            self.rate_transposer.set_rate(rate)?;
        }
        self.virtual_rate = virtual_rate;
        self.virtual_tempo = virtual_tempo;
        self.virtual_pitch = virtual_pitch;
        self.rate = rate;
        self.tempo = tempo;

        let wanted = if self.rate <= 1.0 {
            PipelineOrder::OutputIsStretch
        } else {
            PipelineOrder::OutputIsTransposer
        };
        if wanted != self.order {
            self.switch_order(wanted)?;
        }
        Ok(())
    }

    /// Moves ready output into the new output stage and pending raw input
    /// into the new first stage.
    fn switch_order(&mut self, order: PipelineOrder) -> Result<()> {
        let rt = &mut self.rate_transposer;
        let td = &mut self.tdstretch;
        let (moved_out, moved_in) = match order {
            PipelineOrder::OutputIsStretch => {
                let out = td.output_buffer_mut().append_from(rt.output_buffer_mut())?;
                let inp = rt.input_buffer_mut().append_from(td.input_buffer_mut())?;
                (out, inp)
            }
            PipelineOrder::OutputIsTransposer => {
                let out = rt.output_buffer_mut().append_from(td.output_buffer_mut())?;
                let inp = td.input_buffer_mut().append_from(rt.input_buffer_mut())?;
                (out, inp)
            }
        };
        debug!(
            "pipeline switched to {:?} at rate {:.4}: moved {} output and {} input frames",
            order, self.rate, moved_out, moved_in
        );
        self.order = order;
        Ok(())
    }
}

impl<S: Sample> SamplePipe<S> for StreamProcessor<S> {
    fn channels(&self) -> usize {
        self.channels.unwrap_or(1)
    }

    fn num_samples(&self) -> usize {
        match self.order {
            PipelineOrder::OutputIsStretch => self.tdstretch.num_samples(),
            PipelineOrder::OutputIsTransposer => self.rate_transposer.num_samples(),
        }
    }

    fn is_empty(&self) -> bool {
        match self.order {
            PipelineOrder::OutputIsStretch => self.tdstretch.is_empty(),
            PipelineOrder::OutputIsTransposer => self.rate_transposer.is_empty(),
        }
    }

    fn receive_samples(&mut self, out: &mut [S], max_frames: usize) -> usize {
        self.output_buffer_mut().receive_samples(out, max_frames)
    }

    fn discard_samples(&mut self, max_frames: usize) -> usize {
        self.output_buffer_mut().discard_samples(max_frames)
    }

    fn clear(&mut self) {
        StreamProcessor::clear(self)
    }
}

fn check_ratio(name: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(StretchError::InvalidParameter(format!(
            "{} must be positive and finite, got {}",
            name, value
        )));
    }
    Ok(value)
}
