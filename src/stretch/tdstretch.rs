//! Overlap-add tempo stretching in the time domain.
//!
//! Input is cut into sequences of `seek_window_length` frames. Each sequence
//! is spliced onto the output at the offset (within `seek_length` frames) whose
//! leading `overlap_length` frames best match the tail of the previous
//! sequence, cross-fading over that overlap. The input read position then
//! advances by `tempo * (seek_window_length - overlap_length)` frames, while
//! every sequence contributes exactly `seek_window_length - overlap_length`
//! output frames.

use log::debug;

use crate::core::sample_buffer::{SampleBuffer, SamplePipe};
use crate::core::types::Sample;
use crate::error::{Result, StretchError};
use crate::stretch::params::{
    overlap_frames, SequenceParams, DEFAULT_OVERLAP_MS, DEFAULT_SAMPLE_RATE,
};

/// Candidate energies below this are treated as unit energy.
const NORM_EPSILON: f64 = 1e-9;

/// Quick seek: coarse stride and refinement half-width, in frames.
const SCAN_STEP: usize = 16;
const SCAN_WIND: usize = 8;

/// Bounds on the input advance per sequence, in frames.
const MIN_NOMINAL_SKIP: f64 = 1.0;
const MAX_NOMINAL_SKIP: f64 = u32::MAX as f64;

/// Tempo changer working directly on waveform sequences.
#[derive(Debug, Clone)]
pub struct TdStretch<S: Sample> {
    channels: usize,
    sample_rate: u32,
    tempo: f64,
    sequence_ms: Option<u32>,
    seek_window_ms: Option<u32>,
    overlap_ms: u32,
    quick_seek: bool,
    params: SequenceParams,
    skip_fract: f64,
    /// Tail of the previous sequence, `overlap_length` frames.
    mid_buffer: Vec<S>,
    input: SampleBuffer<S>,
    output: SampleBuffer<S>,
}

impl<S: Sample> Default for TdStretch<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Sample> TdStretch<S> {
    /// Creates a mono stretcher at 44.1 kHz, unit tempo, automatic sequence
    /// and seek window, 8 ms overlap and full seek.
    pub fn new() -> Self {
        let overlap_length = overlap_frames(DEFAULT_SAMPLE_RATE, DEFAULT_OVERLAP_MS);
        Self {
            channels: 1,
            sample_rate: DEFAULT_SAMPLE_RATE,
            tempo: 1.0,
            sequence_ms: None,
            seek_window_ms: None,
            overlap_ms: DEFAULT_OVERLAP_MS,
            quick_seek: false,
            params: SequenceParams::derive(DEFAULT_SAMPLE_RATE, None, None, overlap_length, 1.0),
            skip_fract: 0.0,
            mid_buffer: vec![S::ZERO; overlap_length],
            input: SampleBuffer::new(1),
            output: SampleBuffer::new(1),
        }
    }

    /// Sets the sample rate and sequence timing.
    ///
    /// `None` (or `Some(0)`) for `sequence_ms` or `seek_window_ms` selects the
    /// tempo-dependent automatic length. An `overlap_ms` of zero keeps the
    /// current overlap.
    pub fn set_parameters(
        &mut self,
        sample_rate: u32,
        sequence_ms: Option<u32>,
        seek_window_ms: Option<u32>,
        overlap_ms: u32,
    ) -> Result<()> {
        if sample_rate == 0 {
            return Err(StretchError::InvalidParameter(
                "sample rate must be positive".into(),
            ));
        }
        let sequence_ms = sequence_ms.filter(|&ms| ms > 0);
        let seek_window_ms = seek_window_ms.filter(|&ms| ms > 0);
        let overlap_ms = if overlap_ms > 0 { overlap_ms } else { self.overlap_ms };
        let overlap_length = overlap_frames(sample_rate, overlap_ms);
        let params = checked_params(
            sample_rate,
            sequence_ms,
            seek_window_ms,
            overlap_length,
            self.tempo,
        )?;

        self.sample_rate = sample_rate;
        self.sequence_ms = sequence_ms;
        self.seek_window_ms = seek_window_ms;
        self.overlap_ms = overlap_ms;
        self.accept_overlap_length(overlap_length);
        self.apply_params(params);
        Ok(())
    }

    /// Returns `(sample_rate, sequence_ms, seek_window_ms, overlap_ms)`, with
    /// automatic lengths reported as `None`.
    pub fn parameters(&self) -> (u32, Option<u32>, Option<u32>, u32) {
        (
            self.sample_rate,
            self.sequence_ms,
            self.seek_window_ms,
            self.overlap_ms,
        )
    }

    /// Derived frame counts for the current settings and tempo.
    pub fn sequence_params(&self) -> &SequenceParams {
        &self.params
    }

    /// Sets the tempo: 1.0 is unchanged, above 1.0 plays faster.
    ///
    /// # Errors
    /// [`StretchError::InvalidParameter`] for a tempo that is not positive and
    /// finite, or that would advance the input by less than one frame (or
    /// more than `u32::MAX` frames) per sequence. The stretcher is unchanged
    /// on error.
    pub fn set_tempo(&mut self, tempo: f64) -> Result<()> {
        let params = self.params_for_tempo(tempo)?;
        self.tempo = tempo;
        self.apply_params(params);
        Ok(())
    }

    fn params_for_tempo(&self, tempo: f64) -> Result<SequenceParams> {
        if !tempo.is_finite() || tempo <= 0.0 {
            return Err(StretchError::InvalidParameter(format!(
                "tempo must be positive and finite, got {}",
                tempo
            )));
        }
        checked_params(
            self.sample_rate,
            self.sequence_ms,
            self.seek_window_ms,
            self.params.overlap_length,
            tempo,
        )
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Changes the channel count. Buffered audio is dropped.
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
        self.output.set_channels(channels)?;
        self.input.clear();
        self.output.clear();
        self.mid_buffer = vec![S::ZERO; self.params.overlap_length * channels];
        self.skip_fract = 0.0;
        Ok(())
    }

    pub fn enable_quick_seek(&mut self, enabled: bool) {
        self.quick_seek = enabled;
    }

    pub fn is_quick_seek_enabled(&self) -> bool {
        self.quick_seek
    }

    /// Nominal input frames consumed per processed sequence.
    pub fn input_sample_req(&self) -> usize {
        self.params.input_batch_size()
    }

    /// Output frames produced per processed sequence.
    pub fn output_batch_size(&self) -> usize {
        self.params.output_batch_size()
    }

    /// Frames waiting in the input buffer.
    pub fn num_unprocessed_samples(&self) -> usize {
        self.input.num_samples()
    }

    pub fn input_buffer(&self) -> &SampleBuffer<S> {
        &self.input
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

    /// Appends interleaved frames and processes every complete sequence.
    pub fn put_samples(&mut self, samples: &[S]) -> Result<()> {
        self.input.put_samples(samples)?;
        self.process_samples()
    }

    /// Processes every complete sequence waiting in the input buffer.
    pub fn process_samples(&mut self) -> Result<()> {
        let ch = self.channels;
        let ovl = self.params.overlap_length;
        let seq_body = self.params.seek_window_length - 2 * ovl;

        while self.input.num_samples() >= self.params.sample_req {
            let offset = self.seek_best_overlap_position(self.input.frames());

            {
                let candidate = &self.input.frames()[offset * ch..(offset + ovl) * ch];
                let out = self.output.reserve_tail(ovl)?;
                overlap(out, candidate, &self.mid_buffer, ovl, ch);
            }
            self.output.commit(ovl)?;

            // sample_req always covers offset + seek_window_length
            if self.input.num_samples() < offset + seq_body + 2 * ovl {
                break;
            }

            let body_start = (offset + ovl) * ch;
            self.output
                .put_samples(&self.input.frames()[body_start..body_start + seq_body * ch])?;

            let mid_start = (offset + ovl + seq_body) * ch;
            self.mid_buffer[..ovl * ch]
                .copy_from_slice(&self.input.frames()[mid_start..mid_start + ovl * ch]);

            self.skip_fract += self.params.nominal_skip;
            let skip = self.skip_fract.floor();
            self.skip_fract -= skip;
            self.input.discard_samples(skip as usize);
        }
        Ok(())
    }

    /// Drops all buffered input and output and zeroes the overlap tail.
    pub fn clear(&mut self) {
        self.output.clear();
        self.clear_input();
    }

    /// Drops buffered input and zeroes the overlap tail. Output is kept.
    pub fn clear_input(&mut self) {
        self.input.clear();
        self.mid_buffer.iter_mut().for_each(|s| *s = S::ZERO);
        self.skip_fract = 0.0;
    }

    fn accept_overlap_length(&mut self, overlap_length: usize) {
        let needed = overlap_length * self.channels;
        if needed > self.mid_buffer.len() {
            self.mid_buffer = vec![S::ZERO; needed];
        }
    }

    fn apply_params(&mut self, params: SequenceParams) {
        self.params = params;
        debug!(
            "tdstretch: tempo {:.4}, sequence {} ms / {} frames, seek {} ms / {} frames, overlap {} frames, skip {:.2}",
            self.tempo,
            self.params.sequence_ms,
            self.params.seek_window_length,
            self.params.seek_window_ms,
            self.params.seek_length,
            self.params.overlap_length,
            self.params.nominal_skip
        );
    }

    fn seek_best_overlap_position(&self, ref_pos: &[S]) -> usize {
        let mid = &self.mid_buffer[..self.params.overlap_length * self.channels];
        let seek_length = self.params.seek_length;
        if self.quick_seek && seek_length > SCAN_STEP + SCAN_WIND + 1 {
            seek_quick(ref_pos, mid, self.channels, seek_length)
        } else {
            seek_full(ref_pos, mid, self.channels, seek_length)
        }
    }
}

impl<S: Sample> SamplePipe<S> for TdStretch<S> {
    fn channels(&self) -> usize {
        self.channels
    }

    fn num_samples(&self) -> usize {
        self.output.num_samples()
    }

    fn receive_samples(&mut self, out: &mut [S], max_frames: usize) -> usize {
        self.output.receive_samples(out, max_frames)
    }

    fn discard_samples(&mut self, max_frames: usize) -> usize {
        self.output.discard_samples(max_frames)
    }

    fn clear(&mut self) {
        TdStretch::clear(self)
    }
}

/// Derives the sequence frame counts, rejecting settings whose input
/// advance per sequence is below one frame or beyond `u32::MAX` frames.
fn checked_params(
    sample_rate: u32,
    sequence_ms: Option<u32>,
    seek_window_ms: Option<u32>,
    overlap_length: usize,
    tempo: f64,
) -> Result<SequenceParams> {
    let params = SequenceParams::derive(
        sample_rate,
        sequence_ms,
        seek_window_ms,
        overlap_length,
        tempo,
    );
    if !(MIN_NOMINAL_SKIP..=MAX_NOMINAL_SKIP).contains(&params.nominal_skip) {
        return Err(StretchError::InvalidParameter(format!(
            "tempo {} advances {:.3e} input frames per sequence",
            tempo, params.nominal_skip
        )));
    }
    Ok(params)
}

/// Linear cross-fade from `mid` (fading out) into `input` (fading in) over
/// `ovl` frames.
fn overlap<S: Sample>(out: &mut [S], input: &[S], mid: &[S], ovl: usize, channels: usize) {
    let len = ovl as f64;
    for i in 0..ovl {
        let fade_in = i as f64;
        let fade_out = (ovl - i) as f64;
        for c in 0..channels {
            let k = i * channels + c;
            let v = (input[k].to_f64() * fade_in + mid[k].to_f64() * fade_out) / len;
            out[k] = S::from_f64(v);
        }
    }
}

#[inline]
fn energy<S: Sample>(frame: &[S]) -> f64 {
    frame.iter().map(|s| s.to_f64() * s.to_f64()).sum()
}

#[inline]
fn dot<S: Sample>(a: &[S], b: &[S]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x.to_f64() * y.to_f64()).sum()
}

/// Correlation of the candidate with the reference tail, normalized by the
/// candidate's energy only.
#[inline]
fn normalized(corr: f64, norm: f64) -> f64 {
    let norm = if norm < NORM_EPSILON { 1.0 } else { norm };
    corr / norm.sqrt()
}

fn cross_corr<S: Sample>(candidate: &[S], mid: &[S]) -> f64 {
    normalized(dot(candidate, mid), energy(candidate))
}

/// Evaluates every offset in `[0, seek_length)`, keeping the candidate energy
/// as a running sum. The first maximum wins.
fn seek_full<S: Sample>(ref_pos: &[S], mid: &[S], channels: usize, seek_length: usize) -> usize {
    let len = mid.len();
    let mut norm = energy(&ref_pos[..len]);
    let mut best_corr = normalized(dot(&ref_pos[..len], mid), norm);
    let mut best_offs = 0;

    for i in 1..seek_length {
        let start = i * channels;
        norm -= energy(&ref_pos[start - channels..start]);
        norm += energy(&ref_pos[start + len - channels..start + len]);
        norm = norm.max(0.0);

        let corr = normalized(dot(&ref_pos[start..start + len], mid), norm);
        if corr > best_corr {
            best_corr = corr;
            best_offs = i;
        }
    }
    best_offs
}

/// Coarse scan every `SCAN_STEP` frames, then a full scan of `SCAN_WIND`
/// frames either side of the best and second-best coarse hits. Among equal
/// scores the lowest evaluated offset wins.
fn seek_quick<S: Sample>(ref_pos: &[S], mid: &[S], channels: usize, seek_length: usize) -> usize {
    let len = mid.len();
    let corr_at = |i: usize| cross_corr(&ref_pos[i * channels..i * channels + len], mid);

    let mut best_corr = f64::NEG_INFINITY;
    let mut best_offs = SCAN_WIND;
    let mut second_corr = f64::NEG_INFINITY;
    let mut second_offs = SCAN_WIND;

    let mut i = SCAN_STEP;
    while i < seek_length - SCAN_WIND - 1 {
        let corr = corr_at(i);
        if corr > best_corr {
            second_corr = best_corr;
            second_offs = best_offs;
            best_corr = corr;
            best_offs = i;
        } else if corr > second_corr {
            second_corr = corr;
            second_offs = i;
        }
        i += SCAN_STEP;
    }

    for centre in [best_offs, second_offs] {
        let end = (centre + SCAN_WIND + 1).min(seek_length);
        for i in centre - SCAN_WIND..end {
            if i == centre {
                continue;
            }
            let corr = corr_at(i);
            if corr > best_corr || (corr == best_corr && i < best_offs) {
                best_corr = corr;
                best_offs = i;
            }
        }
    }
    best_offs
}
