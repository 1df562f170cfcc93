//! FIR convolution and the anti-alias low-pass designer.

use std::f64::consts::PI;

use crate::core::sample_buffer::SampleBuffer;
use crate::core::types::Sample;
use crate::core::window::{hamming_centered, lowpass_sinc};
use crate::error::{Result, StretchError};

/// Coefficients are designed at this fixed-point scale (`2^14`).
const AA_COEFF_SHIFT: u32 = 14;
const AA_COEFF_SCALE: f64 = (1u32 << AA_COEFF_SHIFT) as f64;

/// Default tap count of the anti-alias filter.
pub const DEFAULT_AA_LENGTH: usize = 64;

/// Returns an error unless `length` is a non-zero multiple of 8.
pub fn validate_filter_length(length: usize) -> Result<()> {
    if length == 0 || length % 8 != 0 {
        return Err(StretchError::InvalidFilterLength(length));
    }
    Ok(())
}

/// Stateless FIR convolution over interleaved frames.
///
/// Each output sample is `sum(src[j + i] * coeff[i]) / 2^shift`, with the
/// narrowing saturating for integer sample types.
#[derive(Debug, Clone)]
pub struct FirFilter<S: Sample> {
    coeffs: Vec<S>,
    wide: Vec<S::Accum>,
    result_shift: u32,
}

impl<S: Sample> Default for FirFilter<S> {
    fn default() -> Self {
        Self {
            coeffs: Vec::new(),
            wide: Vec::new(),
            result_shift: 0,
        }
    }
}

impl<S: Sample> FirFilter<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a new kernel.
    ///
    /// # Errors
    /// [`StretchError::InvalidFilterLength`] if `coeffs.len()` is zero or not a
    /// multiple of 8. The previous kernel stays active.
    pub fn set_coefficients(&mut self, coeffs: &[S], result_shift: u32) -> Result<()> {
        validate_filter_length(coeffs.len())?;
        self.install(coeffs.to_vec(), result_shift);
        Ok(())
    }

    /// Installs a kernel whose length the caller has already validated.
    fn install(&mut self, coeffs: Vec<S>, result_shift: u32) {
        self.wide = coeffs.iter().map(|c| c.widen()).collect();
        self.coeffs = coeffs;
        self.result_shift = result_shift;
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.coeffs.len()
    }

    pub fn coefficients(&self) -> &[S] {
        &self.coeffs
    }

    /// Filters `num_frames` frames of `src` into `dest`.
    ///
    /// Returns the number of frames written, `num_frames - length()`, or zero
    /// when fewer than `length()` frames are supplied.
    pub fn evaluate(&self, dest: &mut [S], src: &[S], num_frames: usize, channels: usize) -> usize {
        let len = self.length();
        if len == 0 || channels == 0 || num_frames < len {
            return 0;
        }
        let end = num_frames - len;
        let src = &src[..num_frames * channels];
        let dest = &mut dest[..end * channels];
        match channels {
            1 => self.evaluate_mono(dest, src, end),
            2 => self.evaluate_stereo(dest, src, end),
            _ => self.evaluate_multi(dest, src, end, channels),
        }
        end
    }

    fn evaluate_mono(&self, dest: &mut [S], src: &[S], end: usize) {
        let len = self.length();
        for (j, out) in dest.iter_mut().enumerate().take(end) {
            let window = &src[j..j + len];
            let mut sum = S::Accum::default();
            for (s, c) in window.chunks_exact(4).zip(self.wide.chunks_exact(4)) {
                sum += s[0].widen() * c[0]
                    + s[1].widen() * c[1]
                    + s[2].widen() * c[2]
                    + s[3].widen() * c[3];
            }
            *out = S::scale_down(sum, self.result_shift);
        }
    }

    fn evaluate_stereo(&self, dest: &mut [S], src: &[S], end: usize) {
        let len = self.length();
        for j in 0..end {
            let window = &src[2 * j..2 * (j + len)];
            let mut left = S::Accum::default();
            let mut right = S::Accum::default();
            for (s, c) in window.chunks_exact(8).zip(self.wide.chunks_exact(4)) {
                left += s[0].widen() * c[0]
                    + s[2].widen() * c[1]
                    + s[4].widen() * c[2]
                    + s[6].widen() * c[3];
                right += s[1].widen() * c[0]
                    + s[3].widen() * c[1]
                    + s[5].widen() * c[2]
                    + s[7].widen() * c[3];
            }
            dest[2 * j] = S::scale_down(left, self.result_shift);
            dest[2 * j + 1] = S::scale_down(right, self.result_shift);
        }
    }

    fn evaluate_multi(&self, dest: &mut [S], src: &[S], end: usize, channels: usize) {
        let mut sums = vec![S::Accum::default(); channels];
        for j in 0..end {
            sums.iter_mut().for_each(|s| *s = S::Accum::default());
            for (i, &c) in self.wide.iter().enumerate() {
                let frame = &src[(j + i) * channels..(j + i + 1) * channels];
                for (sum, &s) in sums.iter_mut().zip(frame) {
                    *sum += s.widen() * c;
                }
            }
            let out = &mut dest[j * channels..(j + 1) * channels];
            for (o, &sum) in out.iter_mut().zip(&sums) {
                *o = S::scale_down(sum, self.result_shift);
            }
        }
    }
}

/// Windowed-sinc low-pass filter whose kernel is redesigned whenever the
/// cutoff or tap count changes.
#[derive(Debug, Clone)]
pub struct AaFilter<S: Sample> {
    fir: FirFilter<S>,
    cutoff: f64,
    length: usize,
}

impl<S: Sample> Default for AaFilter<S> {
    fn default() -> Self {
        Self::designed(DEFAULT_AA_LENGTH)
    }
}

impl<S: Sample> AaFilter<S> {
    /// Creates a filter of `length` taps at the half-band cutoff.
    pub fn new(length: usize) -> Result<Self> {
        validate_filter_length(length)?;
        Ok(Self::designed(length))
    }

    fn designed(length: usize) -> Self {
        let mut filter = Self {
            fir: FirFilter::new(),
            cutoff: 0.5,
            length,
        };
        filter.calculate_coeffs();
        filter
    }

    /// Sets the cutoff as a fraction of the sample rate, in `[0, 0.5]`.
    pub fn set_cutoff_freq(&mut self, cutoff: f64) -> Result<()> {
        if !cutoff.is_finite() {
            return Err(StretchError::InvalidParameter(format!(
                "anti-alias cutoff must be finite, got {}",
                cutoff
            )));
        }
        self.cutoff = cutoff.clamp(0.0, 0.5);
        self.calculate_coeffs();
        Ok(())
    }

    /// Changes the tap count and redesigns the kernel.
    ///
    /// # Errors
    /// [`StretchError::InvalidFilterLength`] unless `length` is a non-zero
    /// multiple of 8; the filter is unchanged on error.
    pub fn set_length(&mut self, length: usize) -> Result<()> {
        validate_filter_length(length)?;
        self.length = length;
        self.calculate_coeffs();
        Ok(())
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn coefficients(&self) -> &[S] {
        self.fir.coefficients()
    }

    pub fn evaluate(&self, dest: &mut [S], src: &[S], num_frames: usize, channels: usize) -> usize {
        self.fir.evaluate(dest, src, num_frames, channels)
    }

    /// Filters every frame `src` holds into `dest`, removing exactly the
    /// consumed frames from `src`.
    ///
    /// The last `length()` frames stay in `src` until more input arrives.
    pub fn evaluate_buffers(
        &self,
        dest: &mut SampleBuffer<S>,
        src: &mut SampleBuffer<S>,
    ) -> Result<usize> {
        let channels = src.channels();
        let num = src.num_samples();
        let tail = dest.reserve_tail(num)?;
        let produced = self.fir.evaluate(tail, src.frames(), num, channels);
        src.discard_samples(produced);
        dest.commit(produced)?;
        Ok(produced)
    }

    fn calculate_coeffs(&mut self) {
        let wc = 2.0 * PI * self.cutoff;
        let shaped: Vec<f64> = lowpass_sinc(self.length, wc)
            .into_iter()
            .zip(hamming_centered(self.length))
            .map(|(h, w)| h * w)
            .collect();
        let sum: f64 = shaped.iter().sum();
        let scale = AA_COEFF_SCALE / sum;

        let coeffs: Vec<S> = shaped
            .iter()
            .map(|&v| {
                let scaled = v * scale;
                S::from_f64((scaled + 0.5f64.copysign(scaled)).trunc())
            })
            .collect();
        self.fir.install(coeffs, AA_COEFF_SHIFT);
    }
}
