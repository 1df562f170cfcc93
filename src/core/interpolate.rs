//! Fractional-step interpolation kernels for rate transposition.
//!
//! Every kernel walks the source with a phase accumulator `fract` in `[0, 1)`
//! (or `[0, SCALE)` for the fixed-point kernel), emitting one output frame
//! per step and advancing by `rate` source frames. The phase carries across
//! calls, so a stream split into arbitrary blocks produces the same output
//! as the unsplit stream. Changing the rate changes the step only.

use crate::core::sample_buffer::SampleBuffer;
use crate::core::types::{InterpolationAlgorithm, Sample};
use crate::error::Result;

/// Fixed-point phase scale of [`LinearFixed`] (16.16).
const LINEAR_FIXED_SHIFT: u32 = 16;
const LINEAR_FIXED_SCALE: i64 = 1 << LINEAR_FIXED_SHIFT;

/// Cubic weights, one row of four polynomial coefficients (for `f^3`, `f^2`,
/// `f`, 1) per source tap.
const CUBIC_COEFFS: [f64; 16] = [
    -0.5, 1.0, -0.5, 0.0, //
    1.5, -2.5, 0.0, 1.0, //
    -1.5, 2.0, 0.5, 0.0, //
    0.5, -0.5, 0.0, 0.0,
];

/// Kaiser window applied to the eight sinc taps.
const KAISER8: [f64; 8] = [
    0.41778693317814,
    0.64888025049173,
    0.83508562409944,
    0.93887857733412,
    0.93887857733412,
    0.83508562409944,
    0.64888025049173,
    0.41778693317814,
];

const SINC_PI: f64 = 3.1415926536;

#[inline]
fn sinc(x: f64) -> f64 {
    let t = SINC_PI * x;
    t.sin() / t
}

/// Advances a floating-point phase by `rate`, returning the whole frames stepped.
#[inline]
fn split_step(fract: &mut f64, rate: f64) -> usize {
    *fract += rate;
    let whole = fract.floor();
    *fract -= whole;
    whole as usize
}

/// Two-tap linear interpolation with an integer phase accumulator.
#[derive(Debug, Clone)]
pub struct LinearFixed {
    rate: f64,
    i_rate: i64,
    i_fract: i64,
}

impl Default for LinearFixed {
    fn default() -> Self {
        Self {
            rate: 1.0,
            i_rate: LINEAR_FIXED_SCALE,
            i_fract: 0,
        }
    }
}

impl LinearFixed {
    /// Source frames read beyond the current position.
    pub const LOOKAHEAD: usize = 1;

    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
        self.i_rate = (rate * LINEAR_FIXED_SCALE as f64 + 0.5) as i64;
    }

    pub fn reset(&mut self) {
        self.i_fract = 0;
    }

    pub fn transpose<S: Sample>(&mut self, dest: &mut [S], src: &[S], channels: usize) -> (usize, usize) {
        let src_frames = src.len() / channels;
        let dest_frames = dest.len() / channels;
        let mut produced = 0;
        let mut pos = 0;
        while pos + Self::LOOKAHEAD < src_frames && produced < dest_frames {
            let vol0 = S::Accum::from((LINEAR_FIXED_SCALE - self.i_fract) as i32);
            let vol1 = S::Accum::from(self.i_fract as i32);
            let a = &src[pos * channels..(pos + 1) * channels];
            let b = &src[(pos + 1) * channels..(pos + 2) * channels];
            let out = &mut dest[produced * channels..(produced + 1) * channels];
            for c in 0..channels {
                let acc = vol0 * a[c].widen() + vol1 * b[c].widen();
                out[c] = S::scale_down(acc, LINEAR_FIXED_SHIFT);
            }
            produced += 1;
            self.i_fract += self.i_rate;
            let whole = self.i_fract >> LINEAR_FIXED_SHIFT;
            self.i_fract -= whole << LINEAR_FIXED_SHIFT;
            pos += whole as usize;
        }
        (produced, pos)
    }
}

/// Two-tap linear interpolation with a floating-point phase.
#[derive(Debug, Clone)]
pub struct LinearFloat {
    rate: f64,
    fract: f64,
}

impl Default for LinearFloat {
    fn default() -> Self {
        Self { rate: 1.0, fract: 0.0 }
    }
}

impl LinearFloat {
    pub const LOOKAHEAD: usize = 1;

    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    pub fn reset(&mut self) {
        self.fract = 0.0;
    }

    pub fn transpose<S: Sample>(&mut self, dest: &mut [S], src: &[S], channels: usize) -> (usize, usize) {
        let src_frames = src.len() / channels;
        let dest_frames = dest.len() / channels;
        let mut produced = 0;
        let mut pos = 0;
        while pos + Self::LOOKAHEAD < src_frames && produced < dest_frames {
            let f = self.fract;
            for c in 0..channels {
                let s0 = src[pos * channels + c].to_f64();
                let s1 = src[(pos + 1) * channels + c].to_f64();
                dest[produced * channels + c] = S::from_f64((1.0 - f) * s0 + f * s1);
            }
            produced += 1;
            pos += split_step(&mut self.fract, self.rate);
        }
        (produced, pos)
    }
}

/// Four-tap cubic interpolation. Output at phase `f` lies between source
/// taps 1 and 2 of the window.
#[derive(Debug, Clone)]
pub struct Cubic {
    rate: f64,
    fract: f64,
}

impl Default for Cubic {
    fn default() -> Self {
        Self { rate: 1.0, fract: 0.0 }
    }
}

impl Cubic {
    pub const LOOKAHEAD: usize = 4;

    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    pub fn reset(&mut self) {
        self.fract = 0.0;
    }

    #[inline]
    fn weights(f: f64) -> [f64; 4] {
        let powers = [f * f * f, f * f, f, 1.0];
        let mut y = [0.0; 4];
        for (k, row) in CUBIC_COEFFS.chunks_exact(4).enumerate() {
            y[k] = row.iter().zip(powers.iter()).map(|(c, x)| c * x).sum();
        }
        y
    }

    pub fn transpose<S: Sample>(&mut self, dest: &mut [S], src: &[S], channels: usize) -> (usize, usize) {
        let src_frames = src.len() / channels;
        let dest_frames = dest.len() / channels;
        let mut produced = 0;
        let mut pos = 0;
        while pos + Self::LOOKAHEAD < src_frames && produced < dest_frames {
            let y = Self::weights(self.fract);
            for c in 0..channels {
                let out: f64 = (0..4)
                    .map(|k| y[k] * src[(pos + k) * channels + c].to_f64())
                    .sum();
                dest[produced * channels + c] = S::from_f64(out);
            }
            produced += 1;
            pos += split_step(&mut self.fract, self.rate);
        }
        (produced, pos)
    }
}

/// Eight-tap Kaiser-windowed sinc interpolation. Output at phase `f` lies
/// between source taps 3 and 4 of the window.
#[derive(Debug, Clone)]
pub struct Shannon {
    rate: f64,
    fract: f64,
}

impl Default for Shannon {
    fn default() -> Self {
        Self { rate: 1.0, fract: 0.0 }
    }
}

impl Shannon {
    pub const LOOKAHEAD: usize = 8;

    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    pub fn reset(&mut self) {
        self.fract = 0.0;
    }

    #[inline]
    fn weights(f: f64) -> [f64; 8] {
        let mut w = [0.0; 8];
        for (k, (wk, kaiser)) in w.iter_mut().zip(KAISER8.iter()).enumerate() {
            let x = k as f64 - 3.0 - f;
            // the centre tap hits sinc(0) when the phase is on a source frame
            let s = if k == 3 && f < 1e-6 { 1.0 } else { sinc(x) };
            *wk = s * kaiser;
        }
        w
    }

    pub fn transpose<S: Sample>(&mut self, dest: &mut [S], src: &[S], channels: usize) -> (usize, usize) {
        let src_frames = src.len() / channels;
        let dest_frames = dest.len() / channels;
        let mut produced = 0;
        let mut pos = 0;
        while pos + Self::LOOKAHEAD < src_frames && produced < dest_frames {
            let w = Self::weights(self.fract);
            for c in 0..channels {
                let out: f64 = (0..8)
                    .map(|k| w[k] * src[(pos + k) * channels + c].to_f64())
                    .sum();
                dest[produced * channels + c] = S::from_f64(out);
            }
            produced += 1;
            pos += split_step(&mut self.fract, self.rate);
        }
        (produced, pos)
    }
}

/// Interpolation kernel selected at construction time.
#[derive(Debug, Clone)]
pub enum Interpolator {
    LinearFixed(LinearFixed),
    Linear(LinearFloat),
    Cubic(Cubic),
    Shannon(Shannon),
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::new(InterpolationAlgorithm::default())
    }
}

impl Interpolator {
    pub fn new(algorithm: InterpolationAlgorithm) -> Self {
        match algorithm {
            InterpolationAlgorithm::LinearFixed => Self::LinearFixed(LinearFixed::default()),
            InterpolationAlgorithm::Linear => Self::Linear(LinearFloat::default()),
            InterpolationAlgorithm::Cubic => Self::Cubic(Cubic::default()),
            InterpolationAlgorithm::Shannon => Self::Shannon(Shannon::default()),
        }
    }

    pub fn algorithm(&self) -> InterpolationAlgorithm {
        match self {
            Self::LinearFixed(_) => InterpolationAlgorithm::LinearFixed,
            Self::Linear(_) => InterpolationAlgorithm::Linear,
            Self::Cubic(_) => InterpolationAlgorithm::Cubic,
            Self::Shannon(_) => InterpolationAlgorithm::Shannon,
        }
    }

    /// Source frames read past the current position for each output frame.
    pub fn lookahead(&self) -> usize {
        match self {
            Self::LinearFixed(_) => LinearFixed::LOOKAHEAD,
            Self::Linear(_) => LinearFloat::LOOKAHEAD,
            Self::Cubic(_) => Cubic::LOOKAHEAD,
            Self::Shannon(_) => Shannon::LOOKAHEAD,
        }
    }

    pub fn rate(&self) -> f64 {
        match self {
            Self::LinearFixed(k) => k.rate,
            Self::Linear(k) => k.rate,
            Self::Cubic(k) => k.rate,
            Self::Shannon(k) => k.rate,
        }
    }

    /// Sets the step in source frames per output frame. The phase is kept.
    pub fn set_rate(&mut self, rate: f64) {
        match self {
            Self::LinearFixed(k) => k.set_rate(rate),
            Self::Linear(k) => k.set_rate(rate),
            Self::Cubic(k) => k.set_rate(rate),
            Self::Shannon(k) => k.set_rate(rate),
        }
    }

    /// Zeroes the phase accumulator.
    pub fn reset(&mut self) {
        match self {
            Self::LinearFixed(k) => k.reset(),
            Self::Linear(k) => k.reset(),
            Self::Cubic(k) => k.reset(),
            Self::Shannon(k) => k.reset(),
        }
    }

    /// Interpolates interleaved frames from `src` into `dest`.
    ///
    /// Returns `(produced, consumed)` in frames. At rates up to 1 `consumed`
    /// is at most the source frame count minus one. Unconsumed frames must be
    /// presented again, at the front of `src`, on the next call.
    pub fn transpose<S: Sample>(&mut self, dest: &mut [S], src: &[S], channels: usize) -> (usize, usize) {
        if channels == 0 {
            return (0, 0);
        }
        match self {
            Self::LinearFixed(k) => k.transpose(dest, src, channels),
            Self::Linear(k) => k.transpose(dest, src, channels),
            Self::Cubic(k) => k.transpose(dest, src, channels),
            Self::Shannon(k) => k.transpose(dest, src, channels),
        }
    }

    /// Transposes everything `src` holds into `dest`, removing the consumed
    /// frames from `src`.
    pub fn transpose_buffers<S: Sample>(
        &mut self,
        dest: &mut SampleBuffer<S>,
        src: &mut SampleBuffer<S>,
    ) -> Result<usize> {
        let num_src = src.num_samples();
        if num_src == 0 {
            return Ok(0);
        }
        let channels = src.channels();
        let size_demand = (num_src as f64 / self.rate()) as usize + 8;
        let tail = dest.reserve_tail(size_demand)?;
        let (produced, consumed) = self.transpose(tail, src.frames(), channels);
        src.discard_samples(consumed);
        dest.commit(produced)?;
        Ok(produced)
    }
}
