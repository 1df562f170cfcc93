use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};

use serde::{Deserialize, Serialize};

/// A PCM sample type the processing chain can operate on.
///
/// Every stage is generic over this trait. Filter and interpolation sums are
/// carried in the wider [`Sample::Accum`] type and narrowed once per output
/// sample.
pub trait Sample: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Accumulator used for convolution and fixed-point interpolation.
    type Accum: Copy
        + Default
        + PartialOrd
        + fmt::Debug
        + From<i32>
        + Add<Output = Self::Accum>
        + Sub<Output = Self::Accum>
        + Mul<Output = Self::Accum>
        + AddAssign;

    /// Silence.
    const ZERO: Self;

    /// Widens the sample into the accumulator domain.
    fn widen(self) -> Self::Accum;

    /// Narrows an accumulator by `2^shift`, saturating for integer formats.
    fn scale_down(acc: Self::Accum, shift: u32) -> Self;

    fn to_f64(self) -> f64;

    /// Converts from `f64`, rounding and saturating for integer formats.
    fn from_f64(value: f64) -> Self;
}

impl Sample for f32 {
    type Accum = f64;

    const ZERO: Self = 0.0;

    #[inline]
    fn widen(self) -> f64 {
        self as f64
    }

    #[inline]
    fn scale_down(acc: f64, shift: u32) -> f32 {
        (acc / (1u64 << shift) as f64) as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> f32 {
        value as f32
    }
}

impl Sample for i16 {
    type Accum = i64;

    const ZERO: Self = 0;

    #[inline]
    fn widen(self) -> i64 {
        self as i64
    }

    #[inline]
    fn scale_down(acc: i64, shift: u32) -> i16 {
        (acc >> shift).clamp(i16::MIN as i64, i16::MAX as i64) as i16
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> i16 {
        // `as` saturates at the type bounds and maps NaN to zero.
        value.round() as i16
    }
}

/// Interpolation kernel used by the rate transposer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationAlgorithm {
    /// Two-tap linear interpolation with a 16.16 fixed-point phase.
    LinearFixed,
    /// Two-tap linear interpolation with a floating-point phase.
    Linear,
    /// Four-tap cubic interpolation.
    #[default]
    Cubic,
    /// Eight-tap Kaiser-windowed sinc interpolation.
    Shannon,
}

impl fmt::Display for InterpolationAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterpolationAlgorithm::LinearFixed => "linear-fixed",
            InterpolationAlgorithm::Linear => "linear",
            InterpolationAlgorithm::Cubic => "cubic",
            InterpolationAlgorithm::Shannon => "shannon",
        };
        f.write_str(name)
    }
}

/// Integer identifiers accepted by
/// [`StreamProcessor::set_setting`](crate::StreamProcessor::set_setting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    /// Enable (1) or disable (0) the anti-alias filter.
    UseAaFilter,
    /// Anti-alias filter tap count, a multiple of 8.
    AaFilterLength,
    /// Enable (1) or disable (0) quick seek.
    UseQuickSeek,
    /// Sequence length in milliseconds, `<= 0` for automatic.
    SequenceMs,
    /// Seek window length in milliseconds, `<= 0` for automatic.
    SeekWindowMs,
    /// Overlap length in milliseconds.
    OverlapMs,
    /// Read-only: frames consumed from input per processing batch.
    NominalInputSequence,
    /// Read-only: frames produced per processing batch.
    NominalOutputSequence,
}

impl Setting {
    pub const ALL: [Setting; 8] = [
        Setting::UseAaFilter,
        Setting::AaFilterLength,
        Setting::UseQuickSeek,
        Setting::SequenceMs,
        Setting::SeekWindowMs,
        Setting::OverlapMs,
        Setting::NominalInputSequence,
        Setting::NominalOutputSequence,
    ];

    /// Stable integer id of this setting.
    pub fn id(self) -> i32 {
        match self {
            Setting::UseAaFilter => 0,
            Setting::AaFilterLength => 1,
            Setting::UseQuickSeek => 2,
            Setting::SequenceMs => 3,
            Setting::SeekWindowMs => 4,
            Setting::OverlapMs => 5,
            Setting::NominalInputSequence => 6,
            Setting::NominalOutputSequence => 7,
        }
    }

    /// Looks up a setting by id. Unknown ids yield `None`.
    pub fn from_id(id: i32) -> Option<Setting> {
        Setting::ALL.iter().copied().find(|s| s.id() == id)
    }

    /// Returns true for settings that can only be queried.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            Setting::NominalInputSequence | Setting::NominalOutputSequence
        )
    }
}
