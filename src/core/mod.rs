//! Sample types, buffering, filtering and interpolation primitives.

pub mod fir;
pub mod interpolate;
pub mod sample_buffer;
pub mod types;
pub mod window;

pub use fir::{AaFilter, FirFilter};
pub use interpolate::Interpolator;
pub use sample_buffer::{SampleBuffer, SamplePipe};
pub use types::*;
