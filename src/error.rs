//! Error types for the voxstretch crate.

use thiserror::Error;

/// Errors raised by the processing stages and the stream processor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StretchError {
    /// Sample rate or channel count has not been set.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// FIR coefficient count is zero or not a multiple of 8.
    #[error("invalid filter length {0}: must be a non-zero multiple of 8")]
    InvalidFilterLength(usize),
    /// Growing a sample buffer failed.
    #[error("failed to allocate buffer for {requested} samples")]
    AllocationFailure { requested: usize },
    /// A rate, tempo, pitch, channel count or sample rate is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StretchError>;
