//! Processing stages: tempo stretching and rate transposition.

pub mod params;
pub mod rate_transposer;
pub mod tdstretch;

pub use params::{SequenceParams, StretchConfig};
pub use rate_transposer::RateTransposer;
pub use tdstretch::TdStretch;
