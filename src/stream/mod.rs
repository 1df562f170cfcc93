//! The streaming processor combining both stages.

pub mod processor;

pub use processor::{PipelineOrder, StreamProcessor};
