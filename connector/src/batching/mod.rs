//! Per-table batching of the records read from the input stream.
//!
//! Records are buffered per Data Source and posted to its webhook when a size or count ceiling
//! would be crossed, when a checkpoint arrives and once more when the input ends.

mod buffer;
mod pipeline;

pub use buffer::BatchBuffer;
pub use pipeline::BatchingPipeline;
