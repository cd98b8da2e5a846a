//! Result aggregation and reporting.

pub mod artifacts;
pub mod batch;
pub mod console;

pub use artifacts::ArtifactWriter;
pub use batch::{
    BatchReport, BatchResult, BatchSummary, InconclusiveReason, InconclusiveSample, SampleRecord,
};
pub use console::Console;
