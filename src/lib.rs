//! Packing detection by instrumented replay.
//!
//! Each candidate executable is staged into an ISO, executed and replayed in
//! an instrumented VM by external tools, and the reader's output is decoded
//! into memory self-write and per-region entropy signals. A sample that
//! writes into its own executable memory is reported as packed.

pub mod classify;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod replay;
pub mod report;
pub mod sample;
pub mod signals;
pub mod timeout;

pub use classify::{classify, Verdict};
pub use config::{PipelineConfig, SignalConfig};
pub use error::{PackReplayError, Result};
pub use pipeline::Pipeline;
pub use signals::{parse_blob, ParsedSignals};
