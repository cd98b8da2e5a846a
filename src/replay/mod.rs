//! Replay orchestrator: the bounded retry loop around one sample's replay.
//!
//! Each attempt stages the sample, runs the emulator, waits for the replay
//! artifacts to settle, runs the reader and fetches its result. A sentinel
//! result is retried; any other text ends the loop. A tool that exits non-zero
//! aborts the batch through
//! [`crate::error::PackReplayError::FatalTool`].

pub mod tools;

pub use tools::{ProcessTools, ReplayTools, ToolOutput, EMULATOR_STAGE, READER_STAGE};

use crate::config::RetryConfig;
use crate::error::Result;
use crate::report::artifacts::ArtifactWriter;
use crate::report::console::Console;
use crate::sample::Sample;
use crate::signals::ReplayBlob;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Result of driving one sample through the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// The reader produced a non-sentinel blob on attempt `attempts`.
    Blob { text: String, attempts: u32 },
    /// Every attempt returned the sentinel.
    Exhausted { attempts: u32 },
}

impl ReplayOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            ReplayOutcome::Blob { attempts, .. } | ReplayOutcome::Exhausted { attempts } => {
                *attempts
            }
        }
    }
}

/// Drives [`ReplayTools`] through up to `max_tries` replay cycles per sample.
pub struct ReplayOrchestrator<T: ReplayTools> {
    tools: T,
    retry: RetryConfig,
    debug_writer: Option<ArtifactWriter>,
    console: Console,
}

impl<T: ReplayTools> ReplayOrchestrator<T> {
    pub fn new(tools: T, retry: RetryConfig, console: Console) -> Self {
        Self {
            tools,
            retry,
            debug_writer: None,
            console,
        }
    }

    /// Persist raw emulator and reader output through `writer` on every attempt.
    pub fn with_debug_writer(mut self, writer: ArtifactWriter) -> Self {
        self.debug_writer = Some(writer);
        self
    }

    pub fn tools(&self) -> &T {
        &self.tools
    }

    /// Replay `sample` until a usable blob appears or the attempts run out.
    pub fn run_replay(&mut self, sample: &Sample) -> Result<ReplayOutcome> {
        let max_tries = self.retry.max_tries;
        for attempt in 1..=max_tries {
            debug!(sample = %sample, attempt, max_tries, "Starting replay attempt");

            self.console.say("    -- Staging sample ISO");
            match self.tools.stage(sample) {
                Ok(out) if !out.is_success() => warn!(
                    sample = %sample,
                    code = ?out.code,
                    stderr = %out.stderr.trim(),
                    "ISO staging failed; continuing"
                ),
                Ok(_) => {}
                Err(e) => warn!(sample = %sample, error = %e, "ISO staging failed; continuing"),
            }

            self.console.say("    -- Running emulator");
            let run = self.tools.run_emulator(sample)?;
            self.persist_debug(sample, &run);
            self.check_tool(&run)?;

            if self.retry.settle_delay_ms > 0 {
                std::thread::sleep(Duration::from_millis(self.retry.settle_delay_ms));
            }

            self.console.say("    -- Reading replay (this can take a while)");
            let read = self.tools.read_replay()?;
            self.persist_debug(sample, &read);
            self.check_tool(&read)?;

            match ReplayBlob::from_text(self.tools.fetch_result()?) {
                ReplayBlob::Payload(text) => {
                    info!(sample = %sample, attempt, bytes = text.len(), "Replay produced a result");
                    return Ok(ReplayOutcome::Blob {
                        text,
                        attempts: attempt,
                    });
                }
                ReplayBlob::Sentinel => {
                    warn!(sample = %sample, attempt, max_tries, "Replay reader reported an error");
                    self.console.say(&format!(
                        "  !! Replay output unavailable, retrying... ({attempt} of {max_tries})\n"
                    ));
                }
            }
        }

        warn!(sample = %sample, attempts = max_tries, "Replay attempts exhausted");
        Ok(ReplayOutcome::Exhausted {
            attempts: max_tries,
        })
    }

    fn check_tool(&self, out: &ToolOutput) -> Result<()> {
        out.check().inspect_err(|e| {
            error!(error = %e, stderr = %out.stderr.trim(), "Emulation tool failed; aborting batch");
            self.console
                .say("    !! An error occurred while running the emulation tools:");
            self.console.say(out.stderr.trim_end());
        })
    }

    fn persist_debug(&self, sample: &Sample, out: &ToolOutput) {
        if let Some(writer) = &self.debug_writer {
            if let Err(e) = writer.write_debug(sample, out.stage, &out.stdout) {
                warn!(sample = %sample, stage = out.stage, error = %e, "Could not write debug artifact");
            }
        }
    }
}
