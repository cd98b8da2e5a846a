//! End-to-end batch driver.
//!
//! Samples are processed strictly one at a time: each replay occupies the only
//! emulated machine, and the result file is shared between attempts.

use crate::classify::classify;
use crate::config::PipelineConfig;
use crate::error::{PackReplayError, Result};
use crate::replay::{ProcessTools, ReplayOrchestrator, ReplayOutcome, ReplayTools};
use crate::report::{
    ArtifactWriter, BatchResult, BatchSummary, Console, InconclusiveReason, SampleRecord,
};
use crate::sample::{discover_samples, Sample};
use crate::signals::parse_blob;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

/// SHA-256 of a file, or `None` when it cannot be read.
pub fn fingerprint(path: &Path) -> Option<String> {
    let mut file = File::open(path).ok()?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).ok()?;
    Some(hex::encode(hasher.finalize()))
}

/// Wires discovery, replay, parsing, classification and reporting.
pub struct Pipeline<'a, T: ReplayTools> {
    config: &'a PipelineConfig,
    orchestrator: ReplayOrchestrator<T>,
    writer: ArtifactWriter,
    console: Console,
    batch: BatchResult,
}

impl<'a> Pipeline<'a, ProcessTools> {
    /// Pipeline driving the real external tools.
    pub fn with_process_tools(config: &'a PipelineConfig) -> Self {
        let tools = ProcessTools::new(&config.tools, &config.paths, &config.retry);
        Self::new(config, tools)
    }
}

impl<'a, T: ReplayTools> Pipeline<'a, T> {
    pub fn new(config: &'a PipelineConfig, tools: T) -> Self {
        let console = Console::new(config.run.silent);
        let writer = ArtifactWriter::from_paths(&config.paths);
        let mut orchestrator = ReplayOrchestrator::new(tools, config.retry.clone(), console);
        if config.run.debug {
            orchestrator = orchestrator.with_debug_writer(writer.clone());
        }
        Self {
            config,
            orchestrator,
            writer,
            console,
            batch: BatchResult::new(),
        }
    }

    pub fn batch(&self) -> &BatchResult {
        &self.batch
    }

    /// Analyze every candidate sample, print and persist the summary.
    ///
    /// Returns early with the first batch-fatal error; verdicts recorded so far
    /// stay in [`Pipeline::batch`].
    pub fn run(&mut self) -> Result<BatchSummary> {
        self.config.validate()?;

        if self.config.run.debug {
            self.console.say("DEBUGGING ACTIVATED");
        }
        if let Some(name) = &self.config.run.single_sample {
            self.console.say(&format!("SAMPLE ANALYSED: {name}"));
        }
        self.console.say("++ Launching");

        let samples = discover_samples(self.config)?;
        info!(count = samples.len(), "Starting batch");
        for sample in &samples {
            let span = crate::sample_span!(sample);
            let _guard = span.enter();
            self.process(sample)?;
        }
        self.console.say("++ Finished");

        let summary = self.batch.summarize();
        self.console.print_summary(&summary);
        match self.writer.write_summary(&self.batch.report()) {
            Ok(path) => info!(path = %path.display(), "Wrote batch summary"),
            Err(e) => warn!(error = %e, "Could not write batch summary"),
        }
        info!(
            classified = summary.total_classified,
            packed = summary.packed.len(),
            inconclusive = summary.inconclusive.len(),
            "Batch finished"
        );
        Ok(summary)
    }

    /// Replay, classify and record one sample.
    pub fn process(&mut self, sample: &Sample) -> Result<()> {
        self.console
            .say(&format!("  -- Processing file '{}'", sample.name));

        let (text, attempts) = match self.orchestrator.run_replay(sample)? {
            ReplayOutcome::Blob { text, attempts } => (text, attempts),
            ReplayOutcome::Exhausted { attempts } => {
                self.console
                    .say("      -- No usable replay output; sample is inconclusive\n");
                self.batch.record_inconclusive(
                    sample,
                    InconclusiveReason::RetriesExhausted { attempts },
                );
                return Ok(());
            }
        };

        let signals = match parse_blob(&text) {
            Ok(signals) => signals,
            Err(PackReplayError::MalformedBlob(message)) => {
                warn!(sample = %sample, error = %message, "Replay output is malformed");
                self.console
                    .say("      -- Replay output could not be decoded; sample is inconclusive\n");
                self.batch
                    .record_inconclusive(sample, InconclusiveReason::MalformedBlob { message });
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let verdict = classify(&signals, &self.config.signals);
        self.writer
            .write_signals(sample, verdict, &signals, &self.config.signals)?;
        self.batch.record(SampleRecord {
            attempts,
            sha256: fingerprint(&sample.path),
            ..SampleRecord::new(sample, verdict)
        });

        info!(sample = %sample, %verdict, attempts, "Sample classified");
        self.console
            .say(&format!("      -- The result of the analysis is: {verdict}\n"));
        Ok(())
    }
}
