//! Common test utilities and helpers.
//!
//! Provides a scripted stand-in for the emulation tools and a scratch
//! workspace laid out like the analysis container.

#![allow(dead_code)]

use packreplay::config::PipelineConfig;
use packreplay::replay::{ReplayTools, ToolOutput, EMULATOR_STAGE, READER_STAGE};
use packreplay::sample::Sample;
use packreplay::Result;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Replay tools answering from a per-call script of reader results.
#[derive(Debug, Default)]
pub struct ScriptedTools {
    results: VecDeque<String>,
    /// Exit code the emulator reports on every call.
    pub emulator_code: i32,
    /// Exit code the reader reports on every call.
    pub reader_code: i32,
    /// Sample names in the order the emulator saw them.
    pub emulated: Vec<String>,
}

impl ScriptedTools {
    pub fn new(results: &[&str]) -> Self {
        Self {
            results: results.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl ReplayTools for ScriptedTools {
    fn stage(&mut self, _sample: &Sample) -> Result<ToolOutput> {
        Ok(ToolOutput::success("genisoimage", ""))
    }

    fn run_emulator(&mut self, sample: &Sample) -> Result<ToolOutput> {
        self.emulated.push(sample.name.clone());
        Ok(ToolOutput {
            code: Some(self.emulator_code),
            ..ToolOutput::success(EMULATOR_STAGE, format!("recorded {}", sample.name))
        })
    }

    fn read_replay(&mut self) -> Result<ToolOutput> {
        Ok(ToolOutput {
            code: Some(self.reader_code),
            ..ToolOutput::success(READER_STAGE, "replayed")
        })
    }

    fn fetch_result(&mut self) -> Result<String> {
        Ok(self
            .results
            .pop_front()
            .unwrap_or_else(|| "ERROR".to_string()))
    }
}

/// Scratch directory with `payload/`, `output/` and `debug/` roots.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new(samples: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let payload = dir.path().join("payload");
        std::fs::create_dir_all(&payload).unwrap();
        for name in samples {
            std::fs::write(payload.join(name), b"MZ\x90\x00").unwrap();
        }
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn output(&self) -> PathBuf {
        self.path().join("output")
    }

    /// Silent, no-delay configuration rooted in this workspace.
    pub fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.run.silent = true;
        config.retry.settle_delay_ms = 0;
        config.paths.payload_dir = self.path().join("payload");
        config.paths.output_dir = self.output();
        config.paths.debug_dir = self.path().join("debug");
        config.paths.iso_path = self.path().join("payload.iso");
        config.paths.result_file = self.path().join("replay_result.txt");
        config
    }
}

/// Blob with one memory write and a two-region entropy trace.
pub const PACKED_BLOB: &str = "{'memory_write_exe_list': [[100, 4096]], \
    'entropy': {'10': {'UPX0': 0.0, 'UPX1': 7.6}, '500': {'UPX0': 6.9}}, \
    'entropy_initial_oep': ['UPX1', 4198400], 'entropy_unpacked_oep': ['UPX0', 4096]}";

/// Blob with no memory writes.
pub const CLEAN_BLOB: &str = "{'memory_write_exe_list': [], \
    'entropy': {'10': {'.text': 6.1}, '20': {'.text': 6.2}}, \
    'entropy_initial_oep': ['.text', 4198400], 'entropy_unpacked_oep': ['.text', 4198400]}";
