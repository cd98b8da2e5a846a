//! Configuration for the replay pipeline.
//!
//! A [`PipelineConfig`] is built once at startup (defaults, then an optional
//! JSON file, then the environment, then CLI flags) and passed down by
//! reference. Nothing below `main` reads the process environment.

use crate::error::{PackReplayError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable muting human-readable output.
pub const ENV_SILENT: &str = "panda_silent";
/// Environment variable enabling raw tool output persistence.
pub const ENV_DEBUG: &str = "panda_debug";
/// Environment variable naming a single sample to analyze.
pub const ENV_EXECUTABLE: &str = "panda_executable";
/// Environment variable toggling the memory self-write channel.
pub const ENV_MEMCHECK: &str = "panda_memcheck";
/// Environment variable toggling the entropy channel.
pub const ENV_ENTROPY: &str = "panda_entropy";

/// Master configuration for the replay pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Output and sample-selection switches.
    pub run: RunConfig,
    /// Which signal channels feed classification and artifacts.
    pub signals: SignalConfig,
    /// Filesystem locations.
    pub paths: PathConfig,
    /// External tool command lines.
    pub tools: ToolsConfig,
    /// Retry and timing policy for replay attempts.
    pub retry: RetryConfig,
}

/// Output and sample-selection switches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Suppress all human-readable progress and summary output.
    pub silent: bool,
    /// Persist raw emulator and reader output per sample.
    pub debug: bool,
    /// Analyze exactly this file name instead of listing the payload directory.
    pub single_sample: Option<String>,
}

/// Signal channel switches consumed by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Memory self-write detection (default: false).
    pub memcheck_enabled: bool,
    /// Per-region entropy series and entry point annotation (default: true).
    pub entropy_enabled: bool,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            memcheck_enabled: false,
            entropy_enabled: true,
        }
    }
}

impl SignalConfig {
    /// True when at least one channel can contribute to a verdict.
    pub fn any_enabled(&self) -> bool {
        self.memcheck_enabled || self.entropy_enabled
    }
}

/// Filesystem locations used by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Directory holding candidate samples (default: /payload).
    pub payload_dir: PathBuf,
    /// ISO image the staging tool writes (default: payload.iso).
    pub iso_path: PathBuf,
    /// File the replay reader leaves its result in (default: replay_result.txt).
    pub result_file: PathBuf,
    /// Root for per-sample output artifacts (default: output).
    pub output_dir: PathBuf,
    /// Root for debug artifacts (default: debug).
    pub debug_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            payload_dir: PathBuf::from("/payload"),
            iso_path: PathBuf::from("payload.iso"),
            result_file: PathBuf::from("replay_result.txt"),
            output_dir: PathBuf::from("output"),
            debug_dir: PathBuf::from("debug"),
        }
    }
}

/// Command lines for the external collaborators.
///
/// Each command is a program followed by its fixed leading arguments; the
/// pipeline appends the per-call arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// ISO staging tool; receives the ISO path and the sample path.
    pub iso_command: Vec<String>,
    /// Emulator driver; receives the sample name.
    pub emulator_command: Vec<String>,
    /// Replay reader; receives nothing and writes the result file.
    pub reader_command: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            iso_command: vec![
                "genisoimage".to_string(),
                "-max-iso9660-filenames".to_string(),
                "-RJ".to_string(),
                "-o".to_string(),
            ],
            emulator_command: vec!["python3".to_string(), "/addon/run_panda.py".to_string()],
            reader_command: vec!["python3".to_string(), "/addon/read_replay.py".to_string()],
        }
    }
}

/// Retry and timing policy for replay attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Replay cycles per sample before giving up (default: 3).
    pub max_tries: u32,
    /// Blocking wait between the emulator and the reader (default: 2000ms).
    pub settle_delay_ms: u64,
    /// Optional wall-clock bound per tool invocation (default: none).
    pub attempt_timeout_secs: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_tries: 3,
            settle_delay_ms: 2000,
            attempt_timeout_secs: None,
        }
    }
}

/// Interpret a flag the way the container entrypoint sets them: only the
/// exact string `True` enables.
fn env_flag(value: Option<String>) -> Option<bool> {
    value.map(|v| v == "True")
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; missing keys take defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Apply environment-style settings read through `lookup`.
    ///
    /// `panda_executable=None` is treated as unset. Unset variables leave the
    /// current value untouched.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(silent) = env_flag(lookup(ENV_SILENT)) {
            self.run.silent = silent;
        }
        if let Some(debug) = env_flag(lookup(ENV_DEBUG)) {
            self.run.debug = debug;
        }
        if let Some(exe) = lookup(ENV_EXECUTABLE) {
            self.run.single_sample = match exe.as_str() {
                "None" | "" => None,
                _ => Some(exe),
            };
        }
        if let Some(memcheck) = env_flag(lookup(ENV_MEMCHECK)) {
            self.signals.memcheck_enabled = memcheck;
        }
        if let Some(entropy) = env_flag(lookup(ENV_ENTROPY)) {
            self.signals.entropy_enabled = entropy;
        }
    }

    /// Defaults overlaid with environment-style settings read through `lookup`.
    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_env_with(lookup);
        config
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_tries == 0 {
            return Err(PackReplayError::InvalidConfig(
                "retry.max_tries must be at least 1".to_string(),
            ));
        }
        if !self.signals.any_enabled() {
            return Err(PackReplayError::InvalidConfig(
                "no signal channel enabled; enable memcheck and/or entropy".to_string(),
            ));
        }
        for (name, cmd) in [
            ("iso_command", &self.tools.iso_command),
            ("emulator_command", &self.tools.emulator_command),
            ("reader_command", &self.tools.reader_command),
        ] {
            if cmd.is_empty() {
                return Err(PackReplayError::InvalidConfig(format!(
                    "tools.{name} must name a program"
                )));
            }
        }
        Ok(())
    }
}
