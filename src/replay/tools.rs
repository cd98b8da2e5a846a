//! External collaborators of the replay loop.
//!
//! [`ReplayTools`] is the seam between the orchestrator and the outside world:
//! ISO staging, the emulator driver, the replay reader and the fixed-path
//! result file. [`ProcessTools`] drives the real programs.

use crate::config::{PathConfig, RetryConfig, ToolsConfig};
use crate::error::{PackReplayError, Result};
use crate::sample::Sample;
use crate::timeout::{self, TimeoutConfig};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, trace};

/// Stage name of the emulator driver, used in logs and debug artifacts.
pub const EMULATOR_STAGE: &str = "run_panda";
/// Stage name of the replay reader, used in logs and debug artifacts.
pub const READER_STAGE: &str = "read_replay";
/// Stage name of the ISO staging tool.
pub const STAGING_STAGE: &str = "genisoimage";

/// Captured result of one finished tool process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub stage: &'static str,
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(stage: &'static str, stdout: impl Into<String>) -> Self {
        Self {
            stage,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Convert a failed run into the batch-fatal error.
    ///
    /// Signal deaths have no code of their own and map to 1.
    pub fn check(&self) -> Result<()> {
        if self.is_success() {
            return Ok(());
        }
        Err(PackReplayError::FatalTool {
            tool: self.stage.to_string(),
            code: self.code.unwrap_or(1),
            stderr: self.stderr.clone(),
        })
    }
}

/// Operations the orchestrator needs from the emulation environment.
pub trait ReplayTools {
    /// Build the ISO image holding `sample`. Failures are not retried.
    fn stage(&mut self, sample: &Sample) -> Result<ToolOutput>;

    /// Record an execution of `sample` in the emulator.
    fn run_emulator(&mut self, sample: &Sample) -> Result<ToolOutput>;

    /// Replay the recording and write the result file, replacing any earlier one.
    fn read_replay(&mut self) -> Result<ToolOutput>;

    /// Read the result file the reader just wrote.
    fn fetch_result(&mut self) -> Result<String>;
}

/// [`ReplayTools`] backed by real subprocesses.
#[derive(Debug, Clone)]
pub struct ProcessTools {
    tools: ToolsConfig,
    iso_path: PathBuf,
    result_file: PathBuf,
    attempt_timeout_secs: Option<u64>,
}

impl ProcessTools {
    pub fn new(tools: &ToolsConfig, paths: &PathConfig, retry: &RetryConfig) -> Self {
        Self {
            tools: tools.clone(),
            iso_path: paths.iso_path.clone(),
            result_file: paths.result_file.clone(),
            attempt_timeout_secs: retry.attempt_timeout_secs,
        }
    }

    fn invoke(&self, stage: &'static str, command: &[String], extra: &[String]) -> Result<ToolOutput> {
        let (program, leading) = command
            .split_first()
            .ok_or_else(|| PackReplayError::InvalidConfig(format!("empty command for {stage}")))?;

        debug!(stage, program = %program, args = ?leading, extra = ?extra, "Invoking tool");

        let mut cmd = Command::new(program);
        cmd.args(leading).args(extra).kill_on_drop(true);

        let bound = self
            .attempt_timeout_secs
            .map(|secs| TimeoutConfig::new(secs, stage));
        let output = timeout::block_on(bound, async move {
            cmd.output().await.map_err(PackReplayError::from)
        })?;

        let out = ToolOutput {
            stage,
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        trace!(stage, code = ?out.code, stdout_len = out.stdout.len(), "Tool finished");
        Ok(out)
    }

    /// Remove the previous reader's result so a run that writes nothing
    /// surfaces as a missing file.
    fn clear_result(&self) -> Result<()> {
        match std::fs::remove_file(&self.result_file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl ReplayTools for ProcessTools {
    fn stage(&mut self, sample: &Sample) -> Result<ToolOutput> {
        let extra = [
            self.iso_path.to_string_lossy().into_owned(),
            sample.path.to_string_lossy().into_owned(),
        ];
        self.invoke(STAGING_STAGE, &self.tools.iso_command, &extra)
    }

    fn run_emulator(&mut self, sample: &Sample) -> Result<ToolOutput> {
        self.invoke(
            EMULATOR_STAGE,
            &self.tools.emulator_command,
            std::slice::from_ref(&sample.name),
        )
    }

    fn read_replay(&mut self) -> Result<ToolOutput> {
        self.clear_result()?;
        self.invoke(READER_STAGE, &self.tools.reader_command, &[])
    }

    fn fetch_result(&mut self) -> Result<String> {
        Ok(std::fs::read_to_string(&self.result_file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string(), "sh".to_string()]
    }

    fn process_tools(tools: ToolsConfig, dir: &std::path::Path, timeout: Option<u64>) -> ProcessTools {
        let paths = PathConfig {
            iso_path: dir.join("payload.iso"),
            result_file: dir.join("replay_result.txt"),
            ..PathConfig::default()
        };
        let retry = RetryConfig {
            attempt_timeout_secs: timeout,
            ..RetryConfig::default()
        };
        ProcessTools::new(&tools, &paths, &retry)
    }

    #[test]
    fn check_maps_exit_codes() {
        assert!(ToolOutput::success(READER_STAGE, "").check().is_ok());

        let failed = ToolOutput {
            stage: EMULATOR_STAGE,
            code: Some(4),
            stdout: String::new(),
            stderr: "no vm".to_string(),
        };
        match failed.check() {
            Err(PackReplayError::FatalTool { tool, code, stderr }) => {
                assert_eq!(tool, "run_panda");
                assert_eq!(code, 4);
                assert_eq!(stderr, "no vm");
            }
            other => panic!("unexpected {other:?}"),
        }

        let killed = ToolOutput { code: None, ..failed };
        assert_eq!(killed.check().unwrap_err().exit_code(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn process_tools_capture_output_and_arguments() {
        let dir = tempdir().unwrap();
        let result = dir.path().join("replay_result.txt");
        let tools = ToolsConfig {
            iso_command: sh("echo \"$@\""),
            emulator_command: sh("echo emulating \"$1\""),
            reader_command: sh(&format!("printf ERROR > '{}'; exit 0", result.display())),
        };
        let mut pt = process_tools(tools, dir.path(), None);
        let sample = Sample::new("calc.exe", std::path::Path::new("/payload"));

        let staged = pt.stage(&sample).unwrap();
        assert!(staged.stdout.contains("payload.iso"));
        assert!(staged.stdout.contains("/payload/calc.exe"));

        let emu = pt.run_emulator(&sample).unwrap();
        assert!(emu.is_success());
        assert_eq!(emu.stdout.trim(), "emulating calc.exe");

        let reader = pt.read_replay().unwrap();
        assert!(reader.is_success());
        assert_eq!(pt.fetch_result().unwrap(), "ERROR");
    }

    #[cfg(unix)]
    #[test]
    fn process_tools_report_nonzero_exit() {
        let dir = tempdir().unwrap();
        let tools = ToolsConfig {
            emulator_command: sh("echo broken >&2; exit 7"),
            ..ToolsConfig::default()
        };
        let mut pt = process_tools(tools, dir.path(), None);
        let out = pt
            .run_emulator(&Sample::new("a.exe", dir.path()))
            .unwrap();
        assert_eq!(out.code, Some(7));
        assert_eq!(out.stderr.trim(), "broken");
        assert_eq!(out.check().unwrap_err().exit_code(), 7);
    }

    #[cfg(unix)]
    #[test]
    fn process_tools_enforce_attempt_timeout() {
        let dir = tempdir().unwrap();
        let tools = ToolsConfig {
            reader_command: sh("sleep 5"),
            ..ToolsConfig::default()
        };
        let mut pt = process_tools(tools, dir.path(), Some(1));
        assert!(matches!(
            pt.read_replay(),
            Err(PackReplayError::Timeout { seconds: 1 })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn reader_that_writes_nothing_leaves_no_stale_result() {
        let dir = tempdir().unwrap();
        let result = dir.path().join("replay_result.txt");
        std::fs::write(&result, "{'memory_write_exe_list': [[1, 2]]}").unwrap();
        let tools = ToolsConfig {
            reader_command: sh("exit 0"),
            ..ToolsConfig::default()
        };
        let mut pt = process_tools(tools, dir.path(), None);

        assert!(pt.read_replay().unwrap().is_success());
        assert!(!result.exists());
        assert!(matches!(pt.fetch_result(), Err(PackReplayError::Io(_))));
    }

    #[test]
    fn missing_result_file_is_io_error() {
        let dir = tempdir().unwrap();
        let mut pt = process_tools(ToolsConfig::default(), dir.path(), None);
        assert!(matches!(pt.fetch_result(), Err(PackReplayError::Io(_))));
    }
}
