use anyhow::Context;
use clap::Parser;
use packreplay::config::PipelineConfig;
use packreplay::logging;
use packreplay::{PackReplayError, Pipeline};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "packreplay")]
#[command(about = "Detect packed Windows executables by replaying them in an instrumented VM")]
#[command(version)]
struct Args {
    /// JSON configuration file; environment and flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the candidate samples
    #[arg(long)]
    payload_dir: Option<PathBuf>,

    /// Root directory for per-sample artifacts
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Analyze only this file name
    #[arg(short, long)]
    executable: Option<String>,

    /// Suppress progress and summary output
    #[arg(short, long)]
    silent: bool,

    /// Persist raw emulator and reader output
    #[arg(short, long)]
    debug: bool,

    /// Enable the memory self-write channel
    #[arg(long)]
    memcheck: bool,

    /// Disable the entropy channel
    #[arg(long)]
    no_entropy: bool,

    /// Wall-clock bound in seconds for each tool invocation
    #[arg(long)]
    attempt_timeout: Option<u64>,

    /// Emit diagnostic logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(dir) = &self.payload_dir {
            config.paths.payload_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.paths.output_dir = dir.clone();
        }
        if let Some(exe) = &self.executable {
            config.run.single_sample = Some(exe.clone());
        }
        if self.silent {
            config.run.silent = true;
        }
        if self.debug {
            config.run.debug = true;
        }
        if self.memcheck {
            config.signals.memcheck_enabled = true;
        }
        if self.no_entropy {
            config.signals.entropy_enabled = false;
        }
        if self.attempt_timeout.is_some() {
            config.retry.attempt_timeout_secs = self.attempt_timeout;
        }
    }
}

fn load_config(args: &Args) -> anyhow::Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.apply_env_with(|key| std::env::var(key).ok());
    args.apply(&mut config);
    Ok(config)
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let config = load_config(&args)?;
    // Silent mode keeps diagnostics to warnings and above; RUST_LOG overrides.
    let level = if config.run.silent { "warn" } else { "info" };
    if args.json_logs {
        logging::init_tracing_json(level);
    } else {
        logging::init_tracing(level);
    }

    let mut pipeline = Pipeline::with_process_tools(&config);
    match pipeline.run() {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(e @ (PackReplayError::FatalTool { .. } | PackReplayError::Timeout { .. })) => {
            let e = packreplay::log_error!(e, "batch aborted");
            std::process::exit(e.exit_code());
        }
        Err(e) => Err(e).context("replay batch failed"),
    }
}
