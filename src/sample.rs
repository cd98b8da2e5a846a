//! Candidate samples and their discovery.

use crate::config::PipelineConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Substring a file name must contain to be analyzed.
pub const CANDIDATE_MARKER: &str = ".exe";

/// One candidate executable, identified by its file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sample {
    /// File name inside the payload directory.
    pub name: String,
    /// Full path to the sample on disk.
    pub path: PathBuf,
}

impl Sample {
    pub fn new(name: impl Into<String>, payload_dir: &Path) -> Self {
        let name = name.into();
        let path = payload_dir.join(&name);
        Self { name, path }
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Whether `name` qualifies as a sample.
///
/// This is a case-sensitive substring test, not extension validation:
/// `b.exe.bak` qualifies, `C.EXE` does not.
pub fn is_candidate(name: &str) -> bool {
    name.contains(CANDIDATE_MARKER)
}

/// Keep the qualifying names, sorted for a stable processing order.
pub fn filter_candidates<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = names
        .into_iter()
        .map(Into::into)
        .filter(|n| is_candidate(n))
        .collect();
    out.sort();
    out
}

/// Resolve the samples for this batch.
///
/// A configured single sample skips the directory listing but still goes
/// through the name filter.
pub fn discover_samples(config: &PipelineConfig) -> Result<Vec<Sample>> {
    let payload_dir = &config.paths.payload_dir;
    let names = match &config.run.single_sample {
        Some(name) => vec![name.clone()],
        None => {
            let mut names = Vec::new();
            for entry in std::fs::read_dir(payload_dir)? {
                let entry = entry?;
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
            names
        }
    };

    let samples: Vec<Sample> = filter_candidates(names)
        .into_iter()
        .map(|n| Sample::new(n, payload_dir))
        .collect();

    debug!(
        payload_dir = %payload_dir.display(),
        count = samples.len(),
        "Discovered candidate samples"
    );
    Ok(samples)
}
