//! Per-sample artifact files.
//!
//! Layout:
//!
//! ```text
//! <output_dir>/<packed|not-packed>/<sample>/memcheck.txt
//! <output_dir>/<packed|not-packed>/<sample>/<region>_entropy.txt
//! <output_dir>/summary.json
//! <debug_dir>/<sample>/<stage>.txt
//! ```
//!
//! List artifacts use Python's repr conventions (`True`, `None`, `1e-07`).
//! Entropy values are decoded as floats, so an integral value in the blob
//! is written as `0.0` rather than `0`.

use super::batch::BatchReport;
use crate::classify::{annotate_regions, EntryPointMatch, RegionReport, Verdict};
use crate::config::{PathConfig, SignalConfig};
use crate::error::Result;
use crate::sample::Sample;
use crate::signals::{MemoryWriteEvent, ParsedSignals};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Channel name of the memory self-write artifact.
pub const MEMCHECK_CHANNEL: &str = "memcheck";
/// File name of the machine-readable batch report.
pub const SUMMARY_FILE: &str = "summary.json";

/// Writes output and debug artifacts under two root directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
    debug_dir: PathBuf,
}

/// Replace path separators so a region or sample name stays one component.
fn file_component(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect()
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    debug!(path = %path.display(), bytes = content.len(), "Wrote artifact");
    Ok(())
}

fn python_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

/// `[[moment, address], ...]`
pub fn format_memcheck(events: &[MemoryWriteEvent]) -> String {
    let mut out = String::from("[");
    for (i, e) in events.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "[{}, {}]", e.moment, e.address);
    }
    out.push(']');
    out
}

fn format_list<T>(items: &[T], repr: impl Fn(&T) -> String) -> String {
    let parts: Vec<String> = items.iter().map(repr).collect();
    format!("[{}]", parts.join(", "))
}

/// Shortest round-trip float text, exponent form below 1e-4 and from 1e16.
fn python_float(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let sci = format!("{v:e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return format!("{v:?}");
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return format!("{v:?}");
    };
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    if !(-4..16).contains(&exp) {
        let (head, tail) = digits.split_at(1);
        let mantissa = if tail.is_empty() {
            head.to_string()
        } else {
            format!("{head}.{tail}")
        };
        let exp_sign = if exp < 0 { '-' } else { '+' };
        format!("{sign}{mantissa}e{exp_sign}{:02}", exp.abs())
    } else if exp < 0 {
        let zeros = "0".repeat((-exp - 1) as usize);
        format!("{sign}0.{zeros}{digits}")
    } else {
        let point = exp as usize + 1;
        if digits.len() <= point {
            let zeros = "0".repeat(point - digits.len());
            format!("{sign}{digits}{zeros}.0")
        } else {
            let (int, frac) = digits.split_at(point);
            format!("{sign}{int}.{frac}")
        }
    }
}

fn format_match(m: &EntryPointMatch) -> String {
    let address = m
        .address
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "None".to_string());
    format!("{}-{}", python_bool(m.matches), address)
}

/// Four lines: instruction counts, entropy values, initial and unpacked
/// entry point flags as `<True|False>-<address>`.
pub fn format_region(report: &RegionReport<'_>) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        format_list(report.series.instruction_counts().as_slice(), u64::to_string),
        format_list(report.series.values().as_slice(), |v| python_float(*v)),
        format_match(&report.initial),
        format_match(&report.unpacked),
    )
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>, debug_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            debug_dir: debug_dir.into(),
        }
    }

    pub fn from_paths(paths: &PathConfig) -> Self {
        Self::new(&paths.output_dir, &paths.debug_dir)
    }

    /// Location of one channel artifact for a sample.
    pub fn output_path(&self, sample: &Sample, verdict: Verdict, channel: &str) -> PathBuf {
        self.output_dir
            .join(verdict.slug())
            .join(file_component(&sample.name))
            .join(format!("{}.txt", file_component(channel)))
    }

    /// Persist raw tool output for post-mortem inspection.
    pub fn write_debug(&self, sample: &Sample, stage: &str, content: &str) -> Result<PathBuf> {
        let path = self
            .debug_dir
            .join(file_component(&sample.name))
            .join(format!("{}.txt", file_component(stage)));
        write_file(&path, content)?;
        Ok(path)
    }

    pub fn write_output(
        &self,
        sample: &Sample,
        verdict: Verdict,
        channel: &str,
        content: &str,
    ) -> Result<PathBuf> {
        let path = self.output_path(sample, verdict, channel);
        write_file(&path, content)?;
        Ok(path)
    }

    /// Write one artifact per active channel and return their paths.
    pub fn write_signals(
        &self,
        sample: &Sample,
        verdict: Verdict,
        signals: &ParsedSignals,
        channels: &SignalConfig,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        if channels.memcheck_enabled {
            written.push(self.write_output(
                sample,
                verdict,
                MEMCHECK_CHANNEL,
                &format_memcheck(&signals.memory_write_events),
            )?);
        }
        if channels.entropy_enabled {
            for report in annotate_regions(signals) {
                written.push(self.write_output(
                    sample,
                    verdict,
                    &report.channel(),
                    &format_region(&report),
                )?);
            }
        }
        Ok(written)
    }

    pub fn write_summary(&self, report: &BatchReport) -> Result<PathBuf> {
        let path = self.output_dir.join(SUMMARY_FILE);
        write_file(&path, &serde_json::to_string_pretty(report)?)?;
        Ok(path)
    }
}
