//! Human-readable progress and summary output.

use super::batch::BatchSummary;
use std::io::Write;

/// Stdout printer muted entirely in silent mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Console {
    silent: bool,
}

impl Console {
    pub fn new(silent: bool) -> Self {
        Self { silent }
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    /// Print one line and flush, unless silent.
    pub fn say(&self, text: &str) {
        if self.silent {
            return;
        }
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }

    pub fn print_summary(&self, summary: &BatchSummary) {
        for line in summary_lines(summary) {
            self.say(&line);
        }
    }
}

fn percent(ratio: f64) -> String {
    format!("{:.2}", ratio * 100.0)
}

/// Lines printed after the batch.
pub fn summary_lines(summary: &BatchSummary) -> Vec<String> {
    let mut lines = Vec::new();
    match (summary.packed_ratio, summary.not_packed_ratio) {
        (Some(packed), Some(not_packed)) => {
            lines.push(format!("*** % packed: {}", percent(packed)));
            lines.push(format!("*** % non-packed: {}", percent(not_packed)));
        }
        _ => lines.push("*** No samples analyzed".to_string()),
    }
    lines.push(format!("*** Packed list: {:?}", summary.packed));
    lines.push(format!("*** Non-Packed list: {:?}", summary.not_packed));
    if !summary.inconclusive.is_empty() {
        let names: Vec<&str> = summary.inconclusive.iter().map(|i| i.name.as_str()).collect();
        lines.push(format!("*** Inconclusive list: {names:?}"));
    }
    lines
}
