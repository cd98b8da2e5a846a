//! Packing classification over parsed replay signals.
//!
//! Only the memory self-write channel can mark a sample as packed. The entropy
//! channel produces per-region annotations for the artifacts but never moves
//! the verdict, so an entropy-only run always reports NOT-PACKED.
//!
//! Any write into executable memory counts. Requiring the writes to be
//! consecutive in address space is not implemented; doing so would change
//! which samples are reported as packed.

use crate::config::SignalConfig;
use crate::signals::{EntryPoint, OepAddress, ParsedSignals, RegionSeries};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Packing verdict for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Packed,
    NotPacked,
}

impl Verdict {
    pub fn from_packed(packed: bool) -> Self {
        if packed {
            Verdict::Packed
        } else {
            Verdict::NotPacked
        }
    }

    pub fn is_packed(self) -> bool {
        matches!(self, Verdict::Packed)
    }

    /// Directory-safe label used in artifact paths.
    pub fn slug(self) -> &'static str {
        match self {
            Verdict::Packed => "packed",
            Verdict::NotPacked => "not-packed",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Packed => f.write_str("PACKED"),
            Verdict::NotPacked => f.write_str("NOT-PACKED"),
        }
    }
}

/// Decide whether a sample is packed.
///
/// Deterministic and side-effect free. With no channel enabled nothing can
/// set the flag and the result is [`Verdict::NotPacked`]; the pipeline refuses
/// such configurations up front.
pub fn classify(signals: &ParsedSignals, config: &SignalConfig) -> Verdict {
    let packed = config.memcheck_enabled && !signals.memory_write_events.is_empty();
    Verdict::from_packed(packed)
}

/// Whether `region` hosts an entry point, plus that entry point's address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryPointMatch {
    pub matches: bool,
    /// `None` when the reader did not report this entry point.
    pub address: Option<OepAddress>,
}

impl EntryPointMatch {
    fn for_region(region: &str, oep: Option<&EntryPoint>) -> Self {
        Self {
            matches: oep.is_some_and(|e| e.region == region),
            address: oep.map(|e| e.address.clone()),
        }
    }
}

/// Entropy series of one region annotated with entry point matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionReport<'a> {
    pub series: &'a RegionSeries,
    pub initial: EntryPointMatch,
    pub unpacked: EntryPointMatch,
}

impl RegionReport<'_> {
    /// Artifact channel name for this region.
    pub fn channel(&self) -> String {
        format!("{}_entropy", self.series.region)
    }
}

/// Annotate every region's series with initial/unpacked entry point matches.
pub fn annotate_regions(signals: &ParsedSignals) -> Vec<RegionReport<'_>> {
    let initial = signals.initial_entry_point.as_ref();
    let unpacked = signals.unpacked_entry_point.as_ref();
    signals
        .entropy_series
        .regions()
        .iter()
        .map(|series| RegionReport {
            series,
            initial: EntryPointMatch::for_region(&series.region, initial),
            unpacked: EntryPointMatch::for_region(&series.region, unpacked),
        })
        .collect()
}
