//! Batch-wide verdict accounting.

use crate::classify::Verdict;
use crate::sample::Sample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Output schema version of `summary.json`
pub const SUMMARY_SCHEMA_VERSION: &str = "1.0.0";

/// Why a sample ended without a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InconclusiveReason {
    /// Every replay attempt returned the sentinel.
    RetriesExhausted { attempts: u32 },
    /// The reader's output could not be decoded.
    MalformedBlob { message: String },
}

impl fmt::Display for InconclusiveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InconclusiveReason::RetriesExhausted { attempts } => {
                write!(f, "replay failed {attempts} times")
            }
            InconclusiveReason::MalformedBlob { message } => write!(f, "malformed blob: {message}"),
        }
    }
}

/// Classified sample with optional provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub name: String,
    pub verdict: Verdict,
    /// Replay attempts it took to get a usable blob.
    pub attempts: u32,
    /// SHA-256 of the sample file, when it could be read.
    pub sha256: Option<String>,
}

impl SampleRecord {
    pub fn new(sample: &Sample, verdict: Verdict) -> Self {
        Self {
            name: sample.name.clone(),
            verdict,
            attempts: 1,
            sha256: None,
        }
    }
}

/// Sample excluded from the verdict accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InconclusiveSample {
    pub name: String,
    pub reason: InconclusiveReason,
}

/// Verdicts accumulated over one batch.
///
/// Every classified sample sits in exactly one of the packed / not-packed
/// buckets. Inconclusive samples are listed separately and do not count
/// towards the ratios.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    records: Vec<SampleRecord>,
    inconclusive: Vec<InconclusiveSample>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_known(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.name == name)
            || self.inconclusive.iter().any(|i| i.name == name)
    }

    /// Record a verdict. A sample already accounted for is ignored.
    pub fn record(&mut self, record: SampleRecord) {
        if self.is_known(&record.name) {
            warn!(sample = %record.name, "Sample already recorded; ignoring repeat");
            return;
        }
        self.records.push(record);
    }

    pub fn record_verdict(&mut self, sample: &Sample, verdict: Verdict) {
        self.record(SampleRecord::new(sample, verdict));
    }

    pub fn record_inconclusive(&mut self, sample: &Sample, reason: InconclusiveReason) {
        if self.is_known(&sample.name) {
            warn!(sample = %sample, "Sample already recorded; ignoring repeat");
            return;
        }
        self.inconclusive.push(InconclusiveSample {
            name: sample.name.clone(),
            reason,
        });
    }

    /// Names in the bucket for `verdict`, in recording order.
    pub fn bucket(&self, verdict: Verdict) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.verdict == verdict)
            .map(|r| r.name.clone())
            .collect()
    }

    pub fn inconclusive(&self) -> &[InconclusiveSample] {
        &self.inconclusive
    }

    pub fn total_classified(&self) -> usize {
        self.records.len()
    }

    /// Ratios and lists for the batch.
    ///
    /// With nothing classified the ratios are `None` rather than a division
    /// by zero.
    pub fn summarize(&self) -> BatchSummary {
        let packed = self.bucket(Verdict::Packed);
        let not_packed = self.bucket(Verdict::NotPacked);
        let total = self.total_classified();
        let ratio = |n: usize| (total > 0).then(|| n as f64 / total as f64);

        BatchSummary {
            total_classified: total,
            packed_ratio: ratio(packed.len()),
            not_packed_ratio: ratio(not_packed.len()),
            packed,
            not_packed,
            inconclusive: self.inconclusive.clone(),
        }
    }

    /// Summary plus per-sample records, for `summary.json`.
    pub fn report(&self) -> BatchReport {
        BatchReport {
            schema_version: SUMMARY_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            summary: self.summarize(),
            samples: self.records.clone(),
        }
    }
}

/// Aggregate view of a finished batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_classified: usize,
    pub packed_ratio: Option<f64>,
    pub not_packed_ratio: Option<f64>,
    pub packed: Vec<String>,
    pub not_packed: Vec<String>,
    pub inconclusive: Vec<InconclusiveSample>,
}

impl BatchSummary {
    /// True when no sample received a verdict.
    pub fn is_empty(&self) -> bool {
        self.total_classified == 0
    }
}

/// Machine-readable batch report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub summary: BatchSummary,
    pub samples: Vec<SampleRecord>,
}
