//! Signal parser: decodes replay reader output into [`ParsedSignals`].
//!
//! The reader emits a mapping with four keys:
//!
//! - `memory_write_exe_list`: `[[moment, address], ...]`
//! - `entropy`: `{instruction_count: {region: value}}`, outer keys in execution order
//! - `entropy_initial_oep`: `[region, address]`
//! - `entropy_unpacked_oep`: `[region, address]`
//!
//! The entropy mapping is transposed into one series per region. Missing keys
//! decode as empty, since the reader omits channels its plugins did not run.

pub mod blob;
pub mod types;

pub use blob::{normalize_quotes, ReplayBlob, ERROR_SENTINEL};
pub use types::{
    EntropySample, EntropySeries, EntryPoint, MemoryWriteEvent, OepAddress, ParsedSignals,
    RegionSeries,
};

use crate::error::{PackReplayError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::trace;

#[derive(Debug, Deserialize)]
struct RawReplayReport {
    #[serde(default)]
    memory_write_exe_list: Vec<MemoryWriteEvent>,
    #[serde(default)]
    entropy: Map<String, Value>,
    #[serde(default)]
    entropy_initial_oep: Option<EntryPoint>,
    #[serde(default)]
    entropy_unpacked_oep: Option<EntryPoint>,
}

/// Decode one non-sentinel blob.
///
/// Pure: the same text always yields the same signals.
pub fn parse_blob(text: &str) -> Result<ParsedSignals> {
    let normalized = normalize_quotes(text);
    let raw: RawReplayReport = serde_json::from_str(&normalized)
        .map_err(|e| PackReplayError::MalformedBlob(e.to_string()))?;

    let entropy_series = transpose_entropy(&raw.entropy)?;
    trace!(
        writes = raw.memory_write_exe_list.len(),
        regions = entropy_series.len(),
        "Decoded replay blob"
    );

    Ok(ParsedSignals {
        memory_write_events: raw.memory_write_exe_list,
        entropy_series,
        initial_entry_point: raw.entropy_initial_oep,
        unpacked_entry_point: raw.entropy_unpacked_oep,
    })
}

/// Transpose `{instruction_count: {region: value}}` into per-region series.
///
/// Outer keys are visited in the order they appear in the blob and are not
/// re-sorted; each region's series therefore follows execution order.
pub fn transpose_entropy(snapshots: &Map<String, Value>) -> Result<EntropySeries> {
    let mut series = EntropySeries::new();
    for (count_key, regions) in snapshots {
        let instruction_count: u64 = count_key.trim().parse().map_err(|_| {
            PackReplayError::MalformedBlob(format!(
                "entropy key '{count_key}' is not an instruction count"
            ))
        })?;
        let regions = regions.as_object().ok_or_else(|| {
            PackReplayError::MalformedBlob(format!(
                "entropy snapshot at {instruction_count} is not a mapping"
            ))
        })?;
        for (region, value) in regions {
            let value = value.as_f64().ok_or_else(|| {
                PackReplayError::MalformedBlob(format!(
                    "entropy of '{region}' at {instruction_count} is not a number"
                ))
            })?;
            series.push(region, instruction_count, value);
        }
    }
    Ok(series)
}
