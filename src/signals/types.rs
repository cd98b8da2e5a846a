//! Typed replay signals.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A write into executable memory observed during replay.
///
/// Encoded on the wire as a `[moment, address]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u64, u64)", into = "(u64, u64)")]
pub struct MemoryWriteEvent {
    /// Replay moment (instruction count) of the write.
    pub moment: u64,
    /// Target address of the write.
    pub address: u64,
}

impl From<(u64, u64)> for MemoryWriteEvent {
    fn from((moment, address): (u64, u64)) -> Self {
        Self { moment, address }
    }
}

impl From<MemoryWriteEvent> for (u64, u64) {
    fn from(e: MemoryWriteEvent) -> Self {
        (e.moment, e.address)
    }
}

/// Entry point address as emitted by the reader: usually an integer, but
/// some plugin versions print it as a hex string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OepAddress {
    Numeric(u64),
    Text(String),
}

impl fmt::Display for OepAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OepAddress::Numeric(v) => write!(f, "{v}"),
            OepAddress::Text(s) => f.write_str(s),
        }
    }
}

/// An origin entry point: a code region and an address inside it.
///
/// Encoded on the wire as a `[region, address]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, OepAddress)", into = "(String, OepAddress)")]
pub struct EntryPoint {
    pub region: String,
    pub address: OepAddress,
}

impl From<(String, OepAddress)> for EntryPoint {
    fn from((region, address): (String, OepAddress)) -> Self {
        Self { region, address }
    }
}

impl From<EntryPoint> for (String, OepAddress) {
    fn from(e: EntryPoint) -> Self {
        (e.region, e.address)
    }
}

/// One entropy measurement of a region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntropySample {
    pub instruction_count: u64,
    pub value: f64,
}

/// Entropy trajectory of a single code region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSeries {
    pub region: String,
    /// Samples in the order they were encountered; never re-sorted.
    pub samples: Vec<EntropySample>,
}

impl RegionSeries {
    pub fn instruction_counts(&self) -> Vec<u64> {
        self.samples.iter().map(|s| s.instruction_count).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }
}

/// Per-region entropy series, regions kept in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntropySeries {
    regions: Vec<RegionSeries>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl EntropySeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one measurement to `region`'s series, creating it if needed.
    pub fn push(&mut self, region: &str, instruction_count: u64, value: f64) {
        let idx = match self.index.get(region) {
            Some(&idx) => idx,
            None => {
                self.regions.push(RegionSeries {
                    region: region.to_string(),
                    samples: Vec::new(),
                });
                let idx = self.regions.len() - 1;
                self.index.insert(region.to_string(), idx);
                idx
            }
        };
        self.regions[idx].samples.push(EntropySample {
            instruction_count,
            value,
        });
    }

    pub fn regions(&self) -> &[RegionSeries] {
        &self.regions
    }

    pub fn get(&self, region: &str) -> Option<&RegionSeries> {
        self.index.get(region).map(|&idx| &self.regions[idx])
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Flatten back to `(instruction_count, region, value)` triples.
    pub fn triples(&self) -> Vec<(u64, &str, f64)> {
        self.regions
            .iter()
            .flat_map(|r| {
                r.samples
                    .iter()
                    .map(move |s| (s.instruction_count, r.region.as_str(), s.value))
            })
            .collect()
    }
}

/// Everything a replay tells us about one sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedSignals {
    /// Writes into executable memory, in emitted order.
    pub memory_write_events: Vec<MemoryWriteEvent>,
    pub entropy_series: EntropySeries,
    pub initial_entry_point: Option<EntryPoint>,
    pub unpacked_entry_point: Option<EntryPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_keeps_first_appearance_order() {
        let mut s = EntropySeries::new();
        s.push(".text", 10, 5.0);
        s.push("UPX0", 10, 0.5);
        s.push(".text", 20, 7.1);
        let names: Vec<_> = s.regions().iter().map(|r| r.region.as_str()).collect();
        assert_eq!(names, vec![".text", "UPX0"]);
        assert_eq!(s.get(".text").unwrap().instruction_counts(), vec![10, 20]);
        assert_eq!(s.get(".text").unwrap().values(), vec![5.0, 7.1]);
        assert!(s.get("missing").is_none());
    }

    #[test]
    fn wire_pairs_decode() {
        let e: MemoryWriteEvent = serde_json::from_str("[100, 4096]").unwrap();
        assert_eq!(e, MemoryWriteEvent { moment: 100, address: 4096 });

        let oep: EntryPoint = serde_json::from_str(r#"["UPX1", 4198400]"#).unwrap();
        assert_eq!(oep.region, "UPX1");
        assert_eq!(oep.address, OepAddress::Numeric(4198400));

        let oep: EntryPoint = serde_json::from_str(r#"[".text", "0x401000"]"#).unwrap();
        assert_eq!(oep.address.to_string(), "0x401000");
    }
}
