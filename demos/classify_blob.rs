// Classify saved replay reader output without running the emulator.
use packreplay::classify::annotate_regions;
use packreplay::report::artifacts::format_region;
use packreplay::signals::{parse_blob, ReplayBlob};
use packreplay::{classify, SignalConfig};
use std::fs;

fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "samples/replay/upx_calc.txt".to_string());

    let text = fs::read_to_string(&path).expect("Failed to read replay output");
    let text = match ReplayBlob::from_text(text) {
        ReplayBlob::Sentinel => {
            println!("{path}: reader reported an error; nothing to classify");
            return;
        }
        ReplayBlob::Payload(text) => text,
    };

    let signals = parse_blob(&text).expect("Failed to decode replay output");
    let config = SignalConfig {
        memcheck_enabled: true,
        entropy_enabled: true,
    };

    println!("=== {path} ===");
    println!("Memory writes: {}", signals.memory_write_events.len());
    println!("Verdict: {}", classify(&signals, &config));

    for report in annotate_regions(&signals) {
        println!("\n[{}]", report.channel());
        println!("{}", format_region(&report));
    }
}
