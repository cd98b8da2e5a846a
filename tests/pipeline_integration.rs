//! End-to-end batch scenarios with scripted emulation tools.

mod common;

use common::{ScriptedTools, Workspace, CLEAN_BLOB, PACKED_BLOB};
use packreplay::report::batch::BatchReport;
use packreplay::report::InconclusiveReason;
use packreplay::{PackReplayError, Pipeline, Verdict};
use std::fs;

#[test]
fn memcheck_packed_single_sample() {
    let ws = Workspace::new(&["sample.exe"]);
    let mut config = ws.config();
    config.signals.memcheck_enabled = true;

    let mut pipeline = Pipeline::new(&config, ScriptedTools::new(&[PACKED_BLOB]));
    let summary = pipeline.run().unwrap();

    assert_eq!(summary.packed, vec!["sample.exe".to_string()]);
    assert!(summary.not_packed.is_empty());
    assert_eq!(summary.packed_ratio, Some(1.0));
    assert_eq!(summary.not_packed_ratio, Some(0.0));
    assert_eq!(pipeline.batch().bucket(Verdict::Packed).len(), 1);

    let base = ws.output().join("packed/sample.exe");
    assert_eq!(
        fs::read_to_string(base.join("memcheck.txt")).unwrap(),
        "[[100, 4096]]"
    );
    assert_eq!(
        fs::read_to_string(base.join("UPX0_entropy.txt")).unwrap(),
        "[10, 500]\n[0.0, 6.9]\nFalse-4198400\nTrue-4096"
    );
}

#[test]
fn entropy_only_is_never_packed() {
    let ws = Workspace::new(&["sample.exe"]);
    let config = ws.config();
    assert!(!config.signals.memcheck_enabled);
    assert!(config.signals.entropy_enabled);

    let mut pipeline = Pipeline::new(&config, ScriptedTools::new(&[PACKED_BLOB]));
    let summary = pipeline.run().unwrap();

    assert!(summary.packed.is_empty());
    assert_eq!(summary.not_packed, vec!["sample.exe".to_string()]);
    assert!(ws
        .output()
        .join("not-packed/sample.exe/UPX1_entropy.txt")
        .exists());
    assert!(!ws.output().join("not-packed/sample.exe/memcheck.txt").exists());
}

#[test]
fn only_exe_names_are_processed() {
    let ws = Workspace::new(&["a.exe", "readme.txt", "b.exe.bak"]);
    let mut config = ws.config();
    config.signals.memcheck_enabled = true;

    let tools = ScriptedTools::new(&[PACKED_BLOB, CLEAN_BLOB]);
    let mut pipeline = Pipeline::new(&config, tools);
    let summary = pipeline.run().unwrap();

    assert_eq!(summary.total_classified, 2);
    assert_eq!(summary.packed, vec!["a.exe".to_string()]);
    assert_eq!(summary.not_packed, vec!["b.exe.bak".to_string()]);
}

#[test]
fn exhausted_sample_is_inconclusive_and_excluded() {
    let ws = Workspace::new(&["a.exe", "b.exe"]);
    let mut config = ws.config();
    config.signals.memcheck_enabled = true;

    // a.exe burns all three attempts, b.exe succeeds first time.
    let tools = ScriptedTools::new(&["ERROR", "ERROR", "ERROR", CLEAN_BLOB]);
    let mut pipeline = Pipeline::new(&config, tools);
    let summary = pipeline.run().unwrap();

    assert_eq!(summary.total_classified, 1);
    assert_eq!(summary.not_packed_ratio, Some(1.0));
    assert_eq!(summary.inconclusive.len(), 1);
    assert_eq!(summary.inconclusive[0].name, "a.exe");
    assert_eq!(
        summary.inconclusive[0].reason,
        InconclusiveReason::RetriesExhausted { attempts: 3 }
    );
    assert!(!ws.output().join("packed/a.exe").exists());
    assert!(!ws.output().join("not-packed/a.exe").exists());
}

#[test]
fn empty_batch_has_no_ratios() {
    let ws = Workspace::new(&["notes.txt"]);
    let config = ws.config();
    let mut pipeline = Pipeline::new(&config, ScriptedTools::new(&[]));
    let summary = pipeline.run().unwrap();
    assert!(summary.is_empty());
    assert_eq!(summary.packed_ratio, None);
}

#[test]
fn fatal_tool_aborts_whole_batch() {
    let ws = Workspace::new(&["a.exe", "b.exe"]);
    let config = ws.config();
    let mut tools = ScriptedTools::new(&[CLEAN_BLOB, CLEAN_BLOB]);
    tools.reader_code = 5;

    let mut pipeline = Pipeline::new(&config, tools);
    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, PackReplayError::FatalTool { code: 5, .. }));
    assert_eq!(err.exit_code(), 5);
    assert_eq!(pipeline.batch().total_classified(), 0);
    assert!(!ws.output().join("summary.json").exists());
}

#[test]
fn single_sample_override() {
    let ws = Workspace::new(&["a.exe", "b.exe"]);
    let mut config = ws.config();
    config.run.single_sample = Some("b.exe".to_string());

    let mut pipeline = Pipeline::new(&config, ScriptedTools::new(&[CLEAN_BLOB]));
    let summary = pipeline.run().unwrap();
    assert_eq!(summary.not_packed, vec!["b.exe".to_string()]);
}

#[test]
fn summary_json_lists_fingerprints() {
    let ws = Workspace::new(&["a.exe"]);
    let mut config = ws.config();
    config.signals.memcheck_enabled = true;

    let mut pipeline = Pipeline::new(&config, ScriptedTools::new(&["ERROR", PACKED_BLOB]));
    pipeline.run().unwrap();

    let text = fs::read_to_string(ws.output().join("summary.json")).unwrap();
    let report: BatchReport = serde_json::from_str(&text).unwrap();
    assert_eq!(report.samples.len(), 1);
    assert_eq!(report.samples[0].attempts, 2);
    assert_eq!(report.samples[0].verdict, Verdict::Packed);
    assert_eq!(report.samples[0].sha256.as_ref().map(String::len), Some(64));
}

#[test]
fn debug_mode_persists_tool_output() {
    let ws = Workspace::new(&["a.exe"]);
    let mut config = ws.config();
    config.run.debug = true;

    let mut pipeline = Pipeline::new(&config, ScriptedTools::new(&[CLEAN_BLOB]));
    pipeline.run().unwrap();

    let debug = ws.path().join("debug/a.exe");
    assert_eq!(
        fs::read_to_string(debug.join("run_panda.txt")).unwrap(),
        "recorded a.exe"
    );
    assert_eq!(
        fs::read_to_string(debug.join("read_replay.txt")).unwrap(),
        "replayed"
    );
}

#[test]
fn no_channel_configuration_is_rejected() {
    let ws = Workspace::new(&["a.exe"]);
    let mut config = ws.config();
    config.signals.entropy_enabled = false;
    let mut pipeline = Pipeline::new(&config, ScriptedTools::new(&[CLEAN_BLOB]));
    assert!(matches!(
        pipeline.run(),
        Err(PackReplayError::InvalidConfig(_))
    ));
}
