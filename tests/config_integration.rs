use packreplay::config::*;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_pipeline_config_creation() {
    let config = PipelineConfig::default();

    assert!(!config.run.silent);
    assert!(!config.run.debug);
    assert_eq!(config.run.single_sample, None);
    assert_eq!(config.retry.max_tries, 3);
    assert_eq!(config.tools.iso_command[0], "genisoimage");
    assert_eq!(config.tools.reader_command.len(), 2);
}

#[test]
fn test_json_file_overrides_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"paths": {{"payload_dir": "/srv/samples"}}, "retry": {{"attempt_timeout_secs": 600}}}}"#
    )
    .unwrap();

    let config = PipelineConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.paths.payload_dir.to_str(), Some("/srv/samples"));
    assert_eq!(config.retry.attempt_timeout_secs, Some(600));
    assert_eq!(config.paths.result_file.to_str(), Some("replay_result.txt"));
}

#[test]
fn test_env_overrides_file() {
    let mut config = PipelineConfig {
        run: RunConfig {
            silent: false,
            debug: true,
            single_sample: Some("old.exe".into()),
        },
        ..PipelineConfig::default()
    };

    config.apply_env_with(|key| match key {
        ENV_SILENT => Some("True".into()),
        ENV_DEBUG => Some("False".into()),
        ENV_EXECUTABLE => Some("None".into()),
        _ => None,
    });

    assert!(config.run.silent);
    assert!(!config.run.debug);
    assert_eq!(config.run.single_sample, None);
}

#[test]
fn test_unset_env_leaves_values() {
    let mut config = PipelineConfig::default();
    config.signals.memcheck_enabled = true;
    config.apply_env_with(|_| None);
    assert!(config.signals.memcheck_enabled);
    assert!(config.signals.entropy_enabled);
}

#[test]
fn test_malformed_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();
    assert!(PipelineConfig::from_json_file(file.path()).is_err());
}
