use super::*;
use std::io::Write;

#[test]
fn test_default_config() {
    let config = Config::default();

    // Verify default output settings
    assert_eq!(config.output.format, OutputFormat::Pretty);
    assert_eq!(config.output.color, ColorChoice::Auto);
    assert_eq!(config.output.digest_length, 12);
    assert_eq!(config.output.timestamps, TimestampStyle::Relative);

    // Verify default network settings
    assert_eq!(config.network.timeout, 30);
    assert_eq!(config.network.max_idle_per_host, 10);
    assert!(config.network.insecure_registries.is_empty());
    assert_eq!(config.network.platform, "linux/amd64");

    // Verify default retry settings
    assert_eq!(config.retry.max_attempts, 4);
    assert_eq!(config.retry.base_delay_ms, 500);
    assert_eq!(config.retry.max_delay_ms, 8000);
}

#[test]
fn test_from_str_empty_yaml() {
    let config = Config::from_yaml_str("").unwrap();
    // Should be equivalent to default
    assert_eq!(config, Config::default());
}

#[test]
fn test_from_str_partial_yaml() {
    let yaml = r#"
output:
  format: json
retry:
  max_attempts: 6
"#;
    let config = Config::from_yaml_str(yaml).unwrap();

    // Check specified values
    assert_eq!(config.output.format, OutputFormat::Json);
    assert_eq!(config.retry.max_attempts, 6);

    // Check that other values are still default
    assert_eq!(config.output.color, ColorChoice::Auto);
    assert_eq!(config.retry.base_delay_ms, 500);
    assert_eq!(config.network.timeout, 30);
}

#[test]
fn test_from_str_full_yaml() {
    let yaml = r#"
output:
  format: yaml
  color: never
  digest_length: 8
  timestamps: both
network:
  timeout: 10
  max_idle_per_host: 2
  insecure_registries:
    - registry.internal:5000
  platform: linux/arm64
retry:
  max_attempts: 2
  base_delay_ms: 100
  max_delay_ms: 400
"#;
    let config = Config::from_yaml_str(yaml).unwrap();

    assert_eq!(config.output.format, OutputFormat::Yaml);
    assert_eq!(config.output.color, ColorChoice::Never);
    assert_eq!(config.output.digest_length, 8);
    assert_eq!(config.output.timestamps, TimestampStyle::Both);
    assert_eq!(config.network.timeout, 10);
    assert_eq!(config.network.max_idle_per_host, 2);
    assert_eq!(
        config.network.insecure_registries,
        vec!["registry.internal:5000".to_string()]
    );
    assert_eq!(config.network.platform, "linux/arm64");
    assert_eq!(config.retry.max_attempts, 2);
    assert_eq!(config.retry.base_delay_ms, 100);
    assert_eq!(config.retry.max_delay_ms, 400);
}

#[test]
fn test_from_str_invalid_yaml() {
    let yaml = "output: { format: invalid }";
    let result = Config::from_yaml_str(yaml);
    assert!(matches!(result, Err(RetagError::Config { .. })));
}

#[test]
fn test_deserialize_error_keeps_message_and_source() {
    let err = Config::from_yaml_str("retry: { max_attempts: many }").unwrap_err();

    match err {
        RetagError::Config {
            message,
            path,
            source,
        } => {
            assert_eq!(message, "Failed to deserialize configuration");
            assert!(path.is_none());
            assert!(source.is_some());
        }
        other => panic!("expected Config error, got {other:?}"),
    }
}

#[test]
fn test_from_str_unknown_field() {
    // config-rs should ignore unknown fields
    let result = Config::from_yaml_str("unknown_field: true");
    assert!(result.is_ok());
}

#[test]
fn test_load_without_path_returns_defaults() {
    let config = Config::load(None).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "retry:\n  max_attempts: 9").unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.retry.max_attempts, 9);
}

#[test]
fn test_load_missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.yaml");

    match Config::load(Some(&path)) {
        Err(RetagError::Config { path: Some(p), .. }) => {
            assert!(p.ends_with("missing.yaml"));
        }
        other => panic!("expected config error with path, got {:?}", other),
    }
}

#[test]
fn test_retry_policy_from_config() {
    let config = Config::from_yaml_str(
        "retry:\n  max_attempts: 3\n  base_delay_ms: 200\n  max_delay_ms: 1000",
    )
    .unwrap();

    let policy = config.retry_policy();
    assert_eq!(policy.max_attempts(), 3);
    assert_eq!(policy.delay_for(0), Duration::from_millis(200));
    assert_eq!(policy.delay_for(5), Duration::from_millis(1000));
}

#[test]
fn test_report_options_from_config() {
    let config =
        Config::from_yaml_str("output:\n  digest_length: 6\n  timestamps: absolute").unwrap();

    let options = config.report_options();
    assert_eq!(options.digest_length, 6);
    assert_eq!(options.timestamps, TimestampStyle::Absolute);
}
