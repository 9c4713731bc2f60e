use std::io::Write;

use crate::config::loader::{load_config, parse_config, ConfigError};
use crate::config::presets::{ResolutionPolicy, TrackerConfig};

#[test]
fn test_parse_partial_document_keeps_defaults() {
    let config = parse_config(
        r#"
        grace_period_ms = 3000

        [toasts]
        max_visible = 3
        "#,
    )
    .unwrap();

    assert_eq!(config.grace_period_ms, 3_000);
    assert_eq!(config.pending_timeout_ms, None);
    assert_eq!(config.resolution_policy, ResolutionPolicy::LastResolvedWins);
    assert_eq!(config.toasts.max_visible, 3);
    assert_eq!(config.toasts.success_ttl_ms, 5_000);
}

#[test]
fn test_parse_policy_and_timeout() {
    let config = parse_config(
        r#"
        pending_timeout_ms = 60000
        resolution_policy = "LatestSubmissionWins"
        "#,
    )
    .unwrap();

    assert_eq!(config.pending_timeout_ms, Some(60_000));
    assert_eq!(config.resolution_policy, ResolutionPolicy::LatestSubmissionWins);
}

#[test]
fn test_parse_rejects_invalid_values() {
    let err = parse_config("grace_period_ms = 0").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "grace_period_ms = 7000").unwrap();

    let config = load_config(Some(file.path())).unwrap();
    assert_eq!(config.grace_period_ms, 7_000);
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    let err = load_config(Some(&missing)).unwrap_err();
    assert!(matches!(err, ConfigError::Load(_)));
}

#[test]
fn test_config_round_trips_through_toml() {
    let config = TrackerConfig::strict();
    let rendered = toml::to_string(&config).unwrap();
    assert_eq!(parse_config(&rendered).unwrap(), config);
}
