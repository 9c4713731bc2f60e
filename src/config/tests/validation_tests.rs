use crate::config::presets::{ResolutionPolicy, TrackerConfig};
use crate::config::validation::ConfigValidator;

#[test]
fn test_validator_creation() {
    let validator = ConfigValidator::new();
    assert_eq!(validator.rules().len(), 3, "Validator should have the default rules");
}

#[test]
fn test_default_config_is_valid() {
    let result = ConfigValidator::new().validate(&TrackerConfig::default());
    assert!(result.is_valid(), "Default config should be valid");
    assert!(result.warnings.is_empty());
    assert_eq!(result.summary(), "ok");
}

#[test]
fn test_strict_preset() {
    let config = TrackerConfig::strict();
    assert_eq!(config.resolution_policy, ResolutionPolicy::LatestSubmissionWins);
    assert_eq!(config.grace_period_ms, 5_000);

    let result = ConfigValidator::new().validate(&config);
    assert!(result.is_valid(), "Strict preset should be valid");
}

#[test]
fn test_zero_grace_period_rejected() {
    let config = TrackerConfig {
        grace_period_ms: 0,
        ..TrackerConfig::default()
    };
    let result = ConfigValidator::new().validate(&config);
    assert!(!result.is_valid());
    assert!(result.suggested_fixes.contains_key("grace_period_ms"));
}

#[test]
fn test_timeout_shorter_than_grace_period_rejected() {
    let config = TrackerConfig {
        grace_period_ms: 10_000,
        pending_timeout_ms: Some(8_000),
        ..TrackerConfig::default()
    };
    let result = ConfigValidator::new().validate(&config);
    assert!(!result.is_valid());
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].rule, "PendingTimeout");
    assert!(result
        .summary()
        .starts_with("[PendingTimeout] Incompatible settings: pending_timeout_ms 8000 must exceed grace_period_ms 10000"));
}

#[test]
fn test_short_timeout_only_warns() {
    let config = TrackerConfig {
        pending_timeout_ms: Some(10_000),
        ..TrackerConfig::default()
    };
    let result = ConfigValidator::new().validate(&config);
    assert!(result.is_valid());
    assert_eq!(result.warnings.len(), 1);
    assert!(result.summary().starts_with("warning: A pending timeout of 10000 ms"));
}

#[test]
fn test_zero_visible_toasts_rejected() {
    let mut config = TrackerConfig::default();
    config.toasts.max_visible = 0;
    assert!(!ConfigValidator::new().validate(&config).is_valid());
}

#[test]
fn test_failures_carry_rule_description() {
    let config = TrackerConfig {
        grace_period_ms: 0,
        ..TrackerConfig::default()
    };
    let result = ConfigValidator::new().validate(&config);

    let issue = &result.issues[0];
    assert_eq!(issue.rule, "GracePeriod");
    assert_eq!(issue.requirement, "Confirmed entries expire after a positive, bounded delay");
    assert!(result
        .summary()
        .contains("fix grace_period_ms: Use the default of 5000 ms"));
}

#[test]
fn test_describe_lists_rules_in_order() {
    let validator = ConfigValidator::new();
    let names: Vec<&str> = validator
        .describe()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["GracePeriod", "PendingTimeout", "ToastCapacity"]);
}
