use std::collections::{BTreeMap, HashMap};
use std::fmt;

use log::{debug, error};
use thiserror::Error;

use crate::config::presets::TrackerConfig;

/// Upper bound for the confirmation grace period
pub const MAX_GRACE_PERIOD_MS: u64 = 10 * 60 * 1000;

/// Pending timeouts shorter than this usually fire before finalization
pub const MIN_RECOMMENDED_TIMEOUT_MS: u64 = 30_000;

/// Error type for configuration validation issues
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Incompatible settings: {0}")]
    IncompatibleSettings(String),

    #[error("Value out of range: {0}")]
    ValueOutOfRange(String),
}

/// One failed rule
#[derive(Debug)]
pub struct ValidationIssue {
    pub rule: String,
    /// What the rule guarantees when it passes
    pub requirement: String,
    pub error: ConfigValidationError,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.rule, self.error, self.requirement)
    }
}

/// Outcome of running every rule against one configuration
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub issues: Vec<ValidationIssue>,
    /// Accepted, but likely to surprise
    pub warnings: Vec<String>,
    /// Setting name to advice, sorted by setting
    pub suggested_fixes: BTreeMap<String, String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// One line per issue, then its fixes and warnings
    pub fn summary(&self) -> String {
        let mut lines: Vec<String> = self.issues.iter().map(ToString::to_string).collect();
        lines.extend(
            self.suggested_fixes
                .iter()
                .map(|(setting, advice)| format!("fix {}: {}", setting, advice)),
        );
        lines.extend(self.warnings.iter().map(|warning| format!("warning: {}", warning)));
        if lines.is_empty() {
            "ok".to_string()
        } else {
            lines.join("\n")
        }
    }
}

/// Configuration validation rule
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, config: &TrackerConfig) -> Result<(), ConfigValidationError>;

    /// The guarantee a passing rule gives, shown alongside its failures
    fn description(&self) -> &str;

    /// Suggest a fix for validation failures
    fn suggest_fix(&self, config: &TrackerConfig) -> Option<HashMap<String, String>>;
}

/// Applies a set of rules to a tracker configuration
pub struct ConfigValidator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator {
    /// Create a validator with the default rules
    pub fn new() -> Self {
        let mut validator = Self { rules: Vec::new() };

        validator.add_rule(Box::new(GracePeriodRule));
        validator.add_rule(Box::new(PendingTimeoutRule));
        validator.add_rule(Box::new(ToastCapacityRule));

        validator
    }

    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Box<dyn ValidationRule>] {
        &self.rules
    }

    /// `(name, description)` of every rule, in evaluation order
    pub fn describe(&self) -> Vec<(&str, &str)> {
        self.rules
            .iter()
            .map(|rule| (rule.name(), rule.description()))
            .collect()
    }

    pub fn validate(&self, config: &TrackerConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        for rule in &self.rules {
            let Err(error) = rule.validate(config) else {
                debug!("Validation rule '{}' passed", rule.name());
                continue;
            };
            error!("Validation rule '{}' failed: {}", rule.name(), error);
            result
                .suggested_fixes
                .extend(rule.suggest_fix(config).unwrap_or_default());
            result.issues.push(ValidationIssue {
                rule: rule.name().to_string(),
                requirement: rule.description().to_string(),
                error,
            });
        }

        if let Some(timeout) = config.pending_timeout_ms {
            if timeout < MIN_RECOMMENDED_TIMEOUT_MS {
                result.warnings.push(format!(
                    "A pending timeout of {} ms may fail actions that would still finalize.",
                    timeout
                ));
            }
        }

        result
    }
}

/// Grace period must be positive and bounded
struct GracePeriodRule;

impl ValidationRule for GracePeriodRule {
    fn name(&self) -> &str {
        "GracePeriod"
    }

    fn validate(&self, config: &TrackerConfig) -> Result<(), ConfigValidationError> {
        if config.grace_period_ms == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "grace_period_ms must be greater than zero".to_string(),
            ));
        }
        if config.grace_period_ms > MAX_GRACE_PERIOD_MS {
            return Err(ConfigValidationError::ValueOutOfRange(format!(
                "grace_period_ms {} exceeds {}",
                config.grace_period_ms, MAX_GRACE_PERIOD_MS
            )));
        }
        Ok(())
    }

    fn description(&self) -> &str {
        "Confirmed entries expire after a positive, bounded delay"
    }

    fn suggest_fix(&self, _config: &TrackerConfig) -> Option<HashMap<String, String>> {
        let mut fixes = HashMap::new();
        fixes.insert(
            "grace_period_ms".to_string(),
            "Use the default of 5000 ms".to_string(),
        );
        Some(fixes)
    }
}

/// A pending timeout must not fire before a confirmation could be shown
struct PendingTimeoutRule;

impl ValidationRule for PendingTimeoutRule {
    fn name(&self) -> &str {
        "PendingTimeout"
    }

    fn validate(&self, config: &TrackerConfig) -> Result<(), ConfigValidationError> {
        match config.pending_timeout_ms {
            Some(timeout) if timeout <= config.grace_period_ms => {
                Err(ConfigValidationError::IncompatibleSettings(format!(
                    "pending_timeout_ms {} must exceed grace_period_ms {}",
                    timeout, config.grace_period_ms
                )))
            }
            _ => Ok(()),
        }
    }

    fn description(&self) -> &str {
        "A pending timeout, when set, outlasts the grace period"
    }

    fn suggest_fix(&self, config: &TrackerConfig) -> Option<HashMap<String, String>> {
        let mut fixes = HashMap::new();
        fixes.insert(
            "pending_timeout_ms".to_string(),
            format!(
                "Unset it or raise it above {} ms",
                config.grace_period_ms.max(MIN_RECOMMENDED_TIMEOUT_MS)
            ),
        );
        Some(fixes)
    }
}

struct ToastCapacityRule;

impl ValidationRule for ToastCapacityRule {
    fn name(&self) -> &str {
        "ToastCapacity"
    }

    fn validate(&self, config: &TrackerConfig) -> Result<(), ConfigValidationError> {
        if config.toasts.max_visible == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "toasts.max_visible must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn description(&self) -> &str {
        "At least one toast is visible"
    }

    fn suggest_fix(&self, _config: &TrackerConfig) -> Option<HashMap<String, String>> {
        let mut fixes = HashMap::new();
        fixes.insert("toasts.max_visible".to_string(), "Use 5".to_string());
        Some(fixes)
    }
}
