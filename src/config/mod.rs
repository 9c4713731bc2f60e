// Tracker configuration: presets, validation and layered loading

pub mod loader;
pub mod presets;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use presets::{ResolutionPolicy, ToastConfig, TrackerConfig};
pub use validation::{
    ConfigValidationError, ConfigValidator, ValidationIssue, ValidationResult, ValidationRule,
};

#[cfg(test)]
mod tests;
