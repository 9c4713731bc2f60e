use std::path::Path;

use log::{info, warn};
use thiserror::Error;

use crate::config::presets::TrackerConfig;
use crate::config::validation::ConfigValidator;

/// Prefix for environment overrides, e.g. `BLUEHOLE_GRACE_PERIOD_MS`
pub const ENV_PREFIX: &str = "BLUEHOLE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Load the tracker configuration.
///
/// Defaults are overlaid by the optional TOML file, then by `BLUEHOLE_*`
/// environment variables (`__` separates nested keys). The result is
/// validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<TrackerConfig, ConfigError> {
    let mut builder = ::config::Config::builder();

    if let Some(path) = path {
        info!("Loading configuration from {}", path.display());
        builder = builder.add_source(
            ::config::File::from(path)
                .format(::config::FileFormat::Toml)
                .required(true),
        );
    }

    builder = builder.add_source(
        ::config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config: TrackerConfig = builder.build()?.try_deserialize()?;
    validate(config)
}

/// Parse a TOML document into a validated configuration
pub fn parse_config(toml_source: &str) -> Result<TrackerConfig, ConfigError> {
    let config: TrackerConfig = ::config::Config::builder()
        .add_source(::config::File::from_str(toml_source, ::config::FileFormat::Toml))
        .build()?
        .try_deserialize()?;
    validate(config)
}

fn validate(config: TrackerConfig) -> Result<TrackerConfig, ConfigError> {
    let result = ConfigValidator::new().validate(&config);
    if !result.is_valid() {
        return Err(ConfigError::Invalid(result.summary()));
    }
    for warning in &result.warnings {
        warn!("{}", warning);
    }
    Ok(config)
}
