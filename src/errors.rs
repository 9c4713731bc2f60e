use std::fmt;
use std::io;

use thiserror::Error;

use crate::chain::ChainError;
use crate::config::ConfigError;

/// Precondition failures raised by the tracker before any entry is created
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("Wallet not connected")]
    NotConnected,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("No failed action to retry for {0}")]
    UnknownEntry(String),
}

#[derive(Debug)]
pub enum BlueHoleError {
    Tracker(TrackerError),
    Chain(ChainError),
    Config(ConfigError),
    Serialization(String),
    IoError(io::Error),
}

impl From<TrackerError> for BlueHoleError {
    fn from(err: TrackerError) -> Self {
        BlueHoleError::Tracker(err)
    }
}

impl From<ChainError> for BlueHoleError {
    fn from(err: ChainError) -> Self {
        BlueHoleError::Chain(err)
    }
}

impl From<ConfigError> for BlueHoleError {
    fn from(err: ConfigError) -> Self {
        BlueHoleError::Config(err)
    }
}

impl From<serde_json::Error> for BlueHoleError {
    fn from(err: serde_json::Error) -> Self {
        BlueHoleError::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for BlueHoleError {
    fn from(err: toml::ser::Error) -> Self {
        BlueHoleError::Serialization(err.to_string())
    }
}

impl From<io::Error> for BlueHoleError {
    fn from(err: io::Error) -> Self {
        BlueHoleError::IoError(err)
    }
}

impl fmt::Display for BlueHoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlueHoleError::Tracker(err) => write!(f, "Tracker error: {}", err),
            BlueHoleError::Chain(err) => write!(f, "Chain error: {}", err),
            BlueHoleError::Config(err) => write!(f, "Configuration error: {}", err),
            BlueHoleError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            BlueHoleError::IoError(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for BlueHoleError {}

pub type Result<T> = std::result::Result<T, BlueHoleError>;
