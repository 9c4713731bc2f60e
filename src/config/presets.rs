use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a resolution is applied when the entry has been re-armed since it was submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionPolicy {
    /// Whichever submission resolves last sets the visible state
    LastResolvedWins,
    /// Resolutions of superseded submissions are ignored
    LatestSubmissionWins,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        ResolutionPolicy::LastResolvedWins
    }
}

impl fmt::Display for ResolutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionPolicy::LastResolvedWins => write!(f, "LastResolvedWins"),
            ResolutionPolicy::LatestSubmissionWins => write!(f, "LatestSubmissionWins"),
        }
    }
}

/// Transaction toast settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToastConfig {
    /// Maximum number of toasts visible at once
    pub max_visible: usize,
    /// Auto-dismiss delay for success toasts, 0 keeps them until dismissed
    pub success_ttl_ms: u64,
}

impl Default for ToastConfig {
    fn default() -> Self {
        Self {
            max_visible: 5,
            success_ttl_ms: 5_000,
        }
    }
}

impl ToastConfig {
    pub fn success_ttl(&self) -> Option<Duration> {
        (self.success_ttl_ms > 0).then(|| Duration::from_millis(self.success_ttl_ms))
    }
}

/// Tracker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// How long a confirmed entry stays visible
    pub grace_period_ms: u64,

    /// Fail entries still pending after this long. Unset waits forever.
    pub pending_timeout_ms: Option<u64>,

    pub resolution_policy: ResolutionPolicy,

    pub toasts: ToastConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 5_000,
            pending_timeout_ms: None,
            resolution_policy: ResolutionPolicy::LastResolvedWins,
            toasts: ToastConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Sequence-guarded resolutions and a two minute pending timeout
    pub fn strict() -> Self {
        Self {
            pending_timeout_ms: Some(120_000),
            resolution_policy: ResolutionPolicy::LatestSubmissionWins,
            ..Self::default()
        }
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn pending_timeout(&self) -> Option<Duration> {
        self.pending_timeout_ms.map(Duration::from_millis)
    }
}
