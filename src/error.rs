//! Error types for the harvester.
//!
//! Every failure the harvester can report maps onto one variant here. The
//! engine and orchestrator use [`HarvestError::kind`] when they need the
//! abstract kind (summaries, `_errors.log`), and [`HarvestError::is_retryable`]
//! when deciding whether a fetch may be attempted again.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("No plugin registered for '{0}'")]
    PluginNotFound(String),
    #[error("HTTP {status} for {url}")]
    ClientError { status: u16, url: String },
    #[error("Rate limited by {url}")]
    RateLimited {
        url: String,
        retry_after: Option<Duration>,
    },
    #[error("Transient failure for {url}: {reason}")]
    Transient { url: String, reason: String },
    #[error("Unreachable after {attempts} attempts: {url}")]
    Unreachable {
        url: String,
        attempts: u32,
        /// Server-requested wait left over from a final 429.
        retry_after: Option<Duration>,
    },
    #[error("Failed to parse {field}: {reason}")]
    Parse { field: String, reason: String },
    #[error("Date range exceeded: {0}")]
    DateRangeExceeded(String),
    #[error("Invalid delay: {0}")]
    InvalidDelay(String),
    #[error("Site '{0}' is locked by another process")]
    Locked(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Cancelled")]
    Cancelled,
    #[error("Browser error: {0}")]
    Browser(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl HarvestError {
    /// Abstract error kind, stable across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            HarvestError::InvalidConfig(_) => "invalid_config",
            HarvestError::PluginNotFound(_) => "plugin_not_found",
            HarvestError::ClientError { .. } => "client_error",
            HarvestError::RateLimited { .. } => "rate_limited",
            HarvestError::Transient { .. } => "transient",
            HarvestError::Unreachable { .. } => "unreachable",
            HarvestError::Parse { .. } => "parse_error",
            HarvestError::DateRangeExceeded(_) => "date_range_exceeded",
            HarvestError::InvalidDelay(_) => "invalid_delay",
            HarvestError::Locked(_) => "locked",
            HarvestError::Timeout(_) => "timeout",
            HarvestError::Cancelled => "cancelled",
            HarvestError::Browser(_) => "browser",
            HarvestError::Io(_) => "io",
            HarvestError::Json(_) | HarvestError::Yaml(_) | HarvestError::Toml(_) => {
                "invalid_config"
            }
        }
    }

    /// Whether another attempt at the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HarvestError::RateLimited { .. } | HarvestError::Transient { .. }
        )
    }

    /// Errors that must abort startup rather than a single site.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            HarvestError::DateRangeExceeded(_) | HarvestError::InvalidDelay(_)
        )
    }

    /// Wait the server asked for before the next request, if any.
    pub fn server_wait(&self) -> Option<Duration> {
        match self {
            HarvestError::RateLimited { retry_after, .. }
            | HarvestError::Unreachable { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn parse(field: &str, reason: impl Into<String>) -> Self {
        HarvestError::Parse {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;
