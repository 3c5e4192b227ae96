//! Error types for the advisory reconciler

use thiserror::Error;

/// Result type alias for reconciler operations
pub type Result<T> = std::result::Result<T, ReconcilerError>;

/// Main error type for reconciler operations
///
/// Lifecycle handlers treat every variant as a soft stop: the failure is
/// reported through the output sink and the host's install/update continues.
#[derive(Error, Debug)]
pub enum ReconcilerError {
    #[error("audit command unavailable or produced no output")]
    AuditUnavailable,

    #[error("failed to parse audit JSON: {0}")]
    AuditParse(#[source] serde_json::Error),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ReconcilerError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
