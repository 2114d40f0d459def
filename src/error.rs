//! Error types for backr
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur while running a backup model
#[derive(Debug, Error)]
pub enum BackrError {
    /// A stage section is missing a required field or names an unknown type
    #[error("Config error: model {model}: {field}: {message}")]
    Config {
        model: String,
        field: String,
        message: String,
    },

    /// An external command or upload failed
    #[error("Execution error: {0}")]
    Execution(String),

    /// Retention ledger could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Notifier delivery failed
    #[error("Notify error: {0}")]
    Notify(String),

    /// A stage panicked while the content path was running
    #[error("Run fault: {0}")]
    Fault(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackrError {
    /// Build a configuration error for `model`'s `field`.
    pub fn config(model: impl Into<String>, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            model: model.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// True for errors that come from configuration rather than execution.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

/// Result type alias for backr operations
pub type Result<T> = std::result::Result<T, BackrError>;
