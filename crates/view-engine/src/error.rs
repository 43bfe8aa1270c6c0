//! View engine error types.

use document_store::StoreError;
use thiserror::Error;

/// Errors that can occur while building, rebuilding, or reading views.
#[derive(Debug, Error)]
pub enum ViewError {
    /// A view definition is malformed: unknown operator or test marker,
    /// empty names, zero limits, reserved summary names.
    #[error("Configuration error in view '{view}': {message}")]
    Configuration { view: String, message: String },

    /// The engine settings themselves are invalid.
    #[error("Invalid engine configuration: {0}")]
    InvalidEngineConfig(String),

    /// A store read failed while resolving a view's sources.
    #[error("Failed to resolve view '{view}': {source}")]
    Resolution {
        view: String,
        #[source]
        source: StoreError,
    },

    /// A store write failed while persisting a view's cache.
    #[error("Failed to write cache for view '{view}': {source}")]
    Write {
        view: String,
        #[source]
        source: StoreError,
    },

    /// No view with this name is configured.
    #[error("Unknown view: {0}")]
    UnknownView(String),

    /// The view definition file is not valid JSON for the expected shape.
    #[error("Invalid view definition file: {0}")]
    Definition(#[from] serde_json::Error),

    /// The view definition file could not be read.
    #[error("Failed to read view definition file: {0}")]
    Io(#[from] std::io::Error),

    /// A cache read failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ViewError {
    /// Builds a configuration error for `view`.
    pub fn configuration(view: impl Into<String>, message: impl Into<String>) -> Self {
        ViewError::Configuration {
            view: view.into(),
            message: message.into(),
        }
    }

    /// Returns the view this error concerns, when there is one.
    pub fn view(&self) -> Option<&str> {
        match self {
            ViewError::Configuration { view, .. }
            | ViewError::Resolution { view, .. }
            | ViewError::Write { view, .. } => Some(view),
            ViewError::UnknownView(view) => Some(view),
            _ => None,
        }
    }
}

/// Result type for view engine operations.
pub type Result<T> = std::result::Result<T, ViewError>;
