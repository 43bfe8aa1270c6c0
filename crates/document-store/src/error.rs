use thiserror::Error;

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored payload is not a JSON object.
    #[error("Invalid document {0}: payload must be a JSON object")]
    InvalidDocument(String),

    /// The backend refused or could not serve the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while building predicates from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateError {
    /// The operator token is not one of `==`, `!=`, `>`, `array-contains`.
    #[error("Unknown predicate operator: {0:?}")]
    UnknownOperator(String),
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
