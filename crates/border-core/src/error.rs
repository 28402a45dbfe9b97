//! Error types for border core types.

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while building or parsing core types.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Collection name is not part of the schema.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// Record could not be converted to or from JSON.
    #[error("invalid record: {0}")]
    InvalidRecord(#[from] serde_json::Error),
}
