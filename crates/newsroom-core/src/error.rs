use thiserror::Error;

/// Application-wide error types for Newsroom.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The document is neither a valid RSS nor Atom feed.
    #[error("Feed parse error: {0}")]
    FeedParseError(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// The source registry could not be materialized in the store.
    #[error("Source seeding failed: {0}")]
    SeedError(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The operation was cancelled (process shutdown).
    #[error("Operation cancelled")]
    Cancelled,

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true for failures that belong to a single source fetch
    /// (network, HTTP status, malformed feed, timeout).
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            AppError::HttpError(_)
                | AppError::NetworkError(_)
                | AppError::Timeout(_)
                | AppError::FeedParseError(_)
        )
    }
}
