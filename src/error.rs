use thiserror::Error;

/// Main error type for Newsgraph
#[derive(Error, Debug)]
pub enum NewsgraphError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// News API non-success response or network failure
    #[error("Upstream fetch error: {0}")]
    UpstreamFetch(String),

    /// Seed company blank or whitespace-only
    #[error("Company name must not be empty")]
    EmptyInput,

    /// Sentiment classifier or entity extractor failed
    #[error("Model inference error: {0}")]
    ModelInference(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Graph rendering errors
    #[error("Render error: {0}")]
    Render(String),
}

/// Convenient Result type using NewsgraphError
pub type Result<T> = std::result::Result<T, NewsgraphError>;
