use thiserror::Error;

/// Top-level error type for medvid.
///
/// Storage and fetch failures carry the underlying driver or HTTP message as
/// text so that subsystem crates can convert with `?` without exposing their
/// dependencies through this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MedvidError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to connect to database after {attempts} attempts: {message}")]
    Connection { attempts: u32, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Video not found: {0}")]
    NotFound(String),

    #[error("Fetch returned no videos")]
    NoResults,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for MedvidError {
    fn from(err: toml::de::Error) -> Self {
        MedvidError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for MedvidError {
    fn from(err: serde_json::Error) -> Self {
        MedvidError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for medvid operations.
pub type Result<T> = std::result::Result<T, MedvidError>;
