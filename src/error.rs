//! Error types for the Cozmo assistant

use thiserror::Error;

/// Result type alias for Cozmo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Cozmo assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Hosted model returned an error or an unusable response
    #[error("model error: {0}")]
    Model(String),

    /// Tool dispatch or execution error
    #[error("tool error: {0}")]
    Tool(String),

    /// Agent loop error
    #[error("agent error: {0}")]
    Agent(String),

    /// User input could not be interpreted
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Vision capture error
    #[error("vision error: {0}")]
    Vision(String),

    /// Image generation error
    #[error("image error: {0}")]
    Image(String),

    /// The in-flight turn was cancelled by the user
    #[error("request aborted")]
    Aborted,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Unique constraint violated (duplicate username or email)
    #[error("already exists: {0}")]
    Conflict(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Authentication/authorization error
    #[error("auth error: {0}")]
    Auth(String),
}

impl Error {
    /// Whether this error represents a user-initiated abort
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}
