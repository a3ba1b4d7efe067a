//! Error types for dzr core

use thiserror::Error;

/// Result type alias for resolution and streaming operations
pub type Result<T> = std::result::Result<T, Error>;

/// Resolution and streaming error types
#[derive(Error, Debug)]
pub enum Error {
    // Session errors
    #[error("Login required: {0}")]
    Auth(String),

    /// The service rejected the session token. Triggers the one-shot refresh.
    #[error("Invalid session token")]
    InvalidSession,

    // Resolution errors
    #[error("No playable source for track {track_id}: {reason}")]
    Resolution { track_id: String, reason: String },

    #[error("Service error: {0}")]
    Api(String),

    // Streaming errors
    #[error("Stream reset after {attempts} attempt(s): {reason}")]
    TransientStream { attempts: u32, reason: String },

    #[error("Stream integrity violated: {0}")]
    Integrity(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a resolution error for a track
    pub fn resolution(track_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Resolution {
            track_id: track_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a stream reset error for a single attempt
    pub fn stream_reset(reason: impl Into<String>) -> Self {
        Error::TransientStream {
            attempts: 1,
            reason: reason.into(),
        }
    }

    /// Returns true if the stream pipeline may restart after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::TransientStream { .. })
    }

    /// Returns the error code for logging and consumers
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Auth(_) => "AUTH",
            Error::InvalidSession => "INVALID_SESSION",
            Error::Resolution { .. } => "RESOLUTION",
            Error::Api(_) => "API",
            Error::TransientStream { .. } => "STREAM_RESET",
            Error::Integrity(_) => "INTEGRITY",
            Error::Network(_) => "NETWORK",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::Json(_) => "MALFORMED",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Io(_) => "IO",
        }
    }

    /// Kind this error carries when surfaced through `io::Error`
    pub fn io_kind(&self) -> std::io::ErrorKind {
        use std::io::ErrorKind;

        match self {
            Error::Io(err) => err.kind(),
            Error::TransientStream { .. } => ErrorKind::ConnectionReset,
            Error::Integrity(_) => ErrorKind::InvalidData,
            _ => ErrorKind::Other,
        }
    }

    /// Convert into an `io::Error` for byte-stream consumers, keeping the
    /// original error as the source.
    pub fn into_io(self) -> std::io::Error {
        match self {
            Error::Io(err) => err,
            other => std::io::Error::new(other.io_kind(), other),
        }
    }
}
