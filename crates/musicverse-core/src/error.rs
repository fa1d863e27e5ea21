//! Error types for MusicVerse Studio.

use thiserror::Error;

/// Main error type for studio operations.
#[derive(Error, Debug)]
pub enum StudioError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Audio decode error: {0}")]
    AudioDecode(String),

    #[error("Worker communication error: {0}")]
    WorkerCommunication(String),

    /// The worker answered a request with an error response.
    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse error category, stable across payload changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    InvalidArgument,
    AudioDecode,
    WorkerCommunication,
    Worker,
    MalformedSnapshot,
    Serialization,
}

impl StudioError {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::AudioDecode(_) => ErrorKind::AudioDecode,
            Self::WorkerCommunication(_) => ErrorKind::WorkerCommunication,
            Self::Worker(_) => ErrorKind::Worker,
            Self::MalformedSnapshot(_) => ErrorKind::MalformedSnapshot,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }
}

/// Result type alias for studio operations.
pub type Result<T> = std::result::Result<T, StudioError>;
