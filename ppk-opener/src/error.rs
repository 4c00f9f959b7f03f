//! Error types for ppk-opener
//!
//! Every failure of a scan cycle maps to one variant. The front end still
//! collapses them into a single status line, but callers can decide whether
//! a retry makes sense with [`Error::is_retryable`].

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ppk-opener
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Camera/reader access refused; the scanner never launched
    #[error("Scanner permission denied: {0}")]
    PermissionDenied(String),

    /// No network, DNS failure, TLS failure, timeout
    #[error("{0}")]
    Transport(String),

    /// Server answered with a non-success status
    #[error("{code} - {message}")]
    HttpStatus { code: u16, message: String },

    /// Response body is not the expected JSON shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Response payload is not valid base64
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Payload is not a readable ZIP archive
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// Archive entry would escape the extraction directory
    #[error("Unsafe archive entry: {0}")]
    UnsafeEntry(String),

    /// Expected audio entry not present in the archive
    #[error("No audio file found")]
    MissingAudio { expected: String },

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Playback could not be started or failed mid-stream
    #[error("Playback error: {0}")]
    Playback(String),

    /// A scan cycle is already in flight
    #[error("A scan cycle is already in progress")]
    Busy,

    /// File I/O errors
    #[error("File I/O error at {path}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Other I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Background task failed to complete
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FileIo {
            path: path.into(),
            source,
        }
    }

    /// Whether repeating the same cycle can reasonably succeed.
    ///
    /// Transient network conditions, server-side failures, throttling and an
    /// in-flight cycle are retryable. Bad payloads, missing audio and local
    /// faults are terminal for the scanned code.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) | Error::Busy | Error::PermissionDenied(_) => true,
            Error::HttpStatus { code, .. } => *code == 408 || *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

impl From<ppk_common::Error> for Error {
    fn from(err: ppk_common::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Convenience Result type using ppk-opener Error
pub type Result<T> = std::result::Result<T, Error>;
