//! Centralized error types for attachment-relay.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the attachment-relay library.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The mailbox could not be reached or refused the credentials.
    #[error("Cannot connect to mailbox at {host}: {reason}")]
    Connection { host: String, reason: String },

    /// The mailbox date search failed.
    #[error("Mailbox search failed: {0}")]
    Search(String),

    /// A message could not be fetched from the mailbox.
    #[error("Failed to fetch message {id}: {reason}")]
    Fetch { id: u32, reason: String },

    /// No storage path can be decoded from the attachment filename.
    #[error("Malformed filename '{filename}': {reason}")]
    MalformedFilename { filename: String, reason: String },

    /// The object store rejected or failed an upload.
    #[error("Upload of '{key}' failed: {reason}")]
    Storage { key: String, reason: String },

    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A message body could not be parsed as MIME.
    #[error("MIME decoding error: {0}")]
    Mime(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, RelayError>`.
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Shorthand for a `MalformedFilename` error.
    pub fn malformed(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedFilename {
            filename: filename.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error ends the whole run rather than a single attachment.
    ///
    /// Malformed filenames and failed uploads are reported per attachment;
    /// everything else aborts.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::MalformedFilename { .. } | Self::Storage { .. }
        )
    }
}
