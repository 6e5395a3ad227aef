//! Error types for file-based logging

use std::io;
use std::path::PathBuf;

/// Result type for file logger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during file logging
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation on the active file or the log directory failed
    #[error("{0}")]
    Io(&'static str, #[source] io::Error),

    /// Failed to create log directory
    #[error("Failed to create log directory at {path}: {source}")]
    CreateDirectory {
        /// The path that failed to be created
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// The filename template is invalid or rendered an unusable name
    #[error("Invalid filename template: {0}")]
    Template(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Archiving a rotated-out file failed; the rotation itself completed
    #[error("Failed to archive {path}: {source}")]
    Archive {
        /// The rotated-out file that was being archived
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// Updating the latest link failed; the rotation itself completed
    #[error("Failed to update latest link at {path}: {source}")]
    Link {
        /// The link path
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// The logger was closed
    #[error("File logger is closed")]
    Closed,

    /// The rotation scheduler was started outside a tokio runtime
    #[error("No tokio runtime available to drive the rotation scheduler")]
    NoRuntime,
}

impl Error {
    /// Whether this error comes from invalid configuration (only raised at construction).
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(
            self,
            Self::CreateDirectory { .. } | Self::Template(_) | Self::Configuration(_)
        )
    }

    /// Whether this error leaves the rotation it was raised from completed.
    #[must_use]
    pub const fn is_non_fatal(&self) -> bool {
        matches!(self, Self::Archive { .. } | Self::Link { .. })
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Io(_, source)
            | Error::CreateDirectory { source, .. }
            | Error::Archive { source, .. }
            | Error::Link { source, .. } => source.kind(),
            Error::Template(_) | Error::Configuration(_) => io::ErrorKind::InvalidInput,
            Error::Closed | Error::NoRuntime => io::ErrorKind::Other,
        };
        Self::new(kind, err)
    }
}
