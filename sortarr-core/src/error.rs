use std::path::PathBuf;

use thiserror::Error;

use crate::config::MediaFilter;
use crate::file_ops::FileOpError;
use crate::gateway::GatewayError;

/// Why a single sort job did not end up in the library.
///
/// Every variant is local to one job except [`GatewayError::Unavailable`],
/// which means the provider can no longer be used for the rest of the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SortError {
    #[error("no usable title in '{0}'")]
    ParseAmbiguous(String),

    #[error("no match found for '{0}'")]
    NoMatch(String),

    #[error("excluded by the '{0}' media filter")]
    Filtered(MediaFilter),

    #[error("skipped by user")]
    UserSkipped,

    #[error("stop requested while waiting for a decision")]
    Interrupted,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("incomplete metadata: {0}")]
    IncompleteMetadata(String),

    #[error("destination already exists: {}", .0.display())]
    DestinationConflict(PathBuf),

    #[error("file operation failed on {}: {message}", .path.display())]
    FileOperation { path: PathBuf, message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

/// Flat classification of [`SortError`], used for reporting and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ParseAmbiguous,
    NoMatch,
    Filtered,
    UserSkipped,
    Interrupted,
    Timeout,
    Transport,
    NotFound,
    Unexpected,
    ProviderUnavailable,
    IncompleteMetadata,
    DestinationConflict,
    FileOperation,
    Internal,
}

impl SortError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SortError::ParseAmbiguous(_) => ErrorKind::ParseAmbiguous,
            SortError::NoMatch(_) => ErrorKind::NoMatch,
            SortError::Filtered(_) => ErrorKind::Filtered,
            SortError::UserSkipped => ErrorKind::UserSkipped,
            SortError::Interrupted => ErrorKind::Interrupted,
            SortError::Gateway(GatewayError::Timeout { .. }) => ErrorKind::Timeout,
            SortError::Gateway(GatewayError::Transport { .. }) => ErrorKind::Transport,
            SortError::Gateway(GatewayError::NotFound { .. }) => ErrorKind::NotFound,
            SortError::Gateway(GatewayError::Unexpected { .. }) => ErrorKind::Unexpected,
            SortError::Gateway(GatewayError::Unavailable { .. }) => {
                ErrorKind::ProviderUnavailable
            }
            SortError::IncompleteMetadata(_) => ErrorKind::IncompleteMetadata,
            SortError::DestinationConflict(_) => ErrorKind::DestinationConflict,
            SortError::FileOperation { .. } => ErrorKind::FileOperation,
            SortError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Skips leave the job `Skipped`; everything else leaves it `Failed`.
    pub fn is_skip(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ParseAmbiguous
                | ErrorKind::NoMatch
                | ErrorKind::Filtered
                | ErrorKind::UserSkipped
                | ErrorKind::Interrupted
        )
    }

    pub fn aborts_batch(&self) -> bool {
        self.kind() == ErrorKind::ProviderUnavailable
    }
}

impl From<FileOpError> for SortError {
    fn from(err: FileOpError) -> Self {
        match err {
            FileOpError::DestinationExists(path) => SortError::DestinationConflict(path),
            FileOpError::Io { path, source } => SortError::FileOperation {
                path,
                message: source.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, SortError>;
