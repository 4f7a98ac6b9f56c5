use crate::archive::ArchiveError;
use crate::client::ClientError;
use crate::paths::PathIndexError;
use crate::sources::SourceMatchError;

/// Errors that abort a sync command.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("language '{0}' does not exist in the project")]
    LanguageNotFound(String),

    #[error("branch '{0}' was not found in the project")]
    BranchNotFound(String),

    #[error("this operation requires manager access to the project")]
    AccessDenied,

    #[error("build {build_id} ended with status '{status}'")]
    BuildFailed { build_id: u64, status: String },

    #[error("build {build_id} did not finish within {seconds}s")]
    BuildTimedOut { build_id: u64, seconds: u64 },

    #[error(transparent)]
    Remote(#[from] ClientError),

    #[error(transparent)]
    PathIndex(#[from] PathIndexError),

    #[error(transparent)]
    SourceMatch(#[from] SourceMatchError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl SyncError {
    pub fn io(path: impl std::fmt::Display, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }
}
