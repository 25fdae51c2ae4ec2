use burrow_diff::DiffError;
use burrow_merge::MergeError;
use burrow_store::StoreError;

/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// The path does not exist in the current tree.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// The path names a directory where a file was expected.
    #[error("not a file: {0}")]
    NotAFile(String),

    /// Another transaction already owns this branch; retry after it
    /// commits or aborts.
    #[error("transaction already in flight for branch '{0}'")]
    TransactionInFlight(String),

    /// The branch head changed between transaction start and commit.
    #[error("branch head moved during transaction on '{0}'")]
    HeadMoved(String),

    /// The repository has uncommitted changes that would be lost.
    #[error("pending changes; commit or discard them first")]
    PendingChanges,

    /// Chunk storage or object decoding failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Merge-base discovery or three-way merge failed.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// Tree diffing failed.
    #[error(transparent)]
    Diff(#[from] DiffError),

    /// Configuration could not be parsed or serialized.
    #[error("config error: {0}")]
    Config(String),
}

/// Result alias for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;
