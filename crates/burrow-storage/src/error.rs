use burrow_crypto::FilterError;
use burrow_repo::RepoError;

/// Errors from the storage-view layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The path does not exist (neither buffered nor in the database).
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// A stored value does not decode as the requested type.
    #[error("invalid value at {0}")]
    InvalidValue(String),

    /// Encrypt/decrypt filter failure, surfaced as an I/O-class error.
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    /// The backing database failed.
    #[error(transparent)]
    Database(#[from] RepoError),
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
