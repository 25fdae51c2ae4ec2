use burrow_store::StoreError;

/// Errors from diff computation.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// Reading a tree object from storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for diff operations.
pub type DiffResult<T> = Result<T, DiffError>;
