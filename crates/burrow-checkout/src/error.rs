use burrow_storage::StorageError;

/// Errors from working-tree synchronization.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// The storage layer failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Filesystem I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted index entry could not be decoded.
    #[error("corrupt index entry at {path}: {reason}")]
    CorruptIndexEntry { path: String, reason: String },
}

/// Result alias for checkout operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;
