use burrow_crypto::FilterError;
use burrow_types::HashValue;

/// Errors from chunk storage and object decoding.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested chunk is not in the store.
    #[error("chunk not found: {0}")]
    ChunkNotFound(HashValue),

    /// Stored bytes do not match their address (data corruption).
    #[error("corrupt chunk {hash}: {reason}")]
    CorruptChunk { hash: HashValue, reason: String },

    /// Stored bytes fail to decode per the object model.
    #[error("corrupt object: {0}")]
    CorruptObject(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A path cannot be mapped onto the tree (empty, or routed through a file).
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Encrypt/decrypt filter failure, surfaced as an I/O-class error.
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
