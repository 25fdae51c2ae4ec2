use burrow_crypto::ContentHasher;
use burrow_types::{BoxPointer, HashValue};

use crate::error::StoreResult;

/// The kind of an object stored as a chunk.
///
/// The kind selects the hash domain used to address the chunk, so a raw
/// content chunk and a tree object with identical bytes never collide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Raw content (file contents, arbitrary data).
    Chunk,
    /// Directory (tree) object.
    Tree,
    /// Commit object.
    Commit,
}

impl ObjectKind {
    /// The domain-separated hasher addressing this kind of object.
    pub fn hasher(&self) -> &'static ContentHasher {
        match self {
            Self::Chunk => &ContentHasher::CHUNK,
            Self::Tree => &ContentHasher::TREE,
            Self::Commit => &ContentHasher::COMMIT,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chunk => write!(f, "chunk"),
            Self::Tree => write!(f, "tree"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// Content-addressed chunk storage.
///
/// All implementations must satisfy these invariants:
/// - Chunks are immutable once written; a key always maps to the same bytes.
/// - `put_keyed` is idempotent: re-storing under an existing key is a no-op.
/// - Concurrent reads are always safe (chunks are never mutated in place).
/// - The store never interprets chunk contents.
/// - All I/O errors are propagated, never silently ignored.
pub trait ChunkStore: Send + Sync {
    /// Store bytes under the given key. No-op if the key already exists.
    ///
    /// The caller is responsible for the key being the content address of
    /// the (plaintext) chunk; the stored bytes may differ from the
    /// plaintext when an at-rest filter is in play.
    fn put_keyed(&self, hash: &HashValue, data: &[u8]) -> StoreResult<()>;

    /// Read the bytes stored under a key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, hash: &HashValue) -> StoreResult<Option<Vec<u8>>>;

    /// Check whether a key exists in the store.
    fn contains(&self, hash: &HashValue) -> StoreResult<bool>;

    /// Hash plaintext bytes with the chunk domain and store them.
    ///
    /// For all byte sequences `b`: `put(b) == put(b)`, and reading the
    /// returned key yields `b` again (no filter is applied here).
    fn put(&self, data: &[u8]) -> StoreResult<HashValue> {
        let hash = ContentHasher::CHUNK.hash(data);
        self.put_keyed(&hash, data)?;
        Ok(hash)
    }
}

/// Read/write access to chunks through [`BoxPointer`]s.
///
/// This is the seam between the object model and storage: a direct
/// [`crate::ChunkAccessor`] applies the at-rest filter against a backing
/// store, while a repository transaction layers a pending-write buffer on
/// top so uncommitted objects are readable within the transaction.
pub trait ChunkIo: Send + Sync {
    /// Read and verify the chunk a pointer references.
    ///
    /// Fails with [`crate::StoreError::ChunkNotFound`] if absent and
    /// [`crate::StoreError::CorruptChunk`] if the decoded bytes do not
    /// hash back to the pointer's address.
    fn get_chunk(&self, kind: ObjectKind, pointer: &BoxPointer) -> StoreResult<Vec<u8>>;

    /// Store a plaintext chunk and return its pointer.
    fn put_chunk(&self, kind: ObjectKind, data: &[u8]) -> StoreResult<BoxPointer>;
}
