//! Content-addressed chunk storage and the object model for burrow.
//!
//! Every piece of repository data -- file content, directory listings,
//! commits -- is stored as an immutable chunk identified by the
//! domain-separated BLAKE3 hash of its plaintext. An optional
//! [`burrow_crypto::IoFilter`] encrypts chunks at rest without disturbing
//! content addressing: pointers carry a separate key hash, so keys rotate
//! without rehashing anything.
//!
//! # Object Types
//!
//! - raw chunks -- opaque bytes (file contents)
//! - [`DirectoryBox`] -- sorted name → pointer mapping, one per directory
//! - [`CommitBox`] -- root tree + parent commits + metadata
//!
//! # Storage Backends
//!
//! All backends implement the [`ChunkStore`] trait:
//!
//! - [`InMemoryChunkStore`] -- `HashMap`-based store for tests and embedding
//! - [`FileChunkStore`] -- fan-out directory layout with atomic writes
//!
//! # Design Rules
//!
//! 1. Chunks are immutable once written; mutation means a new chunk.
//! 2. Content addressing is computed over plaintext, before any filter.
//! 3. Concurrent reads are always safe.
//! 4. The store never interprets chunk contents.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod accessor;
pub mod error;
pub mod file;
pub mod memory;
pub mod object;
pub mod traits;
pub mod tree;

pub use accessor::ChunkAccessor;
pub use error::{StoreError, StoreResult};
pub use file::FileChunkStore;
pub use memory::InMemoryChunkStore;
pub use object::{CommitBox, DirEntry, DirectoryBox, EntryKind};
pub use traits::{ChunkIo, ChunkStore, ObjectKind};
pub use tree::TreeAccessor;
