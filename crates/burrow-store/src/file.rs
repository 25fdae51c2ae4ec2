use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use burrow_types::HashValue;

use crate::error::{StoreError, StoreResult};
use crate::traits::ChunkStore;

/// On-disk record format version.
const RECORD_FORMAT: u16 = 1;

/// A framed chunk record as written to disk.
#[derive(Serialize, Deserialize)]
struct ChunkRecord {
    format: u16,
    payload: Vec<u8>,
}

/// Filesystem-backed chunk store.
///
/// Chunks live under `<root>/objects/<aa>/<rest-of-hex>` where `aa` is the
/// first hex byte of the key, keeping directory fan-out bounded. Writes go
/// through a temp file in the same directory followed by a rename, so a
/// chunk is either fully present or absent.
pub struct FileChunkStore {
    root: PathBuf,
}

impl FileChunkStore {
    /// Open (or create) a store rooted at the given directory.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("objects"))?;
        Ok(Self { root })
    }

    /// The root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn chunk_path(&self, hash: &HashValue) -> PathBuf {
        let hex = hash.to_hex();
        self.root.join("objects").join(&hex[..2]).join(&hex[2..])
    }
}

impl ChunkStore for FileChunkStore {
    fn put_keyed(&self, hash: &HashValue, data: &[u8]) -> StoreResult<()> {
        let path = self.chunk_path(hash);
        if path.exists() {
            // Idempotent: content addressing guarantees an existing file
            // already holds these bytes.
            return Ok(());
        }
        let parent = path.parent().expect("chunk path always has a parent");
        fs::create_dir_all(parent)?;

        let record = ChunkRecord {
            format: RECORD_FORMAT,
            payload: data.to_vec(),
        };
        let encoded =
            bincode::serialize(&record).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(&encoded)?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(hash = %hash.short_hex(), bytes = data.len(), "stored chunk");
        Ok(())
    }

    fn get(&self, hash: &HashValue) -> StoreResult<Option<Vec<u8>>> {
        let path = self.chunk_path(hash);
        let encoded = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: ChunkRecord = bincode::deserialize(&encoded).map_err(|_| {
            StoreError::CorruptChunk {
                hash: *hash,
                reason: "undecodable chunk record".into(),
            }
        })?;
        if record.format != RECORD_FORMAT {
            return Err(StoreError::CorruptChunk {
                hash: *hash,
                reason: format!("unknown record format {}", record.format),
            });
        }
        Ok(Some(record.payload))
    }

    fn contains(&self, hash: &HashValue) -> StoreResult<bool> {
        Ok(self.chunk_path(hash).exists())
    }
}

impl std::fmt::Debug for FileChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileChunkStore")
            .field("root", &self.root)
            .finish()
    }
}
