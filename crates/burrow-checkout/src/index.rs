use std::fs::Metadata;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use burrow_storage::{StorageDir, StorageError};
use burrow_types::HashValue;

use crate::error::{CheckoutError, CheckoutResult};

/// What the index remembers about one synchronized file.
///
/// Only used for change detection, never for content lookup: `hash` is
/// the stored content hash as of the last sync, `size` and `mtime_ms`
/// describe the on-disk file at that moment. Size is compared first;
/// a newer mtime forces ingestion. Equal size with an unchanged mtime is
/// trusted without re-hashing -- a best-effort heuristic, not a
/// correctness guarantee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub hash: HashValue,
    pub size: u64,
    pub mtime_ms: u64,
}

impl IndexEntry {
    /// Create an entry.
    pub fn new(hash: HashValue, size: u64, mtime_ms: u64) -> Self {
        Self {
            hash,
            size,
            mtime_ms,
        }
    }

    /// Create an entry from a file's metadata.
    pub fn from_metadata(hash: HashValue, metadata: &Metadata) -> Self {
        Self::new(hash, metadata.len(), mtime_millis(metadata))
    }
}

/// A file's modification time as milliseconds since the Unix epoch
/// (zero when the platform provides none).
pub fn mtime_millis(metadata: &Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The per-path sync side-table, persisted as repository-tracked data.
///
/// Entries live as JSON bundles at their tracked path inside the index's
/// own [`StorageDir`], so the index survives restarts and participates in
/// the same commit/merge machinery as everything else.
pub struct Index {
    storage: StorageDir,
}

impl Index {
    /// Create an index over its backing storage dir.
    pub fn new(storage: StorageDir) -> Self {
        Self { storage }
    }

    /// Record the entry for a path.
    pub fn update(&self, path: &str, entry: &IndexEntry) -> CheckoutResult<()> {
        let bundle = serde_json::to_string(entry).map_err(|e| CheckoutError::CorruptIndexEntry {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        self.storage.write_string(path, &bundle)?;
        Ok(())
    }

    /// The recorded entry for a path, `None` if the path is untracked.
    pub fn get(&self, path: &str) -> CheckoutResult<Option<IndexEntry>> {
        let bundle = match self.storage.read_string(path) {
            Ok(bundle) => bundle,
            Err(StorageError::PathNotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry =
            serde_json::from_str(&bundle).map_err(|e| CheckoutError::CorruptIndexEntry {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Some(entry))
    }

    /// Forget a path.
    pub fn remove(&self, path: &str) {
        self.storage.remove(path);
    }

    /// Tracked file names directly under a directory.
    pub fn list_files(&self, dir: &str) -> CheckoutResult<Vec<String>> {
        Ok(self.storage.list_files(dir)?)
    }

    /// Tracked subdirectory names directly under a directory.
    pub fn list_directories(&self, dir: &str) -> CheckoutResult<Vec<String>> {
        Ok(self.storage.list_directories(dir)?)
    }

    /// Persist all recorded changes.
    pub fn commit(&self) -> CheckoutResult<()> {
        self.storage.commit()?;
        Ok(())
    }
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("base_dir", &self.storage.base_dir())
            .finish()
    }
}
