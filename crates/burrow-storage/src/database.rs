use burrow_diff::ChangeKind;
use burrow_repo::{RepoError, Repository};
use burrow_types::{BoxPointer, HashValue};

use crate::error::{StorageError, StorageResult};

/// Path-level summary of the changes between two commits.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DatabaseDiff {
    pub base: BoxPointer,
    pub tip: BoxPointer,
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl DatabaseDiff {
    /// Returns `true` if nothing changed between base and tip.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Returns `true` if the path appears in any change list.
    pub fn contains(&self, path: &str) -> bool {
        self.added.iter().any(|p| p == path)
            || self.modified.iter().any(|p| p == path)
            || self.removed.iter().any(|p| p == path)
    }
}

/// The pluggable database underneath a [`crate::StorageDir`].
///
/// A database is a committed key-value tree with a tip: the head commit
/// pointer. Implementations supply read/write/list, an atomic `commit`
/// advancing the tip, and a `diff` between two tips. The interface is
/// deliberately narrow so storage views stay independent of the concrete
/// repository engine.
pub trait Database: Send {
    fn read_bytes(&mut self, path: &str) -> StorageResult<Vec<u8>>;
    fn write_bytes(&mut self, path: &str, data: &[u8]) -> StorageResult<()>;
    fn remove(&mut self, path: &str) -> StorageResult<()>;
    fn list_files(&mut self, dir: &str) -> StorageResult<Vec<String>>;
    fn list_directories(&mut self, dir: &str) -> StorageResult<Vec<String>>;

    /// The content hash of the file at a path.
    fn hash_of(&mut self, path: &str) -> StorageResult<HashValue>;

    /// Commit pending writes; returns the new tip.
    fn commit(&mut self) -> StorageResult<BoxPointer>;

    /// The current tip (null before the first commit).
    fn tip(&mut self) -> StorageResult<BoxPointer>;

    /// Path-level changes between two tips (null base = empty tree).
    fn diff(&mut self, base: &BoxPointer, tip: &BoxPointer) -> StorageResult<DatabaseDiff>;
}

/// [`Database`] implemented over a burrow [`Repository`].
pub struct RepoDatabase {
    repo: Repository,
    commit_message: String,
}

impl RepoDatabase {
    /// Wrap a repository; commits carry the given message.
    pub fn new(repo: Repository, commit_message: impl Into<String>) -> Self {
        Self {
            repo,
            commit_message: commit_message.into(),
        }
    }

    fn convert(path: &str, err: RepoError) -> StorageError {
        match err {
            RepoError::PathNotFound(_) => StorageError::PathNotFound(path.to_string()),
            other => StorageError::Database(other),
        }
    }
}

impl Database for RepoDatabase {
    fn read_bytes(&mut self, path: &str) -> StorageResult<Vec<u8>> {
        self.repo
            .read_bytes(path)
            .map_err(|e| Self::convert(path, e))
    }

    fn write_bytes(&mut self, path: &str, data: &[u8]) -> StorageResult<()> {
        Ok(self.repo.write_bytes(path, data)?)
    }

    fn remove(&mut self, path: &str) -> StorageResult<()> {
        Ok(self.repo.remove(path)?)
    }

    fn list_files(&mut self, dir: &str) -> StorageResult<Vec<String>> {
        Ok(self.repo.list_files(dir)?)
    }

    fn list_directories(&mut self, dir: &str) -> StorageResult<Vec<String>> {
        Ok(self.repo.list_directories(dir)?)
    }

    fn hash_of(&mut self, path: &str) -> StorageResult<HashValue> {
        self.repo.hash_of(path).map_err(|e| Self::convert(path, e))
    }

    fn commit(&mut self) -> StorageResult<BoxPointer> {
        let message = self.commit_message.clone();
        let head = self.repo.commit(&message)?;
        Ok(head.pointer)
    }

    fn tip(&mut self) -> StorageResult<BoxPointer> {
        Ok(self
            .repo
            .head_commit()
            .map(|node| node.pointer)
            .unwrap_or_else(BoxPointer::null))
    }

    fn diff(&mut self, base: &BoxPointer, tip: &BoxPointer) -> StorageResult<DatabaseDiff> {
        let changes = self.repo.diff(base, tip)?;
        let mut diff = DatabaseDiff {
            base: *base,
            tip: *tip,
            ..Default::default()
        };
        for change in changes {
            match change.kind {
                ChangeKind::Added => diff.added.push(change.path),
                ChangeKind::Modified => diff.modified.push(change.path),
                ChangeKind::Removed => diff.removed.push(change.path),
            }
        }
        Ok(diff)
    }
}

impl std::fmt::Debug for RepoDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoDatabase")
            .field("branch", &self.repo.branch())
            .finish()
    }
}
