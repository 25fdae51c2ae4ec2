use std::collections::HashMap;
use std::sync::RwLock;

use burrow_types::BoxPointer;

use crate::error::{RepoError, RepoResult};

/// Storage for mutable branch pointers.
///
/// A branch is the only mutable top-level state in a repository: a named
/// pointer to the current head commit. Updates are compare-and-swap
/// against the head the caller last observed, which makes the branch
/// pointer the single atomic commit point -- either the whole transaction
/// becomes visible or none of it does.
pub trait BranchStore: Send + Sync {
    /// Read the current head of a branch. `Ok(None)` if the branch has
    /// never been committed to.
    fn read_head(&self, branch: &str) -> RepoResult<Option<BoxPointer>>;

    /// Advance a branch head, but only if the current head still equals
    /// `expected`. Fails with [`RepoError::HeadMoved`] otherwise.
    fn update_head(
        &self,
        branch: &str,
        expected: Option<&BoxPointer>,
        new_head: &BoxPointer,
    ) -> RepoResult<()>;

    /// All branch names with a recorded head, sorted.
    fn list_branches(&self) -> RepoResult<Vec<String>>;
}

/// In-memory branch store for tests and embedding.
pub struct InMemoryBranchStore {
    heads: RwLock<HashMap<String, BoxPointer>>,
}

impl InMemoryBranchStore {
    /// Create an empty branch store.
    pub fn new() -> Self {
        Self {
            heads: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryBranchStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BranchStore for InMemoryBranchStore {
    fn read_head(&self, branch: &str) -> RepoResult<Option<BoxPointer>> {
        let heads = self.heads.read().expect("lock poisoned");
        Ok(heads.get(branch).copied())
    }

    fn update_head(
        &self,
        branch: &str,
        expected: Option<&BoxPointer>,
        new_head: &BoxPointer,
    ) -> RepoResult<()> {
        let mut heads = self.heads.write().expect("lock poisoned");
        let current = heads.get(branch);
        let matches = match (current, expected) {
            (None, None) => true,
            (Some(c), Some(e)) => c.data_hash == e.data_hash,
            _ => false,
        };
        if !matches {
            return Err(RepoError::HeadMoved(branch.to_string()));
        }
        heads.insert(branch.to_string(), *new_head);
        Ok(())
    }

    fn list_branches(&self) -> RepoResult<Vec<String>> {
        let heads = self.heads.read().expect("lock poisoned");
        let mut names: Vec<String> = heads.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl std::fmt::Debug for InMemoryBranchStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.heads.read().expect("lock poisoned").len();
        f.debug_struct("InMemoryBranchStore")
            .field("branches", &count)
            .finish()
    }
}
