use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use burrow_diff::{Change, DiffResult, TreeDiffIterator};
use burrow_merge::{
    CommitNode, CommonAncestorsFinder, ConflictSolver, MergeConflict, MergeError, OursSolver,
    ThreeWayMerge,
};
use burrow_store::{ChunkIo, CommitBox, DirectoryBox, ObjectKind, TreeAccessor};
use burrow_types::{BoxPointer, HashValue};

use crate::config::RepositoryConfig;
use crate::error::{RepoError, RepoResult};
use crate::transaction::{RepoAccessor, Transaction};

/// The repository façade: a file-path view over tree and commit objects.
///
/// A `Repository` tracks one branch. Writes and removals accumulate in a
/// copy-on-write tree overlay inside an open transaction; [`commit`]
/// rebuilds only the directories on changed paths, records a new
/// [`CommitBox`] with the previous head as sole parent, and atomically
/// advances the branch pointer. [`merge`] reconciles another head into
/// this branch through the common-ancestor finder and the three-way
/// merge, always as a new two-parent commit -- history is never rewritten.
///
/// All mutating access to one branch is serialized by the per-branch
/// transaction claim in [`RepoAccessor`].
///
/// [`commit`]: Repository::commit
/// [`merge`]: Repository::merge
pub struct Repository {
    accessor: RepoAccessor,
    config: RepositoryConfig,
    head: Option<CommitNode>,
    txn: Arc<Transaction>,
    tree: TreeAccessor,
}

impl Repository {
    /// Open the branch named by the config, claiming its transaction slot.
    pub fn open(accessor: RepoAccessor, config: RepositoryConfig) -> RepoResult<Self> {
        let txn = Arc::new(accessor.start_transaction(&config.branch)?);
        let head = match txn.base_head() {
            Some(pointer) => Some(CommitNode::read_from(txn.as_ref(), &pointer)?),
            None => None,
        };
        let tree = match &head {
            Some(node) => {
                TreeAccessor::new(Arc::clone(&txn) as Arc<dyn ChunkIo>, &node.commit.tree)?
            }
            None => TreeAccessor::empty(Arc::clone(&txn) as Arc<dyn ChunkIo>),
        };
        Ok(Self {
            accessor,
            config,
            head,
            txn,
            tree,
        })
    }

    /// The branch this repository tracks.
    pub fn branch(&self) -> &str {
        &self.config.branch
    }

    /// The current head commit, if the branch has one.
    pub fn head_commit(&self) -> Option<&CommitNode> {
        self.head.as_ref()
    }

    /// Returns `true` if there are uncommitted writes or removals.
    pub fn is_modified(&self) -> bool {
        self.tree.is_modified()
    }

    /// A chunk view of this repository's committed data, e.g. for another
    /// repository to merge from.
    pub fn chunk_io(&self) -> Arc<dyn ChunkIo> {
        Arc::new(self.accessor.chunk_io())
    }

    // -----------------------------------------------------------------
    // Content operations
    // -----------------------------------------------------------------

    /// Write file content at a path, creating parent directories as
    /// needed. Visible to reads on this repository immediately; visible
    /// externally after [`commit`](Repository::commit).
    pub fn write_bytes(&mut self, path: &str, data: &[u8]) -> RepoResult<()> {
        let pointer = self.txn.put_chunk(ObjectKind::Chunk, data)?;
        self.tree.put_file(path, pointer)?;
        Ok(())
    }

    /// Read the file content at a path from the current tree (pending
    /// writes included).
    pub fn read_bytes(&mut self, path: &str) -> RepoResult<Vec<u8>> {
        let entry = self
            .tree
            .get(path)?
            .ok_or_else(|| RepoError::PathNotFound(path.to_string()))?;
        if !entry.is_file() {
            return Err(RepoError::NotAFile(path.to_string()));
        }
        Ok(self.txn.get_chunk(ObjectKind::Chunk, &entry.pointer)?)
    }

    /// Remove the entry at a path (file or whole subtree). Removing a
    /// missing path is a no-op; directories left empty are pruned on
    /// commit.
    pub fn remove(&mut self, path: &str) -> RepoResult<()> {
        self.tree.remove(path)?;
        Ok(())
    }

    /// The content hash of the file at a path.
    pub fn hash_of(&mut self, path: &str) -> RepoResult<HashValue> {
        let entry = self
            .tree
            .get(path)?
            .ok_or_else(|| RepoError::PathNotFound(path.to_string()))?;
        Ok(entry.pointer.data_hash)
    }

    /// Names of the files directly under a directory, sorted. A missing
    /// directory lists as empty.
    pub fn list_files(&mut self, dir: &str) -> RepoResult<Vec<String>> {
        Ok(match self.tree.directory(dir)? {
            Some(listing) => listing.files().map(|e| e.name.clone()).collect(),
            None => Vec::new(),
        })
    }

    /// Names of the subdirectories directly under a directory, sorted.
    pub fn list_directories(&mut self, dir: &str) -> RepoResult<Vec<String>> {
        Ok(match self.tree.directory(dir)? {
            Some(listing) => listing.directories().map(|e| e.name.clone()).collect(),
            None => Vec::new(),
        })
    }

    // -----------------------------------------------------------------
    // Commit
    // -----------------------------------------------------------------

    /// Commit all pending changes as a new head.
    ///
    /// With nothing pending this is a no-op returning the current head
    /// (except on a never-committed branch, where it records the initial
    /// commit). Only directories on changed paths are re-encoded; every
    /// untouched subtree keeps its existing pointer.
    pub fn commit(&mut self, message: &str) -> RepoResult<CommitNode> {
        if !self.tree.is_modified() {
            if let Some(head) = &self.head {
                debug!(branch = %self.branch(), "commit with no pending changes");
                return Ok(head.clone());
            }
        }

        let mut root = self.tree.build()?;
        if root.is_null() {
            root = DirectoryBox::empty().write_to(self.txn.as_ref())?;
        }
        let parents = self.head.iter().map(|node| node.pointer).collect();
        let commit = CommitBox::new(
            root,
            parents,
            message,
            self.config.author.clone(),
            Utc::now().timestamp_millis(),
        );
        let pointer = commit.write_to(self.txn.as_ref())?;
        self.txn.commit(&pointer)?;

        info!(
            branch = %self.branch(),
            commit = %pointer.data_hash.short_hex(),
            "committed"
        );
        self.head = Some(CommitNode { pointer, commit });
        self.begin()?;
        Ok(self.head.clone().expect("head just set"))
    }

    // -----------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------

    /// Merge another head into this branch, auto-resolving conflicts
    /// deterministically in favor of this side ("ours wins").
    ///
    /// `theirs_io` reads the other head's objects; their chunks must be
    /// locally available (the sync transport has run). Returns the new
    /// head together with the conflicts that were auto-resolved.
    pub fn merge(
        &mut self,
        theirs_io: Arc<dyn ChunkIo>,
        their_head: &BoxPointer,
    ) -> RepoResult<(CommitNode, Vec<MergeConflict>)> {
        self.merge_with(theirs_io, their_head, &OursSolver, false)
    }

    /// Merge another head, failing with [`MergeError::Conflicts`] instead
    /// of committing when any true conflict exists. Nothing is written on
    /// failure; the caller resolves and retries.
    pub fn merge_strict(
        &mut self,
        theirs_io: Arc<dyn ChunkIo>,
        their_head: &BoxPointer,
    ) -> RepoResult<CommitNode> {
        let (head, _) = self.merge_with(theirs_io, their_head, &OursSolver, true)?;
        Ok(head)
    }

    /// Merge with an explicit conflict-resolution policy.
    pub fn merge_with(
        &mut self,
        theirs_io: Arc<dyn ChunkIo>,
        their_head: &BoxPointer,
        solver: &dyn ConflictSolver,
        strict: bool,
    ) -> RepoResult<(CommitNode, Vec<MergeConflict>)> {
        if self.tree.is_modified() {
            return Err(RepoError::PendingChanges);
        }
        let theirs = CommitNode::read_from(theirs_io.as_ref(), their_head)?;

        let Some(ours) = self.head.clone() else {
            // Unborn branch: adopt their head outright.
            self.txn.commit(their_head)?;
            info!(branch = %self.branch(), "adopted remote head onto unborn branch");
            self.head = Some(theirs.clone());
            self.begin()?;
            return Ok((theirs, Vec::new()));
        };
        if ours.pointer.data_hash == theirs.pointer.data_hash {
            return Ok((ours, Vec::new()));
        }

        let chains = CommonAncestorsFinder::find(
            self.txn.as_ref(),
            ours.clone(),
            theirs_io.as_ref(),
            theirs.clone(),
        )?;
        let base = chains
            .shortest_chain()
            .expect("find always returns at least one chain")
            .ancestor()
            .clone();
        if base.pointer.data_hash == theirs.pointer.data_hash {
            // Their head is already an ancestor of ours; nothing to merge.
            debug!(branch = %self.branch(), "merge target already contained in history");
            return Ok((ours, Vec::new()));
        }

        let outcome = ThreeWayMerge::merge(
            Arc::clone(&self.txn) as Arc<dyn ChunkIo>,
            &ours.commit,
            Arc::clone(&theirs_io),
            &theirs.commit,
            &base.commit,
            solver,
        )?;
        if strict && !outcome.conflicts.is_empty() {
            return Err(MergeError::Conflicts(outcome.conflicts).into());
        }

        let mut merged = outcome.tree;
        let mut root = merged.build()?;
        if root.is_null() {
            root = DirectoryBox::empty().write_to(self.txn.as_ref())?;
        }
        let commit = CommitBox::new(
            root,
            vec![ours.pointer, theirs.pointer],
            format!("merge {}", theirs.pointer.data_hash.short_hex()),
            self.config.author.clone(),
            Utc::now().timestamp_millis(),
        );
        let pointer = commit.write_to(self.txn.as_ref())?;
        self.txn.commit(&pointer)?;

        info!(
            branch = %self.branch(),
            commit = %pointer.data_hash.short_hex(),
            conflicts = outcome.conflicts.len(),
            "merged"
        );
        self.head = Some(CommitNode { pointer, commit });
        self.begin()?;
        Ok((
            self.head.clone().expect("head just set"),
            outcome.conflicts,
        ))
    }

    // -----------------------------------------------------------------
    // History
    // -----------------------------------------------------------------

    /// Path-level changes between two commits (base → tip). A null base
    /// pointer stands for the empty tree.
    pub fn diff(&self, base: &BoxPointer, tip: &BoxPointer) -> RepoResult<Vec<Change>> {
        let io: &dyn ChunkIo = self.txn.as_ref();
        let base_root = self.root_of(io, base)?;
        let tip_root = self.root_of(io, tip)?;
        let changes: Vec<Change> = TreeDiffIterator::new(io, &base_root, io, &tip_root)
            .collect::<DiffResult<_>>()?;
        Ok(changes)
    }

    fn root_of(&self, io: &dyn ChunkIo, commit: &BoxPointer) -> RepoResult<DirectoryBox> {
        if commit.is_null() {
            return Ok(DirectoryBox::empty());
        }
        let commit = CommitBox::read_from(io, commit)?;
        Ok(DirectoryBox::read_from(io, &commit.tree)?)
    }

    /// Start a fresh transaction and tree overlay on the current head.
    fn begin(&mut self) -> RepoResult<()> {
        let txn = Arc::new(self.accessor.start_transaction(&self.config.branch)?);
        let tree = match &self.head {
            Some(node) => {
                TreeAccessor::new(Arc::clone(&txn) as Arc<dyn ChunkIo>, &node.commit.tree)?
            }
            None => TreeAccessor::empty(Arc::clone(&txn) as Arc<dyn ChunkIo>),
        };
        self.txn = txn;
        self.tree = tree;
        Ok(())
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("branch", &self.config.branch)
            .field("head", &self.head.as_ref().map(|h| h.pointer))
            .field("modified", &self.tree.is_modified())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::InMemoryBranchStore;
    use burrow_diff::ChangeKind;
    use burrow_store::{ChunkStore, InMemoryChunkStore};

    fn open(branch: &str) -> Repository {
        let store = Arc::new(InMemoryChunkStore::new());
        open_shared(store, branch)
    }

    fn open_shared(store: Arc<InMemoryChunkStore>, branch: &str) -> Repository {
        let accessor = RepoAccessor::plain(
            store as Arc<dyn ChunkStore>,
            Arc::new(InMemoryBranchStore::new()),
        );
        Repository::open(accessor, RepositoryConfig::with_branch(branch)).unwrap()
    }

    #[test]
    fn write_read_roundtrip_before_commit() {
        let mut repo = open("main");
        repo.write_bytes("file1", b"file1").unwrap();
        assert_eq!(repo.read_bytes("file1").unwrap(), b"file1");
        assert!(repo.is_modified());
    }

    #[test]
    fn read_missing_path_is_not_found() {
        let mut repo = open("main");
        assert!(matches!(
            repo.read_bytes("nope"),
            Err(RepoError::PathNotFound(_))
        ));
    }

    #[test]
    fn read_directory_as_file_fails() {
        let mut repo = open("main");
        repo.write_bytes("dir/file", b"x").unwrap();
        assert!(matches!(repo.read_bytes("dir"), Err(RepoError::NotAFile(_))));
    }

    #[test]
    fn commit_advances_head_and_persists() {
        let mut repo = open("main");
        repo.write_bytes("a", b"1").unwrap();
        let head = repo.commit("first").unwrap();
        assert!(!repo.is_modified());
        assert_eq!(repo.head_commit().unwrap().pointer, head.pointer);
        assert!(head.commit.is_root());
        assert_eq!(repo.read_bytes("a").unwrap(), b"1");
    }

    #[test]
    fn second_commit_chains_to_first() {
        let mut repo = open("main");
        repo.write_bytes("a", b"1").unwrap();
        let first = repo.commit("first").unwrap();
        repo.write_bytes("b", b"2").unwrap();
        let second = repo.commit("second").unwrap();
        assert_eq!(second.commit.parents, vec![first.pointer]);
    }

    #[test]
    fn commit_without_changes_is_a_noop() {
        let mut repo = open("main");
        repo.write_bytes("a", b"1").unwrap();
        let first = repo.commit("first").unwrap();
        let again = repo.commit("empty").unwrap();
        assert_eq!(first.pointer, again.pointer);
    }

    #[test]
    fn remove_and_commit_drops_the_file() {
        let mut repo = open("main");
        repo.write_bytes("keep", b"k").unwrap();
        repo.write_bytes("gone", b"g").unwrap();
        repo.commit("both").unwrap();

        repo.remove("gone").unwrap();
        repo.commit("drop one").unwrap();

        assert!(repo.read_bytes("keep").is_ok());
        assert!(matches!(
            repo.read_bytes("gone"),
            Err(RepoError::PathNotFound(_))
        ));
    }

    #[test]
    fn removing_last_file_prunes_directory() {
        let mut repo = open("main");
        repo.write_bytes("dir/only", b"x").unwrap();
        repo.commit("add").unwrap();
        repo.remove("dir/only").unwrap();
        repo.commit("remove").unwrap();
        assert!(repo.list_directories("").unwrap().is_empty());
    }

    #[test]
    fn listings_include_pending_writes() {
        let mut repo = open("main");
        repo.write_bytes("dir/a", b"1").unwrap();
        repo.write_bytes("top", b"2").unwrap();
        assert_eq!(repo.list_files("").unwrap(), vec!["top"]);
        assert_eq!(repo.list_directories("").unwrap(), vec!["dir"]);
        assert_eq!(repo.list_files("dir").unwrap(), vec!["a"]);
        assert!(repo.list_files("missing").unwrap().is_empty());
    }

    #[test]
    fn hash_of_tracks_content() {
        let mut repo = open("main");
        repo.write_bytes("f", b"one").unwrap();
        let h1 = repo.hash_of("f").unwrap();
        repo.write_bytes("f", b"two").unwrap();
        let h2 = repo.hash_of("f").unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn reopen_sees_committed_state() {
        let store = Arc::new(InMemoryChunkStore::new());
        let accessor = RepoAccessor::plain(
            Arc::clone(&store) as Arc<dyn ChunkStore>,
            Arc::new(InMemoryBranchStore::new()),
        );
        {
            let mut repo =
                Repository::open(accessor.clone(), RepositoryConfig::with_branch("main")).unwrap();
            repo.write_bytes("persisted", b"yes").unwrap();
            repo.commit("save").unwrap();
            // Release the branch claim before reopening.
        }
        let mut reopened =
            Repository::open(accessor, RepositoryConfig::with_branch("main")).unwrap();
        assert_eq!(reopened.read_bytes("persisted").unwrap(), b"yes");
    }

    #[test]
    fn concurrent_open_of_same_branch_conflicts() {
        let store = Arc::new(InMemoryChunkStore::new());
        let accessor = RepoAccessor::plain(
            Arc::clone(&store) as Arc<dyn ChunkStore>,
            Arc::new(InMemoryBranchStore::new()),
        );
        let _repo =
            Repository::open(accessor.clone(), RepositoryConfig::with_branch("main")).unwrap();
        assert!(matches!(
            Repository::open(accessor, RepositoryConfig::with_branch("main")),
            Err(RepoError::TransactionInFlight(_))
        ));
    }

    #[test]
    fn diff_between_commits() {
        let mut repo = open("main");
        repo.write_bytes("stable", b"s").unwrap();
        repo.write_bytes("changed", b"v1").unwrap();
        let c1 = repo.commit("one").unwrap();

        repo.write_bytes("changed", b"v2").unwrap();
        repo.write_bytes("added", b"a").unwrap();
        let c2 = repo.commit("two").unwrap();

        let changes = repo.diff(&c1.pointer, &c2.pointer).unwrap();
        assert_eq!(changes.len(), 2);
        assert!(changes
            .iter()
            .any(|c| c.path == "changed" && c.kind == ChangeKind::Modified));
        assert!(changes
            .iter()
            .any(|c| c.path == "added" && c.kind == ChangeKind::Added));
    }

    #[test]
    fn diff_from_null_base_reports_everything_added() {
        let mut repo = open("main");
        repo.write_bytes("a", b"1").unwrap();
        let head = repo.commit("init").unwrap();
        let changes = repo.diff(&BoxPointer::null(), &head.pointer).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Added);
    }
}
