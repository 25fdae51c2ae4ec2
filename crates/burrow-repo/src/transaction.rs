use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use burrow_crypto::{IoFilter, PassthroughFilter};
use burrow_store::{ChunkAccessor, ChunkIo, ChunkStore, ObjectKind, StoreError, StoreResult};
use burrow_types::{BoxPointer, HashValue};

use crate::branch::BranchStore;
use crate::error::{RepoError, RepoResult};

struct AccessorShared {
    store: Arc<dyn ChunkStore>,
    filter: Arc<dyn IoFilter>,
    branches: Arc<dyn BranchStore>,
    /// Branches with a transaction in flight; one writer per branch.
    active: Mutex<HashSet<String>>,
}

/// Entry point for transactional access to a repository's storage.
///
/// Owns the chunk store, the at-rest filter, and the branch pointers, and
/// enforces the single-writer rule: at most one [`Transaction`] per branch
/// at a time. Transactions on different branches are fully independent.
#[derive(Clone)]
pub struct RepoAccessor {
    shared: Arc<AccessorShared>,
}

impl RepoAccessor {
    /// Create an accessor with an at-rest filter.
    pub fn new(
        store: Arc<dyn ChunkStore>,
        filter: Arc<dyn IoFilter>,
        branches: Arc<dyn BranchStore>,
    ) -> Self {
        Self {
            shared: Arc::new(AccessorShared {
                store,
                filter,
                branches,
                active: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Create an accessor storing plaintext as-is.
    pub fn plain(store: Arc<dyn ChunkStore>, branches: Arc<dyn BranchStore>) -> Self {
        Self::new(store, Arc::new(PassthroughFilter), branches)
    }

    /// A read-only chunk view of committed data.
    pub fn chunk_io(&self) -> ChunkAccessor {
        ChunkAccessor::new(
            Arc::clone(&self.shared.store),
            Arc::clone(&self.shared.filter),
        )
    }

    /// The current head of a branch.
    pub fn read_head(&self, branch: &str) -> RepoResult<Option<BoxPointer>> {
        self.shared.branches.read_head(branch)
    }

    /// The branch store.
    pub fn branches(&self) -> &Arc<dyn BranchStore> {
        &self.shared.branches
    }

    /// Claim a branch and start a transaction on it.
    ///
    /// Fails with [`RepoError::TransactionInFlight`] while another
    /// transaction holds the branch; the claim is released when that
    /// transaction commits or is dropped.
    pub fn start_transaction(&self, branch: &str) -> RepoResult<Transaction> {
        {
            let mut active = self.shared.active.lock().expect("lock poisoned");
            if !active.insert(branch.to_string()) {
                return Err(RepoError::TransactionInFlight(branch.to_string()));
            }
        }
        let base_head = match self.shared.branches.read_head(branch) {
            Ok(head) => head,
            Err(e) => {
                self.shared
                    .active
                    .lock()
                    .expect("lock poisoned")
                    .remove(branch);
                return Err(e);
            }
        };
        debug!(branch, "transaction started");
        Ok(Transaction {
            shared: Arc::clone(&self.shared),
            branch: branch.to_string(),
            base_head,
            pending: Mutex::new(HashMap::new()),
            done: AtomicBool::new(false),
        })
    }
}

impl std::fmt::Debug for RepoAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoAccessor").finish_non_exhaustive()
    }
}

/// A pending set of object writes scoped to one branch.
///
/// Chunks written through the transaction are buffered in memory and
/// visible to reads *within* the transaction, but not externally, until
/// [`commit`] flushes them and atomically advances the branch pointer.
/// Dropping the transaction discards the buffer; chunks that were already
/// flushed are unreferenced content-addressed garbage and harmless.
///
/// [`commit`]: Transaction::commit
pub struct Transaction {
    shared: Arc<AccessorShared>,
    branch: String,
    base_head: Option<BoxPointer>,
    /// Plaintext chunks keyed by their content address.
    pending: Mutex<HashMap<HashValue, Vec<u8>>>,
    done: AtomicBool,
}

impl Transaction {
    /// The branch this transaction owns.
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// The branch head observed when the transaction started.
    pub fn base_head(&self) -> Option<BoxPointer> {
        self.base_head
    }

    /// Number of buffered, not-yet-flushed chunks.
    pub fn pending_chunks(&self) -> usize {
        self.pending.lock().expect("lock poisoned").len()
    }

    /// Flush buffered chunks and atomically advance the branch pointer.
    ///
    /// The pointer update is compare-and-swap against the head observed at
    /// transaction start; losing that race fails with
    /// [`RepoError::HeadMoved`] and leaves the branch untouched.
    pub fn commit(&self, new_head: &BoxPointer) -> RepoResult<()> {
        self.flush()?;
        self.shared
            .branches
            .update_head(&self.branch, self.base_head.as_ref(), new_head)?;
        debug!(branch = %self.branch, head = %new_head.data_hash.short_hex(), "transaction committed");
        self.release();
        Ok(())
    }

    /// Flush buffered chunks to the backing store without touching the
    /// branch pointer.
    fn flush(&self) -> RepoResult<()> {
        let drained: Vec<(HashValue, Vec<u8>)> = {
            let mut pending = self.pending.lock().expect("lock poisoned");
            pending.drain().collect()
        };
        for (hash, plaintext) in drained {
            let boxed = self.shared.filter.encrypt(&plaintext).map_err(StoreError::from)?;
            self.shared.store.put_keyed(&hash, &boxed)?;
        }
        Ok(())
    }

    /// Discard all pending writes and release the branch claim.
    pub fn abort(&self) {
        self.pending.lock().expect("lock poisoned").clear();
        self.release();
    }

    fn release(&self) {
        if !self.done.swap(true, Ordering::SeqCst) {
            self.shared
                .active
                .lock()
                .expect("lock poisoned")
                .remove(&self.branch);
            debug!(branch = %self.branch, "transaction released");
        }
    }
}

impl ChunkIo for Transaction {
    fn get_chunk(&self, kind: ObjectKind, pointer: &BoxPointer) -> StoreResult<Vec<u8>> {
        {
            let pending = self.pending.lock().expect("lock poisoned");
            if let Some(plaintext) = pending.get(&pointer.data_hash) {
                return Ok(plaintext.clone());
            }
        }
        let boxed = self
            .shared
            .store
            .get(&pointer.data_hash)?
            .ok_or(StoreError::ChunkNotFound(pointer.data_hash))?;
        let data = self.shared.filter.decrypt(&boxed)?;
        if !kind.hasher().verify(&data, &pointer.data_hash) {
            return Err(StoreError::CorruptChunk {
                hash: pointer.data_hash,
                reason: format!("decoded {kind} bytes do not match their address"),
            });
        }
        Ok(data)
    }

    fn put_chunk(&self, kind: ObjectKind, data: &[u8]) -> StoreResult<BoxPointer> {
        let hash = kind.hasher().hash(data);
        let mut pending = self.pending.lock().expect("lock poisoned");
        pending.entry(hash).or_insert_with(|| data.to_vec());
        Ok(BoxPointer::new(hash, self.shared.filter.key_hash()))
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("branch", &self.branch)
            .field("pending_chunks", &self.pending_chunks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::InMemoryBranchStore;
    use burrow_store::InMemoryChunkStore;

    fn accessor() -> (Arc<InMemoryChunkStore>, RepoAccessor) {
        let store = Arc::new(InMemoryChunkStore::new());
        let accessor = RepoAccessor::plain(
            Arc::clone(&store) as Arc<dyn ChunkStore>,
            Arc::new(InMemoryBranchStore::new()),
        );
        (store, accessor)
    }

    fn head(b: u8) -> BoxPointer {
        BoxPointer::unencrypted(HashValue::from_digest([b; 32]))
    }

    #[test]
    fn pending_writes_are_visible_inside_the_transaction() {
        let (store, accessor) = accessor();
        let txn = accessor.start_transaction("main").unwrap();

        let ptr = txn.put_chunk(ObjectKind::Chunk, b"uncommitted").unwrap();
        assert_eq!(txn.get_chunk(ObjectKind::Chunk, &ptr).unwrap(), b"uncommitted");

        // Not externally visible before commit.
        assert!(store.get(&ptr.data_hash).unwrap().is_none());
    }

    #[test]
    fn commit_flushes_chunks_and_advances_head() {
        let (store, accessor) = accessor();
        let txn = accessor.start_transaction("main").unwrap();
        let ptr = txn.put_chunk(ObjectKind::Chunk, b"data").unwrap();
        txn.commit(&head(1)).unwrap();

        assert!(store.get(&ptr.data_hash).unwrap().is_some());
        assert_eq!(accessor.read_head("main").unwrap().unwrap(), head(1));
    }

    #[test]
    fn second_transaction_on_same_branch_is_rejected() {
        let (_store, accessor) = accessor();
        let _txn = accessor.start_transaction("main").unwrap();
        assert!(matches!(
            accessor.start_transaction("main"),
            Err(RepoError::TransactionInFlight(_))
        ));
    }

    #[test]
    fn different_branches_are_independent() {
        let (_store, accessor) = accessor();
        let _a = accessor.start_transaction("a").unwrap();
        let _b = accessor.start_transaction("b").unwrap();
    }

    #[test]
    fn drop_releases_the_branch_claim() {
        let (_store, accessor) = accessor();
        {
            let _txn = accessor.start_transaction("main").unwrap();
        }
        // Claim released on drop; a new transaction may start.
        let _txn = accessor.start_transaction("main").unwrap();
    }

    #[test]
    fn commit_releases_the_branch_claim() {
        let (_store, accessor) = accessor();
        let txn = accessor.start_transaction("main").unwrap();
        txn.commit(&head(1)).unwrap();
        let _txn = accessor.start_transaction("main").unwrap();
    }

    #[test]
    fn aborted_transaction_discards_pending_writes() {
        let (store, accessor) = accessor();
        let txn = accessor.start_transaction("main").unwrap();
        let ptr = txn.put_chunk(ObjectKind::Chunk, b"discarded").unwrap();
        txn.abort();

        assert!(store.get(&ptr.data_hash).unwrap().is_none());
        assert!(accessor.read_head("main").unwrap().is_none());
    }

    #[test]
    fn stale_transaction_loses_the_head_race() {
        let (_store, accessor) = accessor();

        // Stale transaction starts while the branch is unborn.
        let stale = accessor.start_transaction("main").unwrap();
        stale.abort();

        // Another transaction commits first.
        let winner = accessor.start_transaction("main").unwrap();
        winner.commit(&head(1)).unwrap();

        // A transaction created against the old (empty) head must fail its
        // CAS: simulate by starting from the recorded base of `stale`.
        let raced = accessor.start_transaction("main").unwrap();
        assert_eq!(raced.base_head().unwrap(), head(1));
        // Manually race: branch store rejects a mismatched expectation.
        assert!(matches!(
            accessor
                .branches()
                .update_head("main", None, &head(2)),
            Err(RepoError::HeadMoved(_))
        ));
    }

    #[test]
    fn put_chunk_is_idempotent_within_a_transaction() {
        let (_store, accessor) = accessor();
        let txn = accessor.start_transaction("main").unwrap();
        let p1 = txn.put_chunk(ObjectKind::Chunk, b"dup").unwrap();
        let p2 = txn.put_chunk(ObjectKind::Chunk, b"dup").unwrap();
        assert_eq!(p1, p2);
        assert_eq!(txn.pending_chunks(), 1);
    }

    #[test]
    fn committed_chunks_are_readable_by_later_transactions() {
        let (_store, accessor) = accessor();
        let txn = accessor.start_transaction("main").unwrap();
        let ptr = txn.put_chunk(ObjectKind::Chunk, b"persisted").unwrap();
        txn.commit(&head(1)).unwrap();

        let txn2 = accessor.start_transaction("main").unwrap();
        assert_eq!(txn2.get_chunk(ObjectKind::Chunk, &ptr).unwrap(), b"persisted");
    }
}
