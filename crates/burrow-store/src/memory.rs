use std::collections::HashMap;
use std::sync::RwLock;

use burrow_types::HashValue;

use crate::error::StoreResult;
use crate::traits::ChunkStore;

/// In-memory, HashMap-based chunk store.
///
/// Intended for tests and embedding. All chunks are held in memory behind a
/// `RwLock` for safe concurrent access.
pub struct InMemoryChunkStore {
    chunks: RwLock<HashMap<HashValue, Vec<u8>>>,
}

impl InMemoryChunkStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
        }
    }

    /// Number of chunks currently stored.
    pub fn len(&self) -> usize {
        self.chunks.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.chunks.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored chunks.
    pub fn total_bytes(&self) -> u64 {
        self.chunks
            .read()
            .expect("lock poisoned")
            .values()
            .map(|data| data.len() as u64)
            .sum()
    }

    /// Return a sorted list of all chunk keys in the store.
    pub fn all_hashes(&self) -> Vec<HashValue> {
        let map = self.chunks.read().expect("lock poisoned");
        let mut hashes: Vec<HashValue> = map.keys().copied().collect();
        hashes.sort();
        hashes
    }
}

impl Default for InMemoryChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStore for InMemoryChunkStore {
    fn put_keyed(&self, hash: &HashValue, data: &[u8]) -> StoreResult<()> {
        let mut map = self.chunks.write().expect("lock poisoned");
        // Idempotent: a key always maps to the same content, so an existing
        // entry is left untouched.
        map.entry(*hash).or_insert_with(|| data.to_vec());
        Ok(())
    }

    fn get(&self, hash: &HashValue) -> StoreResult<Option<Vec<u8>>> {
        let map = self.chunks.read().expect("lock poisoned");
        Ok(map.get(hash).cloned())
    }

    fn contains(&self, hash: &HashValue) -> StoreResult<bool> {
        let map = self.chunks.read().expect("lock poisoned");
        Ok(map.contains_key(hash))
    }
}

impl std::fmt::Debug for InMemoryChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryChunkStore")
            .field("chunk_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn put_and_get_roundtrip() {
        let store = InMemoryChunkStore::new();
        let hash = store.put(b"hello world").unwrap();
        assert_eq!(store.get(&hash).unwrap().unwrap(), b"hello world");
    }

    #[test]
    fn get_missing_returns_none() {
        let store = InMemoryChunkStore::new();
        assert!(store.get(&HashValue::from_digest([9; 32])).unwrap().is_none());
    }

    #[test]
    fn put_is_idempotent() {
        let store = InMemoryChunkStore::new();
        let h1 = store.put(b"same").unwrap();
        let h2 = store.put(b"same").unwrap();
        assert_eq!(h1, h2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn different_content_different_keys() {
        let store = InMemoryChunkStore::new();
        let h1 = store.put(b"aaa").unwrap();
        let h2 = store.put(b"bbb").unwrap();
        assert_ne!(h1, h2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn contains_tracks_membership() {
        let store = InMemoryChunkStore::new();
        let hash = store.put(b"present").unwrap();
        assert!(store.contains(&hash).unwrap());
        assert!(!store.contains(&HashValue::from_digest([1; 32])).unwrap());
    }

    #[test]
    fn total_bytes_sums_chunks() {
        let store = InMemoryChunkStore::new();
        store.put(b"12345").unwrap();
        store.put(b"123456789").unwrap();
        assert_eq!(store.total_bytes(), 14);
    }

    #[test]
    fn all_hashes_is_sorted() {
        let store = InMemoryChunkStore::new();
        store.put(b"a").unwrap();
        store.put(b"b").unwrap();
        store.put(b"c").unwrap();
        let hashes = store.all_hashes();
        assert_eq!(hashes.len(), 3);
        for w in hashes.windows(2) {
            assert!(w[0] <= w[1]);
        }
    }

    #[test]
    fn concurrent_reads_are_safe() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryChunkStore::new());
        let hash = store.put(b"shared data").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let data = store.get(&hash).unwrap().unwrap();
                    assert_eq!(data, b"shared data");
                })
            })
            .collect();

        for h in handles {
            h.join().expect("thread should not panic");
        }
    }

    proptest! {
        #[test]
        fn content_addressing_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let store = InMemoryChunkStore::new();
            let hash = store.put(&data).unwrap();
            prop_assert_eq!(store.get(&hash).unwrap().unwrap(), data);
        }

        #[test]
        fn put_twice_same_key(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let store = InMemoryChunkStore::new();
            let h1 = store.put(&data).unwrap();
            let h2 = store.put(&data).unwrap();
            prop_assert_eq!(h1, h2);
            prop_assert_eq!(store.len(), 1);
        }
    }
}
