use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use burrow_crypto::IoFilter;
use burrow_types::{append_dir, BoxPointer, HashValue};

use crate::database::{Database, DatabaseDiff};
use crate::error::{StorageError, StorageResult};

/// Receives tip-change notifications after a commit.
pub trait TipListener: Send + Sync {
    fn on_tip_changed(&self, diff: &DatabaseDiff, base: &BoxPointer, tip: &BoxPointer);
}

/// The write buffer shared by every [`StorageDir`] view of one database.
///
/// Writes and removals buffer in memory until a flush; reads consult the
/// buffer before falling back to the database. All views built from the
/// same root share this one cache, so a single flush/commit is consistent
/// across all of them. Flushing applies removals before writes: after a
/// remove-then-write sequence the write survives (last writer wins).
pub struct StorageDirCache {
    inner: Mutex<CacheInner>,
    listeners: Mutex<Vec<Arc<dyn TipListener>>>,
}

struct CacheInner {
    database: Box<dyn Database>,
    pending_writes: HashMap<String, Vec<u8>>,
    pending_removes: Vec<String>,
}

impl StorageDirCache {
    fn new(database: Box<dyn Database>) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                database,
                pending_writes: HashMap::new(),
                pending_removes: Vec::new(),
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn read_bytes(&self, path: &str) -> StorageResult<Vec<u8>> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if let Some(data) = inner.pending_writes.get(path) {
            return Ok(data.clone());
        }
        if inner.pending_removes.iter().any(|p| p == path) {
            return Err(StorageError::PathNotFound(path.to_string()));
        }
        inner.database.read_bytes(path)
    }

    fn write_bytes(&self, path: &str, data: Vec<u8>) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.pending_writes.insert(path.to_string(), data);
    }

    fn remove(&self, path: &str) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        // A pending write to the same path is superseded by the removal.
        inner.pending_writes.remove(path);
        inner.pending_removes.push(path.to_string());
    }

    fn flush(&self) -> StorageResult<()> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        Self::flush_locked(&mut inner)
    }

    fn flush_locked(inner: &mut CacheInner) -> StorageResult<()> {
        // Removals first so a later write to the same path wins.
        let removes = std::mem::take(&mut inner.pending_removes);
        for path in removes {
            inner.database.remove(&path)?;
        }
        let writes = std::mem::take(&mut inner.pending_writes);
        for (path, data) in writes {
            inner.database.write_bytes(&path, &data)?;
        }
        Ok(())
    }

    fn commit(&self) -> StorageResult<BoxPointer> {
        let (diff, base, tip) = {
            let mut inner = self.inner.lock().expect("lock poisoned");
            let base = inner.database.tip()?;
            Self::flush_locked(&mut inner)?;
            let tip = inner.database.commit()?;
            let diff = if self.listeners.lock().expect("lock poisoned").is_empty() {
                None
            } else {
                Some(inner.database.diff(&base, &tip)?)
            };
            (diff, base, tip)
        };
        if let Some(diff) = diff {
            debug!(
                added = diff.added.len(),
                modified = diff.modified.len(),
                removed = diff.removed.len(),
                "notifying tip listeners"
            );
            let listeners = self.listeners.lock().expect("lock poisoned").clone();
            for listener in listeners {
                listener.on_tip_changed(&diff, &base, &tip);
            }
        }
        Ok(tip)
    }

    fn list_files(&self, path: &str) -> StorageResult<Vec<String>> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        // List views must reflect pending writes.
        Self::flush_locked(&mut inner)?;
        inner.database.list_files(path)
    }

    fn list_directories(&self, path: &str) -> StorageResult<Vec<String>> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        Self::flush_locked(&mut inner)?;
        inner.database.list_directories(path)
    }

    fn hash_of(&self, path: &str) -> StorageResult<HashValue> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        Self::flush_locked(&mut inner)?;
        inner.database.hash_of(path)
    }

    fn tip(&self) -> StorageResult<BoxPointer> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.database.tip()
    }

    fn diff(&self, base: &BoxPointer, tip: &BoxPointer) -> StorageResult<DatabaseDiff> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.database.diff(base, tip)
    }

    fn add_listener(&self, listener: Arc<dyn TipListener>) {
        self.listeners.lock().expect("lock poisoned").push(listener);
    }
}

/// A path-scoped, write-buffered view over a database.
///
/// Views are cheap to clone and to scope: [`subdir`] derives a narrower
/// view sharing the same [`StorageDirCache`] (and therefore the same
/// flush/commit point) with a longer path prefix. An optional
/// [`IoFilter`] transforms bytes on every write before the buffer sees
/// them and on every read after retrieval, giving transparent at-rest
/// encryption; filter failures surface as errors, never as wrong bytes.
///
/// The buffer is not synchronized for concurrent mutation from multiple
/// callers; serialize use per cache externally.
///
/// [`subdir`]: StorageDir::subdir
#[derive(Clone)]
pub struct StorageDir {
    cache: Arc<StorageDirCache>,
    base_dir: String,
    filter: Option<Arc<dyn IoFilter>>,
}

impl StorageDir {
    /// Create a root view over a database.
    pub fn new(database: Box<dyn Database>, base_dir: impl Into<String>) -> Self {
        Self {
            cache: Arc::new(StorageDirCache::new(database)),
            base_dir: base_dir.into(),
            filter: None,
        }
    }

    /// Create a root view applying an at-rest filter to every value.
    pub fn with_filter(
        database: Box<dyn Database>,
        base_dir: impl Into<String>,
        filter: Arc<dyn IoFilter>,
    ) -> Self {
        Self {
            cache: Arc::new(StorageDirCache::new(database)),
            base_dir: base_dir.into(),
            filter: Some(filter),
        }
    }

    /// A narrower view sharing this view's cache and filter.
    pub fn subdir(&self, dir: &str) -> StorageDir {
        Self {
            cache: Arc::clone(&self.cache),
            base_dir: append_dir(&self.base_dir, dir),
            filter: self.filter.clone(),
        }
    }

    /// The path prefix of this view.
    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    fn real_path(&self, path: &str) -> String {
        append_dir(&self.base_dir, path)
    }

    /// Read the value at a path (pending writes win over committed data).
    pub fn read_bytes(&self, path: &str) -> StorageResult<Vec<u8>> {
        let raw = self.cache.read_bytes(&self.real_path(path))?;
        match &self.filter {
            Some(filter) => Ok(filter.decrypt(&raw)?),
            None => Ok(raw),
        }
    }

    /// Buffer a value write at a path.
    pub fn write_bytes(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let stored = match &self.filter {
            Some(filter) => filter.encrypt(data)?,
            None => data.to_vec(),
        };
        self.cache.write_bytes(&self.real_path(path), stored);
        Ok(())
    }

    /// Read a UTF-8 string value.
    pub fn read_string(&self, path: &str) -> StorageResult<String> {
        let bytes = self.read_bytes(path)?;
        String::from_utf8(bytes).map_err(|_| StorageError::InvalidValue(path.to_string()))
    }

    /// Write a UTF-8 string value.
    pub fn write_string(&self, path: &str, data: &str) -> StorageResult<()> {
        self.write_bytes(path, data.as_bytes())
    }

    /// Buffer a removal at a path.
    pub fn remove(&self, path: &str) {
        self.cache.remove(&self.real_path(path));
    }

    /// Names of the files under a directory. Flushes pending writes so
    /// the listing reflects them.
    pub fn list_files(&self, dir: &str) -> StorageResult<Vec<String>> {
        self.cache.list_files(&self.real_path(dir))
    }

    /// Names of the subdirectories under a directory. Flushes first.
    pub fn list_directories(&self, dir: &str) -> StorageResult<Vec<String>> {
        self.cache.list_directories(&self.real_path(dir))
    }

    /// The content hash of the value at a path (after a flush).
    ///
    /// This is the hash of the stored bytes -- post-filter when a filter
    /// is in play -- matching what the database records.
    pub fn hash_of(&self, path: &str) -> StorageResult<HashValue> {
        self.cache.hash_of(&self.real_path(path))
    }

    /// Flush pending changes and commit the database, notifying tip
    /// listeners with the pre→post diff.
    pub fn commit(&self) -> StorageResult<BoxPointer> {
        self.cache.commit()
    }

    /// The database tip.
    pub fn tip(&self) -> StorageResult<BoxPointer> {
        self.cache.tip()
    }

    /// Path-level changes between two tips.
    pub fn diff(&self, base: &BoxPointer, tip: &BoxPointer) -> StorageResult<DatabaseDiff> {
        self.cache.diff(base, tip)
    }

    /// Register a commit-time tip listener.
    pub fn add_listener(&self, listener: Arc<dyn TipListener>) {
        self.cache.add_listener(listener);
    }
}

impl std::fmt::Debug for StorageDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageDir")
            .field("base_dir", &self.base_dir)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::RepoDatabase;
    use burrow_crypto::FilterError;
    use burrow_repo::{InMemoryBranchStore, RepoAccessor, Repository, RepositoryConfig};
    use burrow_store::{ChunkStore, InMemoryChunkStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn storage() -> StorageDir {
        StorageDir::new(Box::new(repo_database()), "")
    }

    fn repo_database() -> RepoDatabase {
        let accessor = RepoAccessor::plain(
            Arc::new(InMemoryChunkStore::new()) as Arc<dyn ChunkStore>,
            Arc::new(InMemoryBranchStore::new()),
        );
        let repo = Repository::open(accessor, RepositoryConfig::default()).unwrap();
        RepoDatabase::new(repo, "storage update")
    }

    struct XorFilter(u8);

    impl IoFilter for XorFilter {
        fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, FilterError> {
            Ok(data.iter().map(|b| b ^ self.0).collect())
        }

        fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, FilterError> {
            Ok(data.iter().map(|b| b ^ self.0).collect())
        }

        fn key_hash(&self) -> HashValue {
            HashValue::from_digest([self.0; 32])
        }
    }

    struct CountingListener {
        calls: AtomicUsize,
        last_added: Mutex<Vec<String>>,
    }

    impl CountingListener {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_added: Mutex::new(Vec::new()),
            }
        }
    }

    impl TipListener for CountingListener {
        fn on_tip_changed(&self, diff: &DatabaseDiff, _base: &BoxPointer, _tip: &BoxPointer) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_added.lock().unwrap() = diff.added.clone();
        }
    }

    #[test]
    fn buffered_write_is_readable_before_flush() {
        let dir = storage();
        dir.write_bytes("key", b"value").unwrap();
        assert_eq!(dir.read_bytes("key").unwrap(), b"value");
    }

    #[test]
    fn buffered_remove_hides_committed_value() {
        let dir = storage();
        dir.write_bytes("key", b"value").unwrap();
        dir.commit().unwrap();

        dir.remove("key");
        assert!(matches!(
            dir.read_bytes("key"),
            Err(StorageError::PathNotFound(_))
        ));
    }

    #[test]
    fn remove_then_write_leaves_the_write() {
        let dir = storage();
        dir.write_bytes("key", b"old").unwrap();
        dir.commit().unwrap();

        dir.remove("key");
        dir.write_bytes("key", b"new").unwrap();
        dir.commit().unwrap();
        assert_eq!(dir.read_bytes("key").unwrap(), b"new");
    }

    #[test]
    fn write_then_remove_leaves_nothing() {
        let dir = storage();
        dir.write_bytes("key", b"short lived").unwrap();
        dir.remove("key");
        dir.commit().unwrap();
        assert!(dir.read_bytes("key").is_err());
    }

    #[test]
    fn listings_flush_pending_writes_first() {
        let dir = storage();
        dir.write_bytes("a", b"1").unwrap();
        dir.write_bytes("sub/b", b"2").unwrap();
        assert_eq!(dir.list_files("").unwrap(), vec!["a"]);
        assert_eq!(dir.list_directories("").unwrap(), vec!["sub"]);
    }

    #[test]
    fn subdir_views_share_one_cache() {
        let root = storage();
        let sub = root.subdir("nested");
        sub.write_bytes("inside", b"x").unwrap();

        // The same value is visible through the root under the full path.
        assert_eq!(root.read_bytes("nested/inside").unwrap(), b"x");

        // One commit through either view covers both.
        root.commit().unwrap();
        assert_eq!(sub.read_bytes("inside").unwrap(), b"x");
    }

    #[test]
    fn append_dir_of_empty_is_identity() {
        let root = storage();
        let same = root.subdir("");
        assert_eq!(same.base_dir(), root.base_dir());
    }

    #[test]
    fn string_helpers_roundtrip() {
        let dir = storage();
        dir.write_string("greeting", "hello").unwrap();
        assert_eq!(dir.read_string("greeting").unwrap(), "hello");
    }

    #[test]
    fn filter_encrypts_at_rest_and_decrypts_on_read() {
        let dir = StorageDir::with_filter(Box::new(repo_database()), "", Arc::new(XorFilter(0x2f)));
        dir.write_bytes("secret", b"plaintext").unwrap();
        dir.commit().unwrap();
        assert_eq!(dir.read_bytes("secret").unwrap(), b"plaintext");

        // The stored hash is of the filtered bytes, not the plaintext.
        let stored_hash = dir.hash_of("secret").unwrap();
        let plain_dir = storage();
        plain_dir.write_bytes("secret", b"plaintext").unwrap();
        assert_ne!(stored_hash, plain_dir.hash_of("secret").unwrap());
    }

    #[test]
    fn commit_notifies_listeners_with_diff() {
        let dir = storage();
        let listener = Arc::new(CountingListener::new());
        dir.add_listener(Arc::clone(&listener) as Arc<dyn TipListener>);

        dir.write_bytes("announced", b"1").unwrap();
        dir.commit().unwrap();

        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*listener.last_added.lock().unwrap(), vec!["announced"]);
    }

    #[test]
    fn tip_advances_with_commits() {
        let dir = storage();
        assert!(dir.tip().unwrap().is_null());
        dir.write_bytes("a", b"1").unwrap();
        let t1 = dir.commit().unwrap();
        dir.write_bytes("b", b"2").unwrap();
        let t2 = dir.commit().unwrap();
        assert_ne!(t1, t2);
        assert_eq!(dir.tip().unwrap(), t2);

        let diff = dir.diff(&t1, &t2).unwrap();
        assert_eq!(diff.added, vec!["b"]);
    }
}
