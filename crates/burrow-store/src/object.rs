use serde::{Deserialize, Serialize};

use burrow_types::{BoxPointer, HashValue};

use crate::error::{StoreError, StoreResult};
use crate::traits::{ChunkIo, ObjectKind};

// ---------------------------------------------------------------------------
// DirectoryBox
// ---------------------------------------------------------------------------

/// The kind of a directory entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// A file leaf: the pointer references a content chunk.
    File,
    /// A subdirectory: the pointer references another `DirectoryBox`.
    Directory,
}

/// A single named entry in a directory object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (one path segment, no slashes).
    pub name: String,
    /// Whether the entry is a file or a subdirectory.
    pub kind: EntryKind,
    /// Pointer to the entry's content.
    pub pointer: BoxPointer,
}

impl DirEntry {
    /// Create a file entry.
    pub fn file(name: impl Into<String>, pointer: BoxPointer) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            pointer,
        }
    }

    /// Create a subdirectory entry.
    pub fn directory(name: impl Into<String>, pointer: BoxPointer) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            pointer,
        }
    }

    /// Returns `true` if this entry is a file.
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Immutable directory object: a sorted mapping from entry name to pointer.
///
/// Entry names are unique and kept sorted so that identical logical content
/// always encodes -- and therefore hashes -- identically, and so that diffing
/// two directories is a linear lockstep walk. A mutation produces a new
/// `DirectoryBox` with a new hash; nothing is ever updated in place once
/// written.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryBox {
    entries: Vec<DirEntry>,
}

impl DirectoryBox {
    /// Create a directory from entries; sorts them by name.
    pub fn new(mut entries: Vec<DirEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries.dedup_by(|a, b| a.name == b.name);
        Self { entries }
    }

    /// Create an empty directory.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The sorted entries.
    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Option<&DirEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Insert or replace an entry, keeping the list sorted.
    pub fn insert(&mut self, entry: DirEntry) {
        match self
            .entries
            .binary_search_by(|e| e.name.cmp(&entry.name))
        {
            Ok(i) => self.entries[i] = entry,
            Err(i) => self.entries.insert(i, entry),
        }
    }

    /// Remove an entry by name.
    pub fn remove(&mut self, name: &str) -> Option<DirEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_str().cmp(name))
            .ok()
            .map(|i| self.entries.remove(i))
    }

    /// Iterate over file entries.
    pub fn files(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::File)
    }

    /// Iterate over subdirectory entries.
    pub fn directories(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::Directory)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the directory has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical byte encoding (sorted entries, stable field order).
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Decode from canonical bytes, validating the sorted-unique invariant.
    pub fn decode(data: &[u8]) -> StoreResult<Self> {
        let decoded: Self = serde_json::from_slice(data)
            .map_err(|e| StoreError::CorruptObject(format!("directory: {e}")))?;
        for w in decoded.entries.windows(2) {
            if w[0].name >= w[1].name {
                return Err(StoreError::CorruptObject(
                    "directory entries not sorted or not unique".into(),
                ));
            }
        }
        Ok(decoded)
    }

    /// The content hash of the canonical encoding.
    pub fn hash(&self) -> StoreResult<HashValue> {
        Ok(ObjectKind::Tree.hasher().hash(&self.encode()?))
    }

    /// Store this directory as a chunk and return its pointer.
    pub fn write_to(&self, io: &dyn ChunkIo) -> StoreResult<BoxPointer> {
        io.put_chunk(ObjectKind::Tree, &self.encode()?)
    }

    /// Read a directory object the given pointer references.
    pub fn read_from(io: &dyn ChunkIo, pointer: &BoxPointer) -> StoreResult<Self> {
        Self::decode(&io.get_chunk(ObjectKind::Tree, pointer)?)
    }
}

// ---------------------------------------------------------------------------
// CommitBox
// ---------------------------------------------------------------------------

/// Immutable snapshot record: a root tree, parent commits, and metadata.
///
/// Zero parents marks a root commit; two parents a merge. A commit is
/// identified by the content hash of its canonical encoding and is never
/// rewritten -- merges only ever add new commits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitBox {
    /// Pointer to the root `DirectoryBox` of this snapshot.
    pub tree: BoxPointer,
    /// Parent commit pointers, in recording order ("ours" first for merges).
    pub parents: Vec<BoxPointer>,
    /// Commit message.
    pub message: String,
    /// Author marker.
    pub author: String,
    /// Commit time, milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

impl CommitBox {
    /// Create a commit.
    pub fn new(
        tree: BoxPointer,
        parents: Vec<BoxPointer>,
        message: impl Into<String>,
        author: impl Into<String>,
        timestamp_ms: i64,
    ) -> Self {
        Self {
            tree,
            parents,
            message: message.into(),
            author: author.into(),
            timestamp_ms,
        }
    }

    /// Returns `true` if this commit has no parents.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Returns `true` if this commit has more than one parent.
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// Canonical byte encoding (stable field order).
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Decode from canonical bytes.
    pub fn decode(data: &[u8]) -> StoreResult<Self> {
        serde_json::from_slice(data)
            .map_err(|e| StoreError::CorruptObject(format!("commit: {e}")))
    }

    /// The content hash of the canonical encoding.
    pub fn hash(&self) -> StoreResult<HashValue> {
        Ok(ObjectKind::Commit.hasher().hash(&self.encode()?))
    }

    /// Store this commit as a chunk and return its pointer.
    pub fn write_to(&self, io: &dyn ChunkIo) -> StoreResult<BoxPointer> {
        io.put_chunk(ObjectKind::Commit, &self.encode()?)
    }

    /// Read a commit object the given pointer references.
    pub fn read_from(io: &dyn ChunkIo, pointer: &BoxPointer) -> StoreResult<Self> {
        Self::decode(&io.get_chunk(ObjectKind::Commit, pointer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::ChunkAccessor;
    use crate::memory::InMemoryChunkStore;
    use std::sync::Arc;

    fn ptr(b: u8) -> BoxPointer {
        BoxPointer::unencrypted(HashValue::from_digest([b; 32]))
    }

    fn accessor() -> ChunkAccessor {
        ChunkAccessor::plain(Arc::new(InMemoryChunkStore::new()))
    }

    // -----------------------------------------------------------------------
    // DirectoryBox
    // -----------------------------------------------------------------------

    #[test]
    fn entries_are_sorted_on_construction() {
        let dir = DirectoryBox::new(vec![
            DirEntry::file("zebra", ptr(1)),
            DirEntry::file("alpha", ptr(2)),
            DirEntry::directory("middle", ptr(3)),
        ]);
        let names: Vec<_> = dir.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "middle", "zebra"]);
    }

    #[test]
    fn insert_keeps_sorted_and_unique() {
        let mut dir = DirectoryBox::empty();
        dir.insert(DirEntry::file("b", ptr(1)));
        dir.insert(DirEntry::file("a", ptr(2)));
        dir.insert(DirEntry::file("b", ptr(3))); // replaces
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.get("b").unwrap().pointer, ptr(3));
    }

    #[test]
    fn remove_entry() {
        let mut dir = DirectoryBox::new(vec![DirEntry::file("a", ptr(1))]);
        assert!(dir.remove("a").is_some());
        assert!(dir.remove("a").is_none());
        assert!(dir.is_empty());
    }

    #[test]
    fn files_and_directories_iterators() {
        let dir = DirectoryBox::new(vec![
            DirEntry::file("f1", ptr(1)),
            DirEntry::directory("d1", ptr(2)),
            DirEntry::file("f2", ptr(3)),
        ]);
        assert_eq!(dir.files().count(), 2);
        assert_eq!(dir.directories().count(), 1);
    }

    #[test]
    fn identical_content_hashes_identically() {
        // Construction order must not matter: entries are canonicalized.
        let a = DirectoryBox::new(vec![
            DirEntry::file("x", ptr(1)),
            DirEntry::file("y", ptr(2)),
        ]);
        let b = DirectoryBox::new(vec![
            DirEntry::file("y", ptr(2)),
            DirEntry::file("x", ptr(1)),
        ]);
        assert_eq!(a.hash().unwrap(), b.hash().unwrap());
    }

    #[test]
    fn mutation_changes_hash() {
        let mut dir = DirectoryBox::new(vec![DirEntry::file("a", ptr(1))]);
        let before = dir.hash().unwrap();
        dir.insert(DirEntry::file("b", ptr(2)));
        assert_ne!(before, dir.hash().unwrap());
    }

    #[test]
    fn directory_storage_roundtrip() {
        let io = accessor();
        let dir = DirectoryBox::new(vec![
            DirEntry::file("file.txt", ptr(1)),
            DirEntry::directory("sub", ptr(2)),
        ]);
        let pointer = dir.write_to(&io).unwrap();
        let read_back = DirectoryBox::read_from(&io, &pointer).unwrap();
        assert_eq!(dir, read_back);
    }

    #[test]
    fn decode_rejects_unsorted_entries() {
        let json = br#"{"entries":[
            {"name":"b","kind":"File","pointer":{"data_hash":[0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,1],"key_hash":[0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0]}},
            {"name":"a","kind":"File","pointer":{"data_hash":[0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,2],"key_hash":[0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0]}}
        ]}"#;
        assert!(matches!(
            DirectoryBox::decode(json),
            Err(StoreError::CorruptObject(_))
        ));
    }

    #[test]
    fn decode_garbage_is_corrupt() {
        assert!(matches!(
            DirectoryBox::decode(b"not json at all"),
            Err(StoreError::CorruptObject(_))
        ));
    }

    // -----------------------------------------------------------------------
    // CommitBox
    // -----------------------------------------------------------------------

    #[test]
    fn root_and_merge_flags() {
        let root = CommitBox::new(ptr(1), vec![], "init", "alice", 1000);
        assert!(root.is_root());
        assert!(!root.is_merge());

        let merge = CommitBox::new(ptr(1), vec![ptr(2), ptr(3)], "merge", "alice", 2000);
        assert!(!merge.is_root());
        assert!(merge.is_merge());
    }

    #[test]
    fn commit_storage_roundtrip() {
        let io = accessor();
        let commit = CommitBox::new(ptr(1), vec![ptr(2)], "message", "bob", 42);
        let pointer = commit.write_to(&io).unwrap();
        let read_back = CommitBox::read_from(&io, &pointer).unwrap();
        assert_eq!(commit, read_back);
    }

    #[test]
    fn commit_hash_is_deterministic() {
        let c1 = CommitBox::new(ptr(1), vec![ptr(2)], "m", "a", 7);
        let c2 = CommitBox::new(ptr(1), vec![ptr(2)], "m", "a", 7);
        assert_eq!(c1.hash().unwrap(), c2.hash().unwrap());
    }

    #[test]
    fn commit_hash_covers_parents() {
        let c1 = CommitBox::new(ptr(1), vec![ptr(2)], "m", "a", 7);
        let c2 = CommitBox::new(ptr(1), vec![ptr(3)], "m", "a", 7);
        assert_ne!(c1.hash().unwrap(), c2.hash().unwrap());
    }

    #[test]
    fn commit_decode_garbage_is_corrupt() {
        assert!(matches!(
            CommitBox::decode(b"\x00\x01\x02"),
            Err(StoreError::CorruptObject(_))
        ));
    }

    #[test]
    fn tree_and_commit_chunks_do_not_collide() {
        let io = accessor();
        let dir = DirectoryBox::empty();
        let dir_ptr = dir.write_to(&io).unwrap();
        // Reading a tree pointer as a commit must fail loudly.
        assert!(CommitBox::read_from(&io, &dir_ptr).is_err());
    }
}
