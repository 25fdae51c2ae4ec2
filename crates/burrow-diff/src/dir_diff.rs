use burrow_store::{DirEntry, DirectoryBox, EntryKind};
use burrow_types::append_dir;

/// The kind of a single path-level change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    /// The entry exists only on the "theirs" side.
    Added,
    /// The entry exists only on the "ours" side.
    Removed,
    /// The entry exists on both sides with differing content.
    Modified,
}

/// A single change between two directory trees.
///
/// `ours`/`theirs` carry the entries as each side sees them: `Added` has
/// only `theirs`, `Removed` only `ours`, `Modified` both.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    /// Full path of the changed entry relative to the diff root.
    pub path: String,
    pub ours: Option<DirEntry>,
    pub theirs: Option<DirEntry>,
}

impl Change {
    pub(crate) fn added(path: String, theirs: DirEntry) -> Self {
        Self {
            kind: ChangeKind::Added,
            path,
            ours: None,
            theirs: Some(theirs),
        }
    }

    pub(crate) fn removed(path: String, ours: DirEntry) -> Self {
        Self {
            kind: ChangeKind::Removed,
            path,
            ours: Some(ours),
            theirs: None,
        }
    }

    pub(crate) fn modified(path: String, ours: DirEntry, theirs: DirEntry) -> Self {
        Self {
            kind: ChangeKind::Modified,
            path,
            ours: Some(ours),
            theirs: Some(theirs),
        }
    }

    /// Returns `true` if both sides of a modification are directories.
    pub fn is_directory_pair(&self) -> bool {
        matches!(
            (&self.ours, &self.theirs),
            (Some(o), Some(t))
                if o.kind == EntryKind::Directory && t.kind == EntryKind::Directory
        )
    }
}

/// Lazy, ordered diff of one directory level.
///
/// Walks the two sorted entry lists in lockstep, emitting changes in
/// entry-name order. Entries equal on both sides produce nothing. Each
/// construction is a fresh walk; the iterator holds no shared state.
pub struct DirDiffIterator {
    base_path: String,
    ours: Vec<DirEntry>,
    theirs: Vec<DirEntry>,
    our_index: usize,
    their_index: usize,
}

impl DirDiffIterator {
    /// Diff two directories, prefixing emitted paths with `base_path`.
    pub fn new(base_path: impl Into<String>, ours: &DirectoryBox, theirs: &DirectoryBox) -> Self {
        Self {
            base_path: base_path.into(),
            ours: ours.entries().to_vec(),
            theirs: theirs.entries().to_vec(),
            our_index: 0,
            their_index: 0,
        }
    }

    fn full_path(&self, name: &str) -> String {
        append_dir(&self.base_path, name)
    }
}

impl Iterator for DirDiffIterator {
    type Item = Change;

    fn next(&mut self) -> Option<Change> {
        loop {
            let our_entry = self.ours.get(self.our_index);
            let their_entry = self.theirs.get(self.their_index);
            match (our_entry, their_entry) {
                (None, None) => return None,
                (Some(ours), None) => {
                    self.our_index += 1;
                    return Some(Change::removed(self.full_path(&ours.name), ours.clone()));
                }
                (None, Some(theirs)) => {
                    self.their_index += 1;
                    return Some(Change::added(self.full_path(&theirs.name), theirs.clone()));
                }
                (Some(ours), Some(theirs)) => match ours.name.cmp(&theirs.name) {
                    std::cmp::Ordering::Less => {
                        self.our_index += 1;
                        return Some(Change::removed(self.full_path(&ours.name), ours.clone()));
                    }
                    std::cmp::Ordering::Greater => {
                        self.their_index += 1;
                        return Some(Change::added(self.full_path(&theirs.name), theirs.clone()));
                    }
                    std::cmp::Ordering::Equal => {
                        self.our_index += 1;
                        self.their_index += 1;
                        if ours != theirs {
                            return Some(Change::modified(
                                self.full_path(&ours.name),
                                ours.clone(),
                                theirs.clone(),
                            ));
                        }
                        // identical on both sides: nothing to emit
                    }
                },
            }
        }
    }
}
