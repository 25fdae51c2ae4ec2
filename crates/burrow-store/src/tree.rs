use std::collections::HashMap;
use std::sync::Arc;

use burrow_types::{split_path, BoxPointer};

use crate::error::{StoreError, StoreResult};
use crate::object::{DirEntry, DirectoryBox, EntryKind};
use crate::traits::ChunkIo;

/// A mutable overlay over an immutable directory tree.
///
/// Directory objects are never updated in place; `TreeAccessor` accumulates
/// pending mutations in memory and, on [`build`], rebuilds exactly the
/// directories on the path from each changed leaf to the root. Untouched
/// subtrees keep their existing pointers and are never re-read or
/// re-hashed. Subdirectories that end up empty are pruned, so removing the
/// last file of a directory removes the directory itself.
///
/// Entries returned by [`get`] for subdirectories with pending changes
/// carry the pointer of the last built state; pointers are refreshed by
/// [`build`].
///
/// [`build`]: TreeAccessor::build
/// [`get`]: TreeAccessor::get
pub struct TreeAccessor {
    io: Arc<dyn ChunkIo>,
    root: Node,
    root_pointer: BoxPointer,
}

struct Node {
    dir: DirectoryBox,
    /// Loaded subdirectory nodes, keyed by entry name.
    children: HashMap<String, Node>,
    modified: bool,
}

impl Node {
    fn loaded(dir: DirectoryBox) -> Self {
        Self {
            dir,
            children: HashMap::new(),
            modified: false,
        }
    }

    fn fresh() -> Self {
        Self {
            dir: DirectoryBox::empty(),
            children: HashMap::new(),
            modified: true,
        }
    }
}

impl TreeAccessor {
    /// Open the tree the given root pointer references.
    pub fn new(io: Arc<dyn ChunkIo>, root_pointer: &BoxPointer) -> StoreResult<Self> {
        let dir = if root_pointer.is_null() {
            DirectoryBox::empty()
        } else {
            DirectoryBox::read_from(io.as_ref(), root_pointer)?
        };
        Ok(Self {
            io,
            root: Node::loaded(dir),
            root_pointer: *root_pointer,
        })
    }

    /// Start from an empty tree.
    pub fn empty(io: Arc<dyn ChunkIo>) -> Self {
        Self {
            io,
            root: Node::loaded(DirectoryBox::empty()),
            root_pointer: BoxPointer::null(),
        }
    }

    /// Returns `true` if there are pending mutations not yet built.
    pub fn is_modified(&self) -> bool {
        self.root.modified
    }

    /// Look up the entry at a path. The empty path names the root
    /// directory itself, which has no entry.
    pub fn get(&mut self, path: &str) -> StoreResult<Option<DirEntry>> {
        let parts = split_path(path);
        if parts.is_empty() {
            return Ok(None);
        }
        Self::get_in(&self.io, &mut self.root, &parts)
    }

    /// A snapshot of the directory at a path, reflecting pending
    /// mutations. The empty path names the root.
    pub fn directory(&mut self, path: &str) -> StoreResult<Option<DirectoryBox>> {
        let parts = split_path(path);
        let mut node = &mut self.root;
        for name in parts {
            let Some(entry) = node.dir.get(name) else {
                return Ok(None);
            };
            if entry.is_file() {
                return Ok(None);
            }
            let pointer = entry.pointer;
            node = Self::load_child(&self.io, node, name, &pointer)?;
        }
        Ok(Some(node.dir.clone()))
    }

    /// Insert or replace the file entry at a path, creating intermediate
    /// directories as needed.
    pub fn put_file(&mut self, path: &str, pointer: BoxPointer) -> StoreResult<()> {
        self.put_entry(path, EntryKind::File, pointer)
    }

    /// Insert or replace the entry at a path with the given kind and
    /// pointer. Directory entries graft an existing stored subtree.
    pub fn put_entry(
        &mut self,
        path: &str,
        kind: EntryKind,
        pointer: BoxPointer,
    ) -> StoreResult<()> {
        let parts = split_path(path);
        if parts.is_empty() {
            return Err(StoreError::InvalidPath("empty path".into()));
        }
        Self::put_in(&self.io, &mut self.root, &parts, kind, pointer)
    }

    /// Remove the entry at a path. Returns the removed entry, or `None`
    /// if the path does not exist. Directories left empty by a removal
    /// are pruned on [`build`](TreeAccessor::build).
    pub fn remove(&mut self, path: &str) -> StoreResult<Option<DirEntry>> {
        // Resolve first so nothing is marked modified for a miss.
        if self.get(path)?.is_none() {
            return Ok(None);
        }
        let parts = split_path(path);
        Self::remove_in(&self.io, &mut self.root, &parts)
    }

    /// Write every directory with pending changes, bottom-up, and return
    /// the new root pointer. Without pending changes this returns the
    /// existing root pointer untouched.
    pub fn build(&mut self) -> StoreResult<BoxPointer> {
        if !self.root.modified {
            return Ok(self.root_pointer);
        }
        Self::build_children(&self.io, &mut self.root)?;
        self.root.modified = false;
        let pointer = self.root.dir.write_to(self.io.as_ref())?;
        self.root_pointer = pointer;
        Ok(pointer)
    }

    /// The root pointer as of the last build (null for a never-built
    /// empty tree).
    pub fn root_pointer(&self) -> BoxPointer {
        self.root_pointer
    }

    // -- internals ----------------------------------------------------------

    fn load_child<'n>(
        io: &Arc<dyn ChunkIo>,
        node: &'n mut Node,
        name: &str,
        pointer: &BoxPointer,
    ) -> StoreResult<&'n mut Node> {
        if !node.children.contains_key(name) {
            let dir = DirectoryBox::read_from(io.as_ref(), pointer)?;
            node.children.insert(name.to_string(), Node::loaded(dir));
        }
        Ok(node.children.get_mut(name).expect("just inserted"))
    }

    fn get_in(
        io: &Arc<dyn ChunkIo>,
        node: &mut Node,
        parts: &[&str],
    ) -> StoreResult<Option<DirEntry>> {
        let name = parts[0];
        if parts.len() == 1 {
            return Ok(node.dir.get(name).cloned());
        }
        let Some(entry) = node.dir.get(name) else {
            return Ok(None);
        };
        if entry.is_file() {
            return Ok(None);
        }
        let pointer = entry.pointer;
        let child = Self::load_child(io, node, name, &pointer)?;
        Self::get_in(io, child, &parts[1..])
    }

    fn put_in(
        io: &Arc<dyn ChunkIo>,
        node: &mut Node,
        parts: &[&str],
        kind: EntryKind,
        pointer: BoxPointer,
    ) -> StoreResult<()> {
        node.modified = true;
        let name = parts[0];
        if parts.len() == 1 {
            // Replacing an entry invalidates any loaded subtree under it.
            node.children.remove(name);
            node.dir.insert(DirEntry {
                name: name.to_string(),
                kind,
                pointer,
            });
            return Ok(());
        }
        match node.dir.get(name) {
            Some(entry) if entry.is_file() => {
                return Err(StoreError::InvalidPath(format!(
                    "path routes through file entry '{name}'"
                )));
            }
            Some(entry) => {
                let child_pointer = entry.pointer;
                let child = Self::load_child(io, node, name, &child_pointer)?;
                Self::put_in(io, child, &parts[1..], kind, pointer)
            }
            None => {
                // Implicitly create the intermediate directory; its pointer
                // is assigned on build.
                node.dir
                    .insert(DirEntry::directory(name, BoxPointer::null()));
                node.children.insert(name.to_string(), Node::fresh());
                let child = node.children.get_mut(name).expect("just inserted");
                Self::put_in(io, child, &parts[1..], kind, pointer)
            }
        }
    }

    fn remove_in(
        io: &Arc<dyn ChunkIo>,
        node: &mut Node,
        parts: &[&str],
    ) -> StoreResult<Option<DirEntry>> {
        node.modified = true;
        let name = parts[0];
        if parts.len() == 1 {
            node.children.remove(name);
            return Ok(node.dir.remove(name));
        }
        let entry = node.dir.get(name).expect("existence checked by caller");
        let pointer = entry.pointer;
        let child = Self::load_child(io, node, name, &pointer)?;
        Self::remove_in(io, child, &parts[1..])
    }

    fn build_children(io: &Arc<dyn ChunkIo>, node: &mut Node) -> StoreResult<()> {
        let names: Vec<String> = node.children.keys().cloned().collect();
        for name in names {
            let child = node.children.get_mut(&name).expect("key from map");
            if !child.modified {
                continue;
            }
            Self::build_children(io, child)?;
            child.modified = false;
            if child.dir.is_empty() {
                node.children.remove(&name);
                node.dir.remove(&name);
            } else {
                let pointer = child.dir.write_to(io.as_ref())?;
                node.dir.insert(DirEntry::directory(name.clone(), pointer));
            }
        }
        Ok(())
    }
}
