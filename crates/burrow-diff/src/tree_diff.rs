use burrow_store::{ChunkIo, CommitBox, DirectoryBox};

use crate::dir_diff::{Change, DirDiffIterator};
use crate::error::DiffResult;

/// Recursive diff of two directory trees, flattened into one lazy,
/// path-ordered sequence.
///
/// When an entry is modified and both sides are subdirectories, the
/// iterator descends instead of reporting the directory itself, so
/// consumers only ever see leaf-level changes with full paths. Descending
/// happens depth-first, keeping the overall sequence in path-lexicographic
/// order. The two sides may live in different stores; each is read through
/// its own [`ChunkIo`].
///
/// The iterator is finite and holds no state beyond its own walk: diffing
/// the same trees twice constructs two independent walks.
pub struct TreeDiffIterator<'a> {
    ours_io: &'a dyn ChunkIo,
    theirs_io: &'a dyn ChunkIo,
    current: DirDiffIterator,
    stack: Vec<DirDiffIterator>,
}

impl<'a> TreeDiffIterator<'a> {
    /// Diff two directory trees.
    pub fn new(
        ours_io: &'a dyn ChunkIo,
        ours: &DirectoryBox,
        theirs_io: &'a dyn ChunkIo,
        theirs: &DirectoryBox,
    ) -> Self {
        Self {
            ours_io,
            theirs_io,
            current: DirDiffIterator::new("", ours, theirs),
            stack: Vec::new(),
        }
    }

    /// Diff two commits, defined as the diff of their root trees.
    pub fn of_commits(
        ours_io: &'a dyn ChunkIo,
        ours: &CommitBox,
        theirs_io: &'a dyn ChunkIo,
        theirs: &CommitBox,
    ) -> DiffResult<Self> {
        let our_root = DirectoryBox::read_from(ours_io, &ours.tree)?;
        let their_root = DirectoryBox::read_from(theirs_io, &theirs.tree)?;
        Ok(Self::new(ours_io, &our_root, theirs_io, &their_root))
    }

    fn descend(&mut self, change: &Change) -> DiffResult<()> {
        let ours = change.ours.as_ref().expect("directory pair has ours");
        let theirs = change.theirs.as_ref().expect("directory pair has theirs");
        let our_box = DirectoryBox::read_from(self.ours_io, &ours.pointer)?;
        let their_box = DirectoryBox::read_from(self.theirs_io, &theirs.pointer)?;
        let sub = DirDiffIterator::new(change.path.clone(), &our_box, &their_box);
        let parent = std::mem::replace(&mut self.current, sub);
        self.stack.push(parent);
        Ok(())
    }
}

impl Iterator for TreeDiffIterator<'_> {
    type Item = DiffResult<Change>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(change) = self.current.next() {
                if change.kind == crate::dir_diff::ChangeKind::Modified
                    && change.is_directory_pair()
                {
                    // Both sides are directories: recurse instead of
                    // reporting the directory itself.
                    if let Err(e) = self.descend(&change) {
                        return Some(Err(e));
                    }
                    continue;
                }
                return Some(Ok(change));
            }
            match self.stack.pop() {
                Some(parent) => self.current = parent,
                None => return None,
            }
        }
    }
}

/// Collect the full change list between two trees.
pub fn diff_trees(
    ours_io: &dyn ChunkIo,
    ours: &DirectoryBox,
    theirs_io: &dyn ChunkIo,
    theirs: &DirectoryBox,
) -> DiffResult<Vec<Change>> {
    TreeDiffIterator::new(ours_io, ours, theirs_io, theirs).collect()
}
