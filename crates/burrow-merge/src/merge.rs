use std::sync::Arc;

use tracing::{debug, warn};

use burrow_diff::{ChangeKind, TreeDiffIterator};
use burrow_store::{ChunkIo, CommitBox, DirEntry, DirectoryBox, TreeAccessor};

use crate::error::MergeResult;

/// A path where both sides changed since the base in incompatible ways.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeConflict {
    pub path: String,
    /// The entry as the common ancestor saw it (`None` if it did not exist).
    pub base: Option<DirEntry>,
    /// The entry on "ours" (`None` if ours removed it).
    pub ours: Option<DirEntry>,
    /// The entry on "theirs" (`None` if theirs removed it).
    pub theirs: Option<DirEntry>,
}

/// Resolution policy for conflicting changes.
///
/// `solve` returns the entry the merged tree should hold at the path, or
/// `None` for "absent". Conflicts are reported to the caller either way;
/// the solver only decides what lands in the tree.
pub trait ConflictSolver {
    fn solve(
        &self,
        path: &str,
        ours: Option<&DirEntry>,
        theirs: Option<&DirEntry>,
    ) -> Option<DirEntry>;
}

/// Deterministic "ours wins": the merged tree keeps our side of every
/// conflict, including our removals.
pub struct OursSolver;

impl ConflictSolver for OursSolver {
    fn solve(
        &self,
        _path: &str,
        ours: Option<&DirEntry>,
        _theirs: Option<&DirEntry>,
    ) -> Option<DirEntry> {
        ours.cloned()
    }
}

/// "Theirs wins": the mirror policy, mostly useful in tests and for
/// callers that re-run a rejected merge the other way around.
pub struct TheirsSolver;

impl ConflictSolver for TheirsSolver {
    fn solve(
        &self,
        _path: &str,
        _ours: Option<&DirEntry>,
        theirs: Option<&DirEntry>,
    ) -> Option<DirEntry> {
        theirs.cloned()
    }
}

/// The merged tree plus every conflict encountered along the way.
///
/// The tree has not been built yet: the caller decides whether to write
/// it (and a merge commit) or to reject the merge because `conflicts` is
/// non-empty -- both resolution modes from one walk.
pub struct MergeOutcome {
    pub tree: TreeAccessor,
    pub conflicts: Vec<MergeConflict>,
}

/// Three-way merge of two commits against a common-ancestor commit.
pub struct ThreeWayMerge;

impl ThreeWayMerge {
    /// Merge `theirs` into `ours` using `base` as the common ancestor.
    ///
    /// Walks the tree diff between the two heads; for every changed path
    /// the base tree decides which side actually changed:
    /// - changed on one side only → that side's change is applied,
    /// - changed identically on both sides → nothing to do (no diff entry),
    /// - changed incompatibly → recorded as a [`MergeConflict`] and
    ///   resolved through the [`ConflictSolver`].
    ///
    /// The merged tree starts from ours' root and is written through
    /// `out_io` (normally the repository transaction); `theirs_io` serves
    /// reads of their tree and the base tree. History is never rewritten:
    /// the caller commits the result as a new two-parent commit.
    pub fn merge(
        out_io: Arc<dyn ChunkIo>,
        ours: &CommitBox,
        theirs_io: Arc<dyn ChunkIo>,
        theirs: &CommitBox,
        base: &CommitBox,
        solver: &dyn ConflictSolver,
    ) -> MergeResult<MergeOutcome> {
        let ours_root = DirectoryBox::read_from(out_io.as_ref(), &ours.tree)?;
        let theirs_root = DirectoryBox::read_from(theirs_io.as_ref(), &theirs.tree)?;

        let mut base_tree = TreeAccessor::new(Arc::clone(&theirs_io), &base.tree)?;
        let mut out_tree = TreeAccessor::new(Arc::clone(&out_io), &ours.tree)?;
        let mut conflicts = Vec::new();

        let changes =
            TreeDiffIterator::new(out_io.as_ref(), &ours_root, theirs_io.as_ref(), &theirs_root);
        for change in changes {
            let change = change?;
            let base_entry = base_tree.get(&change.path)?;
            match change.kind {
                ChangeKind::Added => {
                    // Exists only on theirs.
                    let theirs_entry = change.theirs.as_ref().expect("added has theirs");
                    match &base_entry {
                        None => {
                            // Theirs added it; take it.
                            out_tree.put_entry(
                                &change.path,
                                theirs_entry.kind,
                                theirs_entry.pointer,
                            )?;
                        }
                        Some(base) if entry_unchanged(base, theirs_entry) => {
                            // Ours removed it, theirs left it alone: stays removed.
                        }
                        Some(_) => {
                            // Ours removed what theirs modified.
                            conflicts.push(MergeConflict {
                                path: change.path.clone(),
                                base: base_entry.clone(),
                                ours: None,
                                theirs: Some(theirs_entry.clone()),
                            });
                            apply_resolution(
                                &mut out_tree,
                                &change.path,
                                solver.solve(&change.path, None, Some(theirs_entry)),
                            )?;
                        }
                    }
                }
                ChangeKind::Removed => {
                    // Exists only on ours.
                    let ours_entry = change.ours.as_ref().expect("removed has ours");
                    match &base_entry {
                        Some(base) if entry_unchanged(base, ours_entry) => {
                            // Theirs removed it, ours left it alone: remove.
                            out_tree.remove(&change.path)?;
                        }
                        None => {
                            // Ours added it; keep.
                        }
                        Some(_) => {
                            // Theirs removed what ours modified.
                            conflicts.push(MergeConflict {
                                path: change.path.clone(),
                                base: base_entry.clone(),
                                ours: Some(ours_entry.clone()),
                                theirs: None,
                            });
                            apply_resolution(
                                &mut out_tree,
                                &change.path,
                                solver.solve(&change.path, Some(ours_entry), None),
                            )?;
                        }
                    }
                }
                ChangeKind::Modified => {
                    let ours_entry = change.ours.as_ref().expect("modified has ours");
                    let theirs_entry = change.theirs.as_ref().expect("modified has theirs");
                    match &base_entry {
                        Some(base) if entry_unchanged(base, ours_entry) => {
                            // Only theirs changed it; take theirs.
                            out_tree.put_entry(
                                &change.path,
                                theirs_entry.kind,
                                theirs_entry.pointer,
                            )?;
                        }
                        Some(base) if entry_unchanged(base, theirs_entry) => {
                            // Only ours changed it; keep ours.
                        }
                        _ => {
                            // Both sides changed it (or both added it with
                            // different content when the base lacks it).
                            conflicts.push(MergeConflict {
                                path: change.path.clone(),
                                base: base_entry.clone(),
                                ours: Some(ours_entry.clone()),
                                theirs: Some(theirs_entry.clone()),
                            });
                            apply_resolution(
                                &mut out_tree,
                                &change.path,
                                solver.solve(&change.path, Some(ours_entry), Some(theirs_entry)),
                            )?;
                        }
                    }
                }
            }
        }

        if conflicts.is_empty() {
            debug!("three-way merge finished without conflicts");
        } else {
            warn!(count = conflicts.len(), "three-way merge auto-resolved conflicts");
        }
        Ok(MergeOutcome {
            tree: out_tree,
            conflicts,
        })
    }
}

fn entry_unchanged(base: &DirEntry, side: &DirEntry) -> bool {
    base.pointer.data_hash == side.pointer.data_hash && base.kind == side.kind
}

fn apply_resolution(
    out_tree: &mut TreeAccessor,
    path: &str,
    resolved: Option<DirEntry>,
) -> MergeResult<()> {
    match resolved {
        Some(entry) => out_tree.put_entry(path, entry.kind, entry.pointer)?,
        None => {
            out_tree.remove(path)?;
        }
    }
    Ok(())
}
