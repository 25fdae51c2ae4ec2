use burrow_diff::DiffError;
use burrow_store::StoreError;

use crate::merge::MergeConflict;

/// Errors from merge-base discovery and three-way merging.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The two histories share no commit; the merge cannot proceed.
    #[error("no common ancestor between the two histories")]
    NoCommonAncestor,

    /// Conflicts were found and the caller asked for strict resolution.
    #[error("merge produced {} unresolved conflict(s)", .0.len())]
    Conflicts(Vec<MergeConflict>),

    /// Reading or writing objects failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Tree diffing failed.
    #[error(transparent)]
    Diff(#[from] DiffError),
}

/// Result alias for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;
