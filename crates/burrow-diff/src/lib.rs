//! Tree diffing for burrow.
//!
//! Produces lazy, path-ordered change sequences between two directory
//! trees (or two commits, transitively). The walk is a lockstep merge of
//! the sorted entry lists that `DirectoryBox` maintains, so a diff never
//! touches subtrees whose pointers are equal on both sides -- unchanged
//! parts of the tree cost nothing.
//!
//! - [`DirDiffIterator`] -- one directory level
//! - [`TreeDiffIterator`] -- recursive, flattened over a whole tree

pub mod dir_diff;
pub mod error;
pub mod tree_diff;

pub use dir_diff::{Change, ChangeKind, DirDiffIterator};
pub use error::{DiffError, DiffResult};
pub use tree_diff::{diff_trees, TreeDiffIterator};
