//! Merge machinery for burrow.
//!
//! Reconciles two repository heads into one:
//!
//! - [`CommonAncestorsFinder`] walks both commit graphs backward to find
//!   every chain ending in a shared ancestor (merge-base computation).
//! - [`ThreeWayMerge`] combines the ancestor tree, "ours", and "theirs"
//!   into a merged tree plus a conflict list, driven by the tree diff.
//!
//! Merging never rewrites history: the output is always a fresh tree the
//! caller records as a new two-parent commit.

pub mod ancestors;
pub mod error;
pub mod merge;

pub use ancestors::{Chains, CommitNode, CommonAncestorsFinder, SingleCommitChain};
pub use error::{MergeError, MergeResult};
pub use merge::{ConflictSolver, MergeConflict, MergeOutcome, OursSolver, TheirsSolver, ThreeWayMerge};
