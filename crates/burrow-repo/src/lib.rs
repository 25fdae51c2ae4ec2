//! The burrow repository façade.
//!
//! Maps a forward-slash path hierarchy onto immutable directory and commit
//! objects in a content-addressed chunk store, and tracks the mutable head
//! pointer of one branch:
//!
//! - [`BranchStore`] -- named branch → head pointer, compare-and-swap updates
//! - [`RepoAccessor`] / [`Transaction`] -- per-branch serialized, buffered
//!   writes with a single atomic commit point
//! - [`Repository`] -- read/write/remove/list, copy-on-write [`commit`],
//!   ancestor-aware [`merge`]
//! - [`RepositoryConfig`] -- branch and author settings (TOML)
//!
//! [`commit`]: Repository::commit
//! [`merge`]: Repository::merge

pub mod branch;
pub mod config;
pub mod error;
pub mod repository;
pub mod transaction;

pub use branch::{BranchStore, InMemoryBranchStore};
pub use config::RepositoryConfig;
pub use error::{RepoError, RepoResult};
pub use repository::Repository;
pub use transaction::{RepoAccessor, Transaction};
