//! Write-buffered, path-scoped storage views for burrow.
//!
//! [`StorageDir`] is the layer application code talks to: a view over a
//! committed key-value tree ([`Database`]) with an in-memory write buffer,
//! path-prefix scoping, optional at-rest encryption via
//! [`burrow_crypto::IoFilter`], and commit-time change notification.
//! Every view derived from the same root shares one [`StorageDirCache`] --
//! one buffer, one flush, one commit point.

pub mod database;
pub mod error;
pub mod storage_dir;

pub use database::{Database, DatabaseDiff, RepoDatabase};
pub use error::{StorageError, StorageResult};
pub use storage_dir::{StorageDir, StorageDirCache, TipListener};
