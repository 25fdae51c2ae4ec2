//! Hashing and byte-filter contracts for burrow.
//!
//! The repository core does not implement key management, envelopes, or
//! wire crypto; it consumes exactly two narrow contracts from the
//! surrounding application:
//!
//! - [`ContentHasher`] -- the digest function used uniformly for chunk
//!   addressing and change detection. One digest per repository lifetime:
//!   changing it invalidates every stored hash.
//! - [`IoFilter`] -- an injectable encrypt/decrypt byte transform applied
//!   by the storage layer for at-rest encryption. [`PassthroughFilter`]
//!   is the identity implementation for unencrypted stores.

pub mod filter;
pub mod hasher;

pub use filter::{FilterError, IoFilter, PassthroughFilter};
pub use hasher::ContentHasher;
