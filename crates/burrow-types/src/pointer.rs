use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hash::HashValue;

/// Reference to a stored chunk.
///
/// `data_hash` identifies the chunk by the digest of its plaintext content;
/// `key_hash` identifies the encryption key material used to store it at
/// rest. Keeping the two separate lets keys rotate without recomputing any
/// content hashes: only `key_hash` changes. A zero `key_hash` means the
/// chunk is stored unencrypted.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoxPointer {
    /// Digest of the plaintext chunk content.
    pub data_hash: HashValue,
    /// Digest identifying the key material; zero if unencrypted.
    pub key_hash: HashValue,
}

impl BoxPointer {
    /// Create a pointer to an encrypted chunk.
    pub fn new(data_hash: HashValue, key_hash: HashValue) -> Self {
        Self {
            data_hash,
            key_hash,
        }
    }

    /// Create a pointer to an unencrypted chunk.
    pub fn unencrypted(data_hash: HashValue) -> Self {
        Self {
            data_hash,
            key_hash: HashValue::zero(),
        }
    }

    /// The null pointer (no chunk).
    pub const fn null() -> Self {
        Self {
            data_hash: HashValue::zero(),
            key_hash: HashValue::zero(),
        }
    }

    /// Returns `true` if this pointer references no chunk.
    pub fn is_null(&self) -> bool {
        self.data_hash.is_zero()
    }

    /// Returns `true` if the referenced chunk is stored encrypted.
    pub fn is_encrypted(&self) -> bool {
        !self.key_hash.is_zero()
    }
}

impl fmt::Debug for BoxPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BoxPointer(data: {}, key: {})",
            self.data_hash.short_hex(),
            self.key_hash.short_hex()
        )
    }
}
