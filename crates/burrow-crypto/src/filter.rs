use burrow_types::HashValue;

/// Errors from the encrypt/decrypt byte filter.
///
/// The storage layer surfaces these as I/O failures; a failed filter must
/// never silently produce wrong plaintext or ciphertext.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// Encryption failed.
    #[error("encrypt failed: {0}")]
    Encrypt(String),

    /// Decryption failed (wrong key, truncated or tampered ciphertext).
    #[error("decrypt failed: {0}")]
    Decrypt(String),
}

/// Injectable byte transform applied by the storage layer on every read
/// and write, used for at-rest encryption.
///
/// Implementations must be deterministic for a fixed key/IV so that
/// content addressing stays stable, and must fail loudly rather than
/// return garbage. Key management lives entirely outside the core; the
/// filter only identifies its key material via [`IoFilter::key_hash`].
pub trait IoFilter: Send + Sync {
    /// Transform plaintext into the at-rest representation.
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, FilterError>;

    /// Transform the at-rest representation back into plaintext.
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, FilterError>;

    /// Digest identifying the key material this filter uses.
    ///
    /// Recorded in every [`burrow_types::BoxPointer`] written through the
    /// filter; the zero hash means "no encryption".
    fn key_hash(&self) -> HashValue;
}

/// The identity filter: stores bytes as-is.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughFilter;

impl IoFilter for PassthroughFilter {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, FilterError> {
        Ok(data.to_vec())
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, FilterError> {
        Ok(data.to_vec())
    }

    fn key_hash(&self) -> HashValue {
        HashValue::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_is_identity() {
        let filter = PassthroughFilter;
        let data = b"some bytes".to_vec();
        assert_eq!(filter.encrypt(&data).unwrap(), data);
        assert_eq!(filter.decrypt(&data).unwrap(), data);
    }

    #[test]
    fn passthrough_has_zero_key() {
        assert!(PassthroughFilter.key_hash().is_zero());
    }
}
