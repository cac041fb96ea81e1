//! Content hashing.

use sha2::{Digest, Sha256};

/// Computes the 32-byte SHA-256 digest of `bytes`.
///
/// Used both on insert (to populate a row's `sha`) and by dedup lookups
/// to compare content across rows.
#[must_use]
pub fn digest(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(digest(b"hello"), digest(b"hello"));
    }

    #[test]
    fn digest_distinguishes_content() {
        assert_ne!(digest(b"hello"), digest(b"world"));
    }
}
