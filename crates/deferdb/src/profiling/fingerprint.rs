//! SQL text fingerprints.

use std::fmt;

use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

/// 128-bit content hash of raw SQL text, used as an aggregation key.
///
/// Two texts with the same fingerprint are aggregated as the same statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u128);

impl Fingerprint {
    /// Fingerprint of `sql`, byte for byte (no normalization).
    #[must_use]
    pub fn of(sql: &str) -> Self {
        let digest = Sha256::digest(sql.as_bytes());
        let mut head = [0u8; 16];
        head.copy_from_slice(&digest[..16]);
        Self(u128::from_be_bytes(head))
    }

    #[must_use]
    pub const fn as_u128(self) -> u128 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_deterministic() {
        assert_eq!(Fingerprint::of("SELECT 1"), Fingerprint::of("SELECT 1"));
    }

    #[test]
    fn test_fingerprint_is_whitespace_sensitive() {
        assert_ne!(Fingerprint::of("SELECT 1"), Fingerprint::of("SELECT  1"));
    }

    #[test]
    fn test_fingerprint_display_is_32_hex_chars() {
        let text = Fingerprint::of("").to_string();
        assert_eq!(text.len(), 32);
        // leading 128 bits of SHA-256("")
        assert_eq!(text, "e3b0c44298fc1c149afbf4c8996fb924");
    }
}
