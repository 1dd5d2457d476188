//! # Storage Key Generator
//!
//! Maps an arbitrary cache key onto an identifier that is safe to use as a file
//! name or a remote record key.
//!
//! The identifier is `<sanitized key>_<digest prefix>`. The sanitized part only
//! keeps ASCII letters, digits, `-` and `_` so a human can tell files apart; it may
//! be empty and different keys may sanitize to the same text. Uniqueness comes from
//! the SHA-256 prefix alone.

use sha2::{Digest, Sha256};
use std::fmt;

/// Number of hex characters of the SHA-256 digest kept in the identifier
pub const DIGEST_PREFIX_LEN: usize = 16;

/// Longest sanitized key kept for readability
pub const MAX_READABLE_LEN: usize = 64;

/// Storage identifier derived from a cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// Derive the storage identifier for a cache key
    pub fn encode(key: &str) -> Self {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        let readable = sanitize(key);
        Self(format!("{}_{}", readable, &digest[..DIGEST_PREFIX_LEN]))
    }

    /// Digest component, the part lookups actually depend on
    pub fn digest(&self) -> &str {
        &self.0[self.0.len() - DIGEST_PREFIX_LEN..]
    }

    /// Get the identifier as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(MAX_READABLE_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_is_stable() {
        assert_eq!(StorageKey::encode("all_users"), StorageKey::encode("all_users"));
    }

    #[test]
    fn test_known_layout() {
        let key = StorageKey::encode("all_users");
        assert!(key.as_str().starts_with("all_users_"));
        assert_eq!(key.digest().len(), DIGEST_PREFIX_LEN);
        assert!(key.digest().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_unsafe_characters_are_dropped() {
        let key = StorageKey::encode("user:42/profile?v=1");
        assert!(key.as_str().starts_with("user42profilev1_"));
        assert!(key
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }

    #[test]
    fn test_keys_with_same_sanitized_form_differ() {
        let a = StorageKey::encode("user:1");
        let b = StorageKey::encode("user/1");
        assert_ne!(a, b);
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_one_character_difference() {
        assert_ne!(StorageKey::encode("users_1"), StorageKey::encode("users_2"));
    }

    #[test]
    fn test_fully_unsafe_key_still_encodes() {
        let key = StorageKey::encode("::/?");
        assert_eq!(key.as_str().len(), DIGEST_PREFIX_LEN + 1);
        assert!(key.as_str().starts_with('_'));
    }

    #[test]
    fn test_long_keys_are_bounded() {
        let long_key = "a".repeat(1000);
        let key = StorageKey::encode(&long_key);
        assert_eq!(key.as_str().len(), MAX_READABLE_LEN + 1 + DIGEST_PREFIX_LEN);
    }
}
