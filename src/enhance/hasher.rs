//! Semantic hashing of input snippets.
//!
//! Snippets are normalized before hashing so inputs differing only in case or
//! incidental whitespace address the same cache entry.

use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest of a normalized snippet.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SemanticHash([u8; 32]);

impl SemanticHash {
    /// Hashes the normalized form of `input`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use docforge::SemanticHash;
    ///
    /// let a = SemanticHash::of("fn Add(a, b)");
    /// let b = SemanticHash::of("  fn  add(a,\n b) ");
    /// assert_eq!(a, b);
    /// assert_ne!(a, SemanticHash::of("fn add(a,b)"));
    /// ```
    #[must_use]
    pub fn of(input: &str) -> Self {
        let normalized = normalize(input);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Lowercase hex encoding (64 characters).
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for SemanticHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for SemanticHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SemanticHash({})", &self.to_hex()[..12])
    }
}

/// Lowercases and collapses every whitespace run to a single space.
#[must_use]
pub fn normalize(input: &str) -> String {
    input
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
