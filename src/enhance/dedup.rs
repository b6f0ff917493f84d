//! Collapses duplicate `(snippet, language)` pairs into unique work.

use super::cache::CacheKey;
use super::hasher::SemanticHash;
use std::collections::HashMap;

/// One distinct `(semantic hash, language)` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueItem {
    /// Cache address of this item.
    pub key: CacheKey,
    /// First-seen original text.
    pub text: String,
}

impl UniqueItem {
    /// Language tag of this item.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.key.language
    }
}

/// Result of deduplicating an ordered input list.
///
/// For every original position `i`, `unique[reverse_map[i]]` has the same
/// semantic hash and language as input `i`.
#[derive(Debug, Clone, Default)]
pub struct Deduplicated {
    /// Semantic hash of every original input, in input order.
    pub hashes: Vec<SemanticHash>,
    /// Distinct items in first-occurrence order.
    pub unique: Vec<UniqueItem>,
    /// Original index to unique index.
    pub reverse_map: Vec<usize>,
}

impl Deduplicated {
    /// Deduplicates `(text, language)` pairs in a single pass.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let pairs = pairs.into_iter();
        let (lower, _) = pairs.size_hint();
        let mut seen: HashMap<CacheKey, usize> = HashMap::with_capacity(lower);
        let mut out = Self {
            hashes: Vec::with_capacity(lower),
            unique: Vec::new(),
            reverse_map: Vec::with_capacity(lower),
        };

        for (text, language) in pairs {
            let hash = SemanticHash::of(text);
            out.hashes.push(hash);

            let key = CacheKey::new(hash, language);
            if let Some(&idx) = seen.get(&key) {
                out.reverse_map.push(idx);
                continue;
            }

            let idx = out.unique.len();
            seen.insert(key.clone(), idx);
            out.reverse_map.push(idx);
            out.unique.push(UniqueItem {
                key,
                text: text.to_string(),
            });
        }

        out
    }

    /// Number of original inputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reverse_map.len()
    }

    /// Whether there were no inputs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reverse_map.is_empty()
    }

    /// Re-expands per-unique results to the original order.
    ///
    /// `results` must be indexed by unique index.
    #[must_use]
    pub fn expand<T: Clone>(&self, results: &[T]) -> Vec<T> {
        self.reverse_map
            .iter()
            .map(|&idx| results[idx].clone())
            .collect()
    }
}
