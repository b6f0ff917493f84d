//! File-backed content-addressed cache of documentation results.
//!
//! One JSON file per `(semantic hash, language)` key. Reads never fail the
//! caller: missing, unreadable, and undecodable entries are all misses.
//! Writes replace the target atomically (temp file + rename), so concurrent
//! writers for the same key resolve as last-writer-wins without torn files.

use super::hasher::SemanticHash;
use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// Address of one cached documentation target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Semantic hash of the snippet.
    pub hash: SemanticHash,
    /// Language tag.
    pub language: String,
}

impl CacheKey {
    /// Creates a key.
    #[must_use]
    pub fn new(hash: SemanticHash, language: impl Into<String>) -> Self {
        Self {
            hash,
            language: language.into(),
        }
    }

    /// File name for this key: `{hex}_{language}.json`.
    ///
    /// Path separators and control characters in the language are replaced
    /// with `_` so the name is always a single path component.
    #[must_use]
    pub fn file_name(&self) -> String {
        let language: String = self
            .language
            .chars()
            .map(|c| {
                if c == '/' || c == '\\' || c.is_control() {
                    '_'
                } else {
                    c
                }
            })
            .collect();
        format!("{}_{language}.json", self.hash.to_hex())
    }
}

/// Handle to a cache directory.
#[derive(Debug, Clone)]
pub struct ContentCache {
    dir: PathBuf,
}

impl ContentCache {
    /// Opens (and creates if needed) a cache directory.
    ///
    /// A directory that cannot be created is logged; every later read is then
    /// a miss and every write fails softly.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to create cache directory");
        }
        Self { dir }
    }

    /// The cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the entry for `key`.
    #[must_use]
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Reads and decodes the entry for `key`.
    ///
    /// Returns `None` when the entry is absent, unreadable, or undecodable.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let path = self.path_for(key);
        let data = fs::read(&path).ok()?;
        match serde_json::from_slice(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Ignoring undecodable cache entry");
                None
            },
        }
    }

    /// Writes the entry for `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem step fails. The
    /// previous entry, if any, is left intact on failure.
    pub fn set<T: Serialize>(&self, key: &CacheKey, value: &T) -> Result<()> {
        let data = serde_json::to_vec_pretty(value).map_err(|e| Error::OperationFailed {
            operation: "cache_serialize".to_string(),
            cause: e.to_string(),
        })?;

        let path = self.path_for(key);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", key.file_name(), uuid::Uuid::new_v4().simple()));

        if let Err(e) = fs::write(&tmp, &data) {
            let _ = fs::remove_file(&tmp);
            return Err(Error::OperationFailed {
                operation: "cache_write".to_string(),
                cause: format!("{}: {e}", tmp.display()),
            });
        }

        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::OperationFailed {
                operation: "cache_rename".to_string(),
                cause: format!("{}: {e}", path.display()),
            }
        })
    }

    /// Number of entries on disk.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries().count()
    }

    /// Removes every entry. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns an error if an entry cannot be removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.entries() {
            fs::remove_file(&path).map_err(|e| Error::OperationFailed {
                operation: "cache_clear".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;
            removed += 1;
        }
        Ok(removed)
    }

    fn entries(&self) -> impl Iterator<Item = PathBuf> {
        fs::read_dir(&self.dir)
            .into_iter()
            .flatten()
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.extension().is_some_and(|ext| ext == "json")
                    && !path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with('.'))
            })
    }
}
