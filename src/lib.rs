//! # Docforge
//!
//! Batch documentation enhancement for source code and configuration snippets.
//!
//! Docforge takes ordered `(text, language)` fragments and returns one
//! structured documentation record per fragment, produced by a remote
//! text-generation backend. The heavy lifting is making those calls cheap and
//! correct:
//!
//! - Content-addressed caching keyed on a normalized semantic hash
//! - Deduplication of identical snippets within one invocation
//! - Token-budget-aware grouping of snippets into combined requests
//! - Concurrent dispatch of groups with first-error fast failure
//! - Bounded retry with quadratic backoff that honours cancellation
//! - Tolerant parsing of JSON arrays wrapped in prose or markdown fences
//!
//! ## Example
//!
//! ```rust,ignore
//! use docforge::enhance::{ContentCache, EnhancementPipeline};
//! use docforge::models::Documentation;
//! use tokio_util::sync::CancellationToken;
//!
//! let pipeline = EnhancementPipeline::new(backend, ContentCache::new("ai-cache"), config);
//! let docs: Vec<Documentation> = pipeline
//!     .enhance(&inputs, &languages, &CancellationToken::new())
//!     .await?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod enhance;
pub mod llm;
pub mod models;
pub mod observability;

pub use config::{BackendKind, DocforgeConfig, LlmConfig, PipelineConfig};
pub use enhance::{
    ContentCache, EnhanceRequest, EnhancementPipeline, EnhancementStats, SemanticHash,
};
pub use llm::Backend;
pub use models::{Documentation, DocumentationSchema, YamlDocumentation};

/// Error type for docforge operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Mismatched input/language lengths, unknown backend names |
/// | `OperationFailed` | HTTP, filesystem, or decoding failures |
/// | `Cancelled` | The caller's cancellation token fired |
/// | `CountMismatch` | A backend answer decoded to the wrong number of records |
/// | `NoArrayFound` | A backend answer contained nothing array-like |
/// | `RetriesExhausted` | Every retry attempt for an outer chunk failed |
/// | `BatchFailed` | An outer chunk failed; carries its index range |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - `inputs` and `languages` differ in length
    /// - An unsupported backend name is configured
    /// - The input file for the CLI is malformed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - A backend HTTP request fails or returns a non-success status
    /// - A backend response body cannot be decoded
    /// - Filesystem I/O for the cache or config fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// A batch response decoded to the wrong number of records.
    #[error("documentation count mismatch: expected {expected}, got {actual}")]
    CountMismatch {
        /// Number of records the batch asked for.
        expected: usize,
        /// Number of records actually decoded.
        actual: usize,
    },

    /// A batch response contained no JSON array literal.
    #[error("no JSON array found in response")]
    NoArrayFound,

    /// All retry attempts failed.
    #[error("max retries exceeded after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The last underlying error.
        #[source]
        source: Box<Error>,
    },

    /// An outer chunk of unique inputs failed.
    #[error("batch {start}-{end} failed: {source}")]
    BatchFailed {
        /// First position (inclusive) of the chunk within the uncached work list.
        start: usize,
        /// Last position (inclusive) of the chunk within the uncached work list.
        end: usize,
        /// The underlying cause.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Returns true when this error, or any error it wraps, is a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::RetriesExhausted { source, .. } | Self::BatchFailed { source, .. } => {
                source.is_cancelled()
            },
            _ => false,
        }
    }
}

/// Result type alias for docforge operations.
pub type Result<T> = std::result::Result<T, Error>;
