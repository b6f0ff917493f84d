//! Decoding of combined backend answers into per-snippet records.
//!
//! Hosted models often wrap a valid JSON array in prose or markdown fences.
//! Parsing first tries the whole text, then falls back to the outermost
//! `[` ... `]` span. A wrong record count is always a hard failure.

use crate::{Error, Result};
use serde::de::DeserializeOwned;

/// Decodes `response` into exactly `expected` records.
///
/// # Errors
///
/// - [`Error::CountMismatch`] if a decode succeeds with the wrong length
///   (direct decodes do not fall back).
/// - [`Error::NoArrayFound`] if the text is not an array and contains no
///   bracketed span.
/// - [`Error::OperationFailed`] if the bracketed span does not decode.
pub fn parse_batch_response<T: DeserializeOwned>(response: &str, expected: usize) -> Result<Vec<T>> {
    if let Ok(docs) = serde_json::from_str::<Vec<T>>(response.trim()) {
        return check_count(docs, expected);
    }

    let candidate = extract_json_array(response).ok_or(Error::NoArrayFound)?;
    tracing::debug!(
        response_len = response.len(),
        span_len = candidate.len(),
        "Direct decode failed, using extracted array"
    );

    let docs = serde_json::from_str::<Vec<T>>(candidate).map_err(|e| Error::OperationFailed {
        operation: "parse_batch_response".to_string(),
        cause: format!("failed to unmarshal documentation: {e}"),
    })?;

    check_count(docs, expected)
}

fn check_count<T>(docs: Vec<T>, expected: usize) -> Result<Vec<T>> {
    if docs.len() == expected {
        Ok(docs)
    } else {
        Err(Error::CountMismatch {
            expected,
            actual: docs.len(),
        })
    }
}

/// Returns the span from the first `[` to the last `]`, if any.
#[must_use]
pub fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}
