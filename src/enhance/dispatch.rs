//! Concurrent dispatch of batch groups to the backend.
//!
//! Each group becomes one combined prompt and one backend call, running as
//! its own task. Results are written by index into a pre-sized slot vector,
//! so completion order never affects output order. The first group failure
//! is kept in a one-slot channel; later failures are logged and dropped.

use super::dedup::UniqueItem;
use super::grouping::BatchGroup;
use super::parser::parse_batch_response;
use super::prompt::render_item_prompt;
use crate::llm::Backend;
use crate::models::DocumentationSchema;
use crate::{Error, Result};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Per-slot results of one dispatch round plus the first failure, if any.
#[derive(Debug)]
pub struct DispatchOutcome<T> {
    /// One slot per dispatched item; `Some` only for members of groups that
    /// succeeded.
    pub results: Vec<Option<T>>,
    /// First group failure observed.
    pub error: Option<Error>,
}

impl<T> DispatchOutcome<T> {
    /// Converts into the slot vector, or the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first group failure if any group failed.
    pub fn into_result(self) -> Result<Vec<Option<T>>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.results),
        }
    }
}

/// Sends batch groups to a backend concurrently.
#[derive(Clone)]
pub struct BatchDispatcher {
    backend: Arc<dyn Backend>,
    template: Arc<str>,
}

impl std::fmt::Debug for BatchDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchDispatcher")
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}

impl BatchDispatcher {
    /// Creates a dispatcher rendering each item with `template`.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, template: impl Into<Arc<str>>) -> Self {
        Self {
            backend,
            template: template.into(),
        }
    }

    /// Dispatches every group and waits for all of them.
    ///
    /// Group indices refer to positions in `items`. The returned slot vector
    /// has `items.len()` entries.
    pub async fn dispatch<T: DocumentationSchema>(
        &self,
        items: &[UniqueItem],
        groups: &[BatchGroup],
        cancel: &CancellationToken,
    ) -> DispatchOutcome<T> {
        let results: Arc<Mutex<Vec<Option<T>>>> =
            Arc::new(Mutex::new((0..items.len()).map(|_| None).collect()));
        let (error_tx, mut error_rx) = mpsc::channel::<Error>(1);
        let mut tasks = JoinSet::new();

        for group in groups {
            let indices = group.indices().to_vec();
            let prompts: Vec<String> = indices
                .iter()
                .map(|&i| render_item_prompt(&self.template, &items[i].text, items[i].language()))
                .collect();
            let combined = T::batch_prompt(&prompts);

            let backend = Arc::clone(&self.backend);
            let cancel = cancel.clone();
            let results = Arc::clone(&results);
            let error_tx = error_tx.clone();
            let estimated_tokens = group.estimated_tokens();

            tasks.spawn(async move {
                let outcome = call_group::<T>(backend.as_ref(), &combined, indices.len(), &cancel).await;
                match outcome {
                    Ok(docs) => {
                        let mut slots = results.lock().unwrap_or_else(PoisonError::into_inner);
                        for (idx, doc) in indices.iter().zip(docs) {
                            slots[*idx] = Some(doc);
                        }
                    },
                    Err(e) => {
                        tracing::warn!(
                            indices = ?indices,
                            estimated_tokens,
                            error = %e,
                            "Batch group failed"
                        );
                        let _ = error_tx.try_send(e);
                    },
                }
            });
        }
        drop(error_tx);

        let mut task_failure = None;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Batch group task aborted");
                task_failure.get_or_insert_with(|| Error::OperationFailed {
                    operation: "dispatch_group".to_string(),
                    cause: e.to_string(),
                });
            }
        }

        let error = error_rx.try_recv().ok().or(task_failure);
        let results = std::mem::take(&mut *results.lock().unwrap_or_else(PoisonError::into_inner));
        DispatchOutcome { results, error }
    }
}

async fn call_group<T: DocumentationSchema>(
    backend: &dyn Backend,
    prompt: &str,
    expected: usize,
    cancel: &CancellationToken,
) -> Result<Vec<T>> {
    let provider = backend.name();
    tracing::debug!(provider, kind = T::KIND, group_size = expected, "Calling backend");

    let response = match backend.call(prompt, cancel).await {
        Ok(response) => response,
        Err(e) => {
            metrics::counter!("docforge_backend_calls_total", "provider" => provider, "status" => "error")
                .increment(1);
            return Err(e);
        },
    };
    metrics::counter!("docforge_backend_calls_total", "provider" => provider, "status" => "success")
        .increment(1);
    tracing::debug!(provider, response_len = response.len(), "Backend responded");

    parse_batch_response(&response, expected)
}
