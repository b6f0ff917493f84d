//! The batch enhancement pipeline.
//!
//! Control flow for one invocation:
//!
//! 1. Deduplicate `(text, language)` pairs by semantic hash.
//! 2. Look every unique item up in the content cache.
//! 3. Split the misses into outer chunks of `batch_size` items, processed
//!    sequentially.
//! 4. Group each chunk under the token budget and dispatch its groups
//!    concurrently, retrying the whole chunk on any group failure.
//! 5. Write successful group results to the cache as soon as they arrive.
//! 6. Expand per-unique results back to the original order.
//!
//! The invocation is all-or-nothing: a chunk that exhausts its retries fails
//! the call with [`Error::BatchFailed`], though entries cached along the way
//! make the next attempt cheaper.

use super::cache::ContentCache;
use super::dedup::{Deduplicated, UniqueItem};
use super::dispatch::BatchDispatcher;
use super::grouping::{BatchGroup, SkipFilter, TrivialInputFilter, plan_groups};
use super::retry::RetryController;
use crate::config::PipelineConfig;
use crate::llm::Backend;
use crate::models::DocumentationSchema;
use crate::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, instrument};

/// One input with a caller-owned slot for its result.
#[derive(Debug)]
pub struct EnhanceRequest<'a, T> {
    /// Snippet text.
    pub input: &'a str,
    /// Language tag.
    pub language: &'a str,
    /// Written with the result once the whole invocation succeeds.
    pub target: &'a mut T,
}

impl<'a, T> EnhanceRequest<'a, T> {
    /// Creates a request.
    pub fn new(input: &'a str, language: &'a str, target: &'a mut T) -> Self {
        Self {
            input,
            language,
            target,
        }
    }
}

/// Counters for one pipeline invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnhancementStats {
    /// Original inputs.
    pub total: usize,
    /// Distinct `(hash, language)` items.
    pub unique: usize,
    /// Unique items served from the cache.
    pub cached: usize,
    /// Unique items answered by the backend.
    pub processed: usize,
    /// Unique items excluded by the skip filter.
    pub skipped: usize,
}

/// Dedup, cache, group, dispatch, retry, and reassemble.
pub struct EnhancementPipeline {
    dispatcher: BatchDispatcher,
    cache: ContentCache,
    config: PipelineConfig,
    retry: RetryController,
    skip_filter: Arc<dyn SkipFilter>,
}

impl std::fmt::Debug for EnhancementPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnhancementPipeline")
            .field("dispatcher", &self.dispatcher)
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EnhancementPipeline {
    /// Creates a pipeline. Zero-valued config fields take their defaults.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, cache: ContentCache, config: PipelineConfig) -> Self {
        let config = config.apply_defaults();
        let dispatcher = BatchDispatcher::new(backend, config.prompt_template.as_str());
        let retry = RetryController::new(config.max_retries, config.backoff_unit());
        let skip_filter = Arc::new(TrivialInputFilter {
            min_significant_chars: config.min_significant_chars,
        });
        Self {
            dispatcher,
            cache,
            config,
            retry,
            skip_filter,
        }
    }

    /// Replaces the cheap-skip filter.
    #[must_use]
    pub fn with_skip_filter(mut self, filter: Arc<dyn SkipFilter>) -> Self {
        self.skip_filter = filter;
        self
    }

    /// Effective configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The content cache.
    #[must_use]
    pub const fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Documents every input, returning results in input order.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] if `inputs` and `languages` differ in length.
    /// - [`Error::Cancelled`] if `cancel` fires before a chunk starts.
    /// - [`Error::BatchFailed`] if an outer chunk fails after all retries.
    pub async fn enhance<T, S, L>(
        &self,
        inputs: &[S],
        languages: &[L],
        cancel: &CancellationToken,
    ) -> Result<Vec<T>>
    where
        T: DocumentationSchema,
        S: AsRef<str> + Sync,
        L: AsRef<str> + Sync,
    {
        self.enhance_with_stats(inputs, languages, cancel)
            .await
            .map(|(docs, _)| docs)
    }

    /// Documents every request and writes each result into its target.
    ///
    /// Targets are only written when the whole invocation succeeds.
    ///
    /// # Errors
    ///
    /// Same as [`Self::enhance`].
    pub async fn enhance_into<T: DocumentationSchema>(
        &self,
        requests: &mut [EnhanceRequest<'_, T>],
        cancel: &CancellationToken,
    ) -> Result<EnhancementStats> {
        let inputs: Vec<&str> = requests.iter().map(|r| r.input).collect();
        let languages: Vec<&str> = requests.iter().map(|r| r.language).collect();

        let (docs, stats) = self.enhance_with_stats(&inputs, &languages, cancel).await?;
        for (request, doc) in requests.iter_mut().zip(docs) {
            *request.target = doc;
        }
        Ok(stats)
    }

    /// Like [`Self::enhance`], also returning invocation counters.
    ///
    /// # Errors
    ///
    /// Same as [`Self::enhance`].
    #[instrument(skip_all, fields(kind = T::KIND, total = inputs.len()))]
    pub async fn enhance_with_stats<T, S, L>(
        &self,
        inputs: &[S],
        languages: &[L],
        cancel: &CancellationToken,
    ) -> Result<(Vec<T>, EnhancementStats)>
    where
        T: DocumentationSchema,
        S: AsRef<str> + Sync,
        L: AsRef<str> + Sync,
    {
        if inputs.len() != languages.len() {
            return Err(Error::InvalidInput(format!(
                "inputs and languages must have the same length ({} != {})",
                inputs.len(),
                languages.len()
            )));
        }

        let mut stats = EnhancementStats {
            total: inputs.len(),
            ..Default::default()
        };
        if inputs.is_empty() {
            return Ok((Vec::new(), stats));
        }

        let dedup = Deduplicated::from_pairs(
            inputs
                .iter()
                .map(AsRef::as_ref)
                .zip(languages.iter().map(AsRef::as_ref)),
        );
        stats.unique = dedup.unique.len();

        let mut results: Vec<Option<T>> = Vec::with_capacity(dedup.unique.len());
        let mut misses = Vec::new();
        for (idx, item) in dedup.unique.iter().enumerate() {
            let hit = self.cache.get::<T>(&item.key);
            if hit.is_none() {
                misses.push(idx);
            }
            results.push(hit);
        }
        stats.cached = stats.unique - misses.len();
        metrics::counter!("docforge_cache_hits_total").increment(stats.cached as u64);
        metrics::counter!("docforge_cache_misses_total").increment(misses.len() as u64);
        tracing::debug!(
            unique = stats.unique,
            cached = stats.cached,
            misses = misses.len(),
            "Cache lookup complete"
        );

        let batch_size = self.config.batch_size;
        for (chunk_no, chunk) in misses.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let start = chunk_no * batch_size;
            let end = start + chunk.len() - 1;
            let items: Vec<UniqueItem> = chunk.iter().map(|&u| dedup.unique[u].clone()).collect();
            let texts: Vec<&str> = items.iter().map(|item| item.text.as_str()).collect();

            let plan = plan_groups(&texts, self.skip_filter.as_ref(), self.config.token_budget);
            stats.skipped += plan.skipped.len();
            if plan.groups.is_empty() {
                continue;
            }

            let span = tracing::info_span!(
                "enhance.chunk",
                chunk_start = start,
                chunk_end = end,
                groups = plan.groups.len()
            );
            let slots = self
                .process_chunk::<T>(&items, &plan.groups, cancel)
                .instrument(span)
                .await
                .map_err(|e| Error::BatchFailed {
                    start,
                    end,
                    source: Box::new(e),
                })?;

            for (pos, slot) in slots.into_iter().enumerate() {
                if let Some(doc) = slot {
                    stats.processed += 1;
                    results[chunk[pos]] = Some(doc);
                }
            }
        }

        let per_unique: Vec<T> = results.into_iter().map(Option::unwrap_or_default).collect();
        let docs = dedup.expand(&per_unique);

        tracing::info!(
            total = stats.total,
            unique = stats.unique,
            cached = stats.cached,
            processed = stats.processed,
            skipped = stats.skipped,
            "Enhancement complete"
        );
        Ok((docs, stats))
    }

    /// Dispatches one chunk under the retry controller, caching every
    /// successful group before its attempt's outcome is judged.
    async fn process_chunk<T: DocumentationSchema>(
        &self,
        items: &[UniqueItem],
        groups: &[BatchGroup],
        cancel: &CancellationToken,
    ) -> Result<Vec<Option<T>>> {
        self.retry
            .run(cancel, move |_| async move {
                let outcome = self.dispatcher.dispatch::<T>(items, groups, cancel).await;
                self.store(items, &outcome.results);
                outcome.into_result()
            })
            .await
    }

    fn store<T: DocumentationSchema>(&self, items: &[UniqueItem], slots: &[Option<T>]) {
        for (item, slot) in items.iter().zip(slots) {
            let Some(doc) = slot else { continue };
            if let Err(e) = self.cache.set(&item.key, doc) {
                tracing::warn!(key = %item.key.hash, language = item.language(), error = %e, "Failed to cache result");
            }
        }
    }
}
