//! Enhancement pipeline integration tests.
//!
//! Drives [`EnhancementPipeline`] end to end against an in-process scripted
//! backend and an isolated cache directory:
//! - Warm-cache idempotence
//! - Order preservation across concurrent groups
//! - Deduplication and language separation
//! - Count-mismatch rejection and fallback extraction
//! - Chunk retry, partial-group caching, and failure ranges
//! - Cancellation during retry backoff and mid-chunk

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::excessive_nesting,
    dead_code
)]

use async_trait::async_trait;
use docforge::config::PipelineConfig;
use docforge::enhance::{CacheKey, ContentCache, EnhancementPipeline, SemanticHash};
use docforge::llm::Backend;
use docforge::models::{Documentation, YamlDocumentation};
use docforge::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Scripted Backend
// ============================================================================

type Responder = dyn Fn(usize, &[String]) -> Result<String> + Send + Sync;

/// Backend whose answers are computed from the call number and the snippet
/// texts found in the combined prompt.
struct ScriptedBackend {
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<String>>>,
    delay: Option<Box<dyn Fn(&[String]) -> Duration + Send + Sync>>,
    responder: Box<Responder>,
}

impl ScriptedBackend {
    fn new(responder: impl Fn(usize, &[String]) -> Result<String> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            delay: None,
            responder: Box::new(responder),
        })
    }

    fn echo() -> Arc<Self> {
        Self::new(|_, snippets| Ok(echo_docs(snippets)))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn snippets_sent(&self) -> usize {
        self.seen.lock().unwrap().iter().map(Vec::len).sum()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn call(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let snippets = snippets_in(prompt);
        self.seen.lock().unwrap().push(snippets.clone());
        if let Some(delay) = &self.delay {
            tokio::select! {
                () = tokio::time::sleep(delay(&snippets)) => {},
                () = cancel.cancelled() => return Err(Error::Cancelled),
            }
        }
        (self.responder)(call, &snippets)
    }
}

/// Extracts snippet texts from a combined prompt rendered with the `{code}`
/// template.
fn snippets_in(prompt: &str) -> Vec<String> {
    prompt
        .lines()
        .filter_map(|line| line.trim().strip_prefix("\"Snippet "))
        .filter_map(|rest| rest.split_once(": "))
        .map(|(_, text)| text.trim_end_matches(',').trim_end_matches('"').to_string())
        .collect()
}

fn echo_docs(snippets: &[String]) -> String {
    let docs: Vec<Documentation> = snippets
        .iter()
        .map(|s| Documentation {
            summary: format!("doc for {s}"),
            ..Default::default()
        })
        .collect();
    serde_json::to_string(&docs).unwrap()
}

fn failure(cause: &str) -> Error {
    Error::OperationFailed {
        operation: "scripted_call".to_string(),
        cause: cause.to_string(),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn test_config() -> PipelineConfig {
    PipelineConfig {
        prompt_template: "{code}".to_string(),
        backoff_unit_ms: 1,
        ..PipelineConfig::default()
    }
}

fn pipeline_with(
    backend: Arc<ScriptedBackend>,
    dir: &TempDir,
    config: PipelineConfig,
) -> EnhancementPipeline {
    EnhancementPipeline::new(backend, ContentCache::new(dir.path()), config)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

// ============================================================================
// Caching and Deduplication
// ============================================================================

mod caching {
    use super::*;

    #[tokio::test]
    async fn test_warm_cache_makes_no_backend_calls() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedBackend::echo();
        let pipeline = pipeline_with(backend.clone(), &dir, test_config());
        let inputs = strings(&["fn alpha() { one() }", "fn beta() { two() }"]);
        let languages = strings(&["rust", "rust"]);
        let cancel = CancellationToken::new();

        let first: Vec<Documentation> = pipeline.enhance(&inputs, &languages, &cancel).await.unwrap();
        let calls_after_first = backend.calls();
        assert!(calls_after_first > 0);

        let second: Vec<Documentation> = pipeline.enhance(&inputs, &languages, &cancel).await.unwrap();
        assert_eq!(backend.calls(), calls_after_first);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cache_survives_new_pipeline_instance() {
        let dir = TempDir::new().unwrap();
        let inputs = strings(&["def area(r): return 3.14 * r * r"]);
        let languages = strings(&["python"]);
        let cancel = CancellationToken::new();

        let warm = ScriptedBackend::echo();
        let _: Vec<Documentation> = pipeline_with(warm, &dir, test_config())
            .enhance(&inputs, &languages, &cancel)
            .await
            .unwrap();

        let cold = ScriptedBackend::echo();
        let (_, stats) = pipeline_with(cold.clone(), &dir, test_config())
            .enhance_with_stats::<Documentation, _, _>(&inputs, &languages, &cancel)
            .await
            .unwrap();
        assert_eq!(cold.calls(), 0);
        assert_eq!(stats.cached, 1);
    }

    #[tokio::test]
    async fn test_duplicates_are_sent_once() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedBackend::echo();
        let pipeline = pipeline_with(backend.clone(), &dir, test_config());
        let inputs = strings(&["func A() int { return 1 }", "func  a() INT { return 1 }", "func B() {}"]);
        let languages = strings(&["go", "go", "go"]);

        let (docs, stats) = pipeline
            .enhance_with_stats::<Documentation, _, _>(&inputs, &languages, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.unique, 2);
        assert_eq!(backend.snippets_sent(), 2);
        assert_eq!(docs[0], docs[1]);
        assert_ne!(docs[0], docs[2]);
    }

    #[tokio::test]
    async fn test_same_text_different_language_is_separate_work() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedBackend::echo();
        let pipeline = pipeline_with(backend.clone(), &dir, test_config());

        let _: Vec<Documentation> = pipeline
            .enhance(&["x = compute(1)", "x = compute(1)"], &["python", "ruby"], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(backend.snippets_sent(), 2);
        assert_eq!(pipeline.cache().entry_count(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_is_recomputed() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedBackend::echo();
        let pipeline = pipeline_with(backend.clone(), &dir, test_config());
        let text = "fn gamma() { three() }";
        let key = CacheKey::new(SemanticHash::of(text), "rust");
        std::fs::write(pipeline.cache().path_for(&key), b"not json").unwrap();

        let docs: Vec<Documentation> = pipeline
            .enhance(&[text], &["rust"], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(backend.calls(), 1);
        assert_eq!(docs[0].summary, format!("doc for {text}"));
        assert_eq!(pipeline.cache().get::<Documentation>(&key), Some(docs[0].clone()));
    }
}

// ============================================================================
// Ordering and Grouping
// ============================================================================

mod ordering {
    use super::*;

    #[tokio::test]
    async fn test_results_follow_input_order_despite_completion_order() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend {
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            // Earlier snippets answer later.
            delay: Some(Box::new(|snippets: &[String]| {
                let n: u64 = snippets[0]
                    .trim_start_matches("item_")
                    .split_whitespace()
                    .next()
                    .and_then(|d| d.parse().ok())
                    .unwrap_or(0);
                Duration::from_millis(50u64.saturating_sub(n * 10))
            })),
            responder: Box::new(|_, snippets| Ok(echo_docs(snippets))),
        });
        let config = PipelineConfig {
            token_budget: 1,
            batch_size: 5,
            ..test_config()
        };
        let pipeline = pipeline_with(backend.clone(), &dir, config);
        let inputs: Vec<String> = (0..5).map(|i| format!("item_{i} does work")).collect();
        let languages = vec!["go".to_string(); 5];

        let docs: Vec<Documentation> = pipeline
            .enhance(&inputs, &languages, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(backend.calls(), 5);
        for (input, doc) in inputs.iter().zip(&docs) {
            assert_eq!(doc.summary, format!("doc for {input}"));
        }
    }

    #[tokio::test]
    async fn test_small_inputs_share_one_request() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedBackend::echo();
        let pipeline = pipeline_with(backend.clone(), &dir, test_config());

        let _: Vec<Documentation> = pipeline
            .enhance(
                &["fn a() { x() }", "fn b() { y() }", "fn c() { z() }"],
                &["rust"; 3],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(backend.calls(), 1);
        assert_eq!(backend.snippets_sent(), 3);
    }

    #[tokio::test]
    async fn test_outer_chunks_are_bounded_by_batch_size() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedBackend::echo();
        let config = PipelineConfig {
            batch_size: 2,
            ..test_config()
        };
        let pipeline = pipeline_with(backend.clone(), &dir, config);
        let inputs: Vec<String> = (0..5).map(|i| format!("fn f{i}() {{ body() }}")).collect();
        let languages = vec!["rust".to_string(); 5];

        let _: Vec<Documentation> = pipeline
            .enhance(&inputs, &languages, &CancellationToken::new())
            .await
            .unwrap();

        let sizes: Vec<usize> = backend.seen.lock().unwrap().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_trivial_inputs_never_reach_backend() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedBackend::echo();
        let pipeline = pipeline_with(backend.clone(), &dir, test_config());

        let (docs, stats) = pipeline
            .enhance_with_stats::<Documentation, _, _>(
                &["", "}", "fn real() { work() }"],
                &["rust"; 3],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(stats.skipped, 2);
        assert_eq!(backend.snippets_sent(), 1);
        assert_eq!(docs[0], Documentation::default());
        assert_eq!(docs[1], Documentation::default());
        assert!(!docs[2].summary.is_empty());
    }

    #[tokio::test]
    async fn test_custom_skip_filter() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedBackend::echo();
        let pipeline = pipeline_with(backend.clone(), &dir, test_config())
            .with_skip_filter(Arc::new(|s: &str| s.starts_with("//")));

        let (_, stats) = pipeline
            .enhance_with_stats::<Documentation, _, _>(
                &["// just a comment here", "fn real() { work() }"],
                &["rust"; 2],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(stats.skipped, 1);
        assert_eq!(backend.snippets_sent(), 1);
    }
}

// ============================================================================
// Response Handling
// ============================================================================

mod responses {
    use super::*;

    #[tokio::test]
    async fn test_fenced_response_is_accepted() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedBackend::new(|_, snippets| {
            Ok(format!("Sure! ```json\n{}\n```", echo_docs(snippets)))
        });
        let pipeline = pipeline_with(backend, &dir, test_config());

        let docs: Vec<Documentation> = pipeline
            .enhance(&["fn a() { x() }", "fn b() { y() }"], &["rust"; 2], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.summary.starts_with("doc for")));
    }

    #[tokio::test]
    async fn test_short_answer_is_rejected_after_retries() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedBackend::new(|_, snippets| Ok(echo_docs(&snippets[1..])));
        let pipeline = pipeline_with(backend.clone(), &dir, test_config());

        let err = pipeline
            .enhance::<Documentation, _, _>(
                &["fn a() { x() }", "fn b() { y() }", "fn c() { z() }"],
                &["rust"; 3],
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(backend.calls(), 3);
        match err {
            Error::BatchFailed { start, end, source } => {
                assert_eq!((start, end), (0, 2));
                match *source {
                    Error::RetriesExhausted { attempts, source } => {
                        assert_eq!(attempts, 3);
                        assert!(matches!(
                            *source,
                            Error::CountMismatch {
                                expected: 3,
                                actual: 2
                            }
                        ));
                    },
                    other => panic!("unexpected source: {other:?}"),
                }
            },
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(dir.path().read_dir().unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_yaml_shape() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedBackend::new(|_, snippets| {
            let docs: Vec<YamlDocumentation> = snippets
                .iter()
                .map(|_| YamlDocumentation {
                    summary: "deployment replicas".to_string(),
                    ..Default::default()
                })
                .collect();
            Ok(serde_json::to_string(&docs).unwrap())
        });
        let pipeline = pipeline_with(backend, &dir, test_config());

        let docs: Vec<YamlDocumentation> = pipeline
            .enhance(&["replicas: 3 # scale out"], &["yaml"], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(docs[0].summary, "deployment replicas");
    }
}

// ============================================================================
// Retry, Failure, and Cancellation
// ============================================================================

mod failures {
    use super::*;

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedBackend::new(|call, snippets| {
            if call == 0 {
                Err(failure("connection reset"))
            } else {
                Ok(echo_docs(snippets))
            }
        });
        let pipeline = pipeline_with(backend.clone(), &dir, test_config());

        let docs: Vec<Documentation> = pipeline
            .enhance(&["fn a() { x() }"], &["rust"], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(backend.calls(), 2);
        assert_eq!(docs[0].summary, "doc for fn a() { x() }");
    }

    #[tokio::test]
    async fn test_successful_groups_are_cached_when_chunk_fails() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedBackend::new(|_, snippets| {
            if snippets.iter().any(|s| s.contains("poison")) {
                Err(failure("bad group"))
            } else {
                Ok(echo_docs(snippets))
            }
        });
        let config = PipelineConfig {
            token_budget: 1,
            ..test_config()
        };
        let pipeline = pipeline_with(backend, &dir, config);
        let good = "fn healthy() { fine() }";

        let result = pipeline
            .enhance::<Documentation, _, _>(
                &[good, "fn poison() { bad() }"],
                &["rust"; 2],
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(Error::BatchFailed { .. })));
        let key = CacheKey::new(SemanticHash::of(good), "rust");
        assert!(pipeline.cache().get::<Documentation>(&key).is_some());
        assert_eq!(pipeline.cache().entry_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_names_chunk_range_and_keeps_earlier_chunks() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedBackend::new(|_, snippets| {
            if snippets.iter().any(|s| s.contains("f2")) {
                Err(failure("unavailable"))
            } else {
                Ok(echo_docs(snippets))
            }
        });
        let config = PipelineConfig {
            batch_size: 2,
            ..test_config()
        };
        let pipeline = pipeline_with(backend, &dir, config);
        let inputs: Vec<String> = (0..5).map(|i| format!("fn f{i}() {{ body() }}")).collect();
        let languages = vec!["rust".to_string(); 5];

        let err = pipeline
            .enhance::<Documentation, _, _>(&inputs, &languages, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::BatchFailed { start: 2, end: 3, .. }));
        assert!(err.to_string().starts_with("batch 2-3 failed"));
        assert_eq!(pipeline.cache().entry_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_returns_promptly() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedBackend::new(|_, _| Err(failure("down")));
        let config = PipelineConfig {
            backoff_unit_ms: 3_600_000,
            ..test_config()
        };
        let pipeline = pipeline_with(backend.clone(), &dir, config);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let start = tokio::time::Instant::now();
        let err = pipeline
            .enhance::<Documentation, _, _>(&["fn a() { x() }"], &["rust"], &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(backend.calls(), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_answered_group_is_cached_when_cancelled_mid_chunk() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend {
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            delay: Some(Box::new(|snippets: &[String]| {
                if snippets.iter().any(|s| s.contains("slow")) {
                    Duration::from_secs(3_600)
                } else {
                    Duration::ZERO
                }
            })),
            responder: Box::new(|_, snippets| Ok(echo_docs(snippets))),
        });
        let config = PipelineConfig {
            token_budget: 1,
            ..test_config()
        };
        let pipeline = pipeline_with(backend.clone(), &dir, config);
        let quick = "fn quick() { done() }";
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = pipeline
            .enhance::<Documentation, _, _>(&[quick, "fn slow() { wait() }"], &["rust"; 2], &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled(), "unexpected error: {err}");
        assert_eq!(backend.calls(), 2);
        let key = CacheKey::new(SemanticHash::of(quick), "rust");
        let cached: Documentation = pipeline.cache().get(&key).unwrap();
        assert_eq!(cached.summary, format!("doc for {quick}"));
        assert_eq!(pipeline.cache().entry_count(), 1);
    }

    #[tokio::test]
    async fn test_mismatched_lengths_fail_fast() {
        let dir = TempDir::new().unwrap();
        let backend = ScriptedBackend::echo();
        let pipeline = pipeline_with(backend.clone(), &dir, test_config());

        let err = pipeline
            .enhance::<Documentation, _, _>(&["a", "b", "c"], &["go", "go"], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(backend.calls(), 0);
    }
}
