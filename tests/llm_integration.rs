//! Backend integration tests.
//!
//! Tests backend implementations and selection without real services:
//! - Builder configuration and factory selection
//! - Transport failures against an unreachable endpoint
//! - Cancellation of rate-limiter waits
//!
//! These tests do NOT require API keys or a running Ollama daemon.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::excessive_nesting,
    dead_code
)]

use docforge::Error;
use docforge::config::{BackendKind, LlmConfig, PipelineConfig};
use docforge::llm::{
    Backend, LlmHttpConfig, OllamaBackend, OpenRouterBackend, RateLimiter, build_backend,
};
use secrecy::SecretString;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Discard-protocol port; connections are refused on test hosts.
const UNREACHABLE: &str = "http://127.0.0.1:9";

fn fast_http() -> LlmHttpConfig {
    LlmHttpConfig {
        timeout_ms: 2_000,
        connect_timeout_ms: 500,
    }
}

// ============================================================================
// Backend Configuration Tests
// ============================================================================

mod backend_config {
    use super::*;

    #[test]
    fn test_ollama_builder() {
        let backend = OllamaBackend::new()
            .with_endpoint("http://localhost:11434")
            .with_model("llama3.2");

        assert_eq!(backend.name(), "ollama");
        assert_eq!(backend.model(), "llama3.2");
    }

    #[test]
    fn test_openrouter_builder() {
        let backend = OpenRouterBackend::new(18)
            .with_api_key(SecretString::from("sk-or-test"))
            .with_model("mistralai/mistral-7b-instruct:free")
            .with_http_config(fast_http());

        assert_eq!(backend.name(), "openrouter");
        assert!(backend.is_free_model());
    }

    #[test]
    fn test_factory_selects_configured_backend() {
        let pipeline = PipelineConfig::default();

        let ollama = LlmConfig {
            provider: BackendKind::Ollama,
            ..LlmConfig::default()
        };
        assert_eq!(build_backend(&ollama, &pipeline).name(), "ollama");

        let hosted = LlmConfig {
            provider: BackendKind::OpenRouter,
            api_key: Some(SecretString::from("sk-or-test")),
            ..LlmConfig::default()
        };
        assert_eq!(build_backend(&hosted, &pipeline).name(), "openrouter");
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!(BackendKind::parse("Ollama").unwrap(), BackendKind::Ollama);
        assert_eq!(BackendKind::parse("openrouter").unwrap(), BackendKind::OpenRouter);
        assert!(matches!(BackendKind::parse("gemini"), Err(Error::InvalidInput(_))));
    }
}

// ============================================================================
// Transport Failure Tests
// ============================================================================

mod transport {
    use super::*;

    #[tokio::test]
    async fn test_ollama_unreachable_is_operation_failure() {
        let backend = OllamaBackend::new()
            .with_endpoint(UNREACHABLE)
            .with_http_config(fast_http());

        let result = backend.call("prompt", &CancellationToken::new()).await;
        match result {
            Err(Error::OperationFailed { operation, .. }) => {
                assert!(operation.starts_with("ollama"), "unexpected operation: {operation}");
            },
            other => panic!("expected operation failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_openrouter_unreachable_is_operation_failure() {
        let backend = OpenRouterBackend::new(600)
            .with_api_key(SecretString::from("sk-or-test"))
            .with_endpoint(UNREACHABLE)
            .with_http_config(fast_http());

        let result = backend.call("prompt", &CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::OperationFailed { .. })));
    }
}

// ============================================================================
// Cancellation Tests
// ============================================================================

mod cancellation {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_call_observes_cancellation() {
        // One request per minute: the second call must wait on the limiter.
        let backend = OpenRouterBackend::new(1)
            .with_api_key(SecretString::from("sk-or-test"))
            .with_endpoint(UNREACHABLE);
        let cancel = CancellationToken::new();

        let _ = backend.call("first", &cancel).await;

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let start = tokio::time::Instant::now();
        let result = backend.call("second", &cancel).await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_zero_rate_limit_uses_default_burst() {
        let llm = LlmConfig {
            provider: BackendKind::OpenRouter,
            api_key: Some(SecretString::from("sk-or-test")),
            base_url: Some(UNREACHABLE.to_string()),
            timeout_ms: Some(2_000),
            connect_timeout_ms: Some(500),
            ..LlmConfig::default()
        };
        let pipeline = PipelineConfig {
            rate_limit: 0,
            ..PipelineConfig::default()
        };
        let backend = build_backend(&llm, &pipeline);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        // Both calls are admitted at once and fail on transport, not on the limiter.
        for _ in 0..2 {
            let result = backend.call("prompt", &cancel).await;
            assert!(
                matches!(result, Err(Error::OperationFailed { .. })),
                "unexpected result: {result:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_limiter_admits_burst_then_waits() {
        let limiter = RateLimiter::per_minute(2);
        let cancel = CancellationToken::new();

        limiter.acquire(&cancel).await.unwrap();
        limiter.acquire(&cancel).await.unwrap();

        let start = tokio::time::Instant::now();
        limiter.acquire(&cancel).await.unwrap();
        assert!(start.elapsed() >= limiter.refill_interval());
    }
}
