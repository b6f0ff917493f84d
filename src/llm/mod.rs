//! Text-generation backends.
//!
//! Provides a unified, cancellable interface over a local daemon (Ollama) and
//! a rate-limited hosted API (`OpenRouter`).

mod factory;
mod ollama;
mod openrouter;
mod rate_limit;

pub use factory::build_backend;
pub use ollama::OllamaBackend;
pub use openrouter::OpenRouterBackend;
pub use rate_limit::RateLimiter;

use crate::{Error, Result};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A text-generation backend: send a prompt, get a response string.
#[async_trait]
pub trait Backend: Send + Sync {
    /// The backend name, used for logging and selection.
    fn name(&self) -> &'static str;

    /// Sends `prompt` and returns the raw response text.
    ///
    /// Implementations must return [`Error::Cancelled`] promptly once
    /// `cancel` fires, including while waiting on rate limits.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the response cannot be
    /// decoded, or the call is cancelled.
    async fn call(&self, prompt: &str, cancel: &CancellationToken) -> Result<String>;
}

/// HTTP client configuration for backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 120_000,
            connect_timeout_ms: 10_000,
        }
    }
}

impl LlmHttpConfig {
    /// Loads HTTP configuration from config file settings.
    #[must_use]
    pub fn from_config(config: &crate::config::LlmConfig) -> Self {
        let mut settings = Self::default();
        if let Some(timeout_ms) = config.timeout_ms {
            settings.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = config.connect_timeout_ms {
            settings.connect_timeout_ms = connect_timeout_ms;
        }
        settings
    }
}

/// Builds an async HTTP client for backend requests with configured timeouts.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::Client {
    let mut builder = reqwest::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build LLM HTTP client: {err}");
        reqwest::Client::new()
    })
}

/// Races `fut` against cancellation.
///
/// # Errors
///
/// Returns [`Error::Cancelled`] if `cancel` fires first, otherwise the
/// future's own result.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

/// Classifies a transport error for logs.
pub(crate) fn error_kind(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connect"
    } else if e.is_request() {
        "request"
    } else if e.is_decode() {
        "decode"
    } else {
        "unknown"
    }
}
