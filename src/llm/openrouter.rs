//! `OpenRouter` (hosted, OpenAI-compatible) backend.

use super::{Backend, LlmHttpConfig, RateLimiter, build_http_client, cancellable, error_kind};
use crate::{Error, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Hosted chat-completions backend with local rate limiting.
pub struct OpenRouterBackend {
    /// API key.
    api_key: Option<SecretString>,
    /// API endpoint.
    endpoint: String,
    /// Model to use.
    model: String,
    /// Optional `HTTP-Referer` attribution.
    referer: Option<String>,
    /// HTTP client.
    client: reqwest::Client,
    /// Local request admission.
    limiter: RateLimiter,
}

impl OpenRouterBackend {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://openrouter.ai/api/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "deepseek/deepseek-chat-v3-0324:free";

    /// Completion token cap per request.
    const MAX_TOKENS: u32 = 800;

    /// Sampling temperature.
    const TEMPERATURE: f32 = 0.2;

    /// Creates a new backend admitting `rate_limit` requests per minute
    /// (zero selects the default rate).
    ///
    /// Reads `OPENROUTER_API_KEY` if set.
    #[must_use]
    pub fn new(rate_limit: u32) -> Self {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .map(SecretString::from);
        Self {
            api_key,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            referer: None,
            client: build_http_client(LlmHttpConfig::default()),
            limiter: RateLimiter::per_minute(rate_limit),
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: SecretString) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the `HTTP-Referer` attribution URL.
    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Sets HTTP client timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: LlmHttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    /// Returns the configured model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether the configured model is on the free tier.
    #[must_use]
    pub fn is_free_model(&self) -> bool {
        self.model.ends_with(":free")
    }

    /// Validates that the backend is configured.
    fn validate(&self) -> Result<&SecretString> {
        self.api_key.as_ref().ok_or_else(|| Error::OperationFailed {
            operation: "openrouter_request".to_string(),
            cause: "OPENROUTER_API_KEY not set".to_string(),
        })
    }

    /// Makes a chat-completions request.
    async fn request(&self, prompt: &str) -> Result<String> {
        let api_key = self.validate()?;

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: Self::MAX_TOKENS,
            temperature: Self::TEMPERATURE,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(api_key.expose_secret())
            .header("X-Title", "docforge");
        if let Some(referer) = &self.referer {
            builder = builder.header("HTTP-Referer", referer);
        }

        let response = builder
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let kind = error_kind(&e);
                tracing::error!(
                    provider = "openrouter",
                    model = %self.model,
                    error = %e,
                    error_kind = kind,
                    "LLM request failed"
                );
                Error::OperationFailed {
                    operation: "openrouter_request".to_string(),
                    cause: format!("{kind} error: {e}"),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                provider = "openrouter",
                model = %self.model,
                status = %status,
                "LLM API returned error status"
            );
            return Err(Error::OperationFailed {
                operation: "openrouter_request".to_string(),
                cause: format!("API returned status: {status} - {body}"),
            });
        }

        let response: ChatCompletionResponse =
            response.json().await.map_err(|e| Error::OperationFailed {
                operation: "openrouter_response".to_string(),
                cause: e.to_string(),
            })?;

        first_choice_content(response)
    }
}

#[async_trait]
impl Backend for OpenRouterBackend {
    fn name(&self) -> &'static str {
        "openrouter"
    }

    async fn call(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        self.limiter.acquire(cancel).await?;
        cancellable(cancel, self.request(prompt)).await
    }
}

fn first_choice_content(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| Error::OperationFailed {
            operation: "openrouter_response".to_string(),
            cause: "No choices in response".to_string(),
        })
}

/// Request to the Chat Completions API.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

/// A message in the chat.
#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Response from the Chat Completions API.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

/// A choice in the response.
#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
