//! Ollama (local daemon) backend.

use super::{Backend, LlmHttpConfig, build_http_client, cancellable, error_kind};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Ollama local backend.
pub struct OllamaBackend {
    /// API endpoint.
    endpoint: String,
    /// Model to use.
    model: String,
    /// HTTP client.
    client: reqwest::Client,
}

impl OllamaBackend {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "http://localhost:11434";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "llama3.2";

    /// Creates a new Ollama backend.
    ///
    /// Honours `OLLAMA_HOST` for the endpoint.
    #[must_use]
    pub fn new() -> Self {
        let endpoint =
            std::env::var("OLLAMA_HOST").unwrap_or_else(|_| Self::DEFAULT_ENDPOINT.to_string());

        Self {
            endpoint,
            model: Self::DEFAULT_MODEL.to_string(),
            client: build_http_client(LlmHttpConfig::default()),
        }
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

    /// Makes a generate request to the Ollama API.
    async fn request(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let kind = error_kind(&e);
                tracing::error!(
                    provider = "ollama",
                    model = %self.model,
                    error = %e,
                    error_kind = kind,
                    "LLM request failed"
                );
                Error::OperationFailed {
                    operation: "ollama_request".to_string(),
                    cause: format!("{kind} error: {e}"),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                provider = "ollama",
                model = %self.model,
                status = %status,
                body = %body,
                "LLM API returned error status"
            );
            return Err(Error::OperationFailed {
                operation: "ollama_request".to_string(),
                cause: format!("API returned status: {status} - {body}"),
            });
        }

        let response: GenerateResponse = response.json().await.map_err(|e| {
            tracing::error!(
                provider = "ollama",
                model = %self.model,
                error = %e,
                "Failed to parse LLM response"
            );
            Error::OperationFailed {
                operation: "ollama_response".to_string(),
                cause: e.to_string(),
            }
        })?;

        Ok(response.response)
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for OllamaBackend {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn call(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        cancellable(cancel, self.request(prompt)).await
    }
}

/// Request to the Generate API.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Response from the Generate API.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}
