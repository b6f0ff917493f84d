//! Backend construction from configuration.

use super::{Backend, LlmHttpConfig, OllamaBackend, OpenRouterBackend};
use crate::config::{BackendKind, LlmConfig, PipelineConfig};
use std::sync::Arc;

/// Builds the configured backend.
#[must_use]
pub fn build_backend(llm: &LlmConfig, pipeline: &PipelineConfig) -> Arc<dyn Backend> {
    let http = LlmHttpConfig::from_config(llm);

    match llm.provider {
        BackendKind::Ollama => {
            let mut backend = OllamaBackend::new();
            if let Some(ref model) = llm.model {
                backend = backend.with_model(model);
            }
            if let Some(ref base_url) = llm.base_url {
                backend = backend.with_endpoint(base_url);
            }
            let backend = backend.with_http_config(http);
            tracing::info!(provider = "ollama", model = backend.model(), "Using backend");
            Arc::new(backend)
        },
        BackendKind::OpenRouter => {
            let mut backend = OpenRouterBackend::new(pipeline.rate_limit);
            if let Some(ref api_key) = llm.api_key {
                backend = backend.with_api_key(api_key.clone());
            }
            if let Some(ref model) = llm.model {
                backend = backend.with_model(model);
            }
            if let Some(ref base_url) = llm.base_url {
                backend = backend.with_endpoint(base_url);
            }
            if let Some(ref referer) = llm.referer {
                backend = backend.with_referer(referer);
            }
            let backend = backend.with_http_config(http);
            tracing::info!(provider = "openrouter", model = backend.model(), "Using backend");
            if !backend.is_free_model() {
                tracing::warn!(
                    model = backend.model(),
                    "Using a non-free OpenRouter model may incur costs"
                );
            }
            Arc::new(backend)
        },
    }
}
