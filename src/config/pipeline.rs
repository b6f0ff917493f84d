//! Pipeline tuning knobs.

use std::time::Duration;

/// Default requests per minute for rate-limited backends.
pub const DEFAULT_RATE_LIMIT: u32 = 18;
/// Default attempts per outer chunk.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default number of unique inputs per outer chunk.
pub const DEFAULT_BATCH_SIZE: usize = 3;
/// Default estimated-token budget per batch group.
pub const DEFAULT_TOKEN_BUDGET: usize = 7000;
/// Default backoff unit; retry `n` waits `n² × unit`.
pub const DEFAULT_BACKOFF_UNIT_MS: u64 = 1000;
/// Default minimum non-whitespace characters before a snippet is worth a request.
pub const DEFAULT_MIN_SIGNIFICANT_CHARS: usize = 4;

/// Default per-snippet prompt.
///
/// `{language}` and `{code}` are substituted for every snippet.
pub const DEFAULT_PROMPT_TEMPLATE: &str =
    "Generate a concise explanation (10-15 words) for this {language} code:\n```{language}\n{code}\n```";

/// Batch enhancement configuration.
///
/// Zero values mean "unset" and are replaced by [`PipelineConfig::apply_defaults`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Requests per minute admitted by rate-limited backends.
    pub rate_limit: u32,
    /// Maximum attempts per outer chunk.
    pub max_retries: u32,
    /// Unique uncached inputs per outer chunk.
    pub batch_size: usize,
    /// Estimated-token budget per batch group.
    pub token_budget: usize,
    /// Per-snippet prompt template. Empty means the default template.
    pub prompt_template: String,
    /// Backoff unit in milliseconds.
    pub backoff_unit_ms: u64,
    /// Minimum non-whitespace characters for the default skip filter.
    pub min_significant_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rate_limit: DEFAULT_RATE_LIMIT,
            max_retries: DEFAULT_MAX_RETRIES,
            batch_size: DEFAULT_BATCH_SIZE,
            token_budget: DEFAULT_TOKEN_BUDGET,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            backoff_unit_ms: DEFAULT_BACKOFF_UNIT_MS,
            min_significant_chars: DEFAULT_MIN_SIGNIFICANT_CHARS,
        }
    }
}

impl PipelineConfig {
    /// Replaces unset (zero or empty) values with defaults.
    #[must_use]
    pub fn apply_defaults(mut self) -> Self {
        if self.rate_limit == 0 {
            self.rate_limit = DEFAULT_RATE_LIMIT;
        }
        if self.max_retries == 0 {
            self.max_retries = DEFAULT_MAX_RETRIES;
        }
        if self.batch_size == 0 {
            self.batch_size = DEFAULT_BATCH_SIZE;
        }
        if self.token_budget == 0 {
            self.token_budget = DEFAULT_TOKEN_BUDGET;
        }
        if self.prompt_template.trim().is_empty() {
            self.prompt_template = DEFAULT_PROMPT_TEMPLATE.to_string();
        }
        if self.backoff_unit_ms == 0 {
            self.backoff_unit_ms = DEFAULT_BACKOFF_UNIT_MS;
        }
        if self.min_significant_chars == 0 {
            self.min_significant_chars = DEFAULT_MIN_SIGNIFICANT_CHARS;
        }
        self
    }

    /// Applies environment variable overrides.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `DOCFORGE_RATE_LIMIT` | `rate_limit` |
    /// | `DOCFORGE_MAX_RETRIES` | `max_retries` |
    /// | `DOCFORGE_BATCH_SIZE` | `batch_size` |
    /// | `DOCFORGE_TOKEN_BUDGET` | `token_budget` |
    /// | `DOCFORGE_BACKOFF_UNIT_MS` | `backoff_unit_ms` |
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse::<u32>("DOCFORGE_RATE_LIMIT") {
            self.rate_limit = v;
        }
        if let Some(v) = env_parse::<u32>("DOCFORGE_MAX_RETRIES") {
            self.max_retries = v;
        }
        if let Some(v) = env_parse::<usize>("DOCFORGE_BATCH_SIZE") {
            self.batch_size = v;
        }
        if let Some(v) = env_parse::<usize>("DOCFORGE_TOKEN_BUDGET") {
            self.token_budget = v;
        }
        if let Some(v) = env_parse::<u64>("DOCFORGE_BACKOFF_UNIT_MS") {
            self.backoff_unit_ms = v;
        }
        self
    }

    /// Backoff unit as a [`Duration`].
    #[must_use]
    pub const fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
