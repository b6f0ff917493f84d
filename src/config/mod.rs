//! Configuration management.

mod pipeline;

pub use pipeline::{
    DEFAULT_BACKOFF_UNIT_MS, DEFAULT_BATCH_SIZE, DEFAULT_MAX_RETRIES,
    DEFAULT_MIN_SIGNIFICANT_CHARS, DEFAULT_PROMPT_TEMPLATE, DEFAULT_RATE_LIMIT,
    DEFAULT_TOKEN_BUDGET, PipelineConfig,
};

use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration for docforge.
#[derive(Debug, Clone)]
pub struct DocforgeConfig {
    /// Directory holding cached documentation entries.
    pub cache_dir: PathBuf,
    /// Backend configuration.
    pub llm: LlmConfig,
    /// Batch pipeline configuration.
    pub pipeline: PipelineConfig,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

/// Backend configuration.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    /// Which backend to talk to.
    pub provider: BackendKind,
    /// Model identifier. `None` uses the backend's default.
    pub model: Option<String>,
    /// Custom endpoint. `None` uses the backend's default.
    pub base_url: Option<String>,
    /// Credential for hosted backends.
    pub api_key: Option<SecretString>,
    /// Attribution URL sent to hosted backends as `HTTP-Referer`.
    pub referer: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
}

/// Available backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Local Ollama daemon.
    Ollama,
    /// Hosted `OpenRouter` API (rate limited).
    #[default]
    OpenRouter,
}

impl BackendKind {
    /// Parses a backend name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] for unknown names.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openrouter" | "open-router" | "open_router" => Ok(Self::OpenRouter),
            other => Err(crate::Error::InvalidInput(format!(
                "unsupported backend: {other}"
            ))),
        }
    }

    /// Returns the canonical backend name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenRouter => "openrouter",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging section of the configuration.
#[derive(Debug, Clone, Default)]
pub struct LoggingSettings {
    /// Output format.
    pub format: LogFormat,
    /// Filter directive (e.g. `docforge=debug`). `RUST_LOG` takes precedence.
    pub filter: Option<String>,
    /// Optional log file. Logs go to stderr when unset.
    pub file: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Cache directory.
    pub cache_dir: Option<String>,
    /// Backend section.
    pub llm: Option<ConfigFileLlm>,
    /// Pipeline section.
    pub pipeline: Option<ConfigFilePipeline>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Backend section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLlm {
    /// Backend name.
    pub provider: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Base URL.
    pub base_url: Option<String>,
    /// Attribution URL for hosted backends.
    pub referer: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
}

/// Pipeline section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFilePipeline {
    /// Requests per minute.
    pub rate_limit: Option<u32>,
    /// Attempts per outer chunk.
    pub max_retries: Option<u32>,
    /// Outer chunk size.
    pub batch_size: Option<usize>,
    /// Token budget per group.
    pub token_budget: Option<usize>,
    /// Per-snippet prompt template.
    pub prompt_template: Option<String>,
    /// Backoff unit in milliseconds.
    pub backoff_unit_ms: Option<u64>,
    /// Skip-filter threshold.
    pub min_significant_chars: Option<usize>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// "pretty" or "json".
    pub format: Option<String>,
    /// Filter directive.
    pub filter: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

impl Default for DocforgeConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl DocforgeConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;

        Self::from_toml_str(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or names an unknown backend.
    pub fn from_toml_str(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks `<platform config dir>/docforge/config.toml`, then
    /// `~/.config/docforge/config.toml`. Returns defaults if neither exists
    /// or parses.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join("docforge").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("docforge")
                .join("config.toml"),
        ];

        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Ignoring config file"),
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `DocforgeConfig`.
    fn from_config_file(file: ConfigFile) -> crate::Result<Self> {
        let mut config = Self::default();

        if let Some(cache_dir) = file.cache_dir {
            config.cache_dir = PathBuf::from(cache_dir);
        }
        if let Some(llm) = file.llm {
            if let Some(provider) = llm.provider {
                config.llm.provider = BackendKind::parse(&provider)?;
            }
            config.llm.model = llm.model;
            config.llm.api_key = llm.api_key.map(SecretString::from);
            config.llm.base_url = llm.base_url;
            config.llm.referer = llm.referer;
            config.llm.timeout_ms = llm.timeout_ms;
            config.llm.connect_timeout_ms = llm.connect_timeout_ms;
        }
        if let Some(p) = file.pipeline {
            let pipeline = &mut config.pipeline;
            if let Some(v) = p.rate_limit {
                pipeline.rate_limit = v;
            }
            if let Some(v) = p.max_retries {
                pipeline.max_retries = v;
            }
            if let Some(v) = p.batch_size {
                pipeline.batch_size = v;
            }
            if let Some(v) = p.token_budget {
                pipeline.token_budget = v;
            }
            if let Some(v) = p.prompt_template {
                pipeline.prompt_template = v;
            }
            if let Some(v) = p.backoff_unit_ms {
                pipeline.backoff_unit_ms = v;
            }
            if let Some(v) = p.min_significant_chars {
                pipeline.min_significant_chars = v;
            }
        }
        if let Some(logging) = file.logging {
            if let Some(format) = logging.format {
                config.logging.format = match format.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    _ => LogFormat::Pretty,
                };
            }
            config.logging.filter = logging.filter;
            config.logging.file = logging.file.map(PathBuf::from);
        }

        config.pipeline = config.pipeline.apply_defaults();
        Ok(config)
    }

    /// Applies environment variable overrides.
    ///
    /// | Variable | Effect |
    /// |----------|--------|
    /// | `DOCFORGE_BACKEND` | Backend name |
    /// | `DOCFORGE_MODEL` | Model identifier |
    /// | `DOCFORGE_ENDPOINT` | Custom endpoint |
    /// | `DOCFORGE_API_KEY` / `OPENROUTER_API_KEY` | Credential |
    /// | `DOCFORGE_REFERER` | Attribution URL for hosted backends |
    /// | `DOCFORGE_CACHE_DIR` | Cache directory |
    /// | `DOCFORGE_LLM_TIMEOUT_MS` | Request timeout |
    ///
    /// Pipeline variables are documented on [`PipelineConfig::with_env_overrides`].
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("DOCFORGE_BACKEND") {
            match BackendKind::parse(&v) {
                Ok(kind) => self.llm.provider = kind,
                Err(e) => tracing::warn!(error = %e, "Ignoring DOCFORGE_BACKEND"),
            }
        }
        if let Ok(v) = std::env::var("DOCFORGE_MODEL") {
            self.llm.model = Some(v);
        }
        if let Ok(v) = std::env::var("DOCFORGE_ENDPOINT") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) =
            std::env::var("DOCFORGE_API_KEY").or_else(|_| std::env::var("OPENROUTER_API_KEY"))
        {
            self.llm.api_key = Some(SecretString::from(v));
        }
        if let Ok(v) = std::env::var("DOCFORGE_REFERER") {
            self.llm.referer = Some(v);
        }
        if let Ok(v) = std::env::var("DOCFORGE_CACHE_DIR") {
            self.cache_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DOCFORGE_LLM_TIMEOUT_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                self.llm.timeout_ms = Some(ms);
            }
        }
        self.pipeline = self.pipeline.with_env_overrides().apply_defaults();
        self
    }

    /// Sets the cache directory.
    #[must_use]
    pub fn with_cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_dir = path.into();
        self
    }
}

/// Default cache directory: the platform cache dir, else `./ai-cache`.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "docforge").map_or_else(
        || PathBuf::from("ai-cache"),
        |dirs| dirs.cache_dir().to_path_buf(),
    )
}
