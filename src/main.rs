//! Binary entry point for docforge.
//!
//! This binary provides the CLI interface for the batch enhancement pipeline.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use docforge::config::{BackendKind, DocforgeConfig};
use docforge::enhance::{ContentCache, EnhancementPipeline, EnhancementStats};
use docforge::llm::build_backend;
use docforge::models::{Documentation, DocumentationSchema, YamlDocumentation};
use docforge::observability::{self, LoggingConfig};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

/// Docforge - batch documentation enhancement via LLM backends.
#[derive(Parser)]
#[command(name = "docforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Document a JSON list of snippets.
    Enhance(EnhanceArgs),

    /// Inspect or clear the result cache.
    Cache {
        /// Cache action.
        #[command(subcommand)]
        action: CacheAction,

        /// Cache directory override.
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Inspect configuration.
    Config {
        /// Config action.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments for `enhance`.
#[derive(clap::Args)]
struct EnhanceArgs {
    /// JSON file containing `[{"text": ..., "language": ...}]`.
    #[arg(short, long)]
    input: PathBuf,

    /// Output file (stdout if omitted).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Documentation shape to request.
    #[arg(short, long, value_enum, default_value = "code")]
    kind: DocKind,

    /// Backend: ollama or openrouter.
    #[arg(long)]
    backend: Option<String>,

    /// Model identifier.
    #[arg(long)]
    model: Option<String>,

    /// Custom backend endpoint.
    #[arg(long)]
    endpoint: Option<String>,

    /// API key for the hosted backend.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Cache directory.
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

/// Documentation shapes.
#[derive(Clone, Copy, ValueEnum)]
enum DocKind {
    /// Functions, methods, and classes.
    Code,
    /// YAML configuration blocks.
    Yaml,
}

/// Cache actions.
#[derive(Subcommand)]
enum CacheAction {
    /// Show entry count and location.
    Stats,
    /// Delete every cached entry.
    Clear,
}

/// Config actions.
#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
}

/// One snippet in the input file.
#[derive(Deserialize)]
struct InputItem {
    text: String,
    language: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init(LoggingConfig::from_settings(&config.logging, cli.verbose))
    {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

async fn run_command(command: Commands, config: DocforgeConfig) -> Result<()> {
    match command {
        Commands::Enhance(args) => cmd_enhance(config, args).await,
        Commands::Cache { action, cache_dir } => {
            let config = match cache_dir {
                Some(dir) => config.with_cache_dir(dir),
                None => config,
            };
            cmd_cache(&config, action)
        },
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config),
    }
}

fn load_config(path: Option<&Path>) -> Result<DocforgeConfig> {
    let config = match path {
        Some(path) => DocforgeConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DocforgeConfig::load_default(),
    };
    Ok(config.with_env_overrides())
}

fn apply_enhance_args(mut config: DocforgeConfig, args: &EnhanceArgs) -> Result<DocforgeConfig> {
    if let Some(backend) = &args.backend {
        config.llm.provider = BackendKind::parse(backend)?;
    }
    if let Some(model) = &args.model {
        config.llm.model = Some(model.clone());
    }
    if let Some(endpoint) = &args.endpoint {
        config.llm.base_url = Some(endpoint.clone());
    }
    if let Some(key) = &args.api_key {
        config.llm.api_key = Some(SecretString::from(key.clone()));
    }
    if let Some(dir) = &args.cache_dir {
        config = config.with_cache_dir(dir);
    }
    Ok(config)
}

async fn cmd_enhance(config: DocforgeConfig, args: EnhanceArgs) -> Result<()> {
    let config = apply_enhance_args(config, &args)?;

    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let items: Vec<InputItem> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", args.input.display()))?;
    let (inputs, languages): (Vec<String>, Vec<String>) =
        items.into_iter().map(|i| (i.text, i.language)).unzip();

    let backend = build_backend(&config.llm, &config.pipeline);
    let cache = ContentCache::new(&config.cache_dir);
    let pipeline = EnhancementPipeline::new(backend, cache, config.pipeline.clone());

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling");
            interrupt.cancel();
        }
    });

    let (json, stats) = match args.kind {
        DocKind::Code => run_pipeline::<Documentation>(&pipeline, &inputs, &languages, &cancel).await?,
        DocKind::Yaml => {
            run_pipeline::<YamlDocumentation>(&pipeline, &inputs, &languages, &cancel).await?
        },
    };

    match &args.output {
        Some(path) => std::fs::write(path, json + "\n")
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{json}"),
    }

    eprintln!(
        "Documented {} snippets ({} unique, {} cached, {} generated, {} skipped)",
        stats.total, stats.unique, stats.cached, stats.processed, stats.skipped
    );
    Ok(())
}

async fn run_pipeline<T: DocumentationSchema>(
    pipeline: &EnhancementPipeline,
    inputs: &[String],
    languages: &[String],
    cancel: &CancellationToken,
) -> Result<(String, EnhancementStats)> {
    let (docs, stats) = pipeline
        .enhance_with_stats::<T, _, _>(inputs, languages, cancel)
        .await?;
    Ok((serde_json::to_string_pretty(&docs)?, stats))
}

fn cmd_cache(config: &DocforgeConfig, action: CacheAction) -> Result<()> {
    let cache = ContentCache::new(&config.cache_dir);
    match action {
        CacheAction::Stats => {
            println!("Cache directory: {}", cache.dir().display());
            println!("Entries: {}", cache.entry_count());
        },
        CacheAction::Clear => {
            let removed = cache.clear()?;
            println!("Removed {removed} entries from {}", cache.dir().display());
        },
    }
    Ok(())
}

fn cmd_config_show(config: &DocforgeConfig) -> Result<()> {
    let llm = &config.llm;
    let pipeline = &config.pipeline;
    let api_key = llm
        .api_key
        .as_ref()
        .map_or("(unset)", |k| if k.expose_secret().is_empty() { "(empty)" } else { "***" });

    println!("cache_dir = {}", config.cache_dir.display());
    println!("[llm]");
    println!("provider = {}", llm.provider.as_str());
    println!("model = {}", llm.model.as_deref().unwrap_or("(default)"));
    println!("base_url = {}", llm.base_url.as_deref().unwrap_or("(default)"));
    println!("referer = {}", llm.referer.as_deref().unwrap_or("(none)"));
    println!("api_key = {api_key}");
    println!("[pipeline]");
    println!("rate_limit = {}", pipeline.rate_limit);
    println!("max_retries = {}", pipeline.max_retries);
    println!("batch_size = {}", pipeline.batch_size);
    println!("token_budget = {}", pipeline.token_budget);
    println!("backoff_unit_ms = {}", pipeline.backoff_unit_ms);
    println!("min_significant_chars = {}", pipeline.min_significant_chars);
    Ok(())
}
