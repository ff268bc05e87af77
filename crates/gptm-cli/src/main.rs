//! gptm CLI — entry point.
//!
//! # Commands
//!
//! - `gptm generate -p PROMPT [-m MODEL]` — single completion
//! - `gptm chat [-m MODEL] [-s SYSTEM]` — interactive multi-turn chat
//! - `gptm models` — list models the backend advertises
//! - `gptm model-info MODEL` — show model metadata
//! - `gptm status` — show configuration and backend status
//! - `gptm init` — write a default config file

mod helpers;
mod init;
mod repl;
mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, warn};

use gptm_core::config::{
    load_config_reporting, BackendKind, Config, LoadedConfig, LoggingConfig,
};
use gptm_core::ratelimit::RateLimiter;
use gptm_providers::{create_provider, InferenceService};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// gptm — text generation against a local daemon or a hosted API
#[derive(Parser)]
#[command(name = "gptm", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: ~/.gptm/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured backend ("local" or "remote")
    #[arg(short, long, global = true)]
    backend: Option<BackendKind>,

    /// Enable debug logging
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate text for a single prompt
    Generate {
        /// Prompt text
        #[arg(short, long)]
        prompt: String,

        /// Model name (default: the backend's configured model)
        #[arg(short, long)]
        model: Option<String>,

        /// Caller identity used for rate limiting
        #[arg(long, default_value = "cli")]
        caller: String,
    },

    /// Interactive multi-turn chat
    Chat {
        /// Model name (default: the backend's configured model)
        #[arg(short, long)]
        model: Option<String>,

        /// System prompt prepended to the conversation
        #[arg(short, long)]
        system: Option<String>,
    },

    /// List models available on the backend
    Models,

    /// Show metadata for a model
    ModelInfo {
        /// Model name
        model: String,
    },

    /// Show configuration and backend status
    Status,

    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref().map(helpers::expand_tilde);

    let loaded = load_settings(config_path.as_deref(), cli.backend);
    let config = loaded.config;

    init_logging(&config.logging, cli.verbose);
    for warning in &loaded.warnings {
        warn!("{}", warning);
    }

    match cli.command {
        Commands::Init { force } => init::run(config_path.as_deref(), force),
        Commands::Status => status::run(&config, config_path.as_deref(), &loaded.warnings),
        command => {
            let service = build_service(&config)?;
            run_command(command, &service).await
        }
    }
}

async fn run_command(command: Commands, service: &InferenceService) -> Result<()> {
    match command {
        Commands::Generate {
            prompt,
            model,
            caller,
        } => {
            let model = model.unwrap_or_default();
            let admitted = service
                .generate(&caller, &prompt, &model)
                .await
                .context("generation failed")?;
            debug!(headers = ?admitted.headers(), "rate limit");
            helpers::print_generation(&admitted.value);
            if let Some(quota) = &admitted.quota {
                helpers::print_quota(quota);
            }
        }
        Commands::Chat { model, system } => {
            let model = model.unwrap_or_default();
            repl::run(service, &model, system).await?;
        }
        Commands::Models => {
            let models = service.list_models().await.context("failed to list models")?;
            helpers::print_models(&models, service.default_model());
        }
        Commands::ModelInfo { model } => {
            let info = service
                .model_info(&model)
                .await
                .context("failed to fetch model info")?;
            helpers::print_model_info(&info);
        }
        Commands::Status | Commands::Init { .. } => {}
    }
    Ok(())
}

/// Load the config file and env overrides, then apply command-line overrides.
///
/// Nothing is logged here; the caller reports `warnings` once logging is up.
fn load_settings(path: Option<&Path>, backend: Option<BackendKind>) -> LoadedConfig {
    let mut loaded = load_config_reporting(path);
    if let Some(backend) = backend {
        loaded.config.backend = backend;
    }
    loaded
}

/// Build the inference service for the configured backend.
fn build_service(config: &Config) -> Result<InferenceService> {
    let provider = create_provider(config).context("failed to create provider")?;
    debug!(
        backend = %config.backend,
        provider = provider.display_name(),
        model = provider.default_model(),
        "provider ready"
    );

    let service = InferenceService::new(provider);
    if config.rate_limit.enabled {
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        Ok(service.with_rate_limiter(limiter))
    } else {
        Ok(service)
    }
}

/// Initialize tracing from the logging config. `RUST_LOG` wins when set.
fn init_logging(logging: &LoggingConfig, verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let directive = if verbose {
        "debug".to_string()
    } else {
        logging.level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if logging.is_json() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .init();
    }
}
