//! Config loader — reads `~/.gptm/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.gptm/config.json`
//! 3. Environment variables `GPTM_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// A loaded config plus every problem found while building it.
///
/// Loading never fails: unreadable files and bad env values fall back to
/// defaults, and each fallback is recorded here so the caller can report it
/// once logging is up.
#[derive(Debug, Default)]
pub struct LoadedConfig {
    pub config: Config,
    pub warnings: Vec<String>,
}

/// Load configuration from `path` (or the default path) + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
/// Fallbacks are logged with `warn!`; use [`load_config_reporting`] to get them back.
pub fn load_config(path: Option<&Path>) -> Config {
    let loaded = load_config_reporting(path);
    for warning in &loaded.warnings {
        warn!("{}", warning);
    }
    loaded.config
}

/// Like [`load_config`], but returns the fallbacks instead of logging them.
pub fn load_config_reporting(path: Option<&Path>) -> LoadedConfig {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    load_config_from_path(&config_path)
}

fn load_config_from_path(path: &Path) -> LoadedConfig {
    let mut warnings = Vec::new();
    let config = read_config_file(path, &mut warnings);
    let config = apply_env_overrides(config, &mut warnings);
    LoadedConfig { config, warnings }
}

fn read_config_file(path: &Path, warnings: &mut Vec<String>) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return Config::default();
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warnings.push(format!(
                "Failed to read config file {}: {}, using defaults",
                path.display(),
                e
            ));
            return Config::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warnings.push(format!(
                "Failed to parse config file {}: {}, using defaults",
                path.display(),
                e
            ));
            Config::default()
        }
    }
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `GPTM_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `GPTM_BACKEND` → `backend`
/// - `GPTM_LOCAL__BASE_URL`, `GPTM_LOCAL__DEFAULT_MODEL`, `GPTM_LOCAL__TIMEOUT_SECS`
/// - `GPTM_REMOTE__API_KEY`, `GPTM_REMOTE__BASE_URL`, `GPTM_REMOTE__MODEL`,
///   `GPTM_REMOTE__TIMEOUT_SECS`, `GPTM_REMOTE__MAX_RETRIES`,
///   `GPTM_REMOTE__RETRY_DELAY_MS`, `GPTM_REMOTE__MAX_TOKENS`,
///   `GPTM_REMOTE__TEMPERATURE`
/// - `GPTM_RATE_LIMIT__ENABLED`, `GPTM_RATE_LIMIT__LIMIT`, `GPTM_RATE_LIMIT__PERIOD_SECS`
/// - `GPTM_LOGGING__LEVEL`, `GPTM_LOGGING__FORMAT`
fn apply_env_overrides(mut config: Config, warnings: &mut Vec<String>) -> Config {
    if let Ok(val) = std::env::var("GPTM_BACKEND") {
        match val.parse() {
            Ok(kind) => config.backend = kind,
            Err(e) => warnings.push(format!("Ignoring GPTM_BACKEND: {e}")),
        }
    }

    // Local daemon
    env_string("GPTM_LOCAL__BASE_URL", &mut config.local.base_url);
    env_string("GPTM_LOCAL__DEFAULT_MODEL", &mut config.local.default_model);
    env_parse("GPTM_LOCAL__TIMEOUT_SECS", &mut config.local.timeout_secs, warnings);

    // Remote API
    env_string("GPTM_REMOTE__API_KEY", &mut config.remote.api_key);
    env_string("GPTM_REMOTE__BASE_URL", &mut config.remote.base_url);
    env_string("GPTM_REMOTE__MODEL", &mut config.remote.model);
    env_parse("GPTM_REMOTE__TIMEOUT_SECS", &mut config.remote.timeout_secs, warnings);
    env_parse("GPTM_REMOTE__MAX_RETRIES", &mut config.remote.max_retries, warnings);
    env_parse("GPTM_REMOTE__RETRY_DELAY_MS", &mut config.remote.retry_delay_ms, warnings);
    env_parse("GPTM_REMOTE__MAX_TOKENS", &mut config.remote.max_tokens, warnings);
    env_parse("GPTM_REMOTE__TEMPERATURE", &mut config.remote.temperature, warnings);

    // Rate limiting
    if let Ok(val) = std::env::var("GPTM_RATE_LIMIT__ENABLED") {
        match val.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => config.rate_limit.enabled = true,
            "false" | "0" => config.rate_limit.enabled = false,
            _ => warnings.push(format!(
                "Ignoring GPTM_RATE_LIMIT__ENABLED: cannot parse '{val}'"
            )),
        }
    }
    env_parse("GPTM_RATE_LIMIT__LIMIT", &mut config.rate_limit.limit, warnings);
    env_parse("GPTM_RATE_LIMIT__PERIOD_SECS", &mut config.rate_limit.period_secs, warnings);

    // Logging
    env_string("GPTM_LOGGING__LEVEL", &mut config.logging.level);
    env_string("GPTM_LOGGING__FORMAT", &mut config.logging.format);

    config
}

fn env_string(name: &str, target: &mut String) {
    if let Ok(val) = std::env::var(name) {
        *target = val;
    }
}

fn env_parse<T: FromStr>(name: &str, target: &mut T, warnings: &mut Vec<String>) {
    if let Ok(val) = std::env::var(name) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warnings.push(format!("Ignoring {name}: cannot parse '{val}'")),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
