//! Configuration schema.
//!
//! Hierarchy: `Config` → `LocalConfig`, `RemoteConfig`, `RateLimitConfig`,
//! `LoggingConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.gptm/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Which backend serves requests for this deployment.
    pub backend: BackendKind,
    pub local: LocalConfig,
    pub remote: RemoteConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Backend selector. Exactly one backend is active per process.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Remote,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "ollama" => Ok(BackendKind::Local),
            "remote" | "atoma" => Ok(BackendKind::Remote),
            other => Err(format!("unknown backend '{other}' (expected 'local' or 'remote')")),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Local => f.write_str("local"),
            BackendKind::Remote => f.write_str("remote"),
        }
    }
}

// ─────────────────────────────────────────────
// Local daemon
// ─────────────────────────────────────────────

/// Settings for the local inference daemon.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalConfig {
    /// Daemon base URL, without the `/api` suffix.
    pub base_url: String,
    /// Model used when a request does not name one.
    pub default_model: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            default_model: "llama2".to_string(),
            timeout_secs: 5,
        }
    }
}

impl LocalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ─────────────────────────────────────────────
// Remote hosted API
// ─────────────────────────────────────────────

/// Settings for the hosted chat-completions API.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteConfig {
    /// Bearer token.
    pub api_key: String,
    /// Full chat-completions endpoint URL.
    pub base_url: String,
    pub model: String,
    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// Base backoff delay in milliseconds, doubled after each retry.
    pub retry_delay_ms: u64,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.atoma.network/v1/chat/completions".to_string(),
            model: "meta-llama/Llama-3.3-70B-Instruct".to_string(),
            timeout_secs: 120,
            max_retries: 3,
            retry_delay_ms: 5000,
            max_tokens: 2000,
            temperature: 0.7,
        }
    }
}

impl RemoteConfig {
    /// Whether an API key is set.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

// ─────────────────────────────────────────────
// Rate limiting
// ─────────────────────────────────────────────

/// Admission gate settings: `limit` calls per `period_secs` per caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub limit: u32,
    pub period_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 10,
            period_secs: 60,
        }
    }
}

// ─────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`.
    pub level: String,
    /// `json` for structured output, anything else for compact text.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.local.base_url, "http://localhost:11434");
        assert_eq!(config.local.timeout(), Duration::from_secs(5));
        assert_eq!(config.remote.max_retries, 3);
        assert_eq!(config.remote.retry_delay(), Duration::from_secs(5));
        assert_eq!(config.remote.timeout(), Duration::from_secs(120));
        assert!(!config.remote.is_configured());
        assert_eq!(config.rate_limit.limit, 10);
        assert_eq!(config.rate_limit.period_secs, 60);
    }

    #[test]
    fn test_camel_case_round_trip() {
        let json = serde_json::to_value(Config::default()).unwrap();

        assert!(json["remote"].get("maxRetries").is_some());
        assert!(json["rateLimit"].get("periodSecs").is_some());
        assert!(json["local"].get("default_model").is_none());
        assert_eq!(json["backend"], "local");
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"backend": "remote", "remote": {"apiKey": "sk-1", "maxRetries": 5}}"#,
        )
        .unwrap();

        assert_eq!(config.backend, BackendKind::Remote);
        assert_eq!(config.remote.api_key, "sk-1");
        assert_eq!(config.remote.max_retries, 5);
        assert_eq!(config.remote.max_tokens, 2000);
    }

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!("LOCAL".parse::<BackendKind>(), Ok(BackendKind::Local));
        assert_eq!("atoma".parse::<BackendKind>(), Ok(BackendKind::Remote));
        assert!("cloud".parse::<BackendKind>().is_err());
    }
}
