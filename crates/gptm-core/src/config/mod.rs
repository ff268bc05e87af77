//! Configuration system — schema, loading, and env var overrides.
//!
//! # Usage
//! ```no_run
//! use gptm_core::config;
//!
//! let cfg = config::load_config(None);
//! println!("Backend: {}", cfg.backend);
//! ```

pub mod loader;
pub mod schema;

pub use loader::{get_config_path, load_config, load_config_reporting, save_config, LoadedConfig};
pub use schema::{BackendKind, Config, LocalConfig, LoggingConfig, RateLimitConfig, RemoteConfig};
