//! Inference backends for gptm.
//!
//! # Architecture
//!
//! - [`traits::Provider`] — capability contract every backend implements
//! - [`local::LocalProvider`] — adapter for a local Ollama daemon
//! - [`remote::RemoteClient`] — retrying client for a hosted completions API
//! - [`factory::create_provider`] — builds the backend named by the config
//! - [`service::InferenceService`] — rate-limited, timed caller layer

mod http;

pub mod factory;
pub mod local;
pub mod remote;
pub mod service;
pub mod traits;

pub use factory::create_provider;
pub use local::LocalProvider;
pub use remote::RemoteClient;
pub use service::{Admitted, InferenceService};
pub use traits::Provider;
