//! Core building blocks for gptm.
//!
//! - [`types`] — the uniform request/response contract shared by every backend
//! - [`error`] — provider error taxonomy and retry classification
//! - [`config`] — JSON config file + env var overrides
//! - [`ratelimit`] — per-caller fixed-window admission gate

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod types;
pub mod utils;

pub use error::{ProviderError, Result};
pub use ratelimit::{RateLimitDecision, RateLimiter};
pub use types::{ChatRequest, ChatResponse, InferenceResponse, Message, ModelInfo, Role};
