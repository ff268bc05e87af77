//! Provider trait — the capability contract every backend satisfies.
//!
//! The local daemon adapter and the hosted-API client both implement it, so a
//! caller holding `Arc<dyn Provider>` never needs to know which one it got.

use async_trait::async_trait;
use gptm_core::error::Result;
use gptm_core::types::{ChatRequest, ChatResponse, ModelInfo};

/// Trait that all LLM backends must implement.
///
/// Implementations hold only immutable configuration and their own HTTP
/// client, so every method is safe to call concurrently on a shared instance.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Single free-form completion.
    ///
    /// An empty `model` selects the backend's default model.
    async fn generate(&self, prompt: &str, model: &str) -> Result<String>;

    /// Multi-turn completion.
    ///
    /// Messages are forwarded in order, roles and content untouched. The
    /// reply always carries the `assistant` role.
    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Models the backend advertises.
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Best-effort metadata for `model`.
    ///
    /// Backends that cannot introspect return [`ModelInfo::placeholder`]
    /// instead of failing.
    async fn get_model_info(&self, model: &str) -> Result<ModelInfo>;

    /// The model used when a request names none.
    fn default_model(&self) -> &str;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
