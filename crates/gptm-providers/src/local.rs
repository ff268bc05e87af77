//! Local inference daemon adapter (Ollama REST dialect).
//!
//! Maps the uniform [`Provider`] contract onto `/api/generate`, `/api/chat`,
//! `/api/tags` and `/api/show`. Every call is a single attempt bounded by the
//! configured timeout; failures are surfaced immediately and the caller
//! decides whether to try again.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info_span, Instrument, Span};

use gptm_core::config::LocalConfig;
use gptm_core::error::{ProviderError, Result};
use gptm_core::types::{ChatRequest, ChatResponse, Message, ModelInfo, DEFAULT_CONTEXT_SIZE};
use gptm_core::utils::{join_url, truncate_string};

use crate::http::{build_client, decode, read_success_body, transport_error};
use crate::traits::Provider;

const DISPLAY_NAME: &str = "Ollama";

// ─────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateReply {
    response: String,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatReply {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct TagsReply {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Serialize)]
struct ShowBody<'a> {
    model: &'a str,
}

#[derive(Deserialize, Default)]
struct ShowReply {
    #[serde(default)]
    details: ShowDetails,
    #[serde(default)]
    model_info: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize, Default)]
struct ShowDetails {
    #[serde(default)]
    family: String,
    #[serde(default)]
    parameter_size: String,
}

// ─────────────────────────────────────────────
// LocalProvider
// ─────────────────────────────────────────────

/// Provider backed by a local inference daemon.
pub struct LocalProvider {
    client: reqwest::Client,
    base_url: String,
    default_model: String,
    timeout: Duration,
    span: Span,
}

impl std::fmt::Debug for LocalProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalProvider")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl LocalProvider {
    /// Create a provider from the `local` config section.
    pub fn new(config: &LocalConfig) -> Result<Self> {
        Self::with_timeout(&config.base_url, &config.default_model, config.timeout())
    }

    /// Create a provider with an explicit per-call timeout.
    pub fn with_timeout(base_url: &str, default_model: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let span = info_span!("provider", backend = "local", base_url = %base_url);

        Ok(LocalProvider {
            client: build_client(timeout)?,
            base_url,
            default_model: default_model.to_string(),
            timeout,
            span,
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn resolve_model<'a>(&'a self, model: &'a str) -> &'a str {
        if model.trim().is_empty() {
            &self.default_model
        } else {
            model
        }
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Vec<u8>> {
        let url = self.url(path);
        debug!(url = %url, "POST");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        read_success_body(response, self.timeout).await
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.url(path);
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        read_success_body(response, self.timeout).await
    }

    async fn show_model(&self, model: &str) -> Result<ModelInfo> {
        let body = self.post("api/show", &ShowBody { model }).await?;
        let reply: ShowReply = decode(&body)?;
        Ok(model_info_from_show(model, reply))
    }

    async fn generate_inner(&self, prompt: &str, model: &str) -> Result<String> {
        debug!(model, prompt = %truncate_string(prompt, 80), "generate");
        let body = GenerateBody {
            model,
            prompt,
            stream: false,
        };

        let raw = self
            .post("api/generate", &body)
            .await
            .inspect_err(|e| error!(model, error = %e, "generate failed"))?;
        let reply: GenerateReply = decode(&raw)?;
        Ok(reply.response)
    }

    async fn chat_inner(&self, model: &str, messages: &[Message]) -> Result<ChatResponse> {
        debug!(model, messages = messages.len(), "chat");
        let body = ChatBody {
            model,
            messages,
            stream: false,
        };

        let raw = self
            .post("api/chat", &body)
            .await
            .inspect_err(|e| error!(model, error = %e, "chat failed"))?;
        let reply: ChatReply = decode(&raw)?;
        Ok(ChatResponse::assistant(reply.message.content))
    }

    async fn list_inner(&self) -> Result<Vec<String>> {
        let raw = self.get("api/tags").await?;
        let reply: TagsReply = decode(&raw)?;
        let names: Vec<String> = reply.models.into_iter().map(|m| m.name).collect();
        debug!(count = names.len(), "listed models");
        Ok(names)
    }
}

/// Build metadata from an `/api/show` reply, keeping defaults for gaps.
fn model_info_from_show(model: &str, reply: ShowReply) -> ModelInfo {
    let mut info = ModelInfo::placeholder(model, DISPLAY_NAME);

    info.context_size = reply
        .model_info
        .iter()
        .find(|(k, _)| k.ends_with(".context_length"))
        .and_then(|(_, v)| v.as_u64())
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(DEFAULT_CONTEXT_SIZE);

    info.parameters = reply
        .model_info
        .get("general.parameter_count")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);

    let details = reply.details;
    if !details.family.is_empty() {
        info.description = if details.parameter_size.is_empty() {
            format!("{DISPLAY_NAME} model: {model} ({})", details.family)
        } else {
            format!(
                "{DISPLAY_NAME} model: {model} ({}, {})",
                details.family, details.parameter_size
            )
        };
    }

    info
}

#[async_trait]
impl Provider for LocalProvider {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String> {
        let model = self.resolve_model(model);
        self.generate_inner(prompt, model)
            .instrument(self.span.clone())
            .await
    }

    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse> {
        if request.messages.is_empty() {
            return Err(ProviderError::InvalidRequest(
                "chat request has no messages".to_string(),
            ));
        }
        let model = request.model_or(&self.default_model);
        self.chat_inner(model, &request.messages)
            .instrument(self.span.clone())
            .await
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        self.list_inner().instrument(self.span.clone()).await
    }

    async fn get_model_info(&self, model: &str) -> Result<ModelInfo> {
        let model = self.resolve_model(model);
        let info = match self.show_model(model).instrument(self.span.clone()).await {
            Ok(info) => info,
            Err(e) => {
                debug!(model, error = %e, "model introspection unavailable, using defaults");
                ModelInfo::placeholder(model, DISPLAY_NAME)
            }
        };
        Ok(info)
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn display_name(&self) -> &str {
        DISPLAY_NAME
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
