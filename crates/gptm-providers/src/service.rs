//! Inference service — the caller-facing layer over one provider.
//!
//! Admits each generation or chat call through the optional rate limiter,
//! fills in the provider's default model, and times the backend call.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, info_span, Instrument, Span};

use gptm_core::error::{ProviderError, Result};
use gptm_core::ratelimit::{RateLimitDecision, RateLimiter};
use gptm_core::types::{ChatRequest, ChatResponse, InferenceResponse, Message, ModelInfo};
use gptm_core::utils::truncate_string;

use crate::traits::Provider;

/// A successful call together with the caller's quota after admission.
///
/// `quota` is `None` when the service has no rate limiter.
#[derive(Clone, Debug, PartialEq)]
pub struct Admitted<T> {
    pub value: T,
    pub quota: Option<RateLimitDecision>,
}

impl<T> Admitted<T> {
    /// `X-RateLimit-*` headers for the admitted call, empty without a limiter.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        self.quota
            .as_ref()
            .map(|q| q.headers().to_vec())
            .unwrap_or_default()
    }
}

pub struct InferenceService {
    provider: Arc<dyn Provider>,
    limiter: Option<Arc<RateLimiter>>,
    span: Span,
}

impl InferenceService {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        let span = info_span!("inference", backend = provider.display_name());
        Self {
            provider,
            limiter: None,
            span,
        }
    }

    /// Gate generation and chat calls per caller.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn default_model(&self) -> &str {
        self.provider.default_model()
    }

    /// Generate text for `prompt`. An empty `model` selects the default.
    pub async fn generate(
        &self,
        caller: &str,
        prompt: &str,
        model: &str,
    ) -> Result<Admitted<InferenceResponse>> {
        self.generate_inner(caller, prompt, model)
            .instrument(self.span.clone())
            .await
    }

    /// Run a multi-turn completion over `messages`, in order.
    pub async fn chat(
        &self,
        caller: &str,
        messages: Vec<Message>,
        model: &str,
    ) -> Result<Admitted<ChatResponse>> {
        self.chat_inner(caller, messages, model)
            .instrument(self.span.clone())
            .await
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        self.provider
            .list_models()
            .instrument(self.span.clone())
            .await
    }

    pub async fn model_info(&self, model: &str) -> Result<ModelInfo> {
        let model = self.resolve_model(model);
        self.provider
            .get_model_info(model)
            .instrument(self.span.clone())
            .await
    }

    fn resolve_model<'a>(&'a self, model: &'a str) -> &'a str {
        if model.trim().is_empty() {
            self.provider.default_model()
        } else {
            model
        }
    }

    fn admit(&self, caller: &str) -> Result<Option<RateLimitDecision>> {
        match &self.limiter {
            Some(limiter) => limiter.check(caller).into_result().map(Some),
            None => Ok(None),
        }
    }

    async fn generate_inner(
        &self,
        caller: &str,
        prompt: &str,
        model: &str,
    ) -> Result<Admitted<InferenceResponse>> {
        let quota = self.admit(caller)?;
        let model = self.resolve_model(model);

        info!(
            caller,
            model,
            prompt = %truncate_string(prompt, 60),
            "Generating text"
        );

        let started = Instant::now();
        let result = self.provider.generate(prompt, model).await;
        let elapsed = started.elapsed();

        match result {
            Ok(response) => {
                info!(
                    caller,
                    model,
                    elapsed_ms = elapsed.as_millis() as u64,
                    chars = response.len(),
                    "Generation finished"
                );
                Ok(Admitted {
                    value: InferenceResponse {
                        response,
                        model: model.to_string(),
                        elapsed,
                    },
                    quota,
                })
            }
            Err(e) => {
                error!(
                    caller,
                    model,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "Generation failed"
                );
                Err(e)
            }
        }
    }

    async fn chat_inner(
        &self,
        caller: &str,
        messages: Vec<Message>,
        model: &str,
    ) -> Result<Admitted<ChatResponse>> {
        if messages.is_empty() {
            return Err(ProviderError::InvalidRequest(
                "chat request has no messages".to_string(),
            ));
        }
        let quota = self.admit(caller)?;
        let model = self.resolve_model(model);
        let turns = messages.len();
        let request = ChatRequest::new(model, messages);

        info!(caller, model, turns, "Chat completion");

        let started = Instant::now();
        let result = self.provider.chat_completion(&request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(value) => {
                info!(caller, model, elapsed_ms, "Chat completion finished");
                Ok(Admitted { value, quota })
            }
            Err(e) => {
                error!(caller, model, elapsed_ms, error = %e, "Chat completion failed");
                Err(e)
            }
        }
    }
}
