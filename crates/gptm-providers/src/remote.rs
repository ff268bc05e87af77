//! Resilient client for a hosted chat-completions API.
//!
//! Every call runs inside a bounded retry loop of at most `max_retries + 1`
//! attempts. Before retry `i` the loop sleeps `retry_delay * 2^(i-1)`. Each
//! attempt gets its own timeout; an expired attempt is dropped, which cancels
//! the in-flight request and releases its connection.
//!
//! Failure classification (see [`ProviderError::is_retryable`]):
//! - transport failure or timeout → retry
//! - 4xx → stop immediately and return the error
//! - any other non-2xx → retry
//! - 2xx with an unparseable body, an `error` object, or no choices → retry
//! - 2xx with at least one choice → return the first choice's content

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, warn, Instrument, Span};

use gptm_core::config::RemoteConfig;
use gptm_core::error::{ProviderError, Result};
use gptm_core::types::{ChatRequest, ChatResponse, Message, ModelInfo};
use gptm_core::utils::truncate_string;

use crate::http::{build_client, decode, read_success_body, transport_error};
use crate::traits::Provider;

const DISPLAY_NAME: &str = "Atoma";

// ─────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionReply {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

// ─────────────────────────────────────────────
// RemoteClient
// ─────────────────────────────────────────────

/// Retrying client for an OpenAI-style hosted completions endpoint.
pub struct RemoteClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    max_tokens: u32,
    temperature: f64,
    span: Span,
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl RemoteClient {
    /// Create a client from the `remote` config section.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let timeout = config.timeout();
        let span = info_span!("provider", backend = "remote", endpoint = %config.base_url);

        Ok(RemoteClient {
            client: build_client(timeout)?,
            endpoint: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            span,
        })
    }

    /// Replace the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    /// Generate text for a single user prompt with the configured model.
    pub async fn generate_text(&self, prompt: &str) -> Result<String> {
        self.complete(&self.model, &[Message::user(prompt)]).await
    }

    /// Run the retry loop for `messages` against `model`.
    pub async fn complete(&self, model: &str, messages: &[Message]) -> Result<String> {
        self.complete_with_retries(model, messages)
            .instrument(self.span.clone())
            .await
    }

    /// Delay inserted before attempt `attempt` (1-based retry index).
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_delay.saturating_mul(factor)
    }

    async fn complete_with_retries(&self, model: &str, messages: &[Message]) -> Result<String> {
        let attempts = self.max_retries.saturating_add(1);
        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.backoff(attempt);
                warn!(
                    attempt,
                    max_retries = self.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error.as_ref().map(ToString::to_string).unwrap_or_default(),
                    "retrying completion request"
                );
                tokio::time::sleep(delay).await;
            }

            let request = CompletionRequest {
                model,
                messages,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };
            // Encoding our own request is deterministic; a failure would repeat on
            // every attempt.
            let payload = serde_json::to_vec(&request)
                .map_err(|e| ProviderError::Serialization(e.to_string()))?;

            let started = Instant::now();
            debug!(
                attempt = attempt + 1,
                of = attempts,
                model,
                messages = messages.len(),
                "sending completion request"
            );

            let outcome = match tokio::time::timeout(self.timeout, self.attempt(payload)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.timeout)),
            };

            match outcome {
                Ok(text) => {
                    debug!(
                        attempt = attempt + 1,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        reply = %truncate_string(&text, 80),
                        "completion succeeded"
                    );
                    return Ok(text);
                }
                Err(e) if !e.is_retryable() => {
                    warn!(attempt = attempt + 1, error = %e, "non-retryable completion failure");
                    return Err(e);
                }
                Err(e) => {
                    debug!(
                        attempt = attempt + 1,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        error = %e,
                        "completion attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(ProviderError::RetriesExhausted {
            attempts,
            source: Box::new(last_error.unwrap_or(ProviderError::EmptyResponse)),
        })
    }

    /// One HTTP round trip, classified into text or a typed failure.
    async fn attempt(&self, payload: Vec<u8>) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let raw = read_success_body(response, self.timeout).await?;
        let reply: CompletionReply = decode(&raw)?;

        if let Some(err) = reply.error {
            return Err(ProviderError::Api(err.message));
        }

        debug!(
            id = reply.id.as_deref().unwrap_or("?"),
            choices = reply.choices.len(),
            "completion reply"
        );

        reply
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or(ProviderError::EmptyResponse)
    }

    fn resolve_model<'a>(&'a self, model: &'a str) -> &'a str {
        if model.trim().is_empty() {
            &self.model
        } else {
            model
        }
    }
}

#[async_trait]
impl Provider for RemoteClient {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String> {
        let model = self.resolve_model(model);
        self.complete(model, &[Message::user(prompt)]).await
    }

    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse> {
        if request.messages.is_empty() {
            return Err(ProviderError::InvalidRequest(
                "chat request has no messages".to_string(),
            ));
        }
        let model = request.model_or(&self.model);
        let text = self.complete(model, &request.messages).await?;
        Ok(ChatResponse::assistant(text))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        // The completions endpoint has no catalog call.
        Ok(vec![self.model.clone()])
    }

    async fn get_model_info(&self, model: &str) -> Result<ModelInfo> {
        Ok(ModelInfo::placeholder(self.resolve_model(model), DISPLAY_NAME))
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn display_name(&self) -> &str {
        DISPLAY_NAME
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENDPOINT: &str = "/v1/chat/completions";

    fn config_for(server: &MockServer, max_retries: u32, retry_delay_ms: u64) -> RemoteConfig {
        RemoteConfig {
            api_key: "test-key-123".to_string(),
            base_url: format!("{}{}", server.uri(), ENDPOINT),
            model: "test-model".to_string(),
            timeout_secs: 5,
            max_retries,
            retry_delay_ms,
            max_tokens: 2000,
            temperature: 0.7,
        }
    }

    fn client_for(server: &MockServer, max_retries: u32, retry_delay_ms: u64) -> RemoteClient {
        RemoteClient::new(&config_for(server, max_retries, retry_delay_ms)).unwrap()
    }

    fn success(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-test",
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }

    async fn request_count(server: &MockServer) -> usize {
        server.received_requests().await.unwrap().len()
    }

    // ── Unit tests ──

    #[test]
    fn test_backoff_doubles() {
        let config = RemoteConfig {
            retry_delay_ms: 100,
            ..RemoteConfig::default()
        };
        let client = RemoteClient::new(&config).unwrap();

        assert_eq!(client.backoff(1), Duration::from_millis(100));
        assert_eq!(client.backoff(2), Duration::from_millis(200));
        assert_eq!(client.backoff(3), Duration::from_millis(400));
        assert_eq!(client.backoff(4), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_saturates_instead_of_overflowing() {
        let client = RemoteClient::new(&RemoteConfig::default()).unwrap();
        assert_eq!(client.backoff(200), client.backoff(40));
        assert!(client.backoff(40) > client.backoff(31));
    }

    // ── Success paths ──

    #[tokio::test]
    async fn test_generate_text_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(header("Authorization", "Bearer test-key-123"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(json!({
                "model": "test-model",
                "messages": [{"role": "user", "content": "Write a haiku"}],
                "temperature": 0.7,
                "max_tokens": 2000
            })))
            .respond_with(success("Autumn moonlight..."))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, 3, 10);
        let text = client.generate_text("Write a haiku").await.unwrap();
        assert_eq!(text, "Autumn moonlight...");
    }

    #[tokio::test]
    async fn test_first_success_stops_retrying() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(success("third time lucky"))
            .mount(&server)
            .await;

        let client = client_for(&server, 5, 10);
        let text = client.generate_text("hi").await.unwrap();

        assert_eq!(text, "third time lucky");
        assert_eq!(request_count(&server).await, 3);
    }

    // ── Fatal client errors ──

    #[tokio::test]
    async fn test_client_error_makes_exactly_one_attempt() {
        for status in [400u16, 401, 404, 429] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(ENDPOINT))
                .respond_with(
                    ResponseTemplate::new(status)
                        .set_body_json(json!({"error": {"message": "nope"}})),
                )
                .expect(1)
                .mount(&server)
                .await;

            let client = client_for(&server, 3, 500);
            let started = Instant::now();
            let err = client.generate_text("hi").await.unwrap_err();

            assert_eq!(err.status(), Some(status));
            assert!(matches!(err, ProviderError::Status { .. }), "got {err:?}");
            assert!(started.elapsed() < Duration::from_millis(500), "must not sleep");
            assert_eq!(request_count(&server).await, 1);
        }
    }

    // ── Retry exhaustion ──

    #[tokio::test]
    async fn test_server_errors_exhaust_retries_with_backoff() {
        for status in [500u16, 502, 503] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(ENDPOINT))
                .respond_with(ResponseTemplate::new(status).set_body_string("upstream down"))
                .expect(3)
                .mount(&server)
                .await;

            let client = client_for(&server, 2, 30);
            let started = Instant::now();
            let err = client.generate_text("hi").await.unwrap_err();
            let elapsed = started.elapsed();

            match &err {
                ProviderError::RetriesExhausted { attempts, source } => {
                    assert_eq!(*attempts, 3);
                    assert_eq!(source.status(), Some(status));
                }
                other => panic!("expected RetriesExhausted, got {other:?}"),
            }
            assert!(err.to_string().contains("upstream down"));
            // 30ms + 60ms of backoff
            assert!(elapsed >= Duration::from_millis(90), "elapsed {elapsed:?}");
            assert_eq!(request_count(&server).await, 3);
        }
    }

    #[tokio::test]
    async fn test_max_retry_budget_does_not_overflow() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(success("first try"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, u32::MAX, 10);
        assert_eq!(client.generate_text("hi").await.unwrap(), "first try");
    }

    #[tokio::test]
    async fn test_max_retry_budget_still_stops_on_client_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, u32::MAX, 10);
        let err = client.generate_text("hi").await.unwrap_err();
        assert_eq!(err.status(), Some(403));
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, 0, 10);
        let err = client.generate_text("hi").await.unwrap_err();
        assert!(matches!(err, ProviderError::RetriesExhausted { attempts: 1, .. }));
    }

    // ── Malformed 2xx bodies are retried ──

    #[tokio::test]
    async fn test_empty_choices_is_retried_not_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "x", "choices": []})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(success("real answer"))
            .mount(&server)
            .await;

        let client = client_for(&server, 3, 10);
        assert_eq!(client.generate_text("hi").await.unwrap(), "real answer");
        assert_eq!(request_count(&server).await, 2);
    }

    #[tokio::test]
    async fn test_empty_choices_every_time_exhausts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server, 1, 10);
        let err = client.generate_text("hi").await.unwrap_err();
        match err {
            ProviderError::RetriesExhausted { source, .. } => {
                assert!(matches!(*source, ProviderError::EmptyResponse));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_field_in_success_body_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [],
                "error": {"message": "model overloaded"}
            })))
            .expect(3)
            .mount(&server)
            .await;

        let client = client_for(&server, 2, 10);
        let err = client.generate_text("hi").await.unwrap_err();
        assert!(err.to_string().contains("model overloaded"), "got {err}");
    }

    #[tokio::test]
    async fn test_unparseable_success_body_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_string("{truncated"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(success("ok"))
            .mount(&server)
            .await;

        let client = client_for(&server, 1, 10);
        assert_eq!(client.generate_text("hi").await.unwrap(), "ok");
        assert_eq!(request_count(&server).await, 2);
    }

    // ── Transport failures ──

    #[tokio::test]
    async fn test_attempt_timeout_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(success("too slow").set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client = client_for(&server, 1, 10)
            .with_timeout(Duration::from_millis(150))
            .unwrap();
        let err = client.generate_text("hi").await.unwrap_err();

        match err {
            ProviderError::RetriesExhausted { attempts, source } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*source, ProviderError::Timeout(_)), "got {source:?}");
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_retried() {
        let config = RemoteConfig {
            api_key: "k".to_string(),
            base_url: "http://127.0.0.1:1/v1/chat/completions".to_string(),
            max_retries: 2,
            retry_delay_ms: 10,
            ..RemoteConfig::default()
        };
        let client = RemoteClient::new(&config).unwrap();
        let err = client.generate_text("hi").await.unwrap_err();

        match err {
            ProviderError::RetriesExhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, ProviderError::Transport(_)), "got {source:?}");
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    // ── Provider contract ──

    #[tokio::test]
    async fn test_chat_completion_preserves_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(body_json(json!({
                "model": "other-model",
                "messages": [
                    {"role": "system", "content": "Answer in French."},
                    {"role": "user", "content": "Hello"},
                    {"role": "assistant", "content": "Bonjour"},
                    {"role": "user", "content": "Goodbye"}
                ],
                "temperature": 0.7,
                "max_tokens": 2000
            })))
            .respond_with(success("Au revoir"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, 0, 10);
        let request = ChatRequest::new(
            "other-model",
            vec![
                Message::system("Answer in French."),
                Message::user("Hello"),
                Message::assistant("Bonjour"),
                Message::user("Goodbye"),
            ],
        );

        let resp = client.chat_completion(&request).await.unwrap();
        assert_eq!(resp, ChatResponse::assistant("Au revoir"));
    }

    #[tokio::test]
    async fn test_generate_uses_configured_model_when_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(wiremock::matchers::body_partial_json(json!({"model": "test-model"})))
            .respond_with(success("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, 0, 10);
        assert_eq!(client.generate("hi", "").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_chat_empty_messages_rejected() {
        let server = MockServer::start().await;
        let client = client_for(&server, 3, 10);

        let err = client
            .chat_completion(&ChatRequest::new("", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert_eq!(request_count(&server).await, 0);
    }

    #[tokio::test]
    async fn test_models_and_info_without_introspection() {
        let server = MockServer::start().await;
        let client = client_for(&server, 0, 10);

        assert_eq!(client.list_models().await.unwrap(), vec!["test-model"]);

        let info = client.get_model_info("").await.unwrap();
        assert_eq!(info, ModelInfo::placeholder("test-model", "Atoma"));
        assert_eq!(request_count(&server).await, 0);
    }
}
