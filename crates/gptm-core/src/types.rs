//! Core types for gptm — the uniform request/response contract shared by all backends.
//!
//! Every backend translates its own wire dialect into these shapes, so callers
//! never see a backend-specific response.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Context size reported when a backend cannot introspect a model.
pub const DEFAULT_CONTEXT_SIZE: u32 = 4096;

// ─────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────

/// Who authored a message in a conversation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single chat message.
///
/// Serializes as `{"role": "...", "content": "..."}`, which is the shape both
/// the local daemon and the hosted chat-completions API accept verbatim.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Message {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ─────────────────────────────────────────────
// Chat request / response
// ─────────────────────────────────────────────

/// A multi-turn completion request.
///
/// An empty `model` means "use the backend's configured default".
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    #[serde(default)]
    pub model: String,
    pub messages: Vec<Message>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        ChatRequest {
            model: model.into(),
            messages,
        }
    }

    /// The model to call: the requested one, or `fallback` when none was given.
    pub fn model_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.model.trim().is_empty() {
            fallback
        } else {
            &self.model
        }
    }
}

/// Exactly one reply message from the backend.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub message: Message,
}

impl ChatResponse {
    /// Wrap reply text as an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        ChatResponse {
            message: Message::assistant(content),
        }
    }
}

// ─────────────────────────────────────────────
// Inference response
// ─────────────────────────────────────────────

/// Result of a single free-form generation, with timing.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct InferenceResponse {
    pub response: String,
    pub model: String,
    /// Wall-clock duration of the backend call, serialized as `time_ms`.
    #[serde(rename = "time_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(d.as_millis() as u64)
}

// ─────────────────────────────────────────────
// Model metadata
// ─────────────────────────────────────────────

/// Best-effort model metadata. Zero means unknown.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub description: String,
    pub context_size: u32,
    pub parameters: u64,
}

impl ModelInfo {
    /// Deterministic stand-in for backends that cannot introspect a model.
    pub fn placeholder(model: &str, backend: &str) -> Self {
        ModelInfo {
            name: model.to_string(),
            description: format!("{backend} model: {model}"),
            context_size: DEFAULT_CONTEXT_SIZE,
            parameters: 0,
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
