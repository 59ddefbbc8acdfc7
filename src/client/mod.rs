//! Model API client boundary
//!
//! Wire-level request/response types shared by every model API adapter, plus
//! the closed error taxonomy adapters classify remote failures into. The
//! engine maps [`ModelApiError`] onto its own error type; adapters never leak
//! transport-specific errors past this boundary.

pub mod anthropic;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use anthropic::{AnthropicClient, AnthropicConfig};

/// Role of a message author.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One message in the request conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ModelMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// One rendered request to the remote model service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<ModelMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Token accounting reported by the remote service.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Decoded response from the remote model service. `payload` is the JSON
/// object the model produced, still to be validated against the stage schema.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub id: String,
    pub model: String,
    pub payload: serde_json::Value,
    pub usage: TokenUsage,
}

/// Classified failures at the model API boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelApiError {
    /// The remote service throttled the request
    #[error("rate limited by model API; retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The remote service rejected or failed the request
    #[error("model API error (status {status_code}): {message}")]
    Server {
        status_code: u16,
        retryable: bool,
        message: String,
    },

    /// Transport failure before a response was obtained
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be decoded into the expected wire shape
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
}

/// Result type for model API operations
pub type ModelResult<T> = Result<T, ModelApiError>;
