//! Anthropic messages API adapter
//!
//! Implements [`ModelApiClient`] over the Anthropic HTTP API. The expected
//! response schema is threaded into the system prompt as a JSON-only output
//! contract, and the first text content block of the response must parse as a
//! JSON object; that object is handed back for stage-level schema validation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use tracing::{debug, error};

use crate::ai::traits::ModelApiClient;
use crate::client::{
    MessageRole, ModelApiError, ModelRequest, ModelResponse, ModelResult, TokenUsage,
};

use super::config::AnthropicConfig;
use super::types::{AnthropicErrorBody, AnthropicMessage, AnthropicRequest, AnthropicResponse};

/// Default retry hint when a 429 carries no retry-after header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Anthropic adapter for the engine's model client seam.
pub struct AnthropicClient {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self::new(AnthropicConfig::with_api_key(api_key))
    }

    /// Build HTTP headers for requests
    fn build_headers(&self) -> ModelResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.config.api_key)
                .map_err(|e| ModelApiError::Network(format!("invalid API key format: {}", e)))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_str(&self.config.api_version)
                .map_err(|e| ModelApiError::Network(format!("invalid API version: {}", e)))?,
        );

        for (key, value) in &self.config.custom_headers {
            let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| ModelApiError::Network(format!("invalid header key: {}", e)))?;
            headers.insert(
                name,
                HeaderValue::from_str(value)
                    .map_err(|e| ModelApiError::Network(format!("invalid header value: {}", e)))?,
            );
        }

        Ok(headers)
    }

    /// Convert the engine's request format to Anthropic's, folding system
    /// messages and the response-schema contract into the `system` field.
    fn convert_request(
        &self,
        request: &ModelRequest,
        response_schema: &serde_json::Value,
    ) -> ModelResult<AnthropicRequest> {
        let mut system_parts: Vec<String> = request
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.clone())
            .collect();

        let schema_text = serde_json::to_string_pretty(response_schema)
            .map_err(|e| ModelApiError::InvalidResponse(format!("unserializable schema: {}", e)))?;
        system_parts.push(format!(
            "Respond with a single JSON object that conforms to this JSON Schema. \
             Output only the JSON object, with no surrounding text.\n\n{}",
            schema_text
        ));

        let messages: Vec<AnthropicMessage> = request
            .messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(AnthropicMessage::from)
            .collect();

        Ok(AnthropicRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: Some(f64::from(request.temperature)),
            system: Some(system_parts.join("\n\n")),
            stream: Some(false),
        })
    }
}

#[async_trait]
impl ModelApiClient for AnthropicClient {
    async fn send_message(
        &self,
        request: &ModelRequest,
        response_schema: &serde_json::Value,
        trace_id: &str,
    ) -> ModelResult<ModelResponse> {
        let headers = self.build_headers()?;
        let body = self.convert_request(request, response_schema)?;

        debug!(
            trace_id = %trace_id,
            model = %request.model,
            "sending request to Anthropic API"
        );

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .headers(headers)
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelApiError::Network(format!("request failed: {}", e)))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let retry_after = parse_retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicErrorBody>(&text)
                .map(|body| format!("{}: {}", body.error.error_type, body.error.message))
                .unwrap_or(text);
            error!(
                trace_id = %trace_id,
                status = status,
                "Anthropic API request failed: {}", message
            );
            return Err(classify_status(status, retry_after, message));
        }

        let decoded: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ModelApiError::InvalidResponse(format!("response decode failed: {}", e)))?;

        let payload = extract_payload(&decoded)?;
        Ok(ModelResponse {
            id: decoded.id,
            model: decoded.model,
            payload,
            usage: TokenUsage {
                input_tokens: decoded.usage.input_tokens,
                output_tokens: decoded.usage.output_tokens,
            },
        })
    }
}

/// Classify a non-success HTTP status into the model API error taxonomy.
fn classify_status(status: u16, retry_after: Option<u64>, message: String) -> ModelApiError {
    match status {
        429 => ModelApiError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        // 529 is Anthropic's "overloaded" status
        408 | 529 => ModelApiError::Server {
            status_code: status,
            retryable: true,
            message,
        },
        500..=599 => ModelApiError::Server {
            status_code: status,
            retryable: true,
            message,
        },
        _ => ModelApiError::Server {
            status_code: status,
            retryable: false,
            message,
        },
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

/// The model must answer with a single JSON object in its first text block.
fn extract_payload(response: &AnthropicResponse) -> ModelResult<serde_json::Value> {
    let text = response
        .content
        .iter()
        .find(|block| block.content_type == "text")
        .and_then(|block| block.text.as_deref())
        .ok_or_else(|| {
            ModelApiError::InvalidResponse("response contains no text content block".to_string())
        })?;

    serde_json::from_str(text.trim())
        .map_err(|e| ModelApiError::InvalidResponse(format!("response is not valid JSON: {}", e)))
}
