//! Anthropic adapter configuration

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Configuration for the Anthropic messages API adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// API key for authentication
    pub api_key: String,
    /// Base URL for API requests
    pub base_url: String,
    /// API version header value
    pub api_version: String,
    /// Per-request transport timeout in seconds. Stage-level time budgets are
    /// enforced by the engine; this bounds a single HTTP exchange.
    pub timeout_seconds: u64,
    /// Custom headers to include in every request
    pub custom_headers: HashMap<String, String>,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.anthropic.com".to_string(),
            api_version: "2023-06-01".to_string(),
            timeout_seconds: 120,
            custom_headers: HashMap::new(),
        }
    }
}

impl AnthropicConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }
}
