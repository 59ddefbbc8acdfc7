//! Anthropic model API adapter

pub mod client;
pub mod config;
pub mod types;

pub use client::AnthropicClient;
pub use config::AnthropicConfig;
pub use types::{
    AnthropicContentBlock, AnthropicErrorBody, AnthropicErrorDetails, AnthropicMessage,
    AnthropicRequest, AnthropicResponse, AnthropicUsage,
};
