//! AI Processing Engine
//!
//! This module provides the in-process two-stage analysis engine that replaced
//! ad-hoc external LLM CLI invocations. Stage 1 extracts structured information
//! from an input value; stage 2 maps the extracted data to the final output
//! shape. The engine wires admission control (rate limiter), health tracking
//! (circuit breaker), per-stage timeouts and retry-on-rate-limit around the
//! two sequential model calls, correlating everything with a per-call trace id.

pub mod circuit_breaker;
pub mod engine;
pub mod metrics;
pub mod prompt;
pub mod rate_limiter;
pub mod traits;


use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

pub use circuit_breaker::CircuitBreaker;
pub use engine::AIProcessingEngine;
pub use metrics::{InMemoryMetricsCollector, OperationStats, TracingLogger};
pub use prompt::PromptTemplate;
pub use rate_limiter::{RateLimitExhausted, RateLimiter, RateLimiterConfig};
pub use traits::{JsonSchemaValidator, MetricsCollector, ModelApiClient, SchemaValidator, StructuredLogger};

/// Process-wide engine defaults, loaded once at engine construction and
/// immutable for the engine's lifetime.
#[derive(Debug, Clone)]
pub struct AIProcessingConfig {
    /// Default per-stage timeout when a stage does not override it
    pub timeout: Duration,
    /// Default per-stage retry budget for retryable API errors
    pub max_retries: u32,
    /// Whether the circuit breaker gates new calls
    pub circuit_breaker_enabled: bool,
    /// Whether the rate limiter gates new calls
    pub rate_limiting_enabled: bool,
    /// Model identifier sent with every request
    pub default_model: String,
    /// Sampling temperature when a stage does not override it
    pub default_temperature: f32,
    /// Maximum output tokens when a stage does not override it
    pub default_max_tokens: u32,
}

impl Default for AIProcessingConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 3,
            circuit_breaker_enabled: true,
            rate_limiting_enabled: true,
            default_model: "claude-3-sonnet-20240229".to_string(),
            default_temperature: 0.2,
            default_max_tokens: 4096,
        }
    }
}

/// Per-stage generation parameters. Every field falls back to the engine-wide
/// default from [`AIProcessingConfig`] when unset.
#[derive(Debug, Clone, Default)]
pub struct StageOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
}

/// One stage of an analysis: how to render the request from a typed input and
/// how to validate the decoded response into a typed output.
pub struct StageConfig<T, U> {
    pub prompt: PromptTemplate<T>,
    pub schema: Arc<dyn SchemaValidator<U>>,
    pub options: StageOptions,
}

impl<T, U> StageConfig<T, U> {
    pub fn new(
        prompt: PromptTemplate<T>,
        schema: Arc<dyn SchemaValidator<U>>,
        options: StageOptions,
    ) -> Self {
        Self {
            prompt,
            schema,
            options,
        }
    }
}

/// Immutable configuration for one analysis kind: exactly two ordered stages
/// with a statically-typed intermediate value. Created once per analysis kind
/// and reused across many requests.
///
/// This is deliberately a fixed struct of two stage descriptors, not a
/// dynamic stage list: the domain only ever needs two ordered stages, and the
/// fixed shape keeps the intermediate type known at compile time.
pub struct TwoStageAnalysisConfig<I, M, O> {
    pub stage1: StageConfig<I, M>,
    pub stage2: StageConfig<M, O>,
}

impl<I, M, O> TwoStageAnalysisConfig<I, M, O> {
    pub fn new(stage1: StageConfig<I, M>, stage2: StageConfig<M, O>) -> Self {
        Self { stage1, stage2 }
    }
}

/// Ephemeral per-call correlation context. A fresh trace id is generated for
/// every call, including concurrent calls with identical input, so interleaved
/// log lines can be disambiguated. Each remote send additionally gets its own
/// request id.
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
}

impl TraceContext {
    pub fn new() -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
        }
    }

    /// Fresh identifier for one remote send within this call.
    pub fn next_request_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Closed error taxonomy for the analysis engine. Every outcome of
/// [`AIProcessingEngine::process_two_stage_analysis`] is carried in this type;
/// the engine never panics across its public boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AIProcessingError {
    /// Remote dependency deemed unhealthy; the call was rejected before any I/O
    #[error("circuit breaker is open; model calls are suspended")]
    CircuitBreakerOpen,

    /// Local admission or transport failure before a response was obtained
    #[error("network error: {0}")]
    Network(String),

    /// The remote service throttled the request
    #[error("model API rate limited; retry after {retry_after_secs}s")]
    ApiRateLimit { retry_after_secs: u64 },

    /// The remote service returned a server-side failure
    #[error("model API server error (status {status_code}, retryable: {retryable})")]
    ApiServerError { status_code: u16, retryable: bool },

    /// The response did not match the stage's expected shape
    #[error("invalid response format: {0}")]
    InvalidResponseFormat(String),

    /// Local template rendering or variable extraction failed
    #[error("prompt rendering failed: {0}")]
    PromptRendering(String),

    /// A stage exceeded its time budget. The in-flight request is dropped at
    /// the transport level, but the remote service may still have processed
    /// it; callers must not assume the remote call stopped executing.
    #[error("analysis timed out after {timeout_ms}ms")]
    AnalysisTimeout { timeout_ms: u64 },

    /// A stage panicked or failed in an unclassified way; converted at the
    /// engine boundary so the public contract stays total
    #[error("extraction strategy failed: {0}")]
    ExtractionStrategyFailed(String),
}

impl AIProcessingError {
    /// Whether the engine may retry the failed stage on its retry budget.
    pub fn is_retryable(&self) -> bool {
        match self {
            AIProcessingError::ApiRateLimit { .. } => true,
            AIProcessingError::ApiServerError { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Stable snake_case label used as the error dimension in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AIProcessingError::CircuitBreakerOpen => "circuit_breaker_open",
            AIProcessingError::Network(_) => "network_error",
            AIProcessingError::ApiRateLimit { .. } => "api_rate_limit",
            AIProcessingError::ApiServerError { .. } => "api_server_error",
            AIProcessingError::InvalidResponseFormat(_) => "invalid_response_format",
            AIProcessingError::PromptRendering(_) => "prompt_rendering",
            AIProcessingError::AnalysisTimeout { .. } => "analysis_timeout",
            AIProcessingError::ExtractionStrategyFailed(_) => "extraction_strategy_failed",
        }
    }
}

/// Result type for analysis operations
pub type AIResult<T> = Result<T, AIProcessingError>;
