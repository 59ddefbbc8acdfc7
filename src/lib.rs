//! # frontmatter-ai
//!
//! In-process two-stage AI analysis engine for the frontmatter document
//! processing pipeline. The surrounding application renders markdown
//! documents, aggregates JSON Schemas and formats output; this crate owns the
//! part with systems-engineering weight: orchestrating the two sequential
//! model calls per analysis with admission control, circuit breaking, timeout
//! enforcement, retry-on-rate-limit and trace-correlated observability.
//!
//! ## Core Components
//!
//! - [`AIProcessingEngine`]: the orchestrator; one call runs stage 1
//!   (extraction) then stage 2 (mapping) and resolves to a single typed
//!   `Result`
//! - [`TwoStageAnalysisConfig`]: immutable per-analysis-kind configuration,
//!   a fixed pair of stage descriptors with a typed intermediate value
//! - [`CircuitBreaker`] / [`RateLimiter`]: process-wide health and admission
//!   gates, injected into the engine
//! - [`PromptTemplate`]: pure `{{key}}` substitution over a caller-supplied
//!   variable extractor
//! - [`AnthropicClient`]: reqwest adapter behind the [`ModelApiClient`] seam

// AI processing engine: orchestration, gates, prompts, observability
pub mod ai;

// Model API client boundary: wire types and the Anthropic adapter
pub mod client;

// Flat re-exports so callers don't need the module hierarchy
pub use ai::{
    AIProcessingConfig, AIProcessingEngine, AIProcessingError, AIResult, CircuitBreaker,
    InMemoryMetricsCollector, JsonSchemaValidator, MetricsCollector, ModelApiClient,
    OperationStats, PromptTemplate, RateLimitExhausted, RateLimiter, RateLimiterConfig,
    SchemaValidator, StageConfig,
    StageOptions, StructuredLogger, TraceContext, TracingLogger, TwoStageAnalysisConfig,
};
pub use client::{
    AnthropicClient, AnthropicConfig, MessageRole, ModelApiError, ModelMessage, ModelRequest,
    ModelResponse, ModelResult, TokenUsage,
};
