//! Two-stage analysis orchestration
//!
//! The engine wires the circuit breaker, rate limiter, model client and
//! observability sinks into a fixed two-stage pipeline. Each call gets a
//! fresh trace id, each remote send gets a fresh request id, and every
//! success/failure boundary updates the breaker and metrics. The public
//! contract is total: the engine resolves every call to a `Result` and never
//! lets a panic escape.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::json;
use tokio::time::Instant;

use crate::ai::{
    AIProcessingConfig, AIProcessingError, AIResult, CircuitBreaker, RateLimiter, StageConfig,
    TraceContext, TwoStageAnalysisConfig,
};
use crate::ai::traits::{MetricsCollector, ModelApiClient, StructuredLogger};
use crate::client::{ModelApiError, ModelMessage, ModelRequest};

/// Metric name for the extraction stage.
pub const OP_STAGE1: &str = "stage1_analysis";
/// Metric name for the mapping stage.
pub const OP_STAGE2: &str = "stage2_analysis";
/// Metric name for the overall pipeline.
pub const OP_TWO_STAGE: &str = "two_stage_analysis";

/// Fallback delay before retrying a retryable server error, which carries no
/// retry-after hint.
const SERVER_ERROR_RETRY_DELAY: Duration = Duration::from_secs(1);

/// The two-stage analysis orchestrator. Constructed once per process with its
/// injected collaborators and shared across concurrent calls.
pub struct AIProcessingEngine {
    config: AIProcessingConfig,
    client: Arc<dyn ModelApiClient>,
    circuit_breaker: Arc<CircuitBreaker>,
    rate_limiter: Arc<RateLimiter>,
    metrics: Arc<dyn MetricsCollector>,
    logger: Arc<dyn StructuredLogger>,
}

impl AIProcessingEngine {
    pub fn new(
        config: AIProcessingConfig,
        client: Arc<dyn ModelApiClient>,
        circuit_breaker: Arc<CircuitBreaker>,
        rate_limiter: Arc<RateLimiter>,
        metrics: Arc<dyn MetricsCollector>,
        logger: Arc<dyn StructuredLogger>,
    ) -> Self {
        Self {
            config,
            client,
            circuit_breaker,
            rate_limiter,
            metrics,
            logger,
        }
    }

    /// Run one two-stage analysis: extract with stage 1, map the extracted
    /// value to the output shape with stage 2.
    ///
    /// Resolves to a `Result` for every input; see [`AIProcessingError`] for
    /// the outcome taxonomy. Stage 2 never starts unless stage 1 succeeded.
    pub async fn process_two_stage_analysis<I, M, O>(
        &self,
        input: &I,
        config: &TwoStageAnalysisConfig<I, M, O>,
    ) -> AIResult<O>
    where
        I: Sync,
        M: Send + Sync,
        O: Send,
    {
        let trace = TraceContext::new();
        let started = Instant::now();
        self.logger.info(
            "two-stage analysis start",
            json!({ "trace_id": trace.trace_id }),
        );

        // Fail fast while the remote dependency is unhealthy: no network
        // call, no rate-limiter consumption.
        if self.config.circuit_breaker_enabled && self.circuit_breaker.is_open() {
            self.logger.warn(
                "circuit breaker open, rejecting analysis",
                json!({
                    "trace_id": trace.trace_id,
                    "consecutive_failures": self.circuit_breaker.consecutive_failures(),
                }),
            );
            self.metrics.record_error(
                OP_TWO_STAGE,
                started.elapsed(),
                AIProcessingError::CircuitBreakerOpen.kind(),
            );
            return Err(AIProcessingError::CircuitBreakerOpen);
        }

        if self.config.rate_limiting_enabled {
            if let Err(err) = self.rate_limiter.acquire().await {
                self.logger.warn(
                    "rate limit acquisition failed",
                    json!({
                        "trace_id": trace.trace_id,
                        "error": err.to_string(),
                        "tokens_remaining": self.rate_limiter.tokens_remaining().await,
                    }),
                );
                let error =
                    AIProcessingError::Network(format!("rate limiter admission failed: {}", err));
                self.metrics
                    .record_error(OP_TWO_STAGE, started.elapsed(), error.kind());
                return Err(error);
            }
        }

        // Contain panics from stage execution so the public contract stays
        // total; a panic is classified like any other stage failure.
        let result = match AssertUnwindSafe(self.run_pipeline(input, config, &trace))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic);
                self.logger.error(
                    "analysis stage panicked",
                    json!({ "trace_id": trace.trace_id, "error": message }),
                );
                Err(AIProcessingError::ExtractionStrategyFailed(message))
            }
        };

        let elapsed = started.elapsed();
        match &result {
            Ok(_) => {
                self.circuit_breaker.record_success();
                self.metrics.record_success(OP_TWO_STAGE, elapsed);
                self.logger.info(
                    "two-stage analysis complete",
                    json!({
                        "trace_id": trace.trace_id,
                        "elapsed_ms": elapsed.as_millis() as u64,
                    }),
                );
            }
            Err(error) => {
                self.circuit_breaker.record_failure();
                self.metrics.record_error(OP_TWO_STAGE, elapsed, error.kind());
                self.logger.error(
                    "two-stage analysis failed",
                    json!({
                        "trace_id": trace.trace_id,
                        "elapsed_ms": elapsed.as_millis() as u64,
                        "error": error.to_string(),
                        "error_kind": error.kind(),
                    }),
                );
            }
        }

        result
    }

    async fn run_pipeline<I, M, O>(
        &self,
        input: &I,
        config: &TwoStageAnalysisConfig<I, M, O>,
        trace: &TraceContext,
    ) -> AIResult<O> {
        let intermediate = self
            .run_stage(&config.stage1, input, OP_STAGE1, trace)
            .await?;
        self.run_stage(&config.stage2, &intermediate, OP_STAGE2, trace)
            .await
    }

    /// Execute one stage and record its metric under `operation`.
    async fn run_stage<T, U>(
        &self,
        stage: &StageConfig<T, U>,
        input: &T,
        operation: &str,
        trace: &TraceContext,
    ) -> AIResult<U> {
        let started = Instant::now();
        let result = self.execute_stage(stage, input, operation, trace).await;
        match &result {
            Ok(_) => self.metrics.record_success(operation, started.elapsed()),
            Err(error) => self
                .metrics
                .record_error(operation, started.elapsed(), error.kind()),
        }
        result
    }

    async fn execute_stage<T, U>(
        &self,
        stage: &StageConfig<T, U>,
        input: &T,
        operation: &str,
        trace: &TraceContext,
    ) -> AIResult<U> {
        let prompt = stage.prompt.render(input)?;
        let request = ModelRequest {
            model: self.config.default_model.clone(),
            messages: vec![ModelMessage::user(prompt)],
            max_tokens: stage
                .options
                .max_tokens
                .unwrap_or(self.config.default_max_tokens),
            temperature: stage
                .options
                .temperature
                .unwrap_or(self.config.default_temperature),
        };
        let response_schema = stage.schema.schema();
        let timeout = stage.options.timeout.unwrap_or(self.config.timeout);
        let max_retries = stage.options.max_retries.unwrap_or(self.config.max_retries);

        let mut attempt: u32 = 0;
        loop {
            let request_id = trace.next_request_id();
            self.logger.debug(
                "sending model request",
                json!({
                    "trace_id": trace.trace_id,
                    "request_id": request_id,
                    "operation": operation,
                    "model": request.model,
                    "attempt": attempt,
                }),
            );

            let send = self
                .client
                .send_message(&request, &response_schema, &trace.trace_id);
            let response = match tokio::time::timeout(timeout, send).await {
                Err(_) => {
                    return Err(AIProcessingError::AnalysisTimeout {
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
                Ok(Err(api_error)) => {
                    let error = classify_api_error(api_error);
                    if error.is_retryable() && attempt < max_retries {
                        attempt += 1;
                        let delay = retry_delay(&error);
                        self.logger.debug(
                            "model call failed, will retry",
                            json!({
                                "trace_id": trace.trace_id,
                                "request_id": request_id,
                                "operation": operation,
                                "error_kind": error.kind(),
                                "delay_secs": delay.as_secs(),
                                "attempt": attempt,
                            }),
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(error);
                }
                Ok(Ok(response)) => response,
            };

            self.logger.debug(
                "model response received",
                json!({
                    "trace_id": trace.trace_id,
                    "request_id": request_id,
                    "operation": operation,
                    "response_id": response.id,
                    "total_tokens": response.usage.total_tokens(),
                }),
            );

            return stage
                .schema
                .validate(&response.payload)
                .map_err(AIProcessingError::InvalidResponseFormat);
        }
    }
}

/// Map a model API failure onto the engine's error taxonomy.
fn classify_api_error(error: ModelApiError) -> AIProcessingError {
    match error {
        ModelApiError::RateLimited { retry_after_secs } => {
            AIProcessingError::ApiRateLimit { retry_after_secs }
        }
        ModelApiError::Server {
            status_code,
            retryable,
            ..
        } => AIProcessingError::ApiServerError {
            status_code,
            retryable,
        },
        ModelApiError::Network(message) => AIProcessingError::Network(message),
        ModelApiError::InvalidResponse(message) => {
            AIProcessingError::InvalidResponseFormat(message)
        }
    }
}

/// Delay before retrying: rate limits honor the service's hint, retryable
/// server errors use a fixed short backoff.
fn retry_delay(error: &AIProcessingError) -> Duration {
    match error {
        AIProcessingError::ApiRateLimit { retry_after_secs } => {
            Duration::from_secs(*retry_after_secs)
        }
        _ => SERVER_ERROR_RETRY_DELAY,
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "analysis stage panicked".to_string()
    }
}
