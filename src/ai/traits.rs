//! Capability seams for the analysis engine
//!
//! The model client, schema validators and observability sinks are all
//! capability interfaces so test doubles can substitute each one
//! independently. The engine only ever holds `Arc<dyn ...>` handles to these.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::client::{ModelRequest, ModelResponse, ModelResult};

/// Remote model API boundary. Sends one rendered request plus the response
/// schema the caller expects, and returns the decoded payload or a classified
/// API error. The transport behind this trait is out of the engine's scope.
#[async_trait]
pub trait ModelApiClient: Send + Sync {
    async fn send_message(
        &self,
        request: &ModelRequest,
        response_schema: &serde_json::Value,
        trace_id: &str,
    ) -> ModelResult<ModelResponse>;
}

/// Validates a decoded response payload against the shape a stage expects and
/// yields the typed value. Supplied by the collaborator per stage; the engine
/// consumes it as an opaque capability.
pub trait SchemaValidator<T>: Send + Sync {
    /// The JSON Schema handed to the model client for the wire request.
    fn schema(&self) -> serde_json::Value;

    /// Check the payload against the expected shape and deserialize it.
    fn validate(&self, payload: &serde_json::Value) -> Result<T, String>;
}

/// Observability sink for per-operation success/error counters.
pub trait MetricsCollector: Send + Sync {
    fn record_success(&self, operation: &str, duration: Duration);
    fn record_error(&self, operation: &str, duration: Duration, error_kind: &str);
}

/// Structured log sink. The engine attaches the per-call trace id to the
/// context of every line it emits.
pub trait StructuredLogger: Send + Sync {
    fn info(&self, message: &str, context: serde_json::Value);
    fn debug(&self, message: &str, context: serde_json::Value);
    fn warn(&self, message: &str, context: serde_json::Value);
    fn error(&self, message: &str, context: serde_json::Value);
}

/// [`SchemaValidator`] backed by a compiled JSON Schema: the payload must
/// satisfy the schema and deserialize into `T`.
pub struct JsonSchemaValidator<T> {
    schema: serde_json::Value,
    validator: jsonschema::Validator,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSchemaValidator<T> {
    pub fn new(schema: serde_json::Value) -> Result<Self, String> {
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| format!("invalid response schema: {}", e))?;
        Ok(Self {
            schema,
            validator,
            _marker: PhantomData,
        })
    }
}

impl<T> SchemaValidator<T> for JsonSchemaValidator<T>
where
    T: DeserializeOwned + Send + Sync,
{
    fn schema(&self) -> serde_json::Value {
        self.schema.clone()
    }

    fn validate(&self, payload: &serde_json::Value) -> Result<T, String> {
        if let Err(error) = self.validator.validate(payload) {
            return Err(format!("schema validation failed: {}", error));
        }
        serde_json::from_value(payload.clone())
            .map_err(|e| format!("payload deserialization failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Extraction {
        key: String,
        confidence: f64,
    }

    fn extraction_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "key": { "type": "string" },
                "confidence": { "type": "number" }
            },
            "required": ["key", "confidence"]
        })
    }

    #[test]
    fn test_valid_payload_deserializes() {
        let validator: JsonSchemaValidator<Extraction> =
            JsonSchemaValidator::new(extraction_schema()).unwrap();

        let payload = json!({ "key": "title", "confidence": 0.9 });
        let extraction = validator.validate(&payload).unwrap();
        assert_eq!(
            extraction,
            Extraction {
                key: "title".to_string(),
                confidence: 0.9
            }
        );
    }

    #[test]
    fn test_schema_violation_is_rejected() {
        let validator: JsonSchemaValidator<Extraction> =
            JsonSchemaValidator::new(extraction_schema()).unwrap();

        let err = validator.validate(&json!({ "key": "title" })).unwrap_err();
        assert!(err.contains("schema validation failed"));
    }

    #[test]
    fn test_invalid_schema_is_rejected_at_construction() {
        let result: Result<JsonSchemaValidator<Extraction>, _> =
            JsonSchemaValidator::new(json!({ "type": "not-a-type" }));
        assert!(result.is_err());
    }
}
