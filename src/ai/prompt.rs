//! Prompt template rendering
//!
//! A template is a string with `{{key}}` placeholders plus a caller-supplied
//! variable extractor. Rendering is pure and stateless, so one template can be
//! shared across concurrent analysis calls.

use std::sync::Arc;

use crate::ai::{AIProcessingError, AIResult};

/// Extracts the value for one placeholder key from a typed input.
///
/// The extractor owns the mapping from keys to input fields; a key it does not
/// recognize is a rendering error.
pub type VariableExtractor<T> =
    Arc<dyn Fn(&T, &str) -> Result<serde_json::Value, String> + Send + Sync>;

/// A prompt template bound to a typed input via a variable extractor.
pub struct PromptTemplate<T> {
    template: String,
    extractor: VariableExtractor<T>,
}

impl<T> Clone for PromptTemplate<T> {
    fn clone(&self) -> Self {
        Self {
            template: self.template.clone(),
            extractor: Arc::clone(&self.extractor),
        }
    }
}

impl<T> PromptTemplate<T> {
    pub fn new(template: impl Into<String>, extractor: VariableExtractor<T>) -> Self {
        Self {
            template: template.into(),
            extractor,
        }
    }

    /// Substitute every `{{key}}` placeholder in the template.
    ///
    /// Fails with [`AIProcessingError::PromptRendering`] only when the
    /// extractor rejects a key, yields a value that cannot be rendered as a
    /// string fragment, or the template has an unterminated placeholder.
    pub fn render(&self, input: &T) -> AIResult<String> {
        let mut output = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find("{{") {
            output.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];
            let end = after_open.find("}}").ok_or_else(|| {
                AIProcessingError::PromptRendering(
                    "unterminated placeholder in template".to_string(),
                )
            })?;
            let key = after_open[..end].trim();
            let value = (self.extractor)(input, key).map_err(|e| {
                AIProcessingError::PromptRendering(format!(
                    "variable extraction failed for '{}': {}",
                    key, e
                ))
            })?;
            output.push_str(&stringify_value(key, &value)?);
            rest = &after_open[end + 2..];
        }
        output.push_str(rest);

        Ok(output)
    }
}

/// Render an extracted value as a prompt fragment. Strings embed verbatim,
/// scalars via their display form, arrays and objects as JSON. Null has no
/// string form and is rejected.
fn stringify_value(key: &str, value: &serde_json::Value) -> AIResult<String> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        serde_json::Value::Null => Err(AIProcessingError::PromptRendering(format!(
            "variable '{}' resolved to null",
            key
        ))),
        other => serde_json::to_string(other).map_err(|e| {
            AIProcessingError::PromptRendering(format!(
                "variable '{}' could not be serialized: {}",
                key, e
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn json_extractor() -> VariableExtractor<serde_json::Value> {
        Arc::new(|input: &serde_json::Value, key: &str| {
            input
                .get(key)
                .cloned()
                .ok_or_else(|| format!("unknown key '{}'", key))
        })
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let template = PromptTemplate::new(
            "Analyze the document titled {{title}} with {{count}} sections.",
            json_extractor(),
        );
        let input = json!({ "title": "README", "count": 3 });

        let rendered = template.render(&input).unwrap();
        assert_eq!(rendered, "Analyze the document titled README with 3 sections.");
    }

    #[test]
    fn test_render_embeds_structured_values_as_json() {
        let template = PromptTemplate::new("Fields: {{fields}}", json_extractor());
        let input = json!({ "fields": ["title", "tags"] });

        let rendered = template.render(&input).unwrap();
        assert_eq!(rendered, r#"Fields: ["title","tags"]"#);
    }

    #[test]
    fn test_render_fails_on_unknown_key() {
        let template = PromptTemplate::new("{{missing}}", json_extractor());
        let err = template.render(&json!({})).unwrap_err();
        assert!(matches!(err, AIProcessingError::PromptRendering(_)));
    }

    #[test]
    fn test_render_fails_on_null_value() {
        let template = PromptTemplate::new("{{value}}", json_extractor());
        let err = template.render(&json!({ "value": null })).unwrap_err();
        assert!(matches!(err, AIProcessingError::PromptRendering(_)));
    }

    #[test]
    fn test_render_fails_on_unterminated_placeholder() {
        let template = PromptTemplate::new("broken {{key", json_extractor());
        let err = template.render(&json!({ "key": "v" })).unwrap_err();
        assert!(matches!(err, AIProcessingError::PromptRendering(_)));
    }

    #[test]
    fn test_render_without_placeholders_is_identity() {
        let template = PromptTemplate::new("no variables here", json_extractor());
        let rendered = template.render(&json!({})).unwrap();
        assert_eq!(rendered, "no variables here");
    }
}
