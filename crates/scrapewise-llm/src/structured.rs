//! Structured inference: `infer(prompt, expected_shape)` on top of a raw
//! completion provider.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use scrapewise_core::{ChatMessage, ModelError};

use crate::registry::ModelRegistry;

/// Top-level keys a structured answer must carry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedShape {
    pub required: Vec<String>,
}

impl ExpectedShape {
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Check a parsed answer against the shape.
    pub fn validate(&self, value: &Value) -> Result<(), ModelError> {
        let object = value
            .as_object()
            .ok_or_else(|| ModelError::MalformedOutput("expected a JSON object".into()))?;
        let missing: Vec<&str> = self
            .required
            .iter()
            .filter(|k| !object.contains_key(k.as_str()))
            .map(|k| k.as_str())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ModelError::MalformedOutput(format!(
                "missing keys: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Runs prompts against registry aliases with a hard timeout.
#[derive(Clone)]
pub struct StructuredInference {
    registry: Arc<ModelRegistry>,
    timeout: Duration,
}

impl StructuredInference {
    pub fn new(registry: Arc<ModelRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn is_available(&self, alias: &str) -> bool {
        self.registry.resolve(alias).is_ok()
    }

    /// Send `messages` to the provider behind `alias` and parse a JSON
    /// object matching `shape` out of the completion.
    pub async fn infer(
        &self,
        alias: &str,
        messages: &[ChatMessage],
        shape: &ExpectedShape,
    ) -> Result<Value, ModelError> {
        let provider = self.registry.resolve(alias)?;

        let response = match tokio::time::timeout(self.timeout, provider.complete(messages)).await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    alias,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Model call timed out"
                );
                return Err(ModelError::Timeout {
                    after_ms: self.timeout.as_millis() as u64,
                });
            }
        };

        let json_str = extract_json(&response.content);
        let parsed: Value = serde_json::from_str(json_str)?;
        shape.validate(&parsed)?;

        debug!(alias, provider = provider.provider_name(), "Structured inference complete");
        Ok(parsed)
    }
}

/// Extract a JSON object from a completion that may wrap it in markdown or
/// surrounding prose.
pub fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return trimmed;
    }

    if let Some(start) = trimmed.find("```json") {
        let body = &trimmed[start + 7..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_ticks = &trimmed[start + 3..];
        if let Some(end) = after_ticks.find("```") {
            let block = &after_ticks[..end];
            return match block.find('\n') {
                Some(newline) => block[newline..].trim(),
                None => block.trim(),
            };
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            return &trimmed[start..=end];
        }
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockModelProvider;

    fn inference(mock: &MockModelProvider, timeout_ms: u64) -> StructuredInference {
        let registry = ModelRegistry::single(Arc::new(mock.clone()));
        StructuredInference::new(Arc::new(registry), Duration::from_millis(timeout_ms))
    }

    #[test]
    fn test_extract_json_variants() {
        assert_eq!(extract_json(r#"{"ok": true}"#), r#"{"ok": true}"#);
        assert_eq!(extract_json("```json\n{\"ok\": true}\n```"), r#"{"ok": true}"#);
        assert_eq!(extract_json("```\n{\"ok\": true}\n```"), r#"{"ok": true}"#);
        let prose = "Here you go:\n{\"ok\": true}\nCheers";
        assert_eq!(extract_json(prose), r#"{"ok": true}"#);
    }

    #[tokio::test]
    async fn test_infer_parses_and_validates() {
        let mock = MockModelProvider::new("m").with_response(
            "```json\n{\"operation\": \"extract\", \"confidence\": 0.9}\n```",
        );
        let shape = ExpectedShape::with_keys(["operation", "confidence"]);
        let value = inference(&mock, 1000)
            .infer("default", &[ChatMessage::user("q")], &shape)
            .await
            .unwrap();
        assert_eq!(value["operation"], "extract");
    }

    #[tokio::test]
    async fn test_infer_missing_key_is_malformed() {
        let mock = MockModelProvider::new("m").with_response(r#"{"operation": "extract"}"#);
        let shape = ExpectedShape::with_keys(["operation", "confidence"]);
        let err = inference(&mock, 1000)
            .infer("default", &[ChatMessage::user("q")], &shape)
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::MalformedOutput(_)));
        assert!(!err.is_service_failure());
    }

    #[tokio::test]
    async fn test_infer_garbage_is_malformed() {
        let mock = MockModelProvider::new("m").with_response("I cannot help with that");
        let err = inference(&mock, 1000)
            .infer("default", &[ChatMessage::user("q")], &ExpectedShape::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::MalformedOutput(_)));
    }

    #[tokio::test]
    async fn test_infer_times_out() {
        let mock = MockModelProvider::new("m").with_response("{}");
        mock.set_latency(200);
        let err = inference(&mock, 20)
            .infer("default", &[ChatMessage::user("q")], &ExpectedShape::default())
            .await
            .unwrap_err();
        assert_eq!(err, ModelError::Timeout { after_ms: 20 });
    }

    #[tokio::test]
    async fn test_unknown_alias() {
        let mock = MockModelProvider::new("m");
        let err = inference(&mock, 100)
            .infer("extractor", &[], &ExpectedShape::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Config(_)));
    }
}
