use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use scrapewise_core::{ChatMessage, ExtractedRecord, ExtractionConfig, ModelError, StrategyKind};
use scrapewise_llm::{ExpectedShape, PromptRenderer, StructuredInference, prompts::MODEL_EXTRACTION};

use super::Strategy;
use super::pattern::visible_text;
use crate::error::StrategyError;
use crate::profile::{ContentFormat, ContentProfile};
use crate::score::StrategyOutput;
use crate::values::coerce_value;

const DEFAULT_MAX_CONTENT_CHARS: usize = 12_000;

/// Last-resort strategy: asks the language model for the records.
///
/// Malformed answers are ordinary attempt failures; the executor moves on.
pub struct ModelAssisted {
    inference: Arc<StructuredInference>,
    prompts: PromptRenderer,
    alias: String,
    max_content_chars: usize,
}

impl ModelAssisted {
    pub fn new(inference: Arc<StructuredInference>, alias: impl Into<String>) -> Self {
        Self {
            inference,
            prompts: PromptRenderer::new(),
            alias: alias.into(),
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }

    pub fn with_max_content_chars(mut self, max: usize) -> Self {
        self.max_content_chars = max;
        self
    }

    fn prompt(
        &self,
        content: &str,
        profile: &ContentProfile,
        config: &ExtractionConfig,
    ) -> Result<String, StrategyError> {
        let text = match profile.format {
            ContentFormat::Html => visible_text(content),
            _ => content.to_string(),
        };
        let text: String = text.chars().take(self.max_content_chars).collect();

        let fields: Vec<Value> = config
            .fields
            .iter()
            .map(|field| {
                json!({
                    "name": field.name,
                    "output_type": field.output_type,
                    "hints": field.hints().collect::<Vec<_>>(),
                })
            })
            .collect();

        self.prompts
            .render(
                MODEL_EXTRACTION,
                json!({
                    "operation": config.operation.as_str(),
                    "fields": fields,
                    "limit": config.limit,
                    "content": text,
                }),
            )
            .map_err(|e| StrategyError::Model(ModelError::Config(e.to_string())))
    }
}

#[async_trait]
impl Strategy for ModelAssisted {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ModelAssisted
    }

    fn predict(&self, _profile: &ContentProfile) -> f32 {
        0.6
    }

    async fn extract(
        &self,
        content: &str,
        profile: &ContentProfile,
        config: &ExtractionConfig,
    ) -> Result<StrategyOutput, StrategyError> {
        let prompt = self.prompt(content, profile, config)?;
        let answer = self
            .inference
            .infer(
                &self.alias,
                &[ChatMessage::user(prompt)],
                &ExpectedShape::with_keys(["records"]),
            )
            .await?;

        let items = answer
            .get("records")
            .and_then(Value::as_array)
            .ok_or_else(|| StrategyError::Malformed("\"records\" is not an array".into()))?;

        let records: Vec<ExtractedRecord> = items
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|object| {
                let record: ExtractedRecord = config
                    .fields
                    .iter()
                    .filter_map(|field| {
                        let value = object.get(&field.name)?;
                        Some((field.name.clone(), coerce_value(field.output_type, value)?))
                    })
                    .collect();
                (!record.is_empty()).then_some(record)
            })
            .collect();

        debug!(returned = items.len(), usable = records.len(), "Model extraction parsed");
        if records.is_empty() {
            return Err(StrategyError::NoMatch);
        }
        Ok(StrategyOutput::scored(records, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use scrapewise_core::{FieldSpec, OperationType, OutputShape, OutputType};
    use scrapewise_llm::{MockModelProvider, ModelRegistry};

    fn setup(mock: &MockModelProvider) -> ModelAssisted {
        let registry = ModelRegistry::single(Arc::new(mock.clone()));
        let inference = StructuredInference::new(Arc::new(registry), Duration::from_secs(2));
        ModelAssisted::new(Arc::new(inference), "default")
    }

    fn config() -> ExtractionConfig {
        ExtractionConfig {
            operation: OperationType::Extract,
            fields: vec![
                FieldSpec::new("title", OutputType::Text),
                FieldSpec::new("price", OutputType::Currency),
            ],
            output: OutputShape::List,
            limit: Some(5),
        }
    }

    #[tokio::test]
    async fn test_parses_records() {
        let mock = MockModelProvider::new("mock").with_response(
            r#"```json
{"records":[{"title":"Lamp","price":"$30"},{"title":"Mug","price":8,"extra":"ignored"}]}
```"#,
        );
        let strategy = setup(&mock);
        let content = "<html><body><p>Lamp $30</p><p>Mug $8</p></body></html>";
        let profile = ContentProfile::analyze(content);
        let output = strategy.extract(content, &profile, &config()).await.unwrap();

        assert_eq!(output.confidence, 1.0);
        assert_eq!(output.records.len(), 2);
        assert!(!output.records[1].contains_key("extra"));

        let prompt = mock.last_call().unwrap().prompt_text();
        assert!(prompt.contains("Lamp $30"));
        assert!(prompt.contains("at most 5 records"));
    }

    #[tokio::test]
    async fn test_malformed_is_attempt_failure() {
        let mock = MockModelProvider::new("mock").with_response("I could not find anything.");
        let strategy = setup(&mock);
        let profile = ContentProfile::analyze("plain");
        let err = strategy.extract("plain", &profile, &config()).await.unwrap_err();
        assert!(matches!(err, StrategyError::Model(ModelError::MalformedOutput(_))));
        assert!(!err.is_service_failure());
    }

    #[tokio::test]
    async fn test_records_not_array() {
        let mock = MockModelProvider::new("mock").with_response(r#"{"records":"none"}"#);
        let strategy = setup(&mock);
        let profile = ContentProfile::analyze("plain");
        let err = strategy.extract("plain", &profile, &config()).await.unwrap_err();
        assert!(matches!(err, StrategyError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_unavailable_is_service_failure() {
        let mock = MockModelProvider::new("mock");
        mock.set_error(ModelError::Unavailable("down".into()));
        let strategy = setup(&mock);
        let profile = ContentProfile::analyze("plain");
        let err = strategy.extract("plain", &profile, &config()).await.unwrap_err();
        assert!(err.is_service_failure());
    }

    #[test]
    fn test_content_truncated() {
        let mock = MockModelProvider::new("mock");
        let strategy = setup(&mock).with_max_content_chars(10);
        let profile = ContentProfile::analyze("abcdefghijklmnopqrstuvwxyz");
        let prompt = strategy
            .prompt("abcdefghijklmnopqrstuvwxyz", &profile, &config())
            .unwrap();
        assert!(prompt.contains("abcdefghij"));
        assert!(!prompt.contains("abcdefghijk"));
    }
}
