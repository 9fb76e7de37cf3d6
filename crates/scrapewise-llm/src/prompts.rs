use minijinja::{AutoEscape, Environment};
use serde::Serialize;

use scrapewise_core::{Result, ScrapeError};

pub const INTENT_ESCALATION: &str = "intent_escalation";
pub const MODEL_EXTRACTION: &str = "model_extraction";

/// Template for one-shot intent classification
pub const INTENT_ESCALATION_TEMPLATE: &str = r#"You classify data extraction requests into an operation.

Operations:
{%- for op in operations %}
{{ loop.index }}. {{ op }}
{%- endfor %}
{%- if summary %}

Conversation so far:
{{ summary }}
{%- endif %}

Request: {{ query }}
{%- if guess %}
Keyword guess: {{ guess }}
{%- endif %}

Respond in the following JSON format:
{
  "operation": "extract",
  "confidence": 0.9,
  "targets": ["field names the user wants"]
}"#;

/// Template for model-assisted record extraction
pub const MODEL_EXTRACTION_TEMPLATE: &str = r#"Extract structured records from the content below.

Operation: {{ operation }}
Fields:
{%- for field in fields %}
- {{ field.name }} ({{ field.output_type }}){% if field.hints | length > 1 %}, also known as: {{ field.hints | join(", ") }}{% endif %}
{%- endfor %}
{%- if limit %}
Return at most {{ limit }} records.
{%- endif %}

Content:
{{ content }}

Respond with ONLY JSON in the following format:
{
  "records": [{"field_name": "value"}]
}"#;

/// MiniJinja environment preloaded with the pipeline's prompt templates.
pub struct PromptRenderer {
    env: Environment<'static>,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        // Built-in templates are static and known to parse.
        let _ = env.add_template(INTENT_ESCALATION, INTENT_ESCALATION_TEMPLATE);
        let _ = env.add_template(MODEL_EXTRACTION, MODEL_EXTRACTION_TEMPLATE);
        Self { env }
    }

    /// Replace or add a named template.
    pub fn with_template(mut self, name: &'static str, source: &'static str) -> Result<Self> {
        self.env
            .add_template(name, source)
            .map_err(|e| ScrapeError::Config(format!("invalid template {}: {}", name, e)))?;
        Ok(self)
    }

    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String> {
        let tmpl = self
            .env
            .get_template(name)
            .map_err(|e| ScrapeError::Config(format!("template {}: {}", name, e)))?;
        tmpl.render(ctx)
            .map_err(|e| ScrapeError::Config(format!("template rendering error: {}", e)))
    }
}
