use serde::{Deserialize, Serialize};

use scrapewise_core::{FieldSpec, OperationType, OutputShape, OutputType};

use crate::config::PlanningConfig;

/// Result shape an operation's plans take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    List,
    Comparison,
    Aggregate,
}

/// Plan template for one operation type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTemplate {
    pub operation: OperationType,
    pub shape: ShapeKind,
}

impl ConfigTemplate {
    pub fn new(operation: OperationType, shape: ShapeKind) -> Self {
        Self { operation, shape }
    }

    pub fn builtin(operation: OperationType) -> Self {
        let shape = match operation {
            OperationType::Extract | OperationType::Filter => ShapeKind::List,
            OperationType::Compare => ShapeKind::Comparison,
            OperationType::Analyze => ShapeKind::Aggregate,
        };
        Self::new(operation, shape)
    }

    /// Concrete output shape for a set of fields.
    pub fn output_for(&self, fields: &[FieldSpec]) -> OutputShape {
        match self.shape {
            ShapeKind::List => OutputShape::List,
            ShapeKind::Comparison => OutputShape::Comparison {
                key: comparison_key(fields),
            },
            ShapeKind::Aggregate => {
                let mut measures = vec!["count".to_string()];
                for field in fields.iter().filter(|f| is_numeric(f.output_type)) {
                    for stat in ["mean", "min", "max"] {
                        measures.push(format!("{}:{}", stat, field.name));
                    }
                }
                OutputShape::Aggregate { measures }
            }
        }
    }
}

/// Items are compared by their identifying field when one was requested,
/// otherwise by the first textual field.
fn comparison_key(fields: &[FieldSpec]) -> String {
    ["title", "name"]
        .iter()
        .find(|key| fields.iter().any(|f| f.name == **key))
        .map(|key| key.to_string())
        .or_else(|| {
            fields
                .iter()
                .find(|f| !is_numeric(f.output_type))
                .or_else(|| fields.first())
                .map(|f| f.name.clone())
        })
        .unwrap_or_else(|| "title".to_string())
}

fn is_numeric(output_type: OutputType) -> bool {
    matches!(
        output_type,
        OutputType::Number | OutputType::Currency | OutputType::Rating
    )
}

/// Known plan templates, keyed by operation
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: Vec<ConfigTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in templates for every operation type.
    pub fn builtin() -> Self {
        Self {
            templates: OperationType::ALL
                .iter()
                .map(|op| ConfigTemplate::builtin(*op))
                .collect(),
        }
    }

    pub fn from_config(config: &PlanningConfig) -> Self {
        let mut registry = Self::new();
        for op in &config.templates {
            registry.register(ConfigTemplate::builtin(*op));
        }
        registry
    }

    /// Add or replace the template for its operation.
    pub fn register(&mut self, template: ConfigTemplate) {
        match self
            .templates
            .iter_mut()
            .find(|t| t.operation == template.operation)
        {
            Some(existing) => *existing = template,
            None => self.templates.push(template),
        }
    }

    pub fn remove(&mut self, operation: OperationType) -> Option<ConfigTemplate> {
        let idx = self.templates.iter().position(|t| t.operation == operation)?;
        Some(self.templates.remove(idx))
    }

    pub fn get(&self, operation: OperationType) -> Option<&ConfigTemplate> {
        self.templates.iter().find(|t| t.operation == operation)
    }

    pub fn has(&self, operation: OperationType) -> bool {
        self.get(operation).is_some()
    }

    pub fn operations(&self) -> Vec<OperationType> {
        self.templates.iter().map(|t| t.operation).collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
