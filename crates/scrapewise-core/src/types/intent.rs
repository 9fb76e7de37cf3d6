use serde::{Deserialize, Serialize};

use super::entity::EntityKind;

/// Operation a query requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Extract,
    Filter,
    Compare,
    Analyze,
}

impl OperationType {
    pub const ALL: [OperationType; 4] = [Self::Extract, Self::Filter, Self::Compare, Self::Analyze];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Filter => "filter",
            Self::Compare => "compare",
            Self::Analyze => "analyze",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "extract" => Some(Self::Extract),
            "filter" => Some(Self::Filter),
            "compare" => Some(Self::Compare),
            "analyze" | "analyse" => Some(Self::Analyze),
            _ => None,
        }
    }

    /// Slots that must be filled before a plan can be built.
    pub fn required_slots(&self) -> &'static [Slot] {
        match self {
            Self::Extract | Self::Compare | Self::Analyze => &[Slot::TargetField],
            Self::Filter => &[Slot::TargetField, Slot::FilterCondition],
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an intent's classification came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    Pattern,
    Model,
    /// Pattern guess kept after the model escalation failed
    PatternFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub operation: OperationType,
    #[serde(default)]
    pub targets: Vec<String>,
    pub confidence: f32,
    pub source: IntentSource,
}

impl Intent {
    pub fn new(operation: OperationType, confidence: f32, source: IntentSource) -> Self {
        Self {
            operation,
            targets: Vec::new(),
            confidence: confidence.clamp(0.0, 1.0),
            source,
        }
    }

    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }
}

/// A piece of information a plan needs that the query may not supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "slot", content = "kind", rename_all = "snake_case")]
pub enum Slot {
    Operation,
    TargetField,
    FilterCondition,
    Constraint(EntityKind),
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Operation => f.write_str("operation"),
            Self::TargetField => f.write_str("target field"),
            Self::FilterCondition => f.write_str("filter condition"),
            Self::Constraint(kind) => write!(f, "{} constraint", kind),
        }
    }
}
