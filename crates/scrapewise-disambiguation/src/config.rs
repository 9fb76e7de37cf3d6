//! Configuration types for ambiguity detection and clarification

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisambiguationConfig {
    /// Slot and conflict checks. The intent threshold applies regardless.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Intent confidence below this leaves the operation unresolved
    #[serde(default = "default_threshold")]
    pub intent_threshold: f32,

    /// Entities below this do not fill a slot
    #[serde(default = "default_threshold")]
    pub slot_threshold: f32,

    /// Contradicting entities whose confidences differ by no more than this
    /// are treated as a conflict
    #[serde(default = "default_conflict_margin")]
    pub conflict_margin: f32,

    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,

    /// Offered when the target field is missing and the query names none
    #[serde(default = "default_suggested_fields")]
    pub suggested_fields: Vec<String>,

    /// Question templates keyed by slot name (`operation`, `target_field`,
    /// `filter_condition`, `constraint`). Rendered with `query` and `slot`.
    #[serde(default)]
    pub questions: HashMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

fn default_threshold() -> f32 {
    0.7
}

fn default_conflict_margin() -> f32 {
    0.15
}

fn default_max_suggestions() -> usize {
    3
}

fn default_suggested_fields() -> Vec<String> {
    ["title", "price", "name", "rating", "url"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for DisambiguationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            intent_threshold: default_threshold(),
            slot_threshold: default_threshold(),
            conflict_margin: default_conflict_margin(),
            max_suggestions: default_max_suggestions(),
            suggested_fields: default_suggested_fields(),
            questions: HashMap::new(),
        }
    }
}

impl DisambiguationConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
