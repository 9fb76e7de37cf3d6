//! Configuration for intent classification

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Pattern confidence below this escalates to the model collaborator
    #[serde(default = "default_escalation_threshold")]
    pub escalation_threshold: f32,

    #[serde(default = "default_model_alias")]
    pub model_alias: String,

    /// Set to false to never escalate, even when a model is registered
    #[serde(default = "default_true")]
    pub escalate: bool,
}

fn default_escalation_threshold() -> f32 {
    0.6
}

fn default_model_alias() -> String {
    "router".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            escalation_threshold: default_escalation_threshold(),
            model_alias: default_model_alias(),
            escalate: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClassifierConfig::default();
        assert_eq!(config.escalation_threshold, 0.6);
        assert_eq!(config.model_alias, "router");
        assert!(config.escalate);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "escalation_threshold: 0.5\n";
        let config: ClassifierConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.escalation_threshold, 0.5);
        assert_eq!(config.model_alias, "router");
    }
}
