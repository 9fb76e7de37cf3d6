use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use scrapewise_core::OperationType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningConfig {
    /// Operations that have a plan template
    #[serde(default = "default_templates")]
    pub templates: Vec<OperationType>,

    /// Extra fallback hints per field name, tried after the built-in ones
    #[serde(default)]
    pub field_aliases: BTreeMap<String, Vec<String>>,
}

fn default_templates() -> Vec<OperationType> {
    OperationType::ALL.to_vec()
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            templates: default_templates(),
            field_aliases: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_enable_every_operation() {
        let config = PlanningConfig::default();
        assert_eq!(config.templates.len(), 4);
        assert!(config.field_aliases.is_empty());
    }

    #[test]
    fn test_yaml() {
        let yaml = r#"
templates: [extract, filter]
field_aliases:
  price: [cost_usd]
"#;
        let config: PlanningConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.templates,
            vec![OperationType::Extract, OperationType::Filter]
        );
        assert_eq!(config.field_aliases["price"], vec!["cost_usd"]);
    }
}
