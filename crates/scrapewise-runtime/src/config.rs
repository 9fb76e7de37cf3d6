use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use scrapewise_conversation::ConversationConfig;
use scrapewise_core::{Result, ScrapeError};
use scrapewise_disambiguation::DisambiguationConfig;
use scrapewise_planning::PlanningConfig;
use scrapewise_storage::StorageConfig;
use scrapewise_strategy::StrategyConfig;
use scrapewise_understanding::ClassifierConfig;

/// Top-level pipeline configuration. Every field has a default, so an empty
/// document is a valid configuration.
///
/// ```yaml
/// fetch_timeout_ms: 15000
/// model_timeout_ms: 20000
/// extraction_model_alias: default
/// classifier:
///   escalation_threshold: 0.6
/// disambiguation:
///   intent_threshold: 0.7
/// conversation:
///   ttl_minutes: 30
/// strategy:
///   acceptance_threshold: 0.7
/// storage:
///   type: file
///   path: ./.scrapewise
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    #[serde(default = "default_model_timeout_ms")]
    pub model_timeout_ms: u64,

    /// Model alias serving the model-assisted strategy
    #[serde(default = "default_extraction_model_alias")]
    pub extraction_model_alias: String,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub disambiguation: DisambiguationConfig,

    #[serde(default)]
    pub conversation: ConversationConfig,

    #[serde(default)]
    pub strategy: StrategyConfig,

    #[serde(default)]
    pub planning: PlanningConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_fetch_timeout_ms() -> u64 {
    15_000
}

fn default_model_timeout_ms() -> u64 {
    20_000
}

fn default_extraction_model_alias() -> String {
    "default".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: default_fetch_timeout_ms(),
            model_timeout_ms: default_model_timeout_ms(),
            extraction_model_alias: default_extraction_model_alias(),
            classifier: ClassifierConfig::default(),
            disambiguation: DisambiguationConfig::default(),
            conversation: ConversationConfig::default(),
            strategy: StrategyConfig::default(),
            planning: PlanningConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| ScrapeError::Config(format!("invalid pipeline config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            ("classifier.escalation_threshold", self.classifier.escalation_threshold),
            ("disambiguation.intent_threshold", self.disambiguation.intent_threshold),
            ("disambiguation.slot_threshold", self.disambiguation.slot_threshold),
            ("strategy.acceptance_threshold", self.strategy.acceptance_threshold),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScrapeError::Config(format!(
                    "{} must be between 0 and 1, got {}",
                    name, value
                )));
            }
        }
        if self.strategy.default_order.is_empty() {
            return Err(ScrapeError::Config(
                "strategy.default_order must name at least one strategy".into(),
            ));
        }
        if self.fetch_timeout_ms == 0 || self.strategy.attempt_timeout_ms == 0 {
            return Err(ScrapeError::Config("timeouts must be greater than zero".into()));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_millis(self.model_timeout_ms)
    }
}
