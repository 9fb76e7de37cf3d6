use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use scrapewise_conversation::ConversationManager;
use scrapewise_core::{ContentFetcher, ModelProvider, PlanStore, Result, ScrapeError, StrategyKind};
use scrapewise_disambiguation::DisambiguationManager;
use scrapewise_llm::{ModelRegistry, StructuredInference};
use scrapewise_planning::ExtractionConfigBuilder;
use scrapewise_storage::create_store;
use scrapewise_strategy::{
    FallbackExecutor, ModelAssisted, PerformanceTracker, Strategy, StrategySelector, StrategySet,
};
use scrapewise_understanding::{EntityExtractor, IntentClassifier};

use crate::config::PipelineConfig;
use crate::pipeline::Pipeline;

/// Assembles a [`Pipeline`] from configuration and collaborators.
///
/// ```ignore
/// let pipeline = PipelineBuilder::from_yaml_file("pipeline.yaml")?
///     .fetcher(Arc::new(my_fetcher))
///     .model("default", Arc::new(my_model))
///     .build()?;
/// ```
pub struct PipelineBuilder {
    config: PipelineConfig,
    fetcher: Option<Arc<dyn ContentFetcher>>,
    models: ModelRegistry,
    store: Option<Arc<dyn PlanStore>>,
    strategies: Vec<Arc<dyn Strategy>>,
    tracker: Option<Arc<PerformanceTracker>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::from_config(PipelineConfig::default())
    }

    pub fn from_config(config: PipelineConfig) -> Self {
        Self {
            config,
            fetcher: None,
            models: ModelRegistry::new(),
            store: None,
            strategies: Vec::new(),
            tracker: None,
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(Self::from_config(PipelineConfig::from_yaml_str(yaml)?))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_config(PipelineConfig::from_file(path)?))
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn ContentFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Register a model provider under `alias` (`default`, `router`, or any
    /// alias named in the configuration).
    pub fn model(mut self, alias: impl Into<String>, provider: Arc<dyn ModelProvider>) -> Self {
        self.models.register(alias, provider);
        self
    }

    /// Overrides the store named by `storage` in the configuration.
    pub fn store(mut self, store: Arc<dyn PlanStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Add or replace a strategy. Replaces the built-in of the same kind.
    pub fn strategy(mut self, strategy: Arc<dyn Strategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Share a tracker between pipelines.
    pub fn tracker(mut self, tracker: Arc<PerformanceTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let config = self.config;
        config.validate()?;

        let fetcher = self
            .fetcher
            .ok_or_else(|| ScrapeError::Config("a content fetcher is required".into()))?;

        let mut classifier = IntentClassifier::new(config.classifier.clone());
        let mut strategies = StrategySet::builtin();

        if !self.models.is_empty() {
            let inference = Arc::new(StructuredInference::new(
                Arc::new(self.models),
                config.model_timeout(),
            ));
            classifier = classifier.with_inference(Arc::clone(&inference));
            if inference.is_available(&config.extraction_model_alias) {
                strategies.register(Arc::new(ModelAssisted::new(
                    Arc::clone(&inference),
                    config.extraction_model_alias.clone(),
                )));
            } else {
                info!(
                    alias = %config.extraction_model_alias,
                    "No model for extraction alias, model-assisted strategy disabled"
                );
            }
        } else {
            debug!("No model providers configured");
        }

        for strategy in self.strategies {
            strategies.register(strategy);
        }
        if strategies.is_empty() {
            return Err(ScrapeError::Config("no extraction strategies registered".into()));
        }

        let store = self.store.or_else(|| create_store(&config.storage));
        let tracker = self.tracker.unwrap_or_default();

        info!(
            strategies = ?strategies.kinds(),
            model_assisted = strategies.has(StrategyKind::ModelAssisted),
            store = store.is_some(),
            "Pipeline built"
        );

        Ok(Pipeline {
            entities: EntityExtractor::new(),
            classifier,
            disambiguation: DisambiguationManager::new(config.disambiguation.clone()),
            conversations: Arc::new(ConversationManager::new(config.conversation.clone())),
            planner: ExtractionConfigBuilder::new(&config.planning),
            strategies,
            selector: StrategySelector::new(config.strategy.clone()),
            executor: FallbackExecutor::new(config.strategy.clone()),
            tracker,
            fetcher,
            store,
            config,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
