//! Extraction techniques

mod model;
mod path;
mod pattern;
mod structural;

pub use model::ModelAssisted;
pub use path::PathQuery;
pub use pattern::{PatternMatch, visible_text};
pub use structural::StructuralSelector;

use std::sync::Arc;

use async_trait::async_trait;

use scrapewise_core::{ExtractionConfig, StrategyKind};

use crate::error::StrategyError;
use crate::profile::ContentProfile;
use crate::score::StrategyOutput;

/// One way of pulling the plan's fields out of fetched content.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Whether the technique can work on this kind of content at all.
    fn applicable(&self, _profile: &ContentProfile) -> bool {
        true
    }

    /// Confidence expected before any history exists.
    fn predict(&self, profile: &ContentProfile) -> f32;

    async fn extract(
        &self,
        content: &str,
        profile: &ContentProfile,
        config: &ExtractionConfig,
    ) -> Result<StrategyOutput, StrategyError>;
}

/// Registered strategies, at most one per kind
#[derive(Clone, Default)]
pub struct StrategySet {
    strategies: Vec<Arc<dyn Strategy>>,
}

impl StrategySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every technique that needs no language model.
    pub fn builtin() -> Self {
        let mut set = Self::new();
        set.register(Arc::new(StructuralSelector::new()));
        set.register(Arc::new(PathQuery::new()));
        set.register(Arc::new(PatternMatch::new()));
        set
    }

    /// Add a strategy, replacing any registered for the same kind.
    pub fn register(&mut self, strategy: Arc<dyn Strategy>) {
        let kind = strategy.kind();
        match self.strategies.iter_mut().find(|s| s.kind() == kind) {
            Some(existing) => *existing = strategy,
            None => self.strategies.push(strategy),
        }
    }

    pub fn with(mut self, strategy: Arc<dyn Strategy>) -> Self {
        self.register(strategy);
        self
    }

    pub fn get(&self, kind: StrategyKind) -> Option<Arc<dyn Strategy>> {
        self.strategies.iter().find(|s| s.kind() == kind).cloned()
    }

    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    pub fn has(&self, kind: StrategyKind) -> bool {
        self.strategies.iter().any(|s| s.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl std::fmt::Debug for StrategySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategySet")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Lowercase alphanumerics only, so "sale price", "sale_price" and
/// "salePrice" compare equal.
pub(crate) fn key_form(hint: &str) -> String {
    hint.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
