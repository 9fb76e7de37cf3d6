use std::collections::HashMap;
use std::sync::Arc;

use scrapewise_core::{ModelError, ModelProvider};

const DEFAULT_ALIAS: &str = "default";
const ROUTER_ALIAS: &str = "router";

/// Alias-keyed set of model providers.
///
/// `router` serves intent escalation, `default` serves the model-assisted
/// extraction strategy. The router falls back to the default when no
/// provider is registered under its alias.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    providers: HashMap<String, Arc<dyn ModelProvider>>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut aliases: Vec<_> = self.providers.keys().collect();
        aliases.sort();
        f.debug_struct("ModelRegistry")
            .field("providers", &aliases)
            .finish()
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding a single provider under the default alias.
    pub fn single(provider: Arc<dyn ModelProvider>) -> Self {
        let mut registry = Self::new();
        registry.register(DEFAULT_ALIAS, provider);
        registry
    }

    pub fn register(&mut self, alias: impl Into<String>, provider: Arc<dyn ModelProvider>) {
        self.providers.insert(alias.into(), provider);
    }

    fn get(&self, alias: &str) -> Result<Arc<dyn ModelProvider>, ModelError> {
        self.providers
            .get(alias)
            .cloned()
            .ok_or_else(|| ModelError::Config(format!("model alias not found: {}", alias)))
    }

    /// Resolve an alias, treating `router` as a soft alias for the default.
    pub fn resolve(&self, alias: &str) -> Result<Arc<dyn ModelProvider>, ModelError> {
        if alias == ROUTER_ALIAS && !self.providers.contains_key(ROUTER_ALIAS) {
            return self.get(DEFAULT_ALIAS);
        }
        self.get(alias)
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
