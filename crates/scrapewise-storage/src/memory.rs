use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use scrapewise_core::{
    ContentSignature, ExtractionConfig, PerformanceRecord, PlanStore, Result, StrategyKind,
};

#[derive(Default)]
struct Inner {
    configs: HashMap<(ContentSignature, String), ExtractionConfig>,
    performance: HashMap<(ContentSignature, StrategyKind), PerformanceRecord>,
}

/// Process-local store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config_count(&self) -> usize {
        self.inner.read().configs.len()
    }

    pub fn performance_count(&self) -> usize {
        self.inner.read().performance.len()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("configs", &self.config_count())
            .field("performance", &self.performance_count())
            .finish()
    }
}

#[async_trait]
impl PlanStore for MemoryStore {
    async fn get_config(
        &self,
        signature: &ContentSignature,
        request_key: &str,
    ) -> Result<Option<ExtractionConfig>> {
        Ok(self
            .inner
            .read()
            .configs
            .get(&(signature.clone(), request_key.to_string()))
            .cloned())
    }

    async fn put_config(
        &self,
        signature: &ContentSignature,
        request_key: &str,
        config: &ExtractionConfig,
    ) -> Result<()> {
        self.inner
            .write()
            .configs
            .insert((signature.clone(), request_key.to_string()), config.clone());
        Ok(())
    }

    async fn load_performance(&self) -> Result<Vec<PerformanceRecord>> {
        let mut records: Vec<PerformanceRecord> =
            self.inner.read().performance.values().cloned().collect();
        records.sort_by(|a, b| {
            a.signature
                .cmp(&b.signature)
                .then(a.strategy.cmp(&b.strategy))
        });
        Ok(records)
    }

    async fn save_performance(&self, records: &[PerformanceRecord]) -> Result<()> {
        let mut inner = self.inner.write();
        for record in records {
            inner
                .performance
                .insert((record.signature.clone(), record.strategy), record.clone());
        }
        Ok(())
    }
}
