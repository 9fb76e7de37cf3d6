//! Persistence collaborator trait

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ContentSignature, ExtractionConfig, PerformanceRecord};

/// Durable home for cached plans and strategy performance aggregates.
///
/// Built-in backends: `MemoryStore` and `FileStore` in `scrapewise-storage`.
/// The pipeline keeps working when every call here fails; ranking then falls
/// back to the default strategy order.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Load a cached plan for pages of `signature` built from the request
    /// identified by `request_key`. Returns `None` on a cache miss.
    async fn get_config(
        &self,
        signature: &ContentSignature,
        request_key: &str,
    ) -> Result<Option<ExtractionConfig>>;

    async fn put_config(
        &self,
        signature: &ContentSignature,
        request_key: &str,
        config: &ExtractionConfig,
    ) -> Result<()>;

    async fn load_performance(&self) -> Result<Vec<PerformanceRecord>>;

    /// Upsert aggregates, keyed by (signature, strategy).
    async fn save_performance(&self, records: &[PerformanceRecord]) -> Result<()>;
}
