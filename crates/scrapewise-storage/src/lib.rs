//! Storage backends for scrapewise
//!
//! Both backends implement [`PlanStore`]: cached extraction plans keyed by
//! (content signature, request key), and strategy performance
//! aggregates keyed by (content signature, strategy).

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use scrapewise_core::{PlanStore, Result, ScrapeError};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StorageConfig {
    #[serde(rename = "none")]
    None,
    #[default]
    #[serde(rename = "memory")]
    Memory,
    #[serde(rename = "file")]
    File { path: String },
}

pub fn create_store(config: &StorageConfig) -> Option<Arc<dyn PlanStore>> {
    match config {
        StorageConfig::None => None,
        StorageConfig::Memory => Some(Arc::new(MemoryStore::new())),
        StorageConfig::File { path } => Some(Arc::new(FileStore::new(path))),
    }
}
