use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use scrapewise_core::{ContentSignature, ExtractionConfig, PerformanceRecord, PlanStore, Result};

const CONFIG_DIR: &str = "configs";
const PERFORMANCE_FILE: &str = "performance.json";

/// JSON files under a base directory:
///
/// ```text
/// <base>/configs/<signature>/<request key>.json
/// <base>/performance.json
/// ```
pub struct FileStore {
    base_path: PathBuf,
    // Serializes read-modify-write of the performance file.
    performance_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            performance_lock: Mutex::new(()),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn config_path(&self, signature: &ContentSignature, request_key: &str) -> PathBuf {
        self.base_path
            .join(CONFIG_DIR)
            .join(file_safe(signature.as_str()))
            .join(format!("{}.json", file_safe(request_key)))
    }

    fn performance_path(&self) -> PathBuf {
        self.base_path.join(PERFORMANCE_FILE)
    }

    async fn read_performance(&self) -> Result<Vec<PerformanceRecord>> {
        let path = self.performance_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let json = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("base_path", &self.base_path)
            .finish()
    }
}

/// Write through a temporary sibling so readers never see a partial file.
async fn write_atomic(path: &Path, contents: String) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[async_trait]
impl PlanStore for FileStore {
    async fn get_config(
        &self,
        signature: &ContentSignature,
        request_key: &str,
    ) -> Result<Option<ExtractionConfig>> {
        let path = self.config_path(signature, request_key);
        if !path.exists() {
            return Ok(None);
        }
        let json = tokio::fs::read_to_string(path).await?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    async fn put_config(
        &self,
        signature: &ContentSignature,
        request_key: &str,
        config: &ExtractionConfig,
    ) -> Result<()> {
        let path = self.config_path(signature, request_key);
        write_atomic(&path, serde_json::to_string_pretty(config)?).await?;
        debug!(path = %path.display(), "Cached extraction config");
        Ok(())
    }

    async fn load_performance(&self) -> Result<Vec<PerformanceRecord>> {
        let _guard = self.performance_lock.lock().await;
        self.read_performance().await
    }

    async fn save_performance(&self, records: &[PerformanceRecord]) -> Result<()> {
        let _guard = self.performance_lock.lock().await;
        let mut stored = self.read_performance().await?;
        for record in records {
            match stored
                .iter_mut()
                .find(|r| r.signature == record.signature && r.strategy == record.strategy)
            {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        stored.sort_by(|a, b| {
            a.signature
                .cmp(&b.signature)
                .then(a.strategy.cmp(&b.strategy))
        });
        write_atomic(&self.performance_path(), serde_json::to_string_pretty(&stored)?).await
    }
}
