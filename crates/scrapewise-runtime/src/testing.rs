//! Canned collaborators for tests and demos

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use scrapewise_core::{ContentFetcher, FetchError, FetchHints, FetchedContent};
use scrapewise_strategy::compute_signature;

/// Serves pages from memory, keyed by url.
#[derive(Clone, Default)]
pub struct StaticFetcher {
    pages: Arc<RwLock<HashMap<String, String>>>,
    errors: Arc<RwLock<HashMap<String, FetchError>>>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, content: impl Into<String>) -> Self {
        self.pages.write().insert(url.into(), content.into());
        self
    }

    pub fn with_error(self, url: impl Into<String>, error: FetchError) -> Self {
        self.errors.write().insert(url.into(), error);
        self
    }

    /// Wait before answering, to exercise fetch timeouts.
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay = Some(Duration::from_millis(delay_ms));
        self
    }

    pub fn set_page(&self, url: impl Into<String>, content: impl Into<String>) {
        self.pages.write().insert(url.into(), content.into());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentFetcher for StaticFetcher {
    async fn fetch(&self, url: &str, _hints: &FetchHints) -> Result<FetchedContent, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.errors.read().get(url) {
            return Err(error.clone());
        }
        let content = self
            .pages
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::HttpStatus {
                url: url.to_string(),
                status: 404,
            })?;
        let signature = compute_signature(&content);
        Ok(FetchedContent::new(url, content, signature))
    }
}
