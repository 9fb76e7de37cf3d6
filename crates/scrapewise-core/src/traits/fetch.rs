//! Content-fetching collaborator trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ContentSignature;

/// Hints passed through to the fetcher
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchHints {
    #[serde(default)]
    pub render_javascript: bool,
    /// Element or key the fetcher should wait for before returning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl FetchHints {
    pub fn with_wait_for(mut self, wait_for: impl Into<String>) -> Self {
        self.wait_for = Some(wait_for.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Page content returned by the fetcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedContent {
    pub url: String,
    pub content: String,
    pub signature: ContentSignature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl FetchedContent {
    pub fn new(
        url: impl Into<String>,
        content: impl Into<String>,
        signature: ContentSignature,
    ) -> Self {
        Self {
            url: url.into(),
            content: content.into(),
            signature,
            content_type: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    #[error("blocked fetching {url}: {reason}")]
    Blocked { url: String, reason: String },

    #[error("HTTP {status} fetching: {url}")]
    HttpStatus { url: String, status: u16 },
}

/// Retrieves rendered page content for a URL.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str, hints: &FetchHints) -> Result<FetchedContent, FetchError>;
}
