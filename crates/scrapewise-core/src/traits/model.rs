//! Language-model collaborator trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::ChatMessage;

/// Raw completion returned by a model provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ModelResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: None,
        }
    }
}

/// Core model provider trait.
///
/// Implementations wrap a concrete LLM endpoint. Structured parsing of the
/// completion lives in `scrapewise-llm`, not here.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ModelResponse, ModelError>;

    fn provider_name(&self) -> &str;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Model call timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    #[error("Model configuration error: {0}")]
    Config(String),
}

impl ModelError {
    /// Malformed output is a strategy-level failure, everything else means
    /// the collaborator itself is down or misconfigured.
    pub fn is_service_failure(&self) -> bool {
        !matches!(self, Self::MalformedOutput(_))
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::MalformedOutput(err.to_string())
    }
}
