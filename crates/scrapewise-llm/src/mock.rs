use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use scrapewise_core::{ChatMessage, ModelError, ModelProvider, ModelResponse};

/// Mock model provider for testing
#[derive(Clone)]
pub struct MockModelProvider {
    name: Arc<str>,
    inner: Arc<RwLock<MockModelProviderInner>>,
}

struct MockModelProviderInner {
    responses: Vec<String>,
    response_index: usize,
    cycle_responses: bool,
    call_history: Vec<MockCall>,
    error: Option<ModelError>,
    latency_ms: u64,
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub messages: Vec<ChatMessage>,
    pub timestamp: std::time::Instant,
}

impl MockCall {
    /// Concatenated content of every message in the call.
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl MockModelProvider {
    pub fn new(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            inner: Arc::new(RwLock::new(MockModelProviderInner {
                responses: Vec::new(),
                response_index: 0,
                cycle_responses: false,
                call_history: Vec::new(),
                error: None,
                latency_ms: 0,
            })),
        }
    }

    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.set_response(response);
        self
    }

    pub fn set_response(&self, response: impl Into<String>) {
        let mut inner = self.inner.write();
        inner.responses = vec![response.into()];
        inner.response_index = 0;
    }

    pub fn set_responses(&self, responses: Vec<String>, cycle: bool) {
        let mut inner = self.inner.write();
        inner.responses = responses;
        inner.response_index = 0;
        inner.cycle_responses = cycle;
    }

    pub fn set_error(&self, error: ModelError) {
        self.inner.write().error = Some(error);
    }

    pub fn clear_error(&self) {
        self.inner.write().error = None;
    }

    pub fn set_latency(&self, latency_ms: u64) {
        self.inner.write().latency_ms = latency_ms;
    }

    pub fn call_count(&self) -> usize {
        self.inner.read().call_history.len()
    }

    pub fn call_history(&self) -> Vec<MockCall> {
        self.inner.read().call_history.clone()
    }

    pub fn last_call(&self) -> Option<MockCall> {
        self.inner.read().call_history.last().cloned()
    }

    pub fn clear_history(&self) {
        self.inner.write().call_history.clear();
    }

    fn next_response(&self) -> String {
        let mut inner = self.inner.write();
        if inner.responses.is_empty() {
            return "{}".to_string();
        }

        let content = inner.responses[inner.response_index].clone();
        if inner.cycle_responses {
            inner.response_index = (inner.response_index + 1) % inner.responses.len();
        } else if inner.response_index < inner.responses.len() - 1 {
            inner.response_index += 1;
        }
        content
    }

    fn record_call(&self, messages: &[ChatMessage]) {
        self.inner.write().call_history.push(MockCall {
            messages: messages.to_vec(),
            timestamp: std::time::Instant::now(),
        });
    }
}

impl Default for MockModelProvider {
    fn default() -> Self {
        Self::new("mock")
    }
}

#[async_trait]
impl ModelProvider for MockModelProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ModelResponse, ModelError> {
        self.record_call(messages);

        let latency_ms = self.inner.read().latency_ms;
        if latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(latency_ms)).await;
        }

        if let Some(error) = self.inner.read().error.clone() {
            return Err(error);
        }

        let mut response = ModelResponse::new(self.next_response());
        response.model = Some("mock-model".to_string());
        Ok(response)
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}
