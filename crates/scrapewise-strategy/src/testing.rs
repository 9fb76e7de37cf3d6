//! Scripted strategies for exercising selection and fallback without real
//! content.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use scrapewise_core::{ExtractedRecord, ExtractionConfig, StrategyKind};

use crate::error::StrategyError;
use crate::profile::ContentProfile;
use crate::score::StrategyOutput;
use crate::strategies::Strategy;

/// Strategy returning a fixed result for every call.
#[derive(Clone)]
pub struct ScriptedStrategy {
    kind: StrategyKind,
    result: Result<StrategyOutput, StrategyError>,
    delay: Option<Duration>,
    applicable: bool,
    predicted: f32,
    calls: Arc<AtomicUsize>,
}

impl ScriptedStrategy {
    /// Succeeds with one record per plan field at confidence 1.0 until
    /// configured otherwise.
    pub fn new(kind: StrategyKind) -> Self {
        Self {
            kind,
            result: Ok(StrategyOutput::new(Vec::new(), 1.0)),
            delay: None,
            applicable: true,
            predicted: 0.5,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        let records = match &self.result {
            Ok(output) => output.records.clone(),
            Err(_) => Vec::new(),
        };
        self.result = Ok(StrategyOutput::new(records, confidence));
        self
    }

    pub fn with_records(mut self, records: Vec<ExtractedRecord>) -> Self {
        let confidence = self.result.as_ref().map(|o| o.confidence).unwrap_or(1.0);
        self.result = Ok(StrategyOutput::new(records, confidence));
        self
    }

    pub fn with_error(mut self, error: StrategyError) -> Self {
        self.result = Err(error);
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay = Some(Duration::from_millis(delay_ms));
        self
    }

    pub fn with_applicable(mut self, applicable: bool) -> Self {
        self.applicable = applicable;
        self
    }

    pub fn with_predicted(mut self, predicted: f32) -> Self {
        self.predicted = predicted;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Strategy for ScriptedStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    fn applicable(&self, _profile: &ContentProfile) -> bool {
        self.applicable
    }

    fn predict(&self, _profile: &ContentProfile) -> f32 {
        self.predicted
    }

    async fn extract(
        &self,
        _content: &str,
        _profile: &ContentProfile,
        config: &ExtractionConfig,
    ) -> Result<StrategyOutput, StrategyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut output = self.result.clone()?;
        if output.records.is_empty() && output.confidence > 0.0 {
            let record: ExtractedRecord = config
                .fields
                .iter()
                .map(|f| (f.name.clone(), json!(format!("{} from {}", f.name, self.kind))))
                .collect();
            output.records = vec![record];
        }
        Ok(output)
    }
}
