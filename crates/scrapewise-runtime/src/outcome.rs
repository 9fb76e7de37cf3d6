use serde::{Deserialize, Serialize};

use scrapewise_core::{
    ContentSignature, ExtractedRecord, ExtractionConfig, FailureKind, FetchHints, Slot,
    StrategyKind,
};
use scrapewise_disambiguation::Suggestion;

use crate::shape::ShapedResult;

/// What the caller sends: query text, session id and target url
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub query: String,
    pub session_id: String,
    pub url: String,
    #[serde(default)]
    pub hints: FetchHints,
}

impl ExtractionRequest {
    pub fn new(
        query: impl Into<String>,
        session_id: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            session_id: session_id.into(),
            url: url.into(),
            hints: FetchHints::default(),
        }
    }

    pub fn with_hints(mut self, hints: FetchHints) -> Self {
        self.hints = hints;
        self
    }
}

/// A completed extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub records: Vec<ExtractedRecord>,
    pub result: ShapedResult,
    pub confidence: f32,
    pub strategy: StrategyKind,
    /// Best partial result; no strategy reached the acceptance threshold
    pub below_threshold: bool,
    pub attempts: usize,
    pub signature: ContentSignature,
    pub config: ExtractionConfig,
    /// Plan cache key for this request under `signature`
    pub request_key: String,
    /// The plan came from the cache instead of being built
    #[serde(default)]
    pub cached_config: bool,
}

impl ExtractionReport {
    /// `AllStrategiesBelowThreshold` when the result is a flagged partial.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.below_threshold
            .then_some(FailureKind::AllStrategiesBelowThreshold)
    }
}

/// Everything `Pipeline::handle` can answer with. Never an `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Extracted(ExtractionReport),

    Clarification {
        question: String,
        suggestions: Vec<Suggestion>,
        unresolved: Vec<Slot>,
    },

    Failed {
        kind: FailureKind,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        retry_hint: Option<String>,
    },
}

impl PipelineOutcome {
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            message: message.into(),
            retry_hint: kind.retry_hint().map(str::to_string),
        }
    }

    pub fn is_extracted(&self) -> bool {
        matches!(self, Self::Extracted(_))
    }

    pub fn is_clarification(&self) -> bool {
        matches!(self, Self::Clarification { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Extracted(report) => report.failure_kind(),
            Self::Clarification { .. } => Some(FailureKind::QueryAmbiguous),
            Self::Failed { kind, .. } => Some(*kind),
        }
    }

    pub fn report(&self) -> Option<&ExtractionReport> {
        match self {
            Self::Extracted(report) => Some(report),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_carries_retry_hint() {
        let outcome = PipelineOutcome::failed(FailureKind::ExternalServiceUnavailable, "fetch timed out");
        match &outcome {
            PipelineOutcome::Failed { retry_hint, .. } => assert!(retry_hint.is_some()),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(outcome.failure_kind(), Some(FailureKind::ExternalServiceUnavailable));

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "external_service_unavailable");
    }

    #[test]
    fn test_request_defaults_hints() {
        let request: ExtractionRequest = serde_json::from_str(
            r#"{"query":"get prices","session_id":"s1","url":"https://shop.example"}"#,
        )
        .unwrap();
        assert_eq!(request, ExtractionRequest::new("get prices", "s1", "https://shop.example"));
    }
}
