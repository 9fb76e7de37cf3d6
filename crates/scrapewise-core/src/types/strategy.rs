use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Extraction technique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    StructuralSelector,
    PathQuery,
    PatternMatch,
    ModelAssisted,
}

impl StrategyKind {
    /// Cheapest first; the model-assisted technique always comes last.
    pub const DEFAULT_ORDER: [StrategyKind; 4] = [
        Self::StructuralSelector,
        Self::PathQuery,
        Self::PatternMatch,
        Self::ModelAssisted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StructuralSelector => "structural_selector",
            Self::PathQuery => "path_query",
            Self::PatternMatch => "pattern_match",
            Self::ModelAssisted => "model_assisted",
        }
    }

    pub fn default_rank(&self) -> usize {
        Self::DEFAULT_ORDER
            .iter()
            .position(|k| k == self)
            .unwrap_or(Self::DEFAULT_ORDER.len())
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural fingerprint of a page, indexing historical performance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentSignature(String);

impl ContentSignature {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Partial,
    Fail,
}

/// One extracted item: field name to value
pub type ExtractedRecord = BTreeMap<String, serde_json::Value>;

/// Record of one strategy run. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAttempt {
    pub id: Uuid,
    pub strategy: StrategyKind,
    pub signature: ContentSignature,
    pub outcome: AttemptOutcome,
    pub confidence: f32,
    pub latency_ms: u64,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StrategyAttempt {
    pub fn new(
        strategy: StrategyKind,
        signature: ContentSignature,
        outcome: AttemptOutcome,
        confidence: f32,
        latency_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy,
            signature,
            outcome,
            confidence,
            latency_ms,
            recorded_at: Utc::now(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Aggregate over attempts sharing a (signature, strategy) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub signature: ContentSignature,
    pub strategy: StrategyKind,
    pub sample_count: u64,
    pub success_count: u64,
    pub partial_count: u64,
    pub mean_latency_ms: f64,
}

impl PerformanceRecord {
    pub fn empty(signature: ContentSignature, strategy: StrategyKind) -> Self {
        Self {
            signature,
            strategy,
            sample_count: 0,
            success_count: 0,
            partial_count: 0,
            mean_latency_ms: 0.0,
        }
    }

    /// Fold one attempt into the running aggregate.
    pub fn apply(&mut self, attempt: &StrategyAttempt) {
        self.sample_count += 1;
        match attempt.outcome {
            AttemptOutcome::Success => self.success_count += 1,
            AttemptOutcome::Partial => self.partial_count += 1,
            AttemptOutcome::Fail => {}
        }
        let n = self.sample_count as f64;
        self.mean_latency_ms += (attempt.latency_ms as f64 - self.mean_latency_ms) / n;
    }

    pub fn success_rate(&self) -> f64 {
        if self.sample_count == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.sample_count as f64
    }
}
