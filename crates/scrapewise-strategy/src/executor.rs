use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use scrapewise_core::{
    AttemptOutcome, ContentSignature, ExtractedRecord, ExtractionConfig, StrategyAttempt,
    StrategyKind,
};

use crate::config::StrategyConfig;
use crate::error::StrategyError;
use crate::profile::ContentProfile;
use crate::score::StrategyOutput;
use crate::selector::RankedStrategy;
use crate::strategies::StrategySet;
use crate::tracker::PerformanceTracker;

/// Outcome of running the fallback chain over one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub records: Vec<ExtractedRecord>,
    pub confidence: f32,
    /// Strategy whose records were returned, if any produced records
    pub strategy: Option<StrategyKind>,
    /// No attempt reached the acceptance threshold
    pub below_threshold: bool,
    /// Every attempt made, in order
    pub attempts: Vec<StrategyAttempt>,
}

impl ExecutionResult {
    pub fn accepted(&self) -> bool {
        !self.below_threshold && self.strategy.is_some()
    }

    /// True when every failed attempt was the language-model service being
    /// unreachable and nothing else produced records.
    pub fn service_failure_only(&self) -> bool {
        self.strategy.is_none()
            && !self.attempts.is_empty()
            && self
                .attempts
                .iter()
                .all(|a| a.error.as_deref().is_some_and(|e| e.starts_with(SERVICE_FAILURE_PREFIX)))
    }
}

const SERVICE_FAILURE_PREFIX: &str = "service unavailable: ";

/// Tries ranked strategies one at a time until one clears the acceptance
/// threshold.
#[derive(Debug, Clone, Default)]
pub struct FallbackExecutor {
    config: StrategyConfig,
}

impl FallbackExecutor {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Run `ranked` in order. Each attempt is recorded in `tracker` as soon
    /// as it completes, whether it succeeded or not. Dropping the future
    /// abandons the running attempt without recording it.
    #[allow(clippy::too_many_arguments)]
    pub async fn execute(
        &self,
        ranked: &[RankedStrategy],
        strategies: &StrategySet,
        content: &str,
        profile: &ContentProfile,
        signature: &ContentSignature,
        config: &ExtractionConfig,
        tracker: &PerformanceTracker,
    ) -> ExecutionResult {
        let threshold = self.config.acceptance_threshold;
        let timeout = self.config.attempt_timeout();
        let mut attempts = Vec::new();
        let mut tried: Vec<StrategyKind> = Vec::new();
        let mut best: Option<(StrategyKind, StrategyOutput)> = None;

        for entry in ranked {
            if tried.contains(&entry.kind) {
                continue;
            }
            tried.push(entry.kind);
            let Some(strategy) = strategies.get(entry.kind) else {
                continue;
            };

            let started = Instant::now();
            let result = match tokio::time::timeout(timeout, strategy.extract(content, profile, config)).await {
                Ok(result) => result,
                Err(_) => Err(StrategyError::Timeout {
                    after_ms: self.config.attempt_timeout_ms,
                }),
            };
            let latency_ms = started.elapsed().as_millis() as u64;

            let attempt = match &result {
                Ok(output) => {
                    let outcome = if output.confidence >= threshold {
                        AttemptOutcome::Success
                    } else if output.confidence > 0.0 && !output.is_empty() {
                        AttemptOutcome::Partial
                    } else {
                        AttemptOutcome::Fail
                    };
                    StrategyAttempt::new(entry.kind, signature.clone(), outcome, output.confidence, latency_ms)
                }
                Err(e) => {
                    let message = if e.is_service_failure() {
                        warn!(strategy = %entry.kind, error = %e, "Strategy collaborator unavailable");
                        format!("{}{}", SERVICE_FAILURE_PREFIX, e)
                    } else {
                        debug!(strategy = %entry.kind, error = %e, "Strategy attempt failed");
                        e.to_string()
                    };
                    StrategyAttempt::new(entry.kind, signature.clone(), AttemptOutcome::Fail, 0.0, latency_ms)
                        .with_error(message)
                }
            };
            tracker.record(attempt.clone());
            attempts.push(attempt);

            let Ok(output) = result else {
                continue;
            };
            if output.confidence >= threshold {
                debug!(
                    strategy = %entry.kind,
                    confidence = output.confidence,
                    attempts = attempts.len(),
                    "Strategy accepted"
                );
                return ExecutionResult {
                    records: output.records,
                    confidence: output.confidence,
                    strategy: Some(entry.kind),
                    below_threshold: false,
                    attempts,
                };
            }
            if output.confidence > 0.0
                && best.as_ref().is_none_or(|(_, b)| output.confidence > b.confidence)
            {
                best = Some((entry.kind, output));
            }
        }

        match best {
            Some((kind, output)) => {
                info!(
                    strategy = %kind,
                    confidence = output.confidence,
                    threshold,
                    attempts = attempts.len(),
                    "No strategy reached the acceptance threshold; returning best partial result"
                );
                ExecutionResult {
                    records: output.records,
                    confidence: output.confidence,
                    strategy: Some(kind),
                    below_threshold: true,
                    attempts,
                }
            }
            None => {
                info!(attempts = attempts.len(), "Every strategy attempt failed");
                ExecutionResult {
                    records: Vec::new(),
                    confidence: 0.0,
                    strategy: None,
                    below_threshold: true,
                    attempts,
                }
            }
        }
    }
}
