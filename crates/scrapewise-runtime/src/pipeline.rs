use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use scrapewise_conversation::{ConversationManager, ConversationTurn, SessionTurn, TurnResolution};
use scrapewise_core::{
    ContentFetcher, ContentSignature, Entity, ExtractionConfig, FailureKind, FetchError,
    FetchedContent, Intent, PlanStore, Query, ScrapeError,
};
use scrapewise_disambiguation::{ClarificationAnswer, DisambiguationManager, DisambiguationResult};
use scrapewise_planning::{ExtractionConfigBuilder, PlanError};
use scrapewise_strategy::{
    ContentProfile, FallbackExecutor, PerformanceTracker, StrategySelector, StrategySet,
    compute_signature,
};
use scrapewise_understanding::{EntityExtractor, IntentClassifier};

use crate::config::PipelineConfig;
use crate::outcome::{ExtractionReport, ExtractionRequest, PipelineOutcome};
use crate::shape::ShapedResult;

/// How the current message was read, after merging with any pending
/// clarification.
struct Interpretation {
    text: String,
    intent: Intent,
    entities: Vec<Entity>,
}

struct Plan {
    config: ExtractionConfig,
    key: String,
    cached: bool,
}

/// Query understanding through extraction for one request at a time per
/// session. Cheap to share behind an `Arc`; every method takes `&self`.
pub struct Pipeline {
    pub(crate) config: PipelineConfig,
    pub(crate) entities: EntityExtractor,
    pub(crate) classifier: IntentClassifier,
    pub(crate) disambiguation: DisambiguationManager,
    pub(crate) conversations: Arc<ConversationManager>,
    pub(crate) planner: ExtractionConfigBuilder,
    pub(crate) strategies: StrategySet,
    pub(crate) selector: StrategySelector,
    pub(crate) executor: FallbackExecutor,
    pub(crate) tracker: Arc<PerformanceTracker>,
    pub(crate) fetcher: Arc<dyn ContentFetcher>,
    pub(crate) store: Option<Arc<dyn PlanStore>>,
}

impl Pipeline {
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn conversations(&self) -> &Arc<ConversationManager> {
        &self.conversations
    }

    pub fn tracker(&self) -> &Arc<PerformanceTracker> {
        &self.tracker
    }

    pub fn strategies(&self) -> &StrategySet {
        &self.strategies
    }

    pub fn store(&self) -> Option<&Arc<dyn PlanStore>> {
        self.store.as_ref()
    }

    /// Merge persisted performance aggregates into the tracker. An
    /// unreachable store leaves the default strategy order in effect.
    pub async fn restore_performance(&self) -> usize {
        let Some(store) = &self.store else {
            return 0;
        };
        match self.tracker.load_from(store.as_ref()).await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Performance history unavailable, using default strategy order");
                0
            }
        }
    }

    /// Start the background task that evicts idle sessions.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        self.conversations.spawn_sweeper()
    }

    /// Run one inbound query. Turns for the same session are serialized;
    /// different sessions proceed independently.
    pub async fn handle(&self, request: ExtractionRequest) -> PipelineOutcome {
        if let Err(e) = validate(&request) {
            warn!(error = %e, "Rejected malformed request");
            return PipelineOutcome::failed(FailureKind::InvalidRequest, e.to_string());
        }

        let query = Query::new(request.session_id.clone(), request.query.trim());
        let mut session = self.conversations.begin_turn(&request.session_id).await;
        debug!(
            session_id = %request.session_id,
            fresh = session.is_fresh(),
            turns = session.turn_count(),
            "Turn started"
        );

        let reading = self.interpret(&query, &mut session).await;

        match self
            .disambiguation
            .evaluate(&reading.text, &reading.intent, &reading.entities, &session)
        {
            DisambiguationResult::Resolved => {}
            DisambiguationResult::Ambiguous {
                question,
                detection,
            } => {
                session.record(
                    ConversationTurn::new(
                        query,
                        TurnResolution::Ambiguous {
                            unresolved: detection.unresolved.clone(),
                            question: question.question.clone(),
                        },
                    )
                    .with_interpretation(reading.text, reading.intent, reading.entities),
                );
                return PipelineOutcome::Clarification {
                    question: question.question,
                    suggestions: question.suggestions,
                    unresolved: detection.unresolved,
                };
            }
            DisambiguationResult::Stalled { unresolved } => {
                session.record(
                    ConversationTurn::new(
                        query,
                        TurnResolution::Stalled {
                            unresolved: unresolved.clone(),
                        },
                    )
                    .with_interpretation(reading.text, reading.intent, reading.entities),
                );
                return PipelineOutcome::failed(
                    FailureKind::SessionStalled,
                    format!(
                        "clarification made no progress on: {}",
                        unresolved
                            .iter()
                            .map(|slot| slot.to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                );
            }
        }

        let outcome = self.extract(&request, &reading).await;

        let resolution = match &outcome {
            PipelineOutcome::Failed { kind, .. } => TurnResolution::Failed { kind: *kind },
            _ => TurnResolution::Resolved,
        };
        session.record(
            ConversationTurn::new(query, resolution).with_interpretation(
                reading.text,
                reading.intent,
                reading.entities,
            ),
        );
        outcome
    }

    /// Exactly one classification per query. A pending clarification is
    /// either answered (the texts are merged) or abandoned by a message
    /// that stands on its own.
    async fn interpret(&self, query: &Query, session: &mut SessionTurn) -> Interpretation {
        let summary = session.summary();
        let summary = (!summary.is_empty()).then(|| summary.to_prompt());

        if let Some(pending) = session.pending().cloned() {
            let entities = self.entities.extract(&query.text);
            let standalone = self.classifier.classify_with_patterns(&query.text, None);
            if self.disambiguation.is_self_contained(&standalone, &entities) {
                info!(
                    session_id = %query.session_id,
                    abandoned = %pending.text,
                    "New request replaces pending clarification"
                );
                session.abandon_pending();
                let intent = self
                    .classifier
                    .classify(&query.text, None, summary.as_deref())
                    .await;
                return Interpretation {
                    text: query.text.clone(),
                    intent,
                    entities,
                };
            }

            let answer = ClarificationAnswer::fold(&pending, &query.text, &entities, |text| {
                self.entities.extract(text)
            });
            let intent = self
                .classifier
                .classify(&answer.text, Some(&pending.intent), summary.as_deref())
                .await;
            debug!(session_id = %query.session_id, interpreted = %answer.text, "Answering clarification");
            return Interpretation {
                text: answer.text,
                intent,
                entities: answer.entities,
            };
        }

        let entities = self.entities.extract(&query.text);
        let intent = self
            .classifier
            .classify(&query.text, session.current_intent(), summary.as_deref())
            .await;
        Interpretation {
            text: query.text.clone(),
            intent,
            entities,
        }
    }

    async fn extract(&self, request: &ExtractionRequest, reading: &Interpretation) -> PipelineOutcome {
        let fetched = match self.fetch(request).await {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(url = %request.url, error = %e, "Fetch collaborator unavailable");
                return PipelineOutcome::failed(FailureKind::ExternalServiceUnavailable, e.to_string());
            }
        };

        let profile = ContentProfile::analyze(&fetched.content);
        let signature = if fetched.signature.as_str().is_empty() {
            compute_signature(&fetched.content)
        } else {
            fetched.signature.clone()
        };

        let plan = match self.plan(&signature, reading).await {
            Ok(plan) => plan,
            Err(e) => {
                let kind = ScrapeError::from(e.clone()).failure_kind();
                info!(error = %e, kind = %kind, "No extraction plan");
                return PipelineOutcome::failed(kind, e.to_string());
            }
        };

        let ranked = self
            .selector
            .rank(&self.strategies, &profile, &signature, &self.tracker);
        let result = self
            .executor
            .execute(
                &ranked,
                &self.strategies,
                &fetched.content,
                &profile,
                &signature,
                &plan.config,
                &self.tracker,
            )
            .await;

        if let Some(store) = &self.store {
            if let Err(e) = self.tracker.persist_to(store.as_ref()).await {
                debug!(error = %e, "Ranking continues from in-memory history");
            }
        }

        let Some(strategy) = result.strategy else {
            if result.service_failure_only() {
                error!(signature = %signature, "Model collaborator unavailable and no other strategy applied");
                return PipelineOutcome::failed(
                    FailureKind::ExternalServiceUnavailable,
                    "language model unavailable",
                );
            }
            info!(
                signature = %signature,
                attempts = result.attempts.len(),
                "No strategy produced records"
            );
            return PipelineOutcome::failed(
                FailureKind::AllStrategiesBelowThreshold,
                format!("{} strategies tried, none produced records", result.attempts.len()),
            );
        };

        if result.accepted() {
            if !plan.cached {
                self.cache_plan(&signature, &plan.key, &plan.config).await;
            }
        } else {
            info!(
                strategy = %strategy,
                confidence = result.confidence,
                "Returning best partial result below threshold"
            );
        }

        PipelineOutcome::Extracted(ExtractionReport {
            result: ShapedResult::from_records(&plan.config.output, &result.records),
            records: result.records,
            confidence: result.confidence,
            strategy,
            below_threshold: result.below_threshold,
            attempts: result.attempts.len(),
            signature,
            config: plan.config,
            request_key: plan.key,
            cached_config: plan.cached,
        })
    }

    /// Reuse a plan cached for this request and page shape, or build one.
    /// The operation must still have a template either way.
    async fn plan(
        &self,
        signature: &ContentSignature,
        reading: &Interpretation,
    ) -> Result<Plan, PlanError> {
        let history = [reading.text.as_str()];
        let key = ExtractionConfigBuilder::request_key(&reading.intent, &reading.entities, &history);

        if let Some(store) = &self.store {
            if self.planner.templates().has(reading.intent.operation) {
                match store.get_config(signature, &key).await {
                    Ok(Some(config)) => {
                        debug!(signature = %signature, request_key = %key, "Reusing cached extraction config");
                        return Ok(Plan {
                            config,
                            key,
                            cached: true,
                        });
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(error = %e, signature = %signature, "Config cache unavailable, building plan");
                    }
                }
            }
        }

        let config = self
            .planner
            .build(&reading.intent, &reading.entities, &history)?;
        Ok(Plan {
            config,
            key,
            cached: false,
        })
    }

    async fn fetch(&self, request: &ExtractionRequest) -> Result<FetchedContent, FetchError> {
        let timeout = request
            .hints
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.config.fetch_timeout());
        match tokio::time::timeout(timeout, self.fetcher.fetch(&request.url, &request.hints)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: request.url.clone(),
            }),
        }
    }

    async fn cache_plan(&self, signature: &ContentSignature, key: &str, plan: &ExtractionConfig) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.put_config(signature, key, plan).await {
            warn!(error = %e, signature = %signature, "Failed to cache extraction config");
        }
    }
}

fn validate(request: &ExtractionRequest) -> Result<(), ScrapeError> {
    if request.query.trim().is_empty() {
        return Err(ScrapeError::InvalidRequest("query text is empty".into()));
    }
    if request.session_id.trim().is_empty() {
        return Err(ScrapeError::InvalidRequest("session id is empty".into()));
    }
    if request.url.trim().is_empty() {
        return Err(ScrapeError::InvalidRequest("url is empty".into()));
    }
    Ok(())
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("strategies", &self.strategies)
            .field("sessions", &self.conversations.len())
            .field("tracker", &self.tracker)
            .field("store", &self.store.is_some())
            .finish()
    }
}
