//! Disambiguation manager orchestrating detection, clarification and stall
//! detection for one turn

use tracing::info;

use scrapewise_conversation::ConversationSession;
use scrapewise_core::{Entity, Intent};

use super::clarifier::ClarificationGenerator;
use super::config::DisambiguationConfig;
use super::detector::AmbiguityDetector;
use super::types::{AmbiguityDetection, DisambiguationResult};

pub struct DisambiguationManager {
    config: DisambiguationConfig,
    detector: AmbiguityDetector,
    clarifier: ClarificationGenerator,
}

impl DisambiguationManager {
    pub fn new(config: DisambiguationConfig) -> Self {
        let detector = AmbiguityDetector::new(config.clone());
        let clarifier = ClarificationGenerator::new(config.clone());
        Self {
            config,
            detector,
            clarifier,
        }
    }

    pub fn config(&self) -> &DisambiguationConfig {
        &self.config
    }

    pub fn detect(&self, intent: &Intent, entities: &[Entity]) -> AmbiguityDetection {
        self.detector.detect(intent, entities)
    }

    /// Whether a message stands on its own as a complete, unambiguous request.
    /// Such a message abandons any pending clarification instead of answering it.
    pub fn is_self_contained(&self, intent: &Intent, entities: &[Entity]) -> bool {
        !self.detector.detect(intent, entities).is_ambiguous()
    }

    /// Evaluate an interpreted turn against the session's pending
    /// clarification.
    ///
    /// Two consecutive ambiguous turns must resolve at least one of the
    /// earlier unresolved slots; otherwise the turn is stalled.
    pub fn evaluate(
        &self,
        query: &str,
        intent: &Intent,
        entities: &[Entity],
        session: &ConversationSession,
    ) -> DisambiguationResult {
        let detection = self.detector.detect(intent, entities);
        if !detection.is_ambiguous() {
            return DisambiguationResult::Resolved;
        }

        if let Some(pending) = session.pending() {
            let progressed = pending
                .unresolved
                .iter()
                .any(|slot| !detection.unresolved.contains(slot));
            if !progressed {
                info!(
                    session_id = session.id(),
                    unresolved = ?detection.unresolved,
                    "Clarification made no progress, session stalled"
                );
                return DisambiguationResult::Stalled {
                    unresolved: detection.unresolved,
                };
            }
        }

        let question = self.clarifier.generate(query, &detection, entities);
        info!(
            session_id = session.id(),
            unresolved = ?detection.unresolved,
            confidence = detection.confidence,
            "Query ambiguous, asking for clarification"
        );
        DisambiguationResult::Ambiguous {
            question,
            detection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scrapewise_conversation::{ConversationTurn, TurnResolution};
    use scrapewise_core::{
        Comparator, EntityKind, EntityValue, IntentSource, OperationType, Query, Slot, Span,
    };

    fn field(name: &str, confidence: f32) -> Entity {
        Entity::field(name, Span::new(0, name.len()), name).with_confidence(confidence)
    }

    fn bound(value: f64) -> Entity {
        Entity::new(
            EntityKind::Price,
            EntityValue::Bound {
                comparator: Comparator::Lt,
                value,
                unit: None,
            },
            Span::new(20, 29),
            format!("under ${}", value),
        )
        .with_confidence(0.95)
    }

    fn extract(confidence: f32) -> Intent {
        Intent::new(OperationType::Extract, confidence, IntentSource::Pattern)
    }

    fn record(session: &mut ConversationSession, result: &DisambiguationResult, intent: &Intent) {
        let resolution = match result {
            DisambiguationResult::Resolved => TurnResolution::Resolved,
            DisambiguationResult::Ambiguous {
                question,
                detection,
            } => TurnResolution::Ambiguous {
                unresolved: detection.unresolved.clone(),
                question: question.question.clone(),
            },
            DisambiguationResult::Stalled { unresolved } => TurnResolution::Stalled {
                unresolved: unresolved.clone(),
            },
        };
        session.apply_turn(
            ConversationTurn::new(Query::new(session.id().to_string(), "q"), resolution)
                .with_interpretation("q", intent.clone(), Vec::new()),
            Utc::now(),
        );
    }

    #[test]
    fn test_resolved_passes_through() {
        let manager = DisambiguationManager::new(DisambiguationConfig::default());
        let session = ConversationSession::new("s1", Utc::now(), 10);
        let result = manager.evaluate(
            "get all prices under $50",
            &extract(0.8),
            &[field("price", 0.9), bound(50.0)],
            &session,
        );
        assert!(result.is_resolved());
    }

    #[test]
    fn test_ambiguous_then_progress_then_resolved() {
        let manager = DisambiguationManager::new(DisambiguationConfig::default());
        let mut session = ConversationSession::new("s1", Utc::now(), 10);

        // Operation and target both unclear.
        let first_intent = extract(0.3);
        let first = manager.evaluate("laptops", &first_intent, &[], &session);
        assert!(first.needs_clarification());
        record(&mut session, &first, &first_intent);
        assert_eq!(session.unresolved(), &[Slot::Operation, Slot::TargetField]);

        // Operation resolved, target still weak: progress, asks again.
        let second_intent = extract(0.8);
        let second =
            manager.evaluate("get laptops", &second_intent, &[field("price", 0.6)], &session);
        assert!(second.needs_clarification());
        record(&mut session, &second, &second_intent);
        assert_eq!(session.unresolved(), &[Slot::TargetField]);

        let third = manager.evaluate(
            "get laptops all prices",
            &extract(0.8),
            &[field("price", 0.9)],
            &session,
        );
        assert!(third.is_resolved());
    }

    #[test]
    fn test_no_progress_stalls() {
        let manager = DisambiguationManager::new(DisambiguationConfig::default());
        let mut session = ConversationSession::new("s1", Utc::now(), 10);

        let intent = extract(0.8);
        let first = manager.evaluate("get the prices", &intent, &[field("price", 0.6)], &session);
        record(&mut session, &first, &intent);

        let second = manager.evaluate(
            "get the prices hmm",
            &intent,
            &[field("price", 0.6)],
            &session,
        );
        assert_eq!(
            second,
            DisambiguationResult::Stalled {
                unresolved: vec![Slot::TargetField]
            }
        );
    }

    #[test]
    fn test_self_contained() {
        let manager = DisambiguationManager::new(DisambiguationConfig::default());
        assert!(manager.is_self_contained(&extract(0.8), &[field("title", 0.9)]));
        assert!(!manager.is_self_contained(&extract(0.8), &[field("title", 0.6)]));
    }
}
