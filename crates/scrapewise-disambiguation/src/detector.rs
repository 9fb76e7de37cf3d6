//! Rule-based ambiguity detection

use tracing::debug;

use scrapewise_core::{Entity, EntityKind, Intent, IntentSource, Slot};

use super::config::DisambiguationConfig;
use super::types::{AmbiguityDetection, AmbiguityReason};

pub struct AmbiguityDetector {
    config: DisambiguationConfig,
}

impl AmbiguityDetector {
    pub fn new(config: DisambiguationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DisambiguationConfig {
        &self.config
    }

    /// Check an intent and its entities for anything that would make the
    /// extraction plan a guess.
    pub fn detect(&self, intent: &Intent, entities: &[Entity]) -> AmbiguityDetection {
        let mut detection = AmbiguityDetection::clear(intent.confidence);
        if intent.confidence < self.config.intent_threshold {
            detection.push(AmbiguityReason::LowIntentConfidence {
                confidence: intent.confidence,
            });
        }
        // Disabling turns off slot and conflict checks only; a plan is never
        // built from an intent below the threshold.
        if !self.config.is_enabled() {
            return detection;
        }

        for slot in intent.operation.required_slots() {
            let best = match slot {
                Slot::TargetField => self.target_confidence(intent, entities),
                Slot::FilterCondition => best_confidence(entities, |e| e.kind.is_constraint()),
                Slot::Constraint(kind) => best_confidence(entities, |e| e.kind == *kind),
                Slot::Operation => Some(intent.confidence),
            };

            match best {
                None => detection.push(AmbiguityReason::MissingSlot { slot: *slot }),
                Some(confidence) => {
                    detection.confidence = detection.confidence.min(confidence);
                    if confidence < self.config.slot_threshold {
                        detection.push(AmbiguityReason::WeakSlot {
                            slot: *slot,
                            confidence,
                        });
                    }
                }
            }
        }

        for reason in self.conflicts(entities) {
            detection.push(reason);
        }

        debug!(
            operation = %intent.operation,
            unresolved = detection.unresolved.len(),
            confidence = detection.confidence,
            "Ambiguity detection complete"
        );
        detection
    }

    /// Targets named by the model count as a confident answer; otherwise the
    /// strongest field entity decides.
    fn target_confidence(&self, intent: &Intent, entities: &[Entity]) -> Option<f32> {
        if intent.source == IntentSource::Model && !intent.targets.is_empty() {
            return Some(intent.confidence);
        }
        best_confidence(entities, |e| e.kind == EntityKind::ContentKind)
    }

    fn conflicts(&self, entities: &[Entity]) -> Vec<AmbiguityReason> {
        let mut reasons: Vec<AmbiguityReason> = Vec::new();

        for (i, a) in entities.iter().enumerate() {
            if a.kind == EntityKind::ContentKind {
                continue;
            }
            for b in entities.iter().skip(i + 1) {
                if a.kind != b.kind || !a.value.contradicts(&b.value) {
                    continue;
                }
                if (a.confidence - b.confidence).abs() > self.config.conflict_margin {
                    continue;
                }

                let existing = reasons.iter().position(|r| {
                    matches!(r, AmbiguityReason::ConflictingEntities { kind, .. } if *kind == a.kind)
                });
                match existing {
                    Some(idx) => {
                        if let AmbiguityReason::ConflictingEntities { candidates, .. } =
                            &mut reasons[idx]
                        {
                            for text in [&a.text, &b.text] {
                                if !candidates.contains(text) {
                                    candidates.push(text.clone());
                                }
                            }
                        }
                    }
                    None => reasons.push(AmbiguityReason::ConflictingEntities {
                        kind: a.kind,
                        candidates: vec![a.text.clone(), b.text.clone()],
                    }),
                }
            }
        }
        reasons
    }
}

fn best_confidence(entities: &[Entity], filter: impl Fn(&Entity) -> bool) -> Option<f32> {
    entities
        .iter()
        .filter(|e| filter(e))
        .map(|e| e.confidence)
        .max_by(|a, b| a.total_cmp(b))
}
