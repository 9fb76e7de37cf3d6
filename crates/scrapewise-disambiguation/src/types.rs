//! Result types for ambiguity detection and resolution

use serde::{Deserialize, Serialize};

use scrapewise_core::{EntityKind, Slot};

/// Why a slot was left unresolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AmbiguityReason {
    LowIntentConfidence { confidence: f32 },
    MissingSlot { slot: Slot },
    WeakSlot { slot: Slot, confidence: f32 },
    ConflictingEntities { kind: EntityKind, candidates: Vec<String> },
}

impl AmbiguityReason {
    pub fn slot(&self) -> Slot {
        match self {
            Self::LowIntentConfidence { .. } => Slot::Operation,
            Self::MissingSlot { slot } | Self::WeakSlot { slot, .. } => *slot,
            Self::ConflictingEntities { kind, .. } => Slot::Constraint(*kind),
        }
    }
}

/// Result of ambiguity detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbiguityDetection {
    /// Unresolved slots, deduplicated, in detection order
    pub unresolved: Vec<Slot>,
    pub reasons: Vec<AmbiguityReason>,
    /// Lowest confidence among the signals that were checked
    pub confidence: f32,
}

impl AmbiguityDetection {
    pub fn clear(confidence: f32) -> Self {
        Self {
            unresolved: Vec::new(),
            reasons: Vec::new(),
            confidence,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        !self.unresolved.is_empty()
    }

    pub(crate) fn push(&mut self, reason: AmbiguityReason) {
        let slot = reason.slot();
        if !self.unresolved.contains(&slot) {
            self.unresolved.push(slot);
        }
        self.reasons.push(reason);
    }
}

/// A suggested answer to a clarifying question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub label: String,
    /// Text that, sent back as the next message, resolves the slot
    pub reply: String,
}

impl Suggestion {
    pub fn new(label: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            reply: reply.into(),
        }
    }
}

/// Generated clarification question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationQuestion {
    pub question: String,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    #[serde(default)]
    pub clarifying: Vec<Slot>,
}

impl ClarificationQuestion {
    pub fn has_suggestions(&self) -> bool {
        !self.suggestions.is_empty()
    }
}

/// Outcome of evaluating one turn
#[derive(Debug, Clone, PartialEq)]
pub enum DisambiguationResult {
    /// Confident enough to build a plan
    Resolved,

    /// Ask the caller before going further
    Ambiguous {
        question: ClarificationQuestion,
        detection: AmbiguityDetection,
    },

    /// Second ambiguous turn in a row with no slot resolved
    Stalled { unresolved: Vec<Slot> },
}

impl DisambiguationResult {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved)
    }

    pub fn needs_clarification(&self) -> bool {
        matches!(self, Self::Ambiguous { .. })
    }

    pub fn is_stalled(&self) -> bool {
        matches!(self, Self::Stalled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_dedupes_slots() {
        let mut detection = AmbiguityDetection::clear(1.0);
        assert!(!detection.is_ambiguous());

        detection.push(AmbiguityReason::MissingSlot {
            slot: Slot::TargetField,
        });
        detection.push(AmbiguityReason::WeakSlot {
            slot: Slot::TargetField,
            confidence: 0.6,
        });
        detection.push(AmbiguityReason::ConflictingEntities {
            kind: EntityKind::Price,
            candidates: vec!["under $50".into(), "under $30".into()],
        });

        assert!(detection.is_ambiguous());
        assert_eq!(
            detection.unresolved,
            vec![Slot::TargetField, Slot::Constraint(EntityKind::Price)]
        );
        assert_eq!(detection.reasons.len(), 3);
    }

    #[test]
    fn test_result_variants() {
        assert!(DisambiguationResult::Resolved.is_resolved());
        let stalled = DisambiguationResult::Stalled {
            unresolved: vec![Slot::Operation],
        };
        assert!(stalled.is_stalled());
        assert!(!stalled.needs_clarification());
    }
}
