use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use scrapewise_core::{Entity, FailureKind, Intent, Query, Slot};

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnResolution {
    Resolved,
    Ambiguous { unresolved: Vec<Slot>, question: String },
    Stalled { unresolved: Vec<Slot> },
    Failed { kind: FailureKind },
}

impl TurnResolution {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::Ambiguous { .. } => "ambiguous",
            Self::Stalled { .. } => "stalled",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub query: Query,
    /// Text the turn was interpreted as; the prior turn plus this one when
    /// answering a clarification.
    pub interpreted_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    pub resolution: TurnResolution,
}

impl ConversationTurn {
    pub fn new(query: Query, resolution: TurnResolution) -> Self {
        let interpreted_text = query.text.clone();
        Self {
            query,
            interpreted_text,
            intent: None,
            entities: Vec::new(),
            resolution,
        }
    }

    pub fn with_interpretation(
        mut self,
        interpreted_text: impl Into<String>,
        intent: Intent,
        entities: Vec<Entity>,
    ) -> Self {
        self.interpreted_text = interpreted_text.into();
        self.intent = Some(intent);
        self.entities = entities;
        self
    }
}

/// The single outstanding unresolved intent of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingClarification {
    pub text: String,
    pub intent: Intent,
    /// Entities the pending turn was interpreted with
    #[serde(default)]
    pub entities: Vec<Entity>,
    pub unresolved: Vec<Slot>,
    pub question: String,
    pub asked_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: String,
    turns: Vec<ConversationTurn>,
    current_intent: Option<Intent>,
    pending: Option<PendingClarification>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    max_turns: usize,
}

impl ConversationSession {
    pub fn new(id: impl Into<String>, now: DateTime<Utc>, max_turns: usize) -> Self {
        Self {
            id: id.into(),
            turns: Vec::new(),
            current_intent: None,
            pending: None,
            created_at: now,
            last_activity: now,
            max_turns: max_turns.max(1),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Most recent resolved intent
    pub fn current_intent(&self) -> Option<&Intent> {
        self.current_intent.as_ref()
    }

    pub fn pending(&self) -> Option<&PendingClarification> {
        self.pending.as_ref()
    }

    pub fn unresolved(&self) -> &[Slot] {
        self.pending
            .as_ref()
            .map(|p| p.unresolved.as_slice())
            .unwrap_or(&[])
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_activity > ttl
    }

    /// Append a turn and advance the session state from its resolution.
    pub fn apply_turn(&mut self, turn: ConversationTurn, now: DateTime<Utc>) {
        match &turn.resolution {
            TurnResolution::Resolved => {
                if let Some(intent) = &turn.intent {
                    self.current_intent = Some(intent.clone());
                }
                self.pending = None;
            }
            TurnResolution::Ambiguous {
                unresolved,
                question,
            } => {
                // Replaces any earlier pending intent; a session carries at most one.
                self.pending = turn.intent.as_ref().map(|intent| PendingClarification {
                    text: turn.interpreted_text.clone(),
                    intent: intent.clone(),
                    entities: turn.entities.clone(),
                    unresolved: unresolved.clone(),
                    question: question.clone(),
                    asked_at: now,
                });
            }
            TurnResolution::Stalled { .. } | TurnResolution::Failed { .. } => {
                self.pending = None;
            }
        }

        self.turns.push(turn);
        if self.turns.len() > self.max_turns {
            let excess = self.turns.len() - self.max_turns;
            self.turns.drain(..excess);
        }
        self.last_activity = now;
    }

    /// Drop the outstanding unresolved intent and its slots.
    pub fn abandon_pending(&mut self) -> Option<PendingClarification> {
        self.pending.take()
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    /// Reset to an empty session, as if newly started.
    pub(crate) fn reset(&mut self, now: DateTime<Utc>) {
        self.turns.clear();
        self.current_intent = None;
        self.pending = None;
        self.created_at = now;
        self.last_activity = now;
    }
}
