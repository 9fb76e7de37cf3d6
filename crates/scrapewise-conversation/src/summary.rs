use serde::{Deserialize, Serialize};

use scrapewise_core::{OperationType, Slot};

use crate::session::ConversationSession;

const RECENT_TURNS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnDigest {
    pub text: String,
    pub operation: Option<OperationType>,
    pub resolution: String,
}

/// Compact view of a session for the model collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub turn_count: usize,
    pub current_operation: Option<OperationType>,
    pub unresolved: Vec<Slot>,
    pub recent: Vec<TurnDigest>,
}

impl SessionSummary {
    pub fn from_session(session: &ConversationSession) -> Self {
        let turns = session.turns();
        let start = turns.len().saturating_sub(RECENT_TURNS);
        let recent = turns[start..]
            .iter()
            .map(|turn| TurnDigest {
                text: turn.query.text.clone(),
                operation: turn.intent.as_ref().map(|i| i.operation),
                resolution: turn.resolution.label().to_string(),
            })
            .collect();

        Self {
            session_id: session.id().to_string(),
            turn_count: turns.len(),
            current_operation: session
                .pending()
                .map(|p| p.intent.operation)
                .or_else(|| session.current_intent().map(|i| i.operation)),
            unresolved: session.unresolved().to_vec(),
            recent,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.turn_count == 0
    }

    /// Plain-text rendering for prompt templates.
    pub fn to_prompt(&self) -> String {
        let mut lines = vec![format!("Turns so far: {}", self.turn_count)];
        if let Some(op) = self.current_operation {
            lines.push(format!("Current operation: {}", op));
        }
        if !self.unresolved.is_empty() {
            let slots: Vec<String> = self.unresolved.iter().map(|s| s.to_string()).collect();
            lines.push(format!("Unresolved: {}", slots.join(", ")));
        }
        for digest in &self.recent {
            let op = digest
                .operation
                .map(|o| o.as_str())
                .unwrap_or("unknown");
            lines.push(format!("- \"{}\" ({}, {})", digest.text, op, digest.resolution));
        }
        lines.join("\n")
    }
}
