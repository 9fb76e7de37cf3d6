//! Conversation state for multi-turn clarification dialogues
//!
//! Sessions are keyed by caller-supplied id and evicted after a period of
//! inactivity. Turns within one session are serialized through a per-session
//! lock; different sessions never contend with each other.

mod config;
mod manager;
mod session;
mod summary;

pub use config::ConversationConfig;
pub use manager::{ConversationManager, SessionTurn};
pub use session::{ConversationSession, ConversationTurn, PendingClarification, TurnResolution};
pub use summary::{SessionSummary, TurnDigest};
