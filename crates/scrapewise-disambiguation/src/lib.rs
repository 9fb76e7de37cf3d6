//! Ambiguity detection and resolution for scrapewise
//!
//! Detection is rule based: a query is ambiguous when the operation is
//! uncertain, a slot the operation requires is empty or weak, or two
//! constraints of the same kind contradict each other with comparable
//! confidence. Each ambiguous turn produces a clarifying question; two
//! consecutive ambiguous turns without any slot becoming resolved stall the
//! session.
//!
//! # Example
//!
//! ```yaml
//! disambiguation:
//!   intent_threshold: 0.7
//!   slot_threshold: 0.7
//!   max_suggestions: 3
//!   questions:
//!     target_field: "What should I pull from the page for \"{{ query }}\"?"
//! ```

mod answer;
mod clarifier;
mod config;
mod detector;
mod manager;
mod types;

pub use answer::ClarificationAnswer;
pub use clarifier::ClarificationGenerator;
pub use config::DisambiguationConfig;
pub use detector::AmbiguityDetector;
pub use manager::DisambiguationManager;
pub use types::{
    AmbiguityDetection, AmbiguityReason, ClarificationQuestion, DisambiguationResult, Suggestion,
};
