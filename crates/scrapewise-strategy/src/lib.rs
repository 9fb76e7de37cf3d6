//! Extraction strategies for scrapewise
//!
//! A page is profiled ([`ContentProfile`]) and reduced to a
//! [`ContentSignature`](scrapewise_core::ContentSignature). The
//! [`StrategySelector`] ranks the registered strategies using the
//! [`PerformanceTracker`]'s history for that signature, and the
//! [`FallbackExecutor`] runs them one at a time until one reaches the
//! acceptance threshold.
//!
//! # Example
//!
//! ```yaml
//! strategy:
//!   acceptance_threshold: 0.7
//!   attempt_timeout_ms: 10000
//!   default_order: [structural_selector, path_query, pattern_match, model_assisted]
//!   min_samples: 1
//! ```

mod config;
mod error;
mod executor;
mod profile;
mod score;
mod selector;
mod strategies;
mod tracker;
mod values;

pub mod testing;

pub use config::StrategyConfig;
pub use error::StrategyError;
pub use executor::{ExecutionResult, FallbackExecutor};
pub use profile::{ContentFormat, ContentProfile, compute_signature};
pub use score::{StrategyOutput, apply_filters, coverage};
pub use selector::{RankSource, RankedStrategy, StrategySelector};
pub use strategies::{
    ModelAssisted, PathQuery, PatternMatch, Strategy, StrategySet, StructuralSelector,
    visible_text,
};
pub use tracker::PerformanceTracker;
pub use values::{as_date, as_number, coerce_text, coerce_value};
