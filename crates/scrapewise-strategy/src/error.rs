use thiserror::Error;

use scrapewise_core::ModelError;

/// Why a single strategy attempt produced nothing usable. Always recovered
/// by moving on to the next strategy.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StrategyError {
    #[error("strategy does not apply to {0} content")]
    Inapplicable(&'static str),

    #[error("no values found for any requested field")]
    NoMatch,

    #[error("malformed strategy output: {0}")]
    Malformed(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("attempt timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
}

impl StrategyError {
    /// The language-model collaborator itself is down, as opposed to a
    /// strategy simply not finding anything.
    pub fn is_service_failure(&self) -> bool {
        matches!(self, Self::Model(e) if e.is_service_failure())
    }
}
