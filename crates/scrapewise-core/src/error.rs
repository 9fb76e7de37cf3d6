//! Error types shared across the pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::traits::fetch::FetchError;
use crate::traits::model::ModelError;
use crate::types::OperationType;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("No extraction template for operation '{0}'")]
    NoTemplate(OperationType),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Caller-visible failure taxonomy.
///
/// Most kinds are ordinary control-flow outcomes. Only
/// [`FailureKind::ExternalServiceUnavailable`] and
/// [`FailureKind::InvalidRequest`] are operational failures worth alerting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    QueryAmbiguous,
    IntentUnrecognized,
    StrategyAttemptFailed,
    AllStrategiesBelowThreshold,
    ExternalServiceUnavailable,
    SessionStalled,
    InvalidRequest,
    /// Local configuration, storage or serialization fault
    Internal,
}

impl FailureKind {
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            Self::ExternalServiceUnavailable | Self::InvalidRequest
        )
    }

    pub fn retry_hint(&self) -> Option<&'static str> {
        match self {
            Self::ExternalServiceUnavailable => {
                Some("An upstream service is unavailable; retry the request later")
            }
            Self::SessionStalled => {
                Some("Start over with a more specific request, naming the fields to extract")
            }
            Self::IntentUnrecognized => Some("Rephrase the request as extract, filter, compare or analyze"),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueryAmbiguous => "query_ambiguous",
            Self::IntentUnrecognized => "intent_unrecognized",
            Self::StrategyAttemptFailed => "strategy_attempt_failed",
            Self::AllStrategiesBelowThreshold => "all_strategies_below_threshold",
            Self::ExternalServiceUnavailable => "external_service_unavailable",
            Self::SessionStalled => "session_stalled",
            Self::InvalidRequest => "invalid_request",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ScrapeError {
    /// Map an internal error onto the caller-facing taxonomy.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Fetch(_) | Self::Model(_) => FailureKind::ExternalServiceUnavailable,
            Self::NoTemplate(_) => FailureKind::IntentUnrecognized,
            Self::InvalidRequest(_) => FailureKind::InvalidRequest,
            Self::Config(_)
            | Self::Storage(_)
            | Self::Serialization(_)
            | Self::Io(_)
            | Self::Other(_) => FailureKind::Internal,
        }
    }
}
