use thiserror::Error;

use scrapewise_core::{OperationType, ScrapeError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// The operation has no plan template; a capability gap, not a clarity gap.
    #[error("no extraction template for operation: {0}")]
    NoTemplate(OperationType),

    #[error("intent names no fields to extract")]
    NoFields,
}

impl From<PlanError> for ScrapeError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::NoTemplate(op) => ScrapeError::NoTemplate(op),
            PlanError::NoFields => ScrapeError::InvalidRequest(err.to_string()),
        }
    }
}
