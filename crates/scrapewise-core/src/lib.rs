//! Core types and traits for the scrapewise extraction pipeline

pub mod error;
pub mod message;
pub mod traits;
pub mod types;

pub use error::{FailureKind, Result, ScrapeError};
pub use message::{ChatMessage, Role};
pub use traits::fetch::{ContentFetcher, FetchError, FetchHints, FetchedContent};
pub use traits::model::{ModelError, ModelProvider, ModelResponse};
pub use traits::store::PlanStore;
pub use types::{
    AttemptOutcome, Comparator, Constraint, ContentSignature, Entity, EntityKind, EntityValue,
    ExtractedRecord, ExtractionConfig, FieldSpec, Intent, IntentSource, OperationType,
    OutputShape, OutputType, PerformanceRecord, Query, Slot, Span, StrategyAttempt, StrategyKind,
};
