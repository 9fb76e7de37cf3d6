//! Pipeline data model

mod entity;
mod intent;
mod plan;
mod query;
mod strategy;

pub use entity::{Comparator, Entity, EntityKind, EntityValue, Span};
pub use intent::{Intent, IntentSource, OperationType, Slot};
pub use plan::{Constraint, ExtractionConfig, FieldSpec, OutputShape, OutputType};
pub use query::Query;
pub use strategy::{
    AttemptOutcome, ContentSignature, ExtractedRecord, PerformanceRecord, StrategyAttempt,
    StrategyKind,
};
