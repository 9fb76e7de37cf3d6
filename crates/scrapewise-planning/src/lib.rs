//! Extraction plan compilation
//!
//! Turns a resolved intent, its entities and the relevant turn history into
//! an [`ExtractionConfig`](scrapewise_core::ExtractionConfig). Compilation is
//! deterministic: the same inputs always produce a byte-identical plan.

mod builder;
mod conditions;
mod config;
mod error;
mod templates;

pub use builder::ExtractionConfigBuilder;
pub use conditions::{ConditionParser, FallbackRule};
pub use config::PlanningConfig;
pub use error::PlanError;
pub use templates::{ConfigTemplate, ShapeKind, TemplateRegistry};
