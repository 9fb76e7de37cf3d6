//! Pipeline runtime and builder for scrapewise
//!
//! [`Pipeline::handle`] takes a query, a session id and a url and answers
//! with a [`PipelineOutcome`]: extracted records, a clarifying question, or
//! a tagged failure. It never returns an error.

mod builder;
mod config;
mod outcome;
mod pipeline;
mod shape;

pub mod testing;

pub use builder::PipelineBuilder;
pub use config::PipelineConfig;
pub use outcome::{ExtractionReport, ExtractionRequest, PipelineOutcome};
pub use pipeline::Pipeline;
pub use shape::ShapedResult;

pub use scrapewise_core::{FailureKind, Result, ScrapeError};
