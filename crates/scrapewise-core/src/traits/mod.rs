//! Collaborator traits: the pipeline consumes these, it never implements
//! fetching, inference, or durable storage itself.

pub mod fetch;
pub mod model;
pub mod store;

pub use fetch::ContentFetcher;
pub use model::ModelProvider;
pub use store::PlanStore;
