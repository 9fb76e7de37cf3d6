//! Language-model collaborator plumbing for scrapewise

pub mod mock;
pub mod prompts;
pub mod registry;
pub mod structured;

pub use mock::{MockCall, MockModelProvider};
pub use prompts::PromptRenderer;
pub use registry::ModelRegistry;
pub use scrapewise_core::{ChatMessage, ModelError, ModelProvider, ModelResponse, Role};
pub use structured::{ExpectedShape, StructuredInference, extract_json};
