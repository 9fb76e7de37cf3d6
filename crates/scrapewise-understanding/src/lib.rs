//! Query understanding: typed entities and operation intent from request text

pub mod config;
pub mod entity;
pub mod intent;

pub use config::ClassifierConfig;
pub use entity::EntityExtractor;
pub use intent::IntentClassifier;
