//! Scrapewise: turn a natural-language request and a page into structured
//! records, asking for clarification when the request is unclear and
//! learning which extraction strategy works for each kind of page.

pub mod pipeline {
    pub use scrapewise_runtime::{
        ExtractionReport, ExtractionRequest, Pipeline, PipelineBuilder, PipelineConfig,
        PipelineOutcome, ShapedResult,
    };
}

pub mod error {
    pub use scrapewise_core::{FailureKind, Result, ScrapeError};
    pub use scrapewise_planning::PlanError;
    pub use scrapewise_strategy::StrategyError;
}

pub mod types {
    pub use scrapewise_core::{
        AttemptOutcome, Comparator, Constraint, ContentSignature, Entity, EntityKind,
        EntityValue, ExtractedRecord, ExtractionConfig, FieldSpec, Intent, IntentSource,
        OperationType, OutputShape, OutputType, PerformanceRecord, Query, Slot, Span,
        StrategyAttempt, StrategyKind,
    };
}

pub mod fetch {
    pub use scrapewise_core::{ContentFetcher, FetchError, FetchHints, FetchedContent};
    pub use scrapewise_runtime::testing::StaticFetcher;
}

pub mod llm {
    pub use scrapewise_core::{ChatMessage, ModelError, ModelProvider, ModelResponse, Role};
    pub use scrapewise_llm::{
        ExpectedShape, MockModelProvider, ModelRegistry, PromptRenderer, StructuredInference,
    };
}

pub mod understanding {
    pub use scrapewise_understanding::{ClassifierConfig, EntityExtractor, IntentClassifier};
}

pub mod disambiguation {
    pub use scrapewise_disambiguation::{
        AmbiguityDetection, AmbiguityDetector, AmbiguityReason, ClarificationAnswer,
        ClarificationGenerator, ClarificationQuestion, DisambiguationConfig, DisambiguationManager,
        DisambiguationResult, Suggestion,
    };
}

pub mod conversation {
    pub use scrapewise_conversation::{
        ConversationConfig, ConversationManager, ConversationSession, ConversationTurn,
        PendingClarification, SessionSummary, SessionTurn, TurnDigest, TurnResolution,
    };
}

pub mod planning {
    pub use scrapewise_planning::{
        ConditionParser, ConfigTemplate, ExtractionConfigBuilder, FallbackRule, PlanningConfig,
        ShapeKind, TemplateRegistry,
    };
}

pub mod strategy {
    pub use scrapewise_strategy::{
        ContentFormat, ContentProfile, ExecutionResult, FallbackExecutor, ModelAssisted,
        PathQuery, PatternMatch, PerformanceTracker, RankSource, RankedStrategy, Strategy,
        StrategyConfig, StrategyOutput, StrategySelector, StrategySet, StructuralSelector,
        compute_signature,
    };
}

pub mod storage {
    pub use scrapewise_core::PlanStore;
    pub use scrapewise_storage::{FileStore, MemoryStore, StorageConfig, create_store};
}

pub use error::{FailureKind, Result, ScrapeError};
pub use pipeline::{ExtractionRequest, Pipeline, PipelineBuilder, PipelineConfig, PipelineOutcome};
