//! Intent classification: keyword rules first, a single model escalation
//! when the rules are not confident enough.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use scrapewise_core::{ChatMessage, Intent, IntentSource, ModelError, OperationType};
use scrapewise_llm::prompts::INTENT_ESCALATION;
use scrapewise_llm::{ExpectedShape, PromptRenderer, StructuredInference};

use crate::config::ClassifierConfig;

const NO_MATCH_CONFIDENCE: f32 = 0.3;
const CONFLICT_PENALTY: f32 = 0.25;
const FOLLOW_UP_DECAY: f32 = 0.9;

/// (operation, keyword pattern). Extract is the generic verb set; the other
/// operations are specific and outrank it when both appear.
const INTENT_PATTERNS: &[(OperationType, &str)] = &[
    (
        OperationType::Compare,
        r"(?i)\b(?:compare|comparing|comparison|versus|vs\.?|difference\s+between|side\s+by\s+side)",
    ),
    (
        OperationType::Analyze,
        r"(?i)\b(?:analy[sz]e|analysis|summari[sz]e|summary|average|mean|median|trends?|how\s+many|count|total|distribution|statistics|stats)\b",
    ),
    (
        OperationType::Filter,
        r"(?i)\b(?:filter|only|exclude|excluding|narrow|remove|without|just\s+the)\b",
    ),
    (
        OperationType::Extract,
        r"(?i)\b(?:get|find|extract|scrape|list|show|collect|pull|grab|fetch|give\s+me|retrieve|return)\b",
    ),
];

struct IntentRule {
    operation: OperationType,
    regex: Regex,
}

static INTENT_RULES: LazyLock<Vec<IntentRule>> = LazyLock::new(|| {
    INTENT_PATTERNS
        .iter()
        .map(|(operation, pattern)| IntentRule {
            operation: *operation,
            regex: Regex::new(pattern).expect("intent pattern is valid"),
        })
        .collect()
});

#[derive(Debug, Clone, Copy)]
struct RuleMatch {
    operation: OperationType,
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct EscalationAnswer {
    operation: String,
    confidence: f32,
    #[serde(default)]
    targets: Vec<String>,
}

/// Labels a query with an operation type and confidence.
pub struct IntentClassifier {
    config: ClassifierConfig,
    inference: Option<Arc<StructuredInference>>,
    prompts: PromptRenderer,
}

impl IntentClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            inference: None,
            prompts: PromptRenderer::new(),
        }
    }

    pub fn with_inference(mut self, inference: Arc<StructuredInference>) -> Self {
        self.inference = Some(inference);
        self
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Pattern-only classification. Never touches the model.
    pub fn classify_with_patterns(&self, text: &str, prior: Option<&Intent>) -> Intent {
        let matches = self.rule_matches(text);

        let best = matches.iter().copied().max_by(|a, b| {
            a.confidence
                .total_cmp(&b.confidence)
                .then_with(|| specificity(a.operation).cmp(&specificity(b.operation)))
        });

        match best {
            Some(best) => {
                let contested = matches.iter().any(|m| {
                    m.operation != best.operation && m.operation != OperationType::Extract
                });
                let confidence = if contested {
                    best.confidence - CONFLICT_PENALTY
                } else {
                    best.confidence
                };
                Intent::new(best.operation, confidence, IntentSource::Pattern)
            }
            // A follow-up with no verb of its own carries the previous operation.
            None => match prior {
                Some(prior) => Intent::new(
                    prior.operation,
                    prior.confidence * FOLLOW_UP_DECAY,
                    IntentSource::Pattern,
                )
                .with_targets(prior.targets.clone()),
                None => Intent::new(
                    OperationType::Extract,
                    NO_MATCH_CONFIDENCE,
                    IntentSource::Pattern,
                ),
            },
        }
    }

    /// Classify `text`, escalating at most once to the model collaborator
    /// when the pattern confidence is below the escalation threshold.
    /// `summary` describes prior turns for follow-up queries.
    pub async fn classify(
        &self,
        text: &str,
        prior: Option<&Intent>,
        summary: Option<&str>,
    ) -> Intent {
        let guess = self.classify_with_patterns(text, prior);
        if guess.confidence >= self.config.escalation_threshold || !self.config.escalate {
            return guess;
        }

        let Some(inference) = &self.inference else {
            debug!(
                confidence = guess.confidence,
                "No model collaborator configured, keeping pattern guess"
            );
            return guess;
        };

        match self.escalate(inference, text, &guess, summary).await {
            Ok(intent) => {
                info!(
                    operation = %intent.operation,
                    confidence = intent.confidence,
                    pattern_confidence = guess.confidence,
                    "Intent escalated to model"
                );
                intent
            }
            Err(e) => {
                if e.is_service_failure() {
                    warn!(error = %e, "Intent escalation failed, using pattern guess");
                } else {
                    debug!(error = %e, "Intent escalation unusable, using pattern guess");
                }
                Intent {
                    source: IntentSource::PatternFallback,
                    ..guess
                }
            }
        }
    }

    async fn escalate(
        &self,
        inference: &StructuredInference,
        text: &str,
        guess: &Intent,
        summary: Option<&str>,
    ) -> Result<Intent, ModelError> {
        let operations: Vec<&str> = OperationType::ALL.iter().map(|o| o.as_str()).collect();
        let prompt = self
            .prompts
            .render(
                INTENT_ESCALATION,
                json!({
                    "operations": operations,
                    "summary": summary,
                    "query": text,
                    "guess": guess.operation.as_str(),
                }),
            )
            .map_err(|e| ModelError::Config(e.to_string()))?;

        let shape = ExpectedShape::with_keys(["operation", "confidence"]);
        let value = inference
            .infer(&self.config.model_alias, &[ChatMessage::user(prompt)], &shape)
            .await?;

        let answer: EscalationAnswer = serde_json::from_value(value)?;
        let operation = OperationType::parse(&answer.operation).ok_or_else(|| {
            ModelError::MalformedOutput(format!("unknown operation: {}", answer.operation))
        })?;

        Ok(Intent::new(operation, answer.confidence, IntentSource::Model)
            .with_targets(answer.targets))
    }

    fn rule_matches(&self, text: &str) -> Vec<RuleMatch> {
        let first_word = text
            .char_indices()
            .find(|(_, c)| c.is_alphanumeric())
            .map(|(i, _)| i);

        INTENT_RULES
            .iter()
            .filter_map(|rule| {
                let found = rule.regex.find(text)?;
                let leading = Some(found.start()) == first_word;
                let confidence = match (rule.operation, leading) {
                    (OperationType::Extract, true) => 0.8,
                    (OperationType::Extract, false) => 0.7,
                    (_, true) => 0.9,
                    (_, false) => 0.85,
                };
                Some(RuleMatch {
                    operation: rule.operation,
                    confidence,
                })
            })
            .collect()
    }
}

fn specificity(operation: OperationType) -> u8 {
    match operation {
        OperationType::Extract => 0,
        OperationType::Filter => 1,
        OperationType::Analyze => 2,
        OperationType::Compare => 3,
    }
}
