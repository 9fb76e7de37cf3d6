//! Templated clarification question generator

use minijinja::{AutoEscape, Environment, context};
use tracing::debug;

use scrapewise_core::{Entity, EntityKind, OperationType, Slot};

use super::config::DisambiguationConfig;
use super::types::{AmbiguityDetection, AmbiguityReason, ClarificationQuestion, Suggestion};

const FILTER_EXAMPLES: &[&str] = &["under $50", "4+ stars", "since 2024-01-01"];

pub struct ClarificationGenerator {
    config: DisambiguationConfig,
    env: Environment<'static>,
}

impl ClarificationGenerator {
    pub fn new(config: DisambiguationConfig) -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        Self { config, env }
    }

    /// Build a question for the first unresolved slot, with up to
    /// `max_suggestions` replies that would resolve it.
    pub fn generate(
        &self,
        query: &str,
        detection: &AmbiguityDetection,
        entities: &[Entity],
    ) -> ClarificationQuestion {
        let Some(primary) = detection.unresolved.first().copied() else {
            return ClarificationQuestion {
                question: "Could you rephrase the request?".to_string(),
                suggestions: Vec::new(),
                clarifying: Vec::new(),
            };
        };

        let candidates = conflict_candidates(detection, primary);
        let question = self
            .custom_question(primary, query, &candidates)
            .unwrap_or_else(|| default_question(primary, query, &candidates));

        let mut suggestions = match primary {
            Slot::Operation => operation_suggestions(),
            Slot::TargetField => self.field_suggestions(entities),
            Slot::FilterCondition => FILTER_EXAMPLES
                .iter()
                .map(|example| Suggestion::new(*example, *example))
                .collect(),
            Slot::Constraint(_) => candidates
                .iter()
                .map(|c| Suggestion::new(c.clone(), format!("only {}", c)))
                .collect(),
        };
        suggestions.truncate(self.config.max_suggestions);

        ClarificationQuestion {
            question,
            suggestions,
            clarifying: detection.unresolved.clone(),
        }
    }

    fn custom_question(&self, slot: Slot, query: &str, candidates: &[String]) -> Option<String> {
        let template = self.config.questions.get(slot_key(slot))?;
        match self.env.render_str(
            template,
            context! {
                query => query,
                slot => slot.to_string(),
                candidates => candidates,
            },
        ) {
            Ok(rendered) => Some(rendered),
            Err(e) => {
                debug!(slot = slot_key(slot), error = %e, "Custom question failed to render");
                None
            }
        }
    }

    /// Weakly named fields first, then configured defaults.
    fn field_suggestions(&self, entities: &[Entity]) -> Vec<Suggestion> {
        let mut names: Vec<String> = Vec::new();
        for entity in entities.iter().filter(|e| e.kind == EntityKind::ContentKind) {
            if let Some(name) = entity.value.field_name() {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        for name in &self.config.suggested_fields {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }

        names
            .into_iter()
            .map(|name| Suggestion::new(format!("every {}", name), format!("all {} values", name)))
            .collect()
    }
}

fn slot_key(slot: Slot) -> &'static str {
    match slot {
        Slot::Operation => "operation",
        Slot::TargetField => "target_field",
        Slot::FilterCondition => "filter_condition",
        Slot::Constraint(_) => "constraint",
    }
}

fn conflict_candidates(detection: &AmbiguityDetection, slot: Slot) -> Vec<String> {
    detection
        .reasons
        .iter()
        .find_map(|reason| match reason {
            AmbiguityReason::ConflictingEntities { kind, candidates }
                if Slot::Constraint(*kind) == slot =>
            {
                Some(candidates.clone())
            }
            _ => None,
        })
        .unwrap_or_default()
}

fn default_question(slot: Slot, query: &str, candidates: &[String]) -> String {
    match slot {
        Slot::Operation => format!(
            "What would you like to do with \"{}\": extract, filter, compare or analyze?",
            query
        ),
        Slot::TargetField => format!(
            "Which fields should I extract for \"{}\", and for which items?",
            query
        ),
        Slot::FilterCondition => "What condition should the results meet?".to_string(),
        Slot::Constraint(kind) => format!(
            "The request has conflicting {} conditions ({}). Which one did you mean?",
            kind,
            candidates.join(", ")
        ),
    }
}

fn operation_suggestions() -> Vec<Suggestion> {
    [
        OperationType::Extract,
        OperationType::Filter,
        OperationType::Compare,
        OperationType::Analyze,
    ]
    .into_iter()
    .map(|op| Suggestion::new(op.as_str(), op.as_str()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrapewise_core::Span;

    fn detection(reasons: Vec<AmbiguityReason>) -> AmbiguityDetection {
        let mut detection = AmbiguityDetection::clear(0.5);
        for reason in reasons {
            detection.push(reason);
        }
        detection
    }

    #[test]
    fn test_target_field_question_prefers_named_fields() {
        let generator = ClarificationGenerator::new(DisambiguationConfig::default());
        let entities = vec![Entity::field("price", Span::new(8, 14), "prices").with_confidence(0.6)];
        let question = generator.generate(
            "get the prices",
            &detection(vec![AmbiguityReason::WeakSlot {
                slot: Slot::TargetField,
                confidence: 0.6,
            }]),
            &entities,
        );

        assert!(question.question.contains("get the prices"));
        assert_eq!(question.suggestions.len(), 3);
        assert_eq!(question.suggestions[0].reply, "all price values");
        assert_eq!(question.suggestions[1].label, "every title");
        assert_eq!(question.clarifying, vec![Slot::TargetField]);
    }

    #[test]
    fn test_conflict_question_lists_candidates() {
        let generator = ClarificationGenerator::new(DisambiguationConfig::default());
        let question = generator.generate(
            "prices under $50 or under $30",
            &detection(vec![AmbiguityReason::ConflictingEntities {
                kind: EntityKind::Price,
                candidates: vec!["under $50".into(), "under $30".into()],
            }]),
            &[],
        );
        assert!(question.question.contains("under $50, under $30"));
        assert_eq!(question.suggestions.len(), 2);
        assert_eq!(question.suggestions[1].reply, "only under $30");
    }

    #[test]
    fn test_custom_template() {
        let mut config = DisambiguationConfig::default();
        config.questions.insert(
            "operation".into(),
            "What should I do with {{ query }} ({{ slot }})?".into(),
        );
        let generator = ClarificationGenerator::new(config);
        let question = generator.generate(
            "laptops",
            &detection(vec![AmbiguityReason::LowIntentConfidence { confidence: 0.3 }]),
            &[],
        );
        assert_eq!(question.question, "What should I do with laptops (operation)?");
        assert_eq!(question.suggestions.len(), 3);
    }

    #[test]
    fn test_broken_template_falls_back() {
        let mut config = DisambiguationConfig::default();
        config
            .questions
            .insert("filter_condition".into(), "{% if %}".into());
        let generator = ClarificationGenerator::new(config);
        let question = generator.generate(
            "only laptops",
            &detection(vec![AmbiguityReason::MissingSlot {
                slot: Slot::FilterCondition,
            }]),
            &[],
        );
        assert_eq!(question.question, "What condition should the results meet?");
    }
}
