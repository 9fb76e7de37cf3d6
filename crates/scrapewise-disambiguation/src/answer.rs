//! Reading a reply as the answer to a pending clarification

use scrapewise_conversation::PendingClarification;
use scrapewise_core::{Entity, EntityKind, Slot, Span};

/// A reply folded into the turn that asked for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClarificationAnswer {
    /// The pending text followed by the reply
    pub text: String,
    pub entities: Vec<Entity>,
}

impl ClarificationAnswer {
    /// Combine `reply` with `pending`.
    ///
    /// Field mentions are extracted over the combined text, so a quantifier in
    /// either half qualifies them. Constraints are carried over from the
    /// pending interpretation rather than re-extracted. When the pending turn
    /// asked about a constraint kind and the reply names that kind, the
    /// reply's values replace the pending ones.
    pub fn fold(
        pending: &PendingClarification,
        reply: &str,
        reply_entities: &[Entity],
        extract: impl Fn(&str) -> Vec<Entity>,
    ) -> Self {
        let text = format!("{} {}", pending.text, reply);
        let offset = pending.text.len() + 1;

        let replaced: Vec<EntityKind> = pending
            .unresolved
            .iter()
            .filter_map(|slot| match slot {
                Slot::Constraint(kind) => Some(*kind),
                _ => None,
            })
            .filter(|kind| reply_entities.iter().any(|e| e.kind == *kind))
            .collect();

        let mut entities: Vec<Entity> = extract(&text)
            .into_iter()
            .filter(|e| e.kind == EntityKind::ContentKind)
            .collect();
        entities.extend(
            pending
                .entities
                .iter()
                .filter(|e| e.kind != EntityKind::ContentKind && !replaced.contains(&e.kind))
                .cloned(),
        );
        entities.extend(
            reply_entities
                .iter()
                .filter(|e| e.kind != EntityKind::ContentKind)
                .map(|e| {
                    let mut shifted = e.clone();
                    shifted.span = Span::new(e.span.start + offset, e.span.end + offset);
                    shifted
                }),
        );
        entities.sort_by(|a, b| {
            a.span
                .start
                .cmp(&b.span.start)
                .then_with(|| a.kind.as_str().cmp(b.kind.as_str()))
        });

        Self { text, entities }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scrapewise_core::{Comparator, EntityValue, Intent, IntentSource, OperationType};

    fn bound(value: f64, at: usize) -> Entity {
        Entity::new(
            EntityKind::Price,
            EntityValue::Bound {
                comparator: Comparator::Lt,
                value,
                unit: None,
            },
            Span::new(at, at + 9),
            format!("under ${}", value),
        )
        .with_confidence(0.95)
    }

    fn field(at: usize, confidence: f32) -> Entity {
        Entity::field("price", Span::new(at, at + 6), "prices").with_confidence(confidence)
    }

    fn pending(text: &str, entities: Vec<Entity>, unresolved: Vec<Slot>) -> PendingClarification {
        PendingClarification {
            text: text.to_string(),
            intent: Intent::new(OperationType::Extract, 0.8, IntentSource::Pattern),
            entities,
            unresolved,
            question: "Which one?".into(),
            asked_at: Utc::now(),
        }
    }

    #[test]
    fn test_reply_replaces_conflicting_constraint() {
        let pending = pending(
            "get all prices under $50 or under $30",
            vec![field(8, 0.9), bound(50.0, 15), bound(30.0, 28)],
            vec![Slot::Constraint(EntityKind::Price)],
        );
        let answer = ClarificationAnswer::fold(&pending, "only under $30", &[bound(30.0, 5)], |_| {
            vec![field(8, 0.9), bound(50.0, 15), bound(30.0, 28), bound(30.0, 43)]
        });

        assert_eq!(answer.text, "get all prices under $50 or under $30 only under $30");
        let prices: Vec<&Entity> = answer
            .entities
            .iter()
            .filter(|e| e.kind == EntityKind::Price)
            .collect();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].span.start, 43);
        assert_eq!(answer.entities.len(), 2);
    }

    #[test]
    fn test_reply_without_that_kind_keeps_pending_constraints() {
        let pending = pending(
            "get the prices under $50",
            vec![field(8, 0.6), bound(50.0, 15)],
            vec![Slot::TargetField],
        );
        let answer = ClarificationAnswer::fold(&pending, "all of them", &[], |_| {
            vec![field(8, 0.9), bound(50.0, 15)]
        });

        assert_eq!(answer.entities, vec![field(8, 0.9), bound(50.0, 15)]);
    }
}
