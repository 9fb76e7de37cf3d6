//! Extraction config compilation

use std::collections::BTreeMap;

use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use scrapewise_core::{
    Constraint, Entity, EntityKind, EntityValue, ExtractionConfig, FieldSpec, Intent, OutputType,
};

use crate::conditions::{ConditionParser, FallbackRule, normalize, singular};
use crate::config::PlanningConfig;
use crate::error::PlanError;
use crate::templates::TemplateRegistry;

/// Hints tried after any user-stated fallbacks, per field name
const BUILTIN_ALIASES: &[(&str, &[&str])] = &[
    ("price", &["sale price", "offers.price", "amount"]),
    ("title", &["name", "headline"]),
    ("name", &["title"]),
    ("rating", &["aggregateRating.ratingValue", "stars"]),
    ("date", &["datePublished", "published"]),
    ("image", &["thumbnail", "img"]),
    ("url", &["link", "href"]),
    ("description", &["summary"]),
    ("author", &["byline"]),
    ("review", &["reviewCount"]),
];

pub struct ExtractionConfigBuilder {
    templates: TemplateRegistry,
    aliases: BTreeMap<String, Vec<String>>,
    conditions: ConditionParser,
}

impl ExtractionConfigBuilder {
    pub fn new(config: &PlanningConfig) -> Self {
        Self {
            templates: TemplateRegistry::from_config(config),
            aliases: config.field_aliases.clone(),
            conditions: ConditionParser::new(),
        }
    }

    pub fn with_templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = templates;
        self
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    /// Compile a resolved intent into an extraction plan.
    ///
    /// `history` holds the text of the turns that produced the intent, oldest
    /// first; conditional fallbacks stated in any of them apply. The same
    /// inputs always yield the same plan.
    pub fn build(
        &self,
        intent: &Intent,
        entities: &[Entity],
        history: &[&str],
    ) -> Result<ExtractionConfig, PlanError> {
        let template = self.templates.get(intent.operation).ok_or_else(|| {
            info!(operation = %intent.operation, "No extraction template for operation");
            PlanError::NoTemplate(intent.operation)
        })?;

        let mut names = requested_fields(intent, entities);
        let filters = constraint_filters(entities);
        for (name, _) in &filters {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        if names.is_empty() {
            return Err(PlanError::NoFields);
        }

        let rules: Vec<FallbackRule> = history
            .iter()
            .flat_map(|text| self.conditions.parse(text))
            .collect();

        let fields: Vec<FieldSpec> = names
            .iter()
            .map(|name| {
                let mut field = FieldSpec::new(name.clone(), output_type_for(name));
                field.fallback_chain = self.fallback_chain(name, &rules);
                field.filter = filters
                    .iter()
                    .find(|(field_name, _)| field_name == name)
                    .map(|(_, constraint)| constraint.clone());
                field
            })
            .collect();

        let config = ExtractionConfig {
            operation: intent.operation,
            output: template.output_for(&fields),
            limit: requested_limit(entities),
            fields,
        };

        debug!(
            operation = %config.operation,
            fields = ?config.field_names(),
            fingerprint = %config.fingerprint(),
            "Extraction config built"
        );
        Ok(config)
    }

    /// Stable hash of everything [`build`](Self::build) reads. Together with a
    /// content signature it keys the plan cache, so a request phrased the same
    /// way against a page of the same shape reuses the stored plan.
    pub fn request_key(intent: &Intent, entities: &[Entity], history: &[&str]) -> String {
        let entities: Vec<serde_json::Value> = entities
            .iter()
            .map(|e| json!([e.kind, e.value, e.confidence]))
            .collect();
        let canonical = json!({
            "operation": intent.operation,
            "targets": intent.targets,
            "entities": entities,
            "history": history,
        });
        let digest = Sha256::digest(canonical.to_string().as_bytes());
        format!("{:x}", digest)[..16].to_string()
    }

    /// User-stated fallbacks first, then built-in aliases, then configured
    /// ones. Never contains the primary hint itself or duplicates.
    fn fallback_chain(&self, name: &str, rules: &[FallbackRule]) -> Vec<String> {
        let stated = rules
            .iter()
            .filter(|rule| rule.field == name)
            .map(|rule| rule.hint.clone());
        let builtin = BUILTIN_ALIASES
            .iter()
            .filter(|(field, _)| *field == name)
            .flat_map(|(_, hints)| hints.iter().map(|h| h.to_string()));
        let configured = self.aliases.get(name).into_iter().flatten().cloned();

        let mut chain: Vec<String> = Vec::new();
        for hint in stated.chain(builtin).chain(configured) {
            if hint != name && !chain.contains(&hint) {
                chain.push(hint);
            }
        }
        chain
    }
}

impl Default for ExtractionConfigBuilder {
    fn default() -> Self {
        Self::new(&PlanningConfig::default())
    }
}

/// Field names in order of first mention, then model-provided targets.
fn requested_fields(intent: &Intent, entities: &[Entity]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mentioned = entities
        .iter()
        .filter(|e| e.kind == EntityKind::ContentKind)
        .filter_map(|e| e.value.field_name().map(str::to_string));
    let targeted = intent.targets.iter().map(|t| singular(&normalize(t)));

    for name in mentioned.chain(targeted) {
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Strongest constraint per constrained field; ties go to the earliest
/// mention.
fn constraint_filters(entities: &[Entity]) -> Vec<(&'static str, Constraint)> {
    let mut best: Vec<(&'static str, &Entity)> = Vec::new();
    for entity in entities {
        let Some(field) = constrained_field(entity.kind) else {
            continue;
        };
        match best.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) if entity.confidence > slot.1.confidence => slot.1 = entity,
            Some(_) => {}
            None => best.push((field, entity)),
        }
    }

    best.into_iter()
        .filter_map(|(field, entity)| {
            Constraint::from_entity_value(&entity.value).map(|c| (field, c))
        })
        .collect()
}

fn constrained_field(kind: EntityKind) -> Option<&'static str> {
    match kind {
        EntityKind::Price => Some("price"),
        EntityKind::Rating => Some("rating"),
        EntityKind::Date => Some("date"),
        EntityKind::Quantity | EntityKind::ContentKind => None,
    }
}

fn requested_limit(entities: &[Entity]) -> Option<u32> {
    let mut best: Option<&Entity> = None;
    for entity in entities.iter().filter(|e| e.kind == EntityKind::Quantity) {
        if best.is_none_or(|b| entity.confidence > b.confidence) {
            best = Some(entity);
        }
    }
    match best?.value {
        EntityValue::Count { value } => Some(value),
        _ => None,
    }
}

fn output_type_for(name: &str) -> OutputType {
    match name {
        "price" | "cost" | "amount" | "salary" | "fee" => OutputType::Currency,
        "rating" | "score" | "stars" => OutputType::Rating,
        "date" | "published" | "updated" => OutputType::Date,
        "url" | "link" | "image" | "href" => OutputType::Url,
        "email" => OutputType::Email,
        "phone" => OutputType::Phone,
        "review" | "count" | "quantity" => OutputType::Number,
        _ => OutputType::Text,
    }
}
