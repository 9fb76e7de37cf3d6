use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use scrapewise_core::{ExtractedRecord, ExtractionConfig, FieldSpec, OutputType, StrategyKind};

use super::Strategy;
use crate::error::StrategyError;
use crate::profile::{ContentFormat, ContentProfile};
use crate::score::{StrategyOutput, coverage};
use crate::values::coerce_text;

/// Repeated classes tried as item containers, most frequent first
const MAX_CONTAINERS: usize = 8;

/// Finds repeated item containers (shared classes, microdata scopes) and
/// reads each field from the first descendant matching one of its hints.
#[derive(Debug, Default)]
pub struct StructuralSelector;

impl StructuralSelector {
    pub fn new() -> Self {
        Self
    }

    fn extract_records(
        &self,
        content: &str,
        profile: &ContentProfile,
        config: &ExtractionConfig,
    ) -> Vec<ExtractedRecord> {
        let document = Html::parse_document(content);
        let mut best: Option<(f32, Vec<ExtractedRecord>)> = None;

        for container in container_selectors(profile) {
            let Ok(selector) = Selector::parse(&container) else {
                continue;
            };
            let records: Vec<ExtractedRecord> = document
                .select(&selector)
                .filter_map(|item| read_record(item, config))
                .collect();
            let score = coverage(&records, config);
            debug!(container = %container, records = records.len(), score, "Container candidate");
            if best.as_ref().is_none_or(|(s, _)| score > *s) {
                best = Some((score, records));
            }
        }

        best.map(|(_, records)| records).unwrap_or_default()
    }
}

#[async_trait]
impl Strategy for StructuralSelector {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StructuralSelector
    }

    fn applicable(&self, profile: &ContentProfile) -> bool {
        profile.format == ContentFormat::Html
    }

    fn predict(&self, profile: &ContentProfile) -> f32 {
        if profile.has_repeated_structure() {
            0.8
        } else if profile.has_microdata() {
            0.7
        } else {
            0.3
        }
    }

    async fn extract(
        &self,
        content: &str,
        profile: &ContentProfile,
        config: &ExtractionConfig,
    ) -> Result<StrategyOutput, StrategyError> {
        if !self.applicable(profile) {
            return Err(StrategyError::Inapplicable(profile.format.as_str()));
        }
        let records = self.extract_records(content, profile, config);
        if records.is_empty() {
            return Err(StrategyError::NoMatch);
        }
        Ok(StrategyOutput::scored(records, config))
    }
}

fn container_selectors(profile: &ContentProfile) -> Vec<String> {
    let mut selectors = Vec::new();
    if profile.microdata_items > 0 {
        selectors.push("[itemscope]".to_string());
    }
    for (class, _) in profile.repeated_classes.iter().take(MAX_CONTAINERS) {
        if is_css_safe(class) {
            selectors.push(format!(".{}", class));
        }
    }
    selectors
}

fn read_record(item: ElementRef<'_>, config: &ExtractionConfig) -> Option<ExtractedRecord> {
    let mut record = ExtractedRecord::new();
    for field in &config.fields {
        if let Some(value) = read_field(item, field) {
            record.insert(field.name.clone(), value);
        }
    }
    (!record.is_empty()).then_some(record)
}

fn read_field(item: ElementRef<'_>, field: &FieldSpec) -> Option<serde_json::Value> {
    let mut candidates: Vec<String> = field
        .hints()
        .flat_map(hint_selectors)
        .collect();
    if field.output_type == OutputType::Url {
        candidates.push(if field.name == "image" {
            "img[src]".to_string()
        } else {
            "a[href]".to_string()
        });
    }

    candidates.iter().find_map(|source| {
        let selector = Selector::parse(source).ok()?;
        item.select(&selector)
            .find_map(|el| coerce_text(field.output_type, &element_value(el, field.output_type)))
    })
}

/// Selectors for one hint: microdata property, exact class, class fragment.
fn hint_selectors(hint: &str) -> Vec<String> {
    let mut selectors = Vec::new();
    if let Some(prop) = hint.rsplit('.').next().filter(|p| is_css_safe(p)) {
        selectors.push(format!("[itemprop=\"{}\"]", prop));
    }
    let slug = hint.trim().to_lowercase().replace([' ', '_'], "-");
    if !slug.is_empty() && is_css_safe(&slug) {
        selectors.push(format!(".{}", slug));
        selectors.push(format!("[class*=\"{}\"]", slug));
    }
    selectors
}

fn element_value(el: ElementRef<'_>, output_type: OutputType) -> String {
    let element = el.value();
    let attrs: &[&str] = match output_type {
        OutputType::Url => &["href", "src", "content"],
        OutputType::Date => &["datetime", "content"],
        _ => &["content"],
    };
    if let Some(value) = attrs.iter().find_map(|a| element.attr(a)) {
        return value.to_string();
    }
    el.text().collect::<Vec<_>>().join(" ")
}

fn is_css_safe(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit())
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
