//! Pattern-based entity extraction
//!
//! Every entity kind has its own independent rule set. Rules run over the
//! whole query; overlapping matches of the same kind keep the one with the
//! highest confidence, matches of different kinds are kept side by side.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};
use tracing::debug;

use scrapewise_core::{Comparator, Entity, EntityKind, EntityValue, Span};

type ValueParser = fn(&Captures<'_>) -> Option<(EntityValue, f32)>;

/// (kind, pattern, parser) in no particular order.
const RULES: &[(EntityKind, &str, ValueParser)] = &[
    (
        EntityKind::Price,
        r"(?i)\bbetween\s+\$?\s?(\d[\d,]*(?:\.\d+)?)\s*(?:dollars|usd)?\s+and\s+\$?\s?(\d[\d,]*(?:\.\d+)?)\s*(?:dollars|usd)?",
        parse_price_between,
    ),
    (
        EntityKind::Price,
        r"\$\s?(\d[\d,]*(?:\.\d+)?)\s*(?:-|to)\s*\$?\s?(\d[\d,]*(?:\.\d+)?)",
        parse_price_span,
    ),
    (
        EntityKind::Price,
        r"(?i)\b(under|below|less\s+than|cheaper\s+than|at\s+most|no\s+more\s+than|up\s+to|over|above|more\s+than|greater\s+than|at\s+least)\s+(?:\$\s?(\d[\d,]*(?:\.\d+)?)|(\d[\d,]*(?:\.\d+)?)\s*(?:dollars|usd|bucks)\b)",
        parse_price_bound,
    ),
    (
        EntityKind::Price,
        r"\$\s?(\d[\d,]*(?:\.\d+)?)",
        parse_price_exact,
    ),
    (
        EntityKind::Rating,
        r"(?i)\b(\d(?:\.\d)?)\s*\+\s*stars?\b",
        parse_rating_plus,
    ),
    (
        EntityKind::Rating,
        r"(?i)\b(at\s+least|above|over|more\s+than|below|under|less\s+than|at\s+most)\s+(\d(?:\.\d)?)\s*stars?\b",
        parse_rating_bound,
    ),
    (
        EntityKind::Rating,
        r"(?i)\brated\s+(?:at\s+least\s+)?(\d(?:\.\d)?)(?:\s*stars?)?",
        parse_rating_rated,
    ),
    (
        EntityKind::Rating,
        r"(?i)\b(\d(?:\.\d)?)[\s-]*stars?(\s+(?:and\s+up|and\s+above|or\s+more|or\s+higher|or\s+above))?",
        parse_rating_stars,
    ),
    (
        EntityKind::Date,
        r"(?i)\b(?:(since|after|from|before|until|by|on)\s+)?(\d{4}-\d{2}-\d{2})\b",
        parse_date_iso,
    ),
    (
        EntityKind::Date,
        r"(?i)\b(since|after|from|before|until)\s+((?:19|20)\d{2})\b",
        parse_date_year,
    ),
    (
        EntityKind::Quantity,
        r"(?i)\b(?:top|first|last|latest)\s+(\d{1,4})\b",
        parse_quantity_top,
    ),
    (
        EntityKind::Quantity,
        r"(?i)\b(\d{1,4})\s+(?:items|results|products|listings|entries|records|rows|articles|posts|jobs)\b",
        parse_quantity_count,
    ),
];

/// Nouns that name a field, mapped to the canonical field name.
const FIELD_NOUNS: &[(&str, &str)] = &[
    ("price", "price"),
    ("prices", "price"),
    ("cost", "price"),
    ("costs", "price"),
    ("title", "title"),
    ("titles", "title"),
    ("headline", "title"),
    ("headlines", "title"),
    ("name", "name"),
    ("names", "name"),
    ("rating", "rating"),
    ("ratings", "rating"),
    ("review", "review"),
    ("reviews", "review"),
    ("description", "description"),
    ("descriptions", "description"),
    ("image", "image"),
    ("images", "image"),
    ("photo", "image"),
    ("photos", "image"),
    ("link", "url"),
    ("links", "url"),
    ("url", "url"),
    ("urls", "url"),
    ("email", "email"),
    ("emails", "email"),
    ("phone", "phone"),
    ("phones", "phone"),
    ("address", "address"),
    ("addresses", "address"),
    ("author", "author"),
    ("authors", "author"),
    ("date", "date"),
    ("dates", "date"),
    ("sku", "sku"),
    ("skus", "sku"),
    ("brand", "brand"),
    ("brands", "brand"),
    ("category", "category"),
    ("categories", "category"),
    ("availability", "availability"),
    ("stock", "availability"),
    ("salary", "salary"),
    ("salaries", "salary"),
    ("location", "location"),
    ("locations", "location"),
    ("company", "company"),
    ("companies", "company"),
];

const BARE_FIELD_CONFIDENCE: f32 = 0.6;
const QUALIFIED_FIELD_CONFIDENCE: f32 = 0.9;

struct PatternRule {
    kind: EntityKind,
    regex: Regex,
    parse: ValueParser,
}

static PATTERN_RULES: LazyLock<Vec<PatternRule>> = LazyLock::new(|| {
    RULES
        .iter()
        .map(|(kind, pattern, parse)| PatternRule {
            kind: *kind,
            regex: Regex::new(pattern).expect("entity pattern is valid"),
            parse: *parse,
        })
        .collect()
});

static RE_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Za-z]+\b").unwrap());
static RE_QUANTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:all|every|each|top|first|latest|any)\b").unwrap());

/// Extracts typed entities from query text. Stateless; the compiled
/// patterns are shared statics, so extraction is a pure function of the
/// input.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntityExtractor;

impl EntityExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract entities, ordered by position in the text.
    pub fn extract(&self, text: &str) -> Vec<Entity> {
        let mut candidates: Vec<Entity> = Vec::new();

        for rule in PATTERN_RULES.iter() {
            for caps in rule.regex.captures_iter(text) {
                let Some(whole) = caps.get(0) else {
                    continue;
                };
                if let Some((value, confidence)) = (rule.parse)(&caps) {
                    candidates.push(
                        Entity::new(
                            rule.kind,
                            value,
                            Span::new(whole.start(), whole.end()),
                            whole.as_str().trim(),
                        )
                        .with_confidence(confidence),
                    );
                }
            }
        }

        let mut entities = keep_strongest(candidates);
        let fields = self.extract_fields(text, &entities);
        entities.extend(fields);
        entities.sort_by(|a, b| {
            a.span
                .start
                .cmp(&b.span.start)
                .then_with(|| a.kind.as_str().cmp(b.kind.as_str()))
        });

        debug!(count = entities.len(), "Extracted entities");
        entities
    }

    fn extract_fields(&self, text: &str, constraints: &[Entity]) -> Vec<Entity> {
        let mut fields: Vec<Entity> = RE_WORD
            .find_iter(text)
            .filter_map(|m| {
                let lowered = m.as_str().to_lowercase();
                FIELD_NOUNS
                    .iter()
                    .find(|(noun, _)| *noun == lowered)
                    .map(|(_, canonical)| {
                        Entity::field(*canonical, Span::new(m.start(), m.end()), m.as_str())
                    })
            })
            .collect();

        let distinct_fields = {
            let mut names: Vec<&str> = fields
                .iter()
                .filter_map(|f| f.value.field_name())
                .collect();
            names.sort_unstable();
            names.dedup();
            names.len()
        };
        let has_quantifier = RE_QUANTIFIER.is_match(text);
        let globally_qualified = !constraints.is_empty() || has_quantifier || distinct_fields > 1;

        for field in &mut fields {
            let qualified = globally_qualified || followed_by_qualifier(text, field.span.end);
            field.confidence = if qualified {
                QUALIFIED_FIELD_CONFIDENCE
            } else {
                BARE_FIELD_CONFIDENCE
            };
        }
        fields
    }
}

fn followed_by_qualifier(text: &str, end: usize) -> bool {
    let rest = text.get(end..).unwrap_or("").trim_start().to_lowercase();
    rest.starts_with("of ") || rest.starts_with("for ")
}

/// Same-kind overlaps keep the highest confidence (longer span on ties).
fn keep_strongest(mut candidates: Vec<Entity>) -> Vec<Entity> {
    candidates.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| b.span.len().cmp(&a.span.len()))
            .then_with(|| a.span.start.cmp(&b.span.start))
    });

    let mut kept: Vec<Entity> = Vec::new();
    for candidate in candidates {
        let clashes = kept
            .iter()
            .any(|k| k.kind == candidate.kind && k.span.overlaps(&candidate.span));
        if !clashes {
            kept.push(candidate);
        }
    }
    kept
}

fn parse_number(s: &str) -> Option<f64> {
    s.replace(',', "").parse().ok()
}

fn normalize_phrase(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn comparator_for(phrase: &str) -> Option<Comparator> {
    match normalize_phrase(phrase).as_str() {
        "under" | "below" | "less than" | "cheaper than" => Some(Comparator::Lt),
        "at most" | "no more than" | "up to" => Some(Comparator::Lte),
        "over" | "above" | "more than" | "greater than" => Some(Comparator::Gt),
        "at least" => Some(Comparator::Gte),
        _ => None,
    }
}

fn usd() -> Option<String> {
    Some("USD".to_string())
}

fn ordered_range(a: f64, b: f64) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}

fn parse_price_between(caps: &Captures<'_>) -> Option<(EntityValue, f32)> {
    let whole = caps.get(0)?.as_str().to_lowercase();
    // "between 2 and 4 stars" is not a price
    if !(whole.contains('$') || whole.contains("dollar") || whole.contains("usd")) {
        return None;
    }
    let (min, max) = ordered_range(parse_number(&caps[1])?, parse_number(&caps[2])?);
    Some((EntityValue::Range { min, max, unit: usd() }, 0.95))
}

fn parse_price_span(caps: &Captures<'_>) -> Option<(EntityValue, f32)> {
    let (min, max) = ordered_range(parse_number(&caps[1])?, parse_number(&caps[2])?);
    Some((EntityValue::Range { min, max, unit: usd() }, 0.9))
}

fn parse_price_bound(caps: &Captures<'_>) -> Option<(EntityValue, f32)> {
    let comparator = comparator_for(&caps[1])?;
    let amount = caps.get(2).or_else(|| caps.get(3))?;
    Some((
        EntityValue::Bound {
            comparator,
            value: parse_number(amount.as_str())?,
            unit: usd(),
        },
        0.95,
    ))
}

fn parse_price_exact(caps: &Captures<'_>) -> Option<(EntityValue, f32)> {
    Some((
        EntityValue::Bound {
            comparator: Comparator::Eq,
            value: parse_number(&caps[1])?,
            unit: usd(),
        },
        0.6,
    ))
}

fn rating_value(s: &str) -> Option<f64> {
    parse_number(s).filter(|v| (0.0..=10.0).contains(v))
}

fn rating(comparator: Comparator, value: f64) -> EntityValue {
    EntityValue::Bound {
        comparator,
        value,
        unit: Some("stars".to_string()),
    }
}

fn parse_rating_plus(caps: &Captures<'_>) -> Option<(EntityValue, f32)> {
    Some((rating(Comparator::Gte, rating_value(&caps[1])?), 0.95))
}

fn parse_rating_bound(caps: &Captures<'_>) -> Option<(EntityValue, f32)> {
    let comparator = comparator_for(&caps[1])?;
    Some((rating(comparator, rating_value(&caps[2])?), 0.95))
}

fn parse_rating_rated(caps: &Captures<'_>) -> Option<(EntityValue, f32)> {
    Some((rating(Comparator::Gte, rating_value(&caps[1])?), 0.85))
}

fn parse_rating_stars(caps: &Captures<'_>) -> Option<(EntityValue, f32)> {
    let value = rating_value(&caps[1])?;
    if caps.get(2).is_some() {
        Some((rating(Comparator::Gte, value), 0.9))
    } else {
        Some((rating(Comparator::Eq, value), 0.7))
    }
}

fn date_comparator(preposition: Option<&str>) -> Comparator {
    match preposition.map(|p| p.to_lowercase()).as_deref() {
        Some("since") | Some("from") => Comparator::Gte,
        Some("after") => Comparator::Gt,
        Some("before") => Comparator::Lt,
        Some("until") | Some("by") => Comparator::Lte,
        _ => Comparator::Eq,
    }
}

fn parse_date_iso(caps: &Captures<'_>) -> Option<(EntityValue, f32)> {
    let date = NaiveDate::parse_from_str(&caps[2], "%Y-%m-%d").ok()?;
    let preposition = caps.get(1).map(|m| m.as_str());
    let confidence = if preposition.is_some() { 0.95 } else { 0.8 };
    Some((
        EntityValue::Date {
            comparator: date_comparator(preposition),
            date,
        },
        confidence,
    ))
}

fn parse_date_year(caps: &Captures<'_>) -> Option<(EntityValue, f32)> {
    let year: i32 = caps[2].parse().ok()?;
    let preposition = caps[1].to_lowercase();
    let comparator = date_comparator(Some(&preposition));
    // A bare year stands for its first day going forward and its last day going back.
    let date = match comparator {
        Comparator::Gt | Comparator::Lte => NaiveDate::from_ymd_opt(year, 12, 31)?,
        _ => NaiveDate::from_ymd_opt(year, 1, 1)?,
    };
    Some((EntityValue::Date { comparator, date }, 0.85))
}

fn parse_quantity_top(caps: &Captures<'_>) -> Option<(EntityValue, f32)> {
    let value: u32 = caps[1].parse().ok()?;
    (value > 0).then_some((EntityValue::Count { value }, 0.9))
}

fn parse_quantity_count(caps: &Captures<'_>) -> Option<(EntityValue, f32)> {
    let value: u32 = caps[1].parse().ok()?;
    (value > 0).then_some((EntityValue::Count { value }, 0.8))
}
