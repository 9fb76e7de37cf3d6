//! Conditional fallback phrases: "if the price is missing, check the sale price"

use std::ops::Range;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

const MISSING: &str = r"(?:missing|empty|absent|blank|unavailable|not\s+(?:found|available|listed|shown|there))";
const ACTION: &str = r"(?:check|try|use|grab|take|look\s+(?:at|for)|fall\s*back\s+to)";
const PHRASE: &str = r"[a-z][a-z _-]*?";
const END: &str = r"(?:\s*[.,;!?]|\s+and\b|\s+then\b|\s+instead\b|\s+field\b|$)";

/// Words that point back at the field of the previous rule
const BACK_REFERENCES: &[&str] = &["that", "it", "this", "those", "they", "these", "that one"];

/// One "if `field` is missing, use `hint`" instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackRule {
    /// Normalized field the rule applies to
    pub field: String,
    /// Alternative hint to try when the field is missing
    pub hint: String,
}

struct FallbackPattern {
    regex: Regex,
    /// Capture group index of the primary field and of the fallback hint
    primary: usize,
    fallback: usize,
}

/// Parses conditional fallback language into ordered per-field rules.
pub struct ConditionParser {
    patterns: Vec<FallbackPattern>,
}

impl ConditionParser {
    pub fn new() -> Self {
        let sources = [
            // if X is missing, check Y
            (
                format!(
                    r"\bif\s+(?:the\s+)?({p})\s+(?:is|are)\s+{m}\s*,?\s*(?:then\s+)?{a}\s+(?:the\s+)?({p}){e}",
                    p = PHRASE,
                    m = MISSING,
                    a = ACTION,
                    e = END
                ),
                1,
                2,
            ),
            // use Y if X is missing
            (
                format!(
                    r"\b{a}\s+(?:the\s+)?({p})\s+(?:if|when|where)\s+(?:the\s+)?({p})\s+(?:is|are)\s+{m}",
                    p = PHRASE,
                    m = MISSING,
                    a = ACTION
                ),
                2,
                1,
            ),
            // X, otherwise Y
            (
                format!(
                    r"\b([a-z]+)\s*,?\s+(?:otherwise|or\s+else|else|falling\s+back\s+to)\s+(?:the\s+)?({p}){e}",
                    p = PHRASE,
                    e = END
                ),
                1,
                2,
            ),
        ];

        let patterns = sources
            .into_iter()
            .filter_map(|(source, primary, fallback)| {
                match Regex::new(&format!("(?i){}", source)) {
                    Ok(regex) => Some(FallbackPattern {
                        regex,
                        primary,
                        fallback,
                    }),
                    Err(e) => {
                        warn!(error = %e, "Invalid fallback pattern");
                        None
                    }
                }
            })
            .collect();

        Self { patterns }
    }

    /// All rules in `text`, in order of appearance. Back references such as
    /// "and if that is missing, use Z" attach to the previous rule's field.
    pub fn parse(&self, text: &str) -> Vec<FallbackRule> {
        // Earlier patterns win where matches overlap.
        let mut found: Vec<(Range<usize>, String, String)> = Vec::new();
        for pattern in &self.patterns {
            for caps in pattern.regex.captures_iter(text) {
                let (Some(whole), Some(primary), Some(fallback)) = (
                    caps.get(0),
                    caps.get(pattern.primary),
                    caps.get(pattern.fallback),
                ) else {
                    continue;
                };
                let span = whole.range();
                if found
                    .iter()
                    .any(|(other, _, _)| span.start < other.end && other.start < span.end)
                {
                    continue;
                }
                found.push((
                    span,
                    normalize(primary.as_str()),
                    normalize(fallback.as_str()),
                ));
            }
        }
        found.sort_by_key(|(span, _, _)| span.start);

        let mut rules: Vec<FallbackRule> = Vec::new();
        for (_, primary, hint) in found {
            let field = if BACK_REFERENCES.contains(&primary.as_str()) {
                match rules.last() {
                    Some(previous) => previous.field.clone(),
                    None => continue,
                }
            } else {
                singular(&primary)
            };
            if hint.is_empty() || hint == field {
                continue;
            }
            let rule = FallbackRule { field, hint };
            if !rules.contains(&rule) {
                rules.push(rule);
            }
        }
        rules
    }
}

impl Default for ConditionParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase, collapse whitespace.
pub(crate) fn normalize(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Naive plural folding so "prices" matches the `price` field.
pub(crate) fn singular(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    if word.ends_with("ss") || word.ends_with("us") {
        return word.to_string();
    }
    word.strip_suffix('s').unwrap_or(word).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(field: &str, hint: &str) -> FallbackRule {
        FallbackRule {
            field: field.into(),
            hint: hint.into(),
        }
    }

    #[test]
    fn test_if_missing_check() {
        let parser = ConditionParser::new();
        let rules = parser.parse("get prices; if the price is missing, check the sale price.");
        assert_eq!(rules, vec![rule("price", "sale price")]);
    }

    #[test]
    fn test_chained_back_reference() {
        let parser = ConditionParser::new();
        let rules = parser.parse(
            "list prices, if price is missing try sale price and if that is missing use list price",
        );
        assert_eq!(
            rules,
            vec![rule("price", "sale price"), rule("price", "list price")]
        );
    }

    #[test]
    fn test_reversed_form() {
        let parser = ConditionParser::new();
        let rules = parser.parse("get titles and use the headline when the title is empty");
        assert_eq!(rules, vec![rule("title", "headline")]);
    }

    #[test]
    fn test_otherwise_form() {
        let parser = ConditionParser::new();
        let rules = parser.parse("extract the images, otherwise thumbnail");
        assert_eq!(rules, vec![rule("image", "thumbnail")]);
    }

    #[test]
    fn test_plain_request_has_no_rules() {
        let parser = ConditionParser::new();
        assert!(parser.parse("get all prices under $50").is_empty());
        assert!(parser.parse("").is_empty());
    }

    #[test]
    fn test_dangling_back_reference_is_dropped() {
        let parser = ConditionParser::new();
        assert!(parser.parse("if that is missing use sku").is_empty());
    }

    #[test]
    fn test_singular() {
        assert_eq!(singular("prices"), "price");
        assert_eq!(singular("categories"), "category");
        assert_eq!(singular("address"), "address");
        assert_eq!(singular("status"), "status");
    }
}
