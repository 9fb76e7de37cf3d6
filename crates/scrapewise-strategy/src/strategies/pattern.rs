use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use scrapewise_core::{ExtractedRecord, ExtractionConfig, FieldSpec, OutputType, StrategyKind};

use super::{Strategy, key_form};
use crate::error::StrategyError;
use crate::profile::{ContentFormat, ContentProfile};
use crate::score::StrategyOutput;
use crate::values::coerce_text;

static SCRIPT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script\s*>").ok());
static STYLE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b.*?</style\s*>").ok());
static BLOCK_END: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)</(?:li|tr|article|section)\s*>").ok());
static LINE_END: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(?:p|div|h[1-6]|dt|dd|td|th|ul|ol|table)\s*>").ok()
});
static TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]*>").ok());
static BLANK_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\n[ \t]*\n").ok());

static CURRENCY: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\$\s?\d[\d,]*(?:\.\d+)?|\d[\d,]*(?:\.\d+)?\s?(?:usd|dollars)\b").ok()
});
static RATING: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*(?:/\s*(?:5|10)\b|out of (?:5|10)\b|stars?\b|★)").ok()
});
static DATE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"\b\d{4}-\d{2}-\d{2}\b|\b(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.? \d{1,2}, \d{4}\b",
    )
    .ok()
});
static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[\w.+-]+@[\w-]+(?:\.[\w-]+)+").ok());
static PHONE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\+?\(?\d[\d\s().-]{6,}\d").ok());
static URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>]+"#).ok());

/// Fields whose value is usually the leading line of an item
const LEADING_TEXT_FIELDS: &[&str] = &["title", "name", "headline"];

/// Reads fields from visible text: "Label: value" lines first, then typed
/// value patterns (prices, ratings, dates, contacts) within each text block.
#[derive(Debug, Default)]
pub struct PatternMatch;

impl PatternMatch {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Strategy for PatternMatch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PatternMatch
    }

    fn applicable(&self, profile: &ContentProfile) -> bool {
        profile.format != ContentFormat::Json
    }

    fn predict(&self, profile: &ContentProfile) -> f32 {
        match profile.format {
            ContentFormat::Text => 0.7,
            ContentFormat::Html => 0.5,
            ContentFormat::Json => 0.1,
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

        let text = match profile.format {
            ContentFormat::Html => visible_text(content),
            _ => content.to_string(),
        };
        let records: Vec<ExtractedRecord> = blocks(&text)
            .iter()
            .filter_map(|block| read_block(block, config))
            .collect();
        if records.is_empty() {
            return Err(StrategyError::NoMatch);
        }
        Ok(StrategyOutput::scored(records, config))
    }
}

/// Visible text of an HTML document, with blank lines between list items,
/// rows and articles.
pub fn visible_text(html: &str) -> String {
    let mut text = html.to_string();
    for (re, replacement) in [
        (&SCRIPT, " "),
        (&STYLE, " "),
        (&BLOCK_END, "\n\n"),
        (&LINE_END, "\n"),
        (&TAG, " "),
    ] {
        if let Some(re) = re.as_ref() {
            text = re.replace_all(&text, replacement).into_owned();
        }
    }
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

fn blocks(text: &str) -> Vec<Vec<String>> {
    let parts: Vec<&str> = match BLANK_LINE.as_ref() {
        Some(re) => re.split(text).collect(),
        None => vec![text],
    };
    parts
        .into_iter()
        .map(|part| {
            part.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|lines| !lines.is_empty())
        .collect()
}

fn read_block(lines: &[String], config: &ExtractionConfig) -> Option<ExtractedRecord> {
    let mut record = ExtractedRecord::new();
    let mut anchored = false;

    for field in &config.fields {
        if let Some(value) = labelled_value(lines, field).or_else(|| typed_value(lines, field)) {
            record.insert(field.name.clone(), value);
            anchored = true;
        }
    }
    for field in &config.fields {
        if !record.contains_key(&field.name) {
            if let Some(value) = leading_text(lines, field) {
                record.insert(field.name.clone(), value);
            }
        }
    }

    let text_only = config.fields.iter().all(|f| f.output_type == OutputType::Text);
    ((anchored || text_only) && !record.is_empty()).then_some(record)
}

fn labelled_value(lines: &[String], field: &FieldSpec) -> Option<Value> {
    field.hints().find_map(|hint| {
        let wanted = key_form(hint);
        lines.iter().find_map(|line| {
            let (label, rest) = line.split_once(':')?;
            (key_form(label) == wanted)
                .then(|| coerce_text(field.output_type, rest))
                .flatten()
        })
    })
}

fn typed_value(lines: &[String], field: &FieldSpec) -> Option<Value> {
    let re = match field.output_type {
        OutputType::Currency => &CURRENCY,
        OutputType::Rating => &RATING,
        OutputType::Date => &DATE,
        OutputType::Email => &EMAIL,
        OutputType::Phone => &PHONE,
        OutputType::Url => &URL,
        OutputType::Number | OutputType::Text => return None,
    };
    let re = re.as_ref()?;
    lines.iter().find_map(|line| {
        let caps = re.captures(line)?;
        let m = caps.get(1).or_else(|| caps.get(0))?;
        coerce_text(field.output_type, m.as_str())
    })
}

fn leading_text(lines: &[String], field: &FieldSpec) -> Option<Value> {
    if field.output_type != OutputType::Text || !LEADING_TEXT_FIELDS.contains(&field.name.as_str()) {
        return None;
    }
    let line = lines.first()?;
    if line.contains(':') {
        return None;
    }
    let mut text = line.clone();
    for re in [&CURRENCY, &RATING].into_iter().filter_map(|re| re.as_ref()) {
        text = re.replace_all(&text, " ").into_owned();
    }
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '|');
    coerce_text(OutputType::Text, text).filter(|v| v.as_str().is_some_and(|s| s.chars().any(char::is_alphabetic)))
}
