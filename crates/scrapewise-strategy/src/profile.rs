//! Content profiling and content-shape signatures

use std::collections::{BTreeMap, BTreeSet};

use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use scrapewise_core::ContentSignature;

/// Minimum elements sharing a class before it counts as a repeated item
const MIN_REPEAT: usize = 3;
const SKELETON_DEPTH: usize = 6;
const SIGNATURE_CLASSES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    Html,
    Json,
    Text,
}

impl ContentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural summary of fetched content.
///
/// Drives strategy applicability, predicted confidence, and the
/// content-shape signature. Two pages built from the same template share a
/// signature even when their item counts and text differ.
#[derive(Debug, Clone)]
pub struct ContentProfile {
    pub format: ContentFormat,
    pub json_ld_blocks: usize,
    pub microdata_items: usize,
    pub microdata_props: usize,
    /// Classes shared by several elements, most frequent first
    pub repeated_classes: Vec<(String, usize)>,
    /// Arrays whose elements are objects, for JSON content
    pub object_arrays: usize,
    pub text_length: usize,
    skeleton: BTreeSet<String>,
}

impl ContentProfile {
    pub fn analyze(content: &str) -> Self {
        let trimmed = content.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(value) = serde_json::from_str::<Value>(content) {
                return Self::from_json(&value, content.len());
            }
        }
        if looks_like_html(trimmed) {
            return Self::from_html(content);
        }
        Self::from_text(content)
    }

    fn empty(format: ContentFormat, text_length: usize) -> Self {
        Self {
            format,
            json_ld_blocks: 0,
            microdata_items: 0,
            microdata_props: 0,
            repeated_classes: Vec::new(),
            object_arrays: 0,
            text_length,
            skeleton: BTreeSet::new(),
        }
    }

    fn from_html(content: &str) -> Self {
        let document = Html::parse_document(content);
        let mut profile = Self::empty(ContentFormat::Html, 0);
        let mut class_counts: BTreeMap<String, usize> = BTreeMap::new();

        for node in document.root_element().descendants() {
            let Some(el) = ElementRef::wrap(node) else {
                continue;
            };
            let element = el.value();
            if element.name() == "script"
                && element
                    .attr("type")
                    .is_some_and(|t| t.eq_ignore_ascii_case("application/ld+json"))
            {
                profile.json_ld_blocks += 1;
            }
            if element.attr("itemscope").is_some() {
                profile.microdata_items += 1;
            }
            if element.attr("itemprop").is_some() {
                profile.microdata_props += 1;
            }
            for class in element.classes() {
                *class_counts.entry(class.to_string()).or_default() += 1;
            }

            let depth = el.ancestors().count();
            if depth <= SKELETON_DEPTH {
                profile
                    .skeleton
                    .insert(format!("{}:{}", depth, element.name()));
            }
        }

        let mut repeated: Vec<(String, usize)> = class_counts
            .into_iter()
            .filter(|(_, count)| *count >= MIN_REPEAT)
            .collect();
        repeated.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        for (class, _) in repeated.iter().take(SIGNATURE_CLASSES) {
            profile.skeleton.insert(format!(".{}", class));
        }
        profile.repeated_classes = repeated;
        profile.text_length = document.root_element().text().map(str::len).sum();
        profile
    }

    fn from_json(value: &Value, text_length: usize) -> Self {
        let mut profile = Self::empty(ContentFormat::Json, text_length);
        walk_json(value, "$", 0, &mut profile);
        profile
    }

    fn from_text(content: &str) -> Self {
        let mut profile = Self::empty(ContentFormat::Text, content.len());
        for line in content.lines() {
            if let Some((label, _)) = line.trim().split_once(':') {
                let label = label.trim();
                if !label.is_empty()
                    && label.len() <= 30
                    && label.chars().all(|c| c.is_alphabetic() || c == ' ')
                {
                    profile
                        .skeleton
                        .insert(format!("label:{}", label.to_lowercase()));
                }
            }
        }
        profile
    }

    pub fn has_json_ld(&self) -> bool {
        self.json_ld_blocks > 0
    }

    pub fn has_microdata(&self) -> bool {
        self.microdata_props > 0
    }

    pub fn has_repeated_structure(&self) -> bool {
        !self.repeated_classes.is_empty() || self.microdata_items > 1
    }

    /// Content-shape signature: format plus a hash of the structural
    /// skeleton, never the text itself.
    pub fn signature(&self) -> ContentSignature {
        let mut hasher = Sha256::new();
        hasher.update(self.format.as_str().as_bytes());
        for part in &self.skeleton {
            hasher.update(b"\n");
            hasher.update(part.as_bytes());
        }
        let digest = format!("{:x}", hasher.finalize());
        ContentSignature::new(format!("{}:{}", self.format, &digest[..16]))
    }
}

/// Signature for fetchers that do not compute their own.
pub fn compute_signature(content: &str) -> ContentSignature {
    ContentProfile::analyze(content).signature()
}

fn looks_like_html(trimmed: &str) -> bool {
    if !trimmed.contains('<') {
        return false;
    }
    let lower = trimmed.to_ascii_lowercase();
    ["<html", "<body", "<div", "<ul", "<li", "<table", "<article", "<span", "<p>", "<!doctype"]
        .iter()
        .any(|tag| lower.contains(tag))
}

fn walk_json(value: &Value, path: &str, depth: usize, profile: &mut ContentProfile) {
    if depth > 4 {
        return;
    }
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = format!("{}.{}", path, key);
                profile.skeleton.insert(child_path.clone());
                walk_json(child, &child_path, depth + 1, profile);
            }
        }
        Value::Array(items) => {
            if items.iter().any(Value::is_object) {
                profile.object_arrays += 1;
            }
            // Elements share one path so item counts do not change the shape.
            let child_path = format!("{}[]", path);
            for child in items.iter().take(3) {
                walk_json(child, &child_path, depth + 1, profile);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(items: &[(&str, &str)]) -> String {
        let body: String = items
            .iter()
            .map(|(name, price)| {
                format!(
                    r#"<li class="product"><span class="title">{}</span><span class="price">{}</span></li>"#,
                    name, price
                )
            })
            .collect();
        format!("<html><body><ul class=\"grid\">{}</ul></body></html>", body)
    }

    #[test]
    fn test_html_profile() {
        let html = listing(&[("A", "$10"), ("B", "$20"), ("C", "$30")]);
        let profile = ContentProfile::analyze(&html);
        assert_eq!(profile.format, ContentFormat::Html);
        assert!(profile.has_repeated_structure());
        assert_eq!(profile.repeated_classes[0].1, 3);
        assert!(!profile.has_json_ld());
    }

    #[test]
    fn test_signature_ignores_text_and_item_count() {
        let a = listing(&[("A", "$10"), ("B", "$20"), ("C", "$30")]);
        let b = listing(&[("X", "$1"), ("Y", "$2"), ("Z", "$3"), ("W", "$4")]);
        assert_eq!(compute_signature(&a), compute_signature(&b));
        assert!(compute_signature(&a).as_str().starts_with("html:"));
    }

    #[test]
    fn test_json_ld_and_microdata() {
        let html = r#"<html><head><script type="application/ld+json">{"@type":"Product","name":"A"}</script></head>
<body><div itemscope><span itemprop="name">A</span></div></body></html>"#;
        let profile = ContentProfile::analyze(html);
        assert_eq!(profile.json_ld_blocks, 1);
        assert!(profile.has_microdata());
    }

    #[test]
    fn test_json_profile() {
        let profile = ContentProfile::analyze(r#"{"items":[{"name":"A","price":1},{"name":"B","price":2}]}"#);
        assert_eq!(profile.format, ContentFormat::Json);
        assert_eq!(profile.object_arrays, 1);

        let longer = compute_signature(
            r#"{"items":[{"name":"A","price":1},{"name":"B","price":2},{"name":"C","price":3}]}"#,
        );
        assert_eq!(profile.signature(), longer);
    }

    #[test]
    fn test_text_profile() {
        let profile = ContentProfile::analyze("Title: Lamp\nPrice: $30\n\nTitle: Desk\nPrice: $120\n");
        assert_eq!(profile.format, ContentFormat::Text);
        assert_ne!(
            profile.signature(),
            ContentProfile::analyze("Name: Lamp\nCost: $30").signature()
        );
    }

    #[test]
    fn test_invalid_json_falls_through() {
        let profile = ContentProfile::analyze("{ not json at all");
        assert_eq!(profile.format, ContentFormat::Text);
    }
}
