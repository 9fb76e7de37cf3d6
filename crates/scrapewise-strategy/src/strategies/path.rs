use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::{Map, Value};

use scrapewise_core::{ExtractedRecord, ExtractionConfig, FieldSpec, StrategyKind};

use super::{Strategy, key_form};
use crate::error::StrategyError;
use crate::profile::{ContentFormat, ContentProfile};
use crate::score::{StrategyOutput, coverage};
use crate::values::coerce_value;

const MAX_DEPTH: usize = 8;

/// Reads fields by key path from JSON documents or embedded JSON-LD blocks.
///
/// Hints are matched against keys loosely ("sale price" finds `salePrice`
/// and `sale_price`); dotted hints such as `offers.price` walk nested
/// objects.
#[derive(Debug, Default)]
pub struct PathQuery;

impl PathQuery {
    pub fn new() -> Self {
        Self
    }

    fn documents(&self, content: &str, profile: &ContentProfile) -> Vec<Value> {
        match profile.format {
            ContentFormat::Json => serde_json::from_str(content).into_iter().collect(),
            ContentFormat::Html => json_ld_blocks(content),
            ContentFormat::Text => Vec::new(),
        }
    }
}

#[async_trait]
impl Strategy for PathQuery {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PathQuery
    }

    fn applicable(&self, profile: &ContentProfile) -> bool {
        profile.format == ContentFormat::Json || profile.has_json_ld()
    }

    fn predict(&self, profile: &ContentProfile) -> f32 {
        match profile.format {
            ContentFormat::Json if profile.object_arrays > 0 => 0.85,
            ContentFormat::Json => 0.7,
            _ if profile.has_json_ld() => 0.75,
            _ => 0.1,
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

        let documents = self.documents(content, profile);
        let mut lists: Vec<Vec<&Value>> = Vec::new();
        for document in &documents {
            collect_object_arrays(document, 0, &mut lists);
        }
        // JSON-LD items often sit one per block rather than in an array.
        let singles: Vec<&Value> = documents.iter().filter(|d| d.is_object()).collect();
        if !singles.is_empty() {
            lists.push(singles);
        }

        let mut best: Option<(f32, Vec<ExtractedRecord>)> = None;
        for items in lists {
            let records: Vec<ExtractedRecord> =
                items.iter().filter_map(|item| read_record(item, config)).collect();
            let score = coverage(&records, config);
            if best.as_ref().is_none_or(|(s, _)| score > *s) {
                best = Some((score, records));
            }
        }

        match best {
            Some((_, records)) if !records.is_empty() => Ok(StrategyOutput::scored(records, config)),
            _ => Err(StrategyError::NoMatch),
        }
    }
}

fn json_ld_blocks(content: &str) -> Vec<Value> {
    let document = Html::parse_document(content);
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for script in document.select(&selector) {
        let text: String = script.text().collect();
        if let Ok(value) = serde_json::from_str::<Value>(&text) {
            flatten_json_ld(value, &mut out);
        }
    }
    out
}

/// Split `@graph` containers and top-level arrays into individual nodes.
fn flatten_json_ld(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_json_ld(item, out);
            }
        }
        Value::Object(mut map) => match map.remove("@graph") {
            Some(graph) => flatten_json_ld(graph, out),
            None => out.push(Value::Object(map)),
        },
        _ => {}
    }
}

fn collect_object_arrays<'a>(value: &'a Value, depth: usize, out: &mut Vec<Vec<&'a Value>>) {
    if depth > MAX_DEPTH {
        return;
    }
    match value {
        Value::Array(items) => {
            let objects: Vec<&Value> = items.iter().filter(|v| v.is_object()).collect();
            if !objects.is_empty() {
                out.push(objects);
            }
            for item in items {
                collect_object_arrays(item, depth + 1, out);
            }
        }
        Value::Object(map) => {
            for child in map.values() {
                collect_object_arrays(child, depth + 1, out);
            }
        }
        _ => {}
    }
}

fn read_record(item: &Value, config: &ExtractionConfig) -> Option<ExtractedRecord> {
    let object = unwrap_list_item(item.as_object()?);
    let mut record = ExtractedRecord::new();
    for field in &config.fields {
        if let Some(value) = read_field(object, field) {
            record.insert(field.name.clone(), value);
        }
    }
    (!record.is_empty()).then_some(record)
}

/// `ListItem` wrappers carry the real entity under `item`.
fn unwrap_list_item(object: &Map<String, Value>) -> &Map<String, Value> {
    match object.get("item").and_then(Value::as_object) {
        Some(inner) if object.contains_key("position") || object.get("@type").is_some_and(|t| t == "ListItem") => inner,
        _ => object,
    }
}

fn read_field(object: &Map<String, Value>, field: &FieldSpec) -> Option<Value> {
    field.hints().find_map(|hint| {
        let value = lookup_path(object, hint).or_else(|| lookup_nested(object, hint))?;
        coerce_value(field.output_type, value)
    })
}

fn lookup_path<'a>(object: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = find_key(object, first)?;
    for segment in segments {
        let next = match current {
            Value::Array(items) => items.iter().find_map(|i| i.as_object()),
            Value::Object(map) => Some(map),
            _ => None,
        }?;
        current = find_key(next, segment)?;
    }
    Some(current)
}

/// One level down, for entities nesting their fields (e.g. `offers`).
fn lookup_nested<'a>(object: &'a Map<String, Value>, hint: &str) -> Option<&'a Value> {
    if hint.contains('.') {
        return None;
    }
    object
        .values()
        .filter_map(Value::as_object)
        .find_map(|child| find_key(child, hint))
}

fn find_key<'a>(object: &'a Map<String, Value>, hint: &str) -> Option<&'a Value> {
    if let Some(value) = object.get(hint) {
        return Some(value);
    }
    let wanted = key_form(hint);
    object
        .iter()
        .find(|(key, _)| key_form(key) == wanted)
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrapewise_core::{OperationType, OutputShape, OutputType};
    use serde_json::json;

    fn config(fields: Vec<FieldSpec>) -> ExtractionConfig {
        ExtractionConfig {
            operation: OperationType::Extract,
            fields,
            output: OutputShape::List,
            limit: None,
        }
    }

    fn price_with_chain() -> FieldSpec {
        let mut price = FieldSpec::new("price", OutputType::Currency);
        price.fallback_chain = vec!["sale price".into(), "offers.price".into()];
        price
    }

    #[tokio::test]
    async fn test_json_array() {
        let content = r#"{"data":{"items":[
            {"title":"Lamp","price":"$30"},
            {"title":"Mug","salePrice":8},
            {"title":"Desk"}
        ]}}"#;
        let profile = ContentProfile::analyze(content);
        let output = PathQuery::new()
            .extract(
                content,
                &profile,
                &config(vec![FieldSpec::new("title", OutputType::Text), price_with_chain()]),
            )
            .await
            .unwrap();

        assert_eq!(output.records.len(), 3);
        assert_eq!(output.records[1]["price"], json!(8));
        // titles 3/3, prices 2/3
        assert!((output.confidence - 5.0 / 6.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_json_ld_products() {
        let content = r#"<html><head>
<script type="application/ld+json">{"@context":"https://schema.org","@type":"Product","name":"Lamp","offers":{"@type":"Offer","price":"30.00"}}</script>
<script type="application/ld+json">{"@graph":[{"@type":"Product","name":"Mug","offers":{"price":8}}]}</script>
</head><body><p>x</p></body></html>"#;
        let profile = ContentProfile::analyze(content);
        let mut title = FieldSpec::new("title", OutputType::Text);
        title.fallback_chain = vec!["name".into()];
        let output = PathQuery::new()
            .extract(content, &profile, &config(vec![title, price_with_chain()]))
            .await
            .unwrap();

        assert_eq!(output.confidence, 1.0);
        assert_eq!(output.records[0]["title"], json!("Lamp"));
        assert_eq!(output.records[0]["price"], json!(30));
        assert_eq!(output.records[1]["price"], json!(8));
    }

    #[tokio::test]
    async fn test_item_list() {
        let content = r#"{"@type":"ItemList","itemListElement":[
            {"@type":"ListItem","position":1,"item":{"name":"A","url":"https://a.test"}},
            {"@type":"ListItem","position":2,"item":{"name":"B","url":"https://b.test"}}
        ]}"#;
        let profile = ContentProfile::analyze(content);
        let output = PathQuery::new()
            .extract(content, &profile, &config(vec![FieldSpec::new("url", OutputType::Url)]))
            .await
            .unwrap();
        assert_eq!(output.records.len(), 2);
        assert_eq!(output.records[1]["url"], json!("https://b.test"));
    }

    #[tokio::test]
    async fn test_plain_html_is_inapplicable() {
        let content = "<html><body><div>hi</div></body></html>";
        let profile = ContentProfile::analyze(content);
        let strategy = PathQuery::new();
        assert!(!strategy.applicable(&profile));
        assert!(strategy
            .extract(content, &profile, &config(vec![price_with_chain()]))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_no_match() {
        let content = r#"{"unrelated":[{"foo":1}]}"#;
        let profile = ContentProfile::analyze(content);
        let err = PathQuery::new()
            .extract(content, &profile, &config(vec![price_with_chain()]))
            .await
            .unwrap_err();
        assert_eq!(err, StrategyError::NoMatch);
    }
}
