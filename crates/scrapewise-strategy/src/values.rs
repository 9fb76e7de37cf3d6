//! Raw value coercion into a field's output type

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Number, Value};

use scrapewise_core::OutputType;

static NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"-?\d[\d,]*(?:\.\d+)?").ok());
static ISO_DATE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").ok());

const DATE_FORMATS: &[&str] = &["%b %d, %Y", "%B %d, %Y", "%d %B %Y", "%d %b %Y", "%m/%d/%Y"];

/// Coerce scraped text into the JSON value for `output_type`. `None` when
/// the text holds nothing of that type.
pub fn coerce_text(output_type: OutputType, raw: &str) -> Option<Value> {
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }

    match output_type {
        OutputType::Currency | OutputType::Number => first_number(&text).and_then(number_value),
        OutputType::Rating => first_number(&text)
            .filter(|n| (0.0..=10.0).contains(n))
            .and_then(number_value),
        OutputType::Date => parse_date(&text).map(|d| Value::String(d.to_string())),
        OutputType::Url => (!text.contains(' ')).then(|| Value::String(text)),
        OutputType::Email => (text.contains('@') && !text.contains(' ')).then(|| Value::String(text)),
        OutputType::Phone => {
            let digits = text.chars().filter(char::is_ascii_digit).count();
            (digits >= 7).then(|| Value::String(text))
        }
        OutputType::Text => Some(Value::String(text)),
    }
}

/// Coerce an already structured value, e.g. from JSON or a model answer.
pub fn coerce_value(output_type: OutputType, value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Number(n) => match output_type {
            OutputType::Currency | OutputType::Number | OutputType::Rating => {
                let n = n.as_f64()?;
                if output_type == OutputType::Rating && !(0.0..=10.0).contains(&n) {
                    return None;
                }
                number_value(n)
            }
            _ => coerce_text(output_type, &n.to_string()),
        },
        Value::String(s) => coerce_text(output_type, s),
        Value::Bool(b) => match output_type {
            OutputType::Text => Some(Value::String(b.to_string())),
            _ => None,
        },
        Value::Array(items) => items.iter().find_map(|v| coerce_value(output_type, v)),
        Value::Object(map) => ["value", "@value", "name", "url", "@id", "price"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(|v| coerce_value(output_type, v)),
    }
}

/// Numeric view of an extracted value, for filtering and aggregation.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => first_number(s),
        _ => None,
    }
}

pub fn as_date(value: &Value) -> Option<NaiveDate> {
    value.as_str().and_then(parse_date)
}

fn first_number(text: &str) -> Option<f64> {
    let re = NUMBER.as_ref()?;
    let m = re.find(text)?;
    m.as_str().replace(',', "").parse().ok()
}

fn number_value(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Some(Value::Number(Number::from(n as i64)));
    }
    Number::from_f64(n).map(Value::Number)
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    if let Some(m) = ISO_DATE.as_ref().and_then(|re| re.find(text)) {
        if let Ok(date) = NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d") {
            return Some(date);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text.trim(), format).ok())
}
