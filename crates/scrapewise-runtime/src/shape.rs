use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use scrapewise_core::{ExtractedRecord, OutputShape};
use scrapewise_strategy::as_number;

/// Extracted records arranged in the plan's output shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ShapedResult {
    List { items: Vec<ExtractedRecord> },
    /// Records keyed by the compared attribute. Records missing the key are
    /// listed under `unkeyed`.
    Comparison {
        key: String,
        rows: BTreeMap<String, ExtractedRecord>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        unkeyed: Vec<ExtractedRecord>,
    },
    Aggregate { values: BTreeMap<String, Value> },
}

impl ShapedResult {
    pub fn from_records(shape: &OutputShape, records: &[ExtractedRecord]) -> Self {
        match shape {
            OutputShape::List => Self::List {
                items: records.to_vec(),
            },
            OutputShape::Comparison { key } => {
                let mut rows = BTreeMap::new();
                let mut unkeyed = Vec::new();
                for record in records {
                    match record.get(key).map(label) {
                        Some(label) if !rows.contains_key(&label) => {
                            rows.insert(label, record.clone());
                        }
                        _ => unkeyed.push(record.clone()),
                    }
                }
                Self::Comparison {
                    key: key.clone(),
                    rows,
                    unkeyed,
                }
            }
            OutputShape::Aggregate { measures } => Self::Aggregate {
                values: measures
                    .iter()
                    .map(|measure| (measure.clone(), aggregate(measure, records)))
                    .collect(),
            },
        }
    }
}

fn label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `count`, or `mean:<field>` / `min:<field>` / `max:<field>` / `sum:<field>`.
/// Measures over fields with no numeric values are null.
fn aggregate(measure: &str, records: &[ExtractedRecord]) -> Value {
    if measure == "count" {
        return json!(records.len());
    }
    let Some((function, field)) = measure.split_once(':') else {
        return Value::Null;
    };
    let numbers: Vec<f64> = records
        .iter()
        .filter_map(|r| r.get(field).and_then(as_number))
        .collect();
    if numbers.is_empty() {
        return Value::Null;
    }

    let result = match function {
        "mean" => numbers.iter().sum::<f64>() / numbers.len() as f64,
        "sum" => numbers.iter().sum(),
        "min" => numbers.iter().copied().fold(f64::INFINITY, f64::min),
        "max" => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        _ => return Value::Null,
    };
    json!((result * 100.0).round() / 100.0)
}
