//! Confidence scoring and post-extraction filtering

use scrapewise_core::{ExtractedRecord, ExtractionConfig, OutputType};

use crate::values::{as_date, as_number};

/// Records produced by one strategy attempt, with the attempt's confidence
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutput {
    pub records: Vec<ExtractedRecord>,
    pub confidence: f32,
}

impl StrategyOutput {
    pub fn new(records: Vec<ExtractedRecord>, confidence: f32) -> Self {
        Self {
            records,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Score raw records by field coverage, then apply the plan's filters
    /// and limit. Filtering never lowers confidence: a page with nothing
    /// under $50 was still read correctly.
    pub fn scored(raw: Vec<ExtractedRecord>, config: &ExtractionConfig) -> Self {
        let confidence = coverage(&raw, config);
        Self::new(apply_filters(raw, config), confidence)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Mean fraction of records holding a value, across requested fields.
pub fn coverage(records: &[ExtractedRecord], config: &ExtractionConfig) -> f32 {
    if records.is_empty() || config.fields.is_empty() {
        return 0.0;
    }
    let total = records.len() as f32;
    let sum: f32 = config
        .fields
        .iter()
        .map(|field| {
            let present = records
                .iter()
                .filter(|r| r.get(&field.name).is_some_and(|v| !v.is_null()))
                .count();
            present as f32 / total
        })
        .sum();
    sum / config.fields.len() as f32
}

/// Drop records failing a field filter (or missing a filtered field), then
/// truncate to the plan's limit.
pub fn apply_filters(records: Vec<ExtractedRecord>, config: &ExtractionConfig) -> Vec<ExtractedRecord> {
    let mut kept: Vec<ExtractedRecord> = records
        .into_iter()
        .filter(|record| {
            config.fields.iter().all(|field| {
                let Some(filter) = &field.filter else {
                    return true;
                };
                let Some(value) = record.get(&field.name) else {
                    return false;
                };
                match field.output_type {
                    OutputType::Date => as_date(value).is_some_and(|d| filter.accepts_date(d)),
                    _ => as_number(value).is_some_and(|n| filter.accepts_number(n)),
                }
            })
        })
        .collect();

    if let Some(limit) = config.limit {
        kept.truncate(limit as usize);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrapewise_core::{Comparator, Constraint, FieldSpec, OperationType, OutputShape};
    use serde_json::json;

    fn config(limit: Option<u32>) -> ExtractionConfig {
        let mut price = FieldSpec::new("price", OutputType::Currency);
        price.filter = Some(Constraint::Bound {
            comparator: Comparator::Lt,
            value: 50.0,
        });
        ExtractionConfig {
            operation: OperationType::Extract,
            fields: vec![FieldSpec::new("title", OutputType::Text), price],
            output: OutputShape::List,
            limit,
        }
    }

    fn record(title: Option<&str>, price: Option<f64>) -> ExtractedRecord {
        let mut r = ExtractedRecord::new();
        if let Some(t) = title {
            r.insert("title".into(), json!(t));
        }
        if let Some(p) = price {
            r.insert("price".into(), json!(p));
        }
        r
    }

    #[test]
    fn test_coverage() {
        let records = vec![
            record(Some("A"), Some(10.0)),
            record(Some("B"), None),
            record(None, Some(70.0)),
            record(Some("D"), Some(20.0)),
        ];
        // title 3/4, price 3/4
        assert!((coverage(&records, &config(None)) - 0.75).abs() < 1e-6);
        assert_eq!(coverage(&[], &config(None)), 0.0);
    }

    #[test]
    fn test_scored_filters_after_scoring() {
        let records = vec![
            record(Some("A"), Some(10.0)),
            record(Some("B"), Some(70.0)),
            record(Some("C"), Some(30.0)),
        ];
        let output = StrategyOutput::scored(records, &config(None));
        assert_eq!(output.confidence, 1.0);
        assert_eq!(output.records.len(), 2);
    }

    #[test]
    fn test_limit() {
        let records = vec![
            record(Some("A"), Some(10.0)),
            record(Some("B"), Some(20.0)),
            record(Some("C"), Some(30.0)),
        ];
        let kept = apply_filters(records, &config(Some(2)));
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1]["title"], json!("B"));
    }
}
