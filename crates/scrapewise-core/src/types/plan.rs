use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::entity::{Comparator, EntityValue};
use super::intent::OperationType;

/// Expected value type of an extracted field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    Text,
    Number,
    Currency,
    Rating,
    Date,
    Url,
    Email,
    Phone,
}

/// Shape of the final result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum OutputShape {
    /// One record per matched item
    List,
    /// Records side by side, keyed by the compared attribute
    Comparison { key: String },
    /// Aggregates over the matched records
    Aggregate { measures: Vec<String> },
}

/// Narrowing condition attached to a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Constraint {
    Bound { comparator: Comparator, value: f64 },
    Range { min: f64, max: f64 },
    Date { comparator: Comparator, date: NaiveDate },
}

impl Constraint {
    pub fn from_entity_value(value: &EntityValue) -> Option<Self> {
        match value {
            EntityValue::Bound {
                comparator, value, ..
            } => Some(Self::Bound {
                comparator: *comparator,
                value: *value,
            }),
            EntityValue::Range { min, max, .. } => Some(Self::Range {
                min: *min,
                max: *max,
            }),
            EntityValue::Date { comparator, date } => Some(Self::Date {
                comparator: *comparator,
                date: *date,
            }),
            EntityValue::Count { .. } | EntityValue::Field { .. } => None,
        }
    }

    pub fn accepts_number(&self, n: f64) -> bool {
        match self {
            Self::Bound { comparator, value } => comparator.holds(n, *value),
            Self::Range { min, max } => n >= *min && n <= *max,
            Self::Date { .. } => true,
        }
    }

    pub fn accepts_date(&self, d: NaiveDate) -> bool {
        match self {
            Self::Date { comparator, date } => comparator.holds(d, *date),
            _ => true,
        }
    }
}

/// One field to extract, with its ordered hint chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub hint: String,
    #[serde(default)]
    pub fallback_chain: Vec<String>,
    pub output_type: OutputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Constraint>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, output_type: OutputType) -> Self {
        let name = name.into();
        Self {
            hint: name.clone(),
            name,
            fallback_chain: Vec::new(),
            output_type,
            filter: None,
        }
    }

    /// Primary hint followed by the fallback chain, in order.
    pub fn hints(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.hint.as_str()).chain(self.fallback_chain.iter().map(|h| h.as_str()))
    }
}

/// Structured extraction plan compiled from a resolved intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub operation: OperationType,
    pub fields: Vec<FieldSpec>,
    pub output: OutputShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl ExtractionConfig {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Stable content hash of the plan, used as a cache key.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        format!("{:x}", digest)[..16].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price_config() -> ExtractionConfig {
        let mut field = FieldSpec::new("price", OutputType::Currency);
        field.fallback_chain = vec!["sale price".into()];
        field.filter = Some(Constraint::Bound {
            comparator: Comparator::Lt,
            value: 50.0,
        });
        ExtractionConfig {
            operation: OperationType::Extract,
            fields: vec![field],
            output: OutputShape::List,
            limit: None,
        }
    }

    #[test]
    fn test_hints_in_order() {
        let config = price_config();
        let hints: Vec<&str> = config.fields[0].hints().collect();
        assert_eq!(hints, vec!["price", "sale price"]);
    }

    #[test]
    fn test_fingerprint_stable() {
        assert_eq!(price_config().fingerprint(), price_config().fingerprint());
        let mut other = price_config();
        other.limit = Some(10);
        assert_ne!(price_config().fingerprint(), other.fingerprint());
    }

    #[test]
    fn test_constraint_accepts() {
        let c = Constraint::Range {
            min: 10.0,
            max: 20.0,
        };
        assert!(c.accepts_number(15.0));
        assert!(!c.accepts_number(25.0));
    }
}
