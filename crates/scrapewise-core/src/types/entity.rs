use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Kind of value pulled out of query text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Price,
    Rating,
    Date,
    Quantity,
    ContentKind,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Rating => "rating",
            Self::Date => "date",
            Self::Quantity => "quantity",
            Self::ContentKind => "content_kind",
        }
    }

    /// Whether entities of this kind narrow results rather than name a field.
    pub fn is_constraint(&self) -> bool {
        matches!(self, Self::Price | Self::Rating | Self::Date)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Eq => "=",
        }
    }

    pub fn is_upper_bound(&self) -> bool {
        matches!(self, Self::Lt | Self::Lte)
    }

    pub fn is_lower_bound(&self) -> bool {
        matches!(self, Self::Gt | Self::Gte)
    }

    pub fn holds<T: PartialOrd>(&self, lhs: T, rhs: T) -> bool {
        match self {
            Self::Lt => lhs < rhs,
            Self::Lte => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Gte => lhs >= rhs,
            Self::Eq => lhs == rhs,
        }
    }
}

/// Normalized entity value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityValue {
    Bound {
        comparator: Comparator,
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },
    Range {
        min: f64,
        max: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },
    Date {
        comparator: Comparator,
        date: NaiveDate,
    },
    Count {
        value: u32,
    },
    Field {
        name: String,
    },
}

impl EntityValue {
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Self::Field { name } => Some(name),
            _ => None,
        }
    }

    /// Whether two values of the same kind cannot both hold.
    ///
    /// Two upper bounds (or two lower bounds, or two exact values) with
    /// different magnitudes contradict each other; an upper and a lower bound
    /// together describe a range and do not.
    pub fn contradicts(&self, other: &EntityValue) -> bool {
        match (self, other) {
            (
                Self::Bound {
                    comparator: a,
                    value: va,
                    ..
                },
                Self::Bound {
                    comparator: b,
                    value: vb,
                    ..
                },
            ) => {
                let same_direction = (a.is_upper_bound() && b.is_upper_bound())
                    || (a.is_lower_bound() && b.is_lower_bound())
                    || (*a == Comparator::Eq && *b == Comparator::Eq);
                same_direction && (va - vb).abs() > f64::EPSILON
            }
            (
                Self::Date {
                    comparator: a,
                    date: da,
                },
                Self::Date {
                    comparator: b,
                    date: db,
                },
            ) => a == b && da != db,
            (Self::Range { min: a0, max: a1, .. }, Self::Range { min: b0, max: b1, .. }) => {
                (a0 - b0).abs() > f64::EPSILON || (a1 - b1).abs() > f64::EPSILON
            }
            (Self::Count { value: a }, Self::Count { value: b }) => a != b,
            _ => false,
        }
    }
}

/// Byte span in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A typed value parsed out of query text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub value: EntityValue,
    pub span: Span,
    pub text: String,
    pub confidence: f32,
}

impl Entity {
    pub fn new(kind: EntityKind, value: EntityValue, span: Span, text: impl Into<String>) -> Self {
        Self {
            kind,
            value,
            span,
            text: text.into(),
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn field(name: impl Into<String>, span: Span, text: impl Into<String>) -> Self {
        Self::new(
            EntityKind::ContentKind,
            EntityValue::Field { name: name.into() },
            span,
            text,
        )
    }
}
