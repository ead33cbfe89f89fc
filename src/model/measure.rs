//! Measure definitions.

use serde::{Deserialize, Serialize};

/// Aggregation kind of a measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// `COUNT(*)`, or `COUNT(expr)` when a fragment is given.
    Count,
    Sum,
    Avg,
    /// A scalar formula evaluated after aggregation. The fragment references
    /// sibling measures via `${measureName}` and is not further aggregatable.
    Number,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Count => "count",
            Aggregation::Sum => "sum",
            Aggregation::Avg => "avg",
            Aggregation::Number => "number",
        }
    }

    /// Whether this aggregation requires an underlying sql fragment.
    pub fn requires_sql(&self) -> bool {
        !matches!(self, Aggregation::Count)
    }
}

/// Display formatting hint. Carried through to the column manifest for
/// clients; not semantically load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatHint {
    Currency,
    Percent,
}

/// An aggregate expression of a cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub name: String,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(rename = "type")]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub format: Option<FormatHint>,
}

impl Measure {
    /// A plain row count.
    pub fn count(name: &str) -> Self {
        Self {
            name: name.into(),
            sql: None,
            aggregation: Aggregation::Count,
            format: None,
        }
    }

    /// A count over an expression (`COUNT(expr)` counts non-NULL values).
    pub fn count_of(name: &str, sql: &str) -> Self {
        Self {
            name: name.into(),
            sql: Some(sql.into()),
            aggregation: Aggregation::Count,
            format: None,
        }
    }

    pub fn sum(name: &str, sql: &str) -> Self {
        Self {
            name: name.into(),
            sql: Some(sql.into()),
            aggregation: Aggregation::Sum,
            format: None,
        }
    }

    pub fn avg(name: &str, sql: &str) -> Self {
        Self {
            name: name.into(),
            sql: Some(sql.into()),
            aggregation: Aggregation::Avg,
            format: None,
        }
    }

    /// A post-aggregation formula over sibling measures.
    pub fn number(name: &str, sql: &str) -> Self {
        Self {
            name: name.into(),
            sql: Some(sql.into()),
            aggregation: Aggregation::Number,
            format: None,
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: FormatHint) -> Self {
        self.format = Some(format);
        self
    }
}
