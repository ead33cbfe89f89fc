//! Dimension definitions.

use serde::{Deserialize, Serialize};

/// Semantic type of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionType {
    String,
    Number,
    Boolean,
    Time,
}

impl DimensionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionType::String => "string",
            DimensionType::Number => "number",
            DimensionType::Boolean => "boolean",
            DimensionType::Time => "time",
        }
    }
}

/// Calendar truncation unit for time dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Month,
    Quarter,
    Year,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Month => "month",
            Granularity::Quarter => "quarter",
            Granularity::Year => "year",
        }
    }
}

/// An attribute projection of a cube.
///
/// The `sql` fragment references only the owning cube's columns, either as a
/// bare column name or through `${CUBE}` self-references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub sql: String,
    #[serde(rename = "type")]
    pub dimension_type: DimensionType,
    #[serde(default)]
    pub primary_key: bool,
}

impl Dimension {
    pub fn new(name: &str, sql: &str, dimension_type: DimensionType) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            dimension_type,
            primary_key: false,
        }
    }

    /// Mark this dimension as the cube's primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }
}
