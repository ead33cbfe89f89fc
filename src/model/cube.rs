//! Cube definitions.

use serde::{Deserialize, Serialize};

use super::dimension::Dimension;
use super::join::Join;
use super::measure::Measure;
use super::segment::Segment;

/// A named analytical entity bound to a base relation.
///
/// The `sql` source expression is opaque to the compiler and is emitted as a
/// derived table `(<sql>) AS <alias>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cube {
    pub name: String,
    pub sql: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub measures: Vec<Measure>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub joins: Vec<Join>,
}

impl Cube {
    pub fn new(name: &str, sql: &str) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            title: None,
            dimensions: Vec::new(),
            measures: Vec::new(),
            segments: Vec::new(),
            joins: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    #[must_use]
    pub fn measure(mut self, measure: Measure) -> Self {
        self.measures.push(measure);
        self
    }

    #[must_use]
    pub fn segment(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    #[must_use]
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Look up a dimension by name.
    pub fn find_dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    /// Look up a measure by name.
    pub fn find_measure(&self, name: &str) -> Option<&Measure> {
        self.measures.iter().find(|m| m.name == name)
    }

    /// Look up a segment by name.
    pub fn find_segment(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.name == name)
    }

    /// The primary key dimension. Registration guarantees exactly one exists.
    pub fn primary_key(&self) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.primary_key)
    }
}
