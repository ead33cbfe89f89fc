//! Segment definitions.

use serde::{Deserialize, Serialize};

/// A named boolean predicate scoped to one cube, usable as a filter in any
/// query against that cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub sql: String,
}

impl Segment {
    pub fn new(name: &str, sql: &str) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}
