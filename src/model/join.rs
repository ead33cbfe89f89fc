//! Join declarations between cubes.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Relationship kind of a directed join edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Relationship {
    /// Many-to-one: many rows of the declaring cube match one target row.
    BelongsTo,
    /// One-to-many: one row of the declaring cube matches many target rows.
    HasMany,
    /// One-to-one.
    HasOne,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::BelongsTo => "belongsTo",
            Relationship::HasMany => "hasMany",
            Relationship::HasOne => "hasOne",
        }
    }
}

/// A declared join from the owning cube to `target`.
///
/// The predicate is an equi-join fragment of the shape
/// `${CUBE}.col = ${Target}.col [AND ...]`; the registry parses it into
/// [`JoinKey`] pairs at build time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub target: String,
    pub relationship: Relationship,
    pub sql: String,
}

impl Join {
    pub fn new(target: &str, relationship: Relationship, sql: &str) -> Self {
        Self {
            target: target.into(),
            relationship,
            sql: sql.into(),
        }
    }
}

/// One equality of a join predicate, as column names on each side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinKey {
    /// Column of the declaring cube.
    pub source_column: String,
    /// Column of the target cube.
    pub target_column: String,
}

static EQUI_SIDE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\$\{(\w+)\}\.(\w+)\s*$").expect("valid regex"));
static AND_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+AND\s+").expect("valid regex"));

/// Parse a join predicate into its column key pairs.
///
/// Accepts only conjunctions of `${A}.col = ${B}.col` equalities where one
/// side names the declaring cube (as `CUBE` or by name) and the other the
/// target cube.
pub(crate) fn parse_join_keys(
    cube: &str,
    target: &str,
    sql: &str,
) -> Result<Vec<JoinKey>, ModelError> {
    let invalid = || ModelError::InvalidJoinPredicate {
        cube: cube.to_string(),
        target: target.to_string(),
        sql: sql.to_string(),
    };

    let mut keys = Vec::new();
    for conjunct in AND_SPLIT_RE.split(sql) {
        let sides: Vec<&str> = conjunct.split('=').collect();
        if sides.len() != 2 {
            return Err(invalid());
        }

        let mut source_column = None;
        let mut target_column = None;
        for side in sides {
            let caps = EQUI_SIDE_RE.captures(side).ok_or_else(invalid)?;
            let cube_ref = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let column = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            if cube_ref == "CUBE" || cube_ref == cube {
                source_column = Some(column.to_string());
            } else if cube_ref == target {
                target_column = Some(column.to_string());
            } else {
                return Err(invalid());
            }
        }

        match (source_column, target_column) {
            (Some(source_column), Some(target_column)) => keys.push(JoinKey {
                source_column,
                target_column,
            }),
            _ => return Err(invalid()),
        }
    }

    if keys.is_empty() {
        return Err(invalid());
    }
    Ok(keys)
}
