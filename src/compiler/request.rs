//! Query request types.
//!
//! A request arrives from an external transport layer already structured
//! (the crate never parses HTTP or CLI input) and is consumed entirely by
//! one compile call. All member references are cube-qualified strings such
//! as `"OsvDetailed.totalTurnoverDebit"`.

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};
use crate::model::{DimensionType, Granularity};

/// An analytical query request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryRequest {
    pub dimensions: Vec<String>,
    pub measures: Vec<String>,
    pub filters: Vec<Filter>,
    pub segments: Vec<String>,
    pub time_dimension: Option<TimeDimension>,
    pub order: Vec<Order>,
    pub limit: Option<u64>,
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn dimension(mut self, member: &str) -> Self {
        self.dimensions.push(member.into());
        self
    }

    #[must_use]
    pub fn measure(mut self, member: &str) -> Self {
        self.measures.push(member.into());
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn segment(mut self, member: &str) -> Self {
        self.segments.push(member.into());
        self
    }

    #[must_use]
    pub fn time_dimension(mut self, member: &str, granularity: Granularity) -> Self {
        self.time_dimension = Some(TimeDimension {
            dimension: member.into(),
            granularity,
        });
        self
    }

    #[must_use]
    pub fn order_by(mut self, member: &str, descending: bool) -> Self {
        self.order.push(Order {
            member: member.into(),
            descending,
        });
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A time dimension with its requested truncation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeDimension {
    pub dimension: String,
    pub granularity: Granularity,
}

/// An explicit ordering entry. The member must be one of the requested
/// dimensions or measures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub member: String,
    #[serde(default)]
    pub descending: bool,
}

/// A filter predicate over a dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub member: String,
    pub op: FilterOp,
    #[serde(default)]
    pub values: Vec<FilterValue>,
}

impl Filter {
    pub fn new(member: &str, op: FilterOp, values: Vec<FilterValue>) -> Self {
        Self {
            member: member.into(),
            op,
            values,
        }
    }
}

/// Filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOp {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    Gt,
    Gte,
    Lt,
    Lte,
    /// IS NOT NULL
    Set,
    /// IS NULL
    NotSet,
}

/// How many values an operator consumes.
pub(crate) enum ValueArity {
    None,
    AtLeastOne,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Equals => "equals",
            FilterOp::NotEquals => "notEquals",
            FilterOp::Contains => "contains",
            FilterOp::NotContains => "notContains",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Set => "set",
            FilterOp::NotSet => "notSet",
        }
    }

    /// Whether this operator applies to a dimension of the given type.
    pub(crate) fn applicable_to(&self, ty: DimensionType) -> bool {
        match self {
            FilterOp::Equals | FilterOp::NotEquals | FilterOp::Set | FilterOp::NotSet => true,
            FilterOp::Contains | FilterOp::NotContains => ty == DimensionType::String,
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                matches!(ty, DimensionType::Number | DimensionType::Time)
            }
        }
    }

    pub(crate) fn value_arity(&self) -> ValueArity {
        match self {
            FilterOp::Set | FilterOp::NotSet => ValueArity::None,
            _ => ValueArity::AtLeastOne,
        }
    }

    /// Ordering comparisons take exactly one value; Equals/NotEquals and the
    /// pattern operators accept a disjunction.
    pub(crate) fn single_valued(&self) -> bool {
        matches!(
            self,
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte
        )
    }
}

/// A filter literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    String(String),
    Number(f64),
    Bool(bool),
}

/// A parsed `Cube.member` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MemberRef<'a> {
    pub cube: &'a str,
    pub member: &'a str,
}

impl<'a> MemberRef<'a> {
    pub fn parse(reference: &'a str) -> CompileResult<Self> {
        match reference.split_once('.') {
            Some((cube, member))
                if !cube.is_empty() && !member.is_empty() && !member.contains('.') =>
            {
                Ok(Self { cube, member })
            }
            _ => Err(CompileError::InvalidMember(reference.to_string())),
        }
    }
}
