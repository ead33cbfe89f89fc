//! Error types for the semantic layer.
//!
//! Two families, matching the two phases of the crate's lifecycle:
//!
//! - [`ModelError`] - raised while registering cube definitions. Expected to
//!   surface at deployment time, before any query traffic.
//! - [`CompileError`] - raised per query request. A bad request never produces
//!   a partial statement; compilation is all-or-nothing.

/// Result type for registry operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Result type for query compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Errors raised while building the model registry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("duplicate cube '{0}'")]
    DuplicateCube(String),

    #[error("cube '{cube}' declares duplicate {category} '{name}'")]
    DuplicateMember {
        cube: String,
        category: &'static str,
        name: String,
    },

    #[error("cube '{cube}' must declare exactly one primary key dimension, found {found}")]
    InvalidPrimaryKey { cube: String, found: usize },

    #[error("measure '{cube}.{measure}' ({aggregation}) requires a sql expression")]
    MissingMeasureSql {
        cube: String,
        measure: String,
        aggregation: &'static str,
    },

    #[error("cube '{cube}' joins unknown cube '{target}'")]
    DanglingJoin { cube: String, target: String },

    #[error(
        "join from '{cube}' to '{target}' must be a conjunction of \
         ${{CUBE}}.col = ${{{target}}}.col equalities, got: {sql}"
    )]
    InvalidJoinPredicate {
        cube: String,
        target: String,
        sql: String,
    },

    #[error("unknown cube '{0}'")]
    UnknownCube(String),
}

/// Errors raised while compiling a query request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("request references no dimensions, measures or time dimension")]
    EmptyRequest,

    #[error("member reference '{0}' is not of the form 'Cube.member'")]
    InvalidMember(String),

    #[error("unknown cube '{0}'")]
    UnknownCube(String),

    #[error("unknown field '{field}' on cube '{cube}'")]
    UnknownField { cube: String, field: String },

    #[error("operator {op} is not applicable to {ty} dimension '{cube}.{field}'")]
    TypeMismatch {
        cube: String,
        field: String,
        op: &'static str,
        ty: &'static str,
    },

    #[error("operator {op} on '{member}' expects {expected}, got {found} value(s)")]
    InvalidFilter {
        member: String,
        op: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("no join path from '{from}' to '{to}'")]
    UnreachableCube { from: String, to: String },

    #[error("ambiguous join path from '{from}' to '{to}': multiple shortest paths exist")]
    AmbiguousJoinPath { from: String, to: String },

    #[error("fragment references cube '{cube}' which is not part of the join: {fragment}")]
    UnboundCubeReference { cube: String, fragment: String },

    #[error("unresolved placeholder left in fragment: {0}")]
    UnresolvedPlaceholder(String),

    #[error("cyclic measure reference: {}", path.join(" -> "))]
    CyclicMeasureReference { cube: String, path: Vec<String> },

    #[error(
        "formula measure '{cube}.{measure}' reads raw columns of a cube \
         that is not grouped by its primary key"
    )]
    UngroupedFormulaColumns { cube: String, measure: String },

    #[error("order by '{0}' does not match any requested dimension or measure")]
    InvalidOrderBy(String),
}
