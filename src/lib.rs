//! # Mica
//!
//! A semantic layer query compiler: cube models in, one correct aggregate
//! SQL statement out.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          Cube Definitions (structured, pre-parsed)       │
//! │   (dimensions, measures, segments, joins per cube)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [model registry]
//! ┌─────────────────────────────────────────────────────────┐
//! │        ModelRegistry (validated, immutable graph)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │        ◄── QueryRequest
//!                          ▼ [compiler]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Resolve → Join Plan → Bind → Fan-out Guard → Emit      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [sql printer]
//! ┌─────────────────────────────────────────────────────────┐
//! │        SQL statement + ordered column manifest           │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The compiler's core guarantee is the fan-out invariant: a measure's
//! total never changes because a caller added a dimension reachable only
//! through a one-to-many join. Whenever the join tree crosses such an edge,
//! measure cubes are pre-aggregated in derived subqueries before joining.
//!
//! Loading definitions from disk, executing statements and serving requests
//! are external collaborators' concerns; this crate is a pure function from
//! (registry, request) to SQL.

pub mod compile;
pub mod compiler;
pub mod error;
pub mod model;
pub mod sql;

// Re-export SQL submodules at crate level for convenient paths
pub use sql::dialect;
pub use sql::expr;
pub use sql::query;
pub use sql::token;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::compile::{compile, CompileOptions, CompileOutput};
    pub use crate::compiler::{
        Filter, FilterOp, FilterValue, Order, OutputColumn, QueryRequest, TimeDimension,
    };
    pub use crate::error::{CompileError, ModelError};
    pub use crate::model::{
        Aggregation, Cube, Dimension, DimensionType, FormatHint, Granularity, Join, Measure,
        ModelRegistry, Relationship, Segment,
    };
    pub use crate::sql::{Dialect, SqlDialect};
}

// Also export at crate root for convenience
pub use compile::{compile, CompileOptions, CompileOutput};
pub use compiler::{Filter, FilterOp, FilterValue, Order, OutputColumn, QueryRequest, TimeDimension};
pub use error::{CompileError, ModelError};
pub use model::ModelRegistry;
pub use sql::Dialect;
