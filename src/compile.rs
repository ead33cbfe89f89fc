//! End-to-end compilation from a query request to SQL.
//!
//! This module provides the high-level API:
//!
//! ```text
//! QueryRequest → Resolve → Join Plan → Fan-out Guard → Emit → SQL
//! ```
//!
//! # Example
//!
//! ```ignore
//! use mica::compile::{compile, CompileOptions};
//! use mica::compiler::QueryRequest;
//!
//! let request = QueryRequest::new()
//!     .dimension("CompanyDirectory.companyName")
//!     .measure("OsvDetailed.totalTurnoverDebit");
//!
//! let output = compile(&request, &registry, CompileOptions::default())?;
//! println!("{}", output.sql);
//! ```

use crate::compiler::emit::OutputColumn;
use crate::compiler::request::QueryRequest;
use crate::compiler::{emit, fanout, joins, resolve};
use crate::error::CompileResult;
use crate::model::ModelRegistry;
use crate::sql::query::Query;
use crate::sql::Dialect;

// ============================================================================
// Options
// ============================================================================

/// Options for compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// SQL dialect to generate.
    pub dialect: Dialect,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::Postgres,
        }
    }
}

impl CompileOptions {
    /// Set the SQL dialect.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result of compiling a request to SQL.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// The generated SQL string.
    pub sql: String,

    /// The SQL query AST (for further manipulation if needed).
    pub query: Query,

    /// The SELECT-list columns in statement order: requested dimensions,
    /// the time dimension, then requested measures. Callers can zip result
    /// rows against this without re-inspecting the statement.
    pub columns: Vec<OutputColumn>,

    /// The dialect used for generation.
    pub dialect: Dialect,
}

// ============================================================================
// Compilation
// ============================================================================

/// Compile a query request against a registry.
///
/// Pure and synchronous: no I/O, no shared mutable state. The registry can
/// serve any number of concurrent compiles. Every failure identifies the
/// offending cube, field or join; no partial statement is ever returned.
pub fn compile(
    request: &QueryRequest,
    registry: &ModelRegistry,
    options: CompileOptions,
) -> CompileResult<CompileOutput> {
    // Step 1: Resolve member references and validate the request
    let resolved = resolve::resolve(request, registry)?;
    log::debug!(
        "resolved request: root={}, cubes={:?}",
        resolved.root,
        resolved.cubes
    );

    // Step 2: Resolve the join tree
    let plan = joins::resolve_joins(&resolved.root, &resolved.cubes, registry)?;
    log::debug!("join plan: {} step(s)", plan.steps.len());

    // Step 3: Fan-out analysis
    let strategies = fanout::plan_strategies(&plan, &resolved);

    // Step 4: Emit the statement
    let emitted = emit::emit(registry, &resolved, &plan, &strategies, options.dialect)?;

    // Step 5: Serialize
    let sql = emitted.query.to_sql(options.dialect);
    log::debug!("compiled: {}", sql);

    Ok(CompileOutput {
        sql,
        query: emitted.query,
        columns: emitted.columns,
        dialect: options.dialect,
    })
}
