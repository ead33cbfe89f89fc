//! PostgreSQL dialect.

use super::SqlDialect;

/// PostgreSQL dialect: double-quoted identifiers, native booleans, ILIKE.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}
