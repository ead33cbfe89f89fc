//! Typed SQL building blocks: tokens, expressions, queries, dialects.
//!
//! The compiler constructs a [`query::Query`] AST and serializes it through
//! a [`token::TokenStream`]; all dialect differences live behind
//! [`dialect::SqlDialect`].

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

pub use dialect::{Dialect, SqlDialect};
pub use expr::{BinaryOperator, Expr, ExprExt, Literal, UnaryOperator};
pub use query::{Join, JoinType, LimitOffset, OrderByExpr, Query, Relation, SelectExpr, SortDir, TableRef};
pub use token::{Token, TokenStream};
