//! Expression AST - the core of SQL expression building.
//!
//! This module provides a strongly-typed AST for SQL expressions
//! with exhaustive pattern matching enforced by the compiler.

use super::dialect::{Dialect, SqlDialect};
use super::token::{Token, TokenStream};

// =============================================================================
// Expression AST
// =============================================================================

/// A SQL expression.
///
/// Every variant must be handled in `to_tokens_for_dialect()` - the compiler
/// enforces this.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference: optional_table.column
    Column {
        table: Option<String>,
        column: String,
    },

    /// Literal values
    Literal(Literal),

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Unary operation: op expr
    UnaryOp { op: UnaryOperator, expr: Box<Expr> },

    /// Function call: name(args...)
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },

    /// CASE WHEN... THEN... ELSE... END
    Case {
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },

    /// IN: expr IN (values...)
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// LIKE / ILIKE pattern matching
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        case_insensitive: bool,
        negated: bool,
    },

    /// Wildcard: * or table.*
    Star { table: Option<String> },

    /// Parenthesized expression
    Paren(Box<Expr>),

    /// Raw SQL expression passed directly to output without escaping.
    ///
    /// Carries bound fragments from cube definitions. The expression binder
    /// guarantees no placeholder survives into this variant; user-provided
    /// filter values never enter it.
    Raw(String),
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    // Logical
    And,
    Or,
    // Arithmetic
    Plus,
    Minus,
    Mul,
    Div,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

// =============================================================================
// Constructors
// =============================================================================

/// Unqualified column reference.
pub fn col(name: &str) -> Expr {
    Expr::Column {
        table: None,
        column: name.into(),
    }
}

/// Table-qualified column reference.
pub fn table_col(table: &str, column: &str) -> Expr {
    Expr::Column {
        table: Some(table.into()),
        column: column.into(),
    }
}

/// Wildcard: `*`
pub fn star() -> Expr {
    Expr::Star { table: None }
}

pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

pub fn lit_float(f: f64) -> Expr {
    Expr::Literal(Literal::Float(f))
}

pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

pub fn lit_bool(b: bool) -> Expr {
    Expr::Literal(Literal::Bool(b))
}

pub fn lit_null() -> Expr {
    Expr::Literal(Literal::Null)
}

/// Arbitrary function call.
pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
        distinct: false,
    }
}

/// `COUNT(*)`
pub fn count_star() -> Expr {
    func("COUNT", vec![star()])
}

/// `COUNT(expr)`
pub fn count(expr: Expr) -> Expr {
    func("COUNT", vec![expr])
}

/// `SUM(expr)`
pub fn sum(expr: Expr) -> Expr {
    func("SUM", vec![expr])
}

/// `AVG(expr)`
pub fn avg(expr: Expr) -> Expr {
    func("AVG", vec![expr])
}

/// Raw SQL fragment (already bound, see [`Expr::Raw`]).
pub fn raw(sql: &str) -> Expr {
    Expr::Raw(sql.into())
}

/// `CASE WHEN ... THEN ... [ELSE ...] END`
pub fn case_when(when_clauses: Vec<(Expr, Expr)>, else_clause: Option<Expr>) -> Expr {
    Expr::Case {
        when_clauses,
        else_clause: else_clause.map(Box::new),
    }
}

// =============================================================================
// Fluent combinators
// =============================================================================

/// Fluent combinators over [`Expr`].
pub trait ExprExt: Sized {
    fn binary(self, op: BinaryOperator, right: Expr) -> Expr;

    fn eq(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Eq, right)
    }
    fn ne(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Ne, right)
    }
    fn lt(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Lt, right)
    }
    fn lte(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Lte, right)
    }
    fn gt(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Gt, right)
    }
    fn gte(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Gte, right)
    }
    fn and(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::And, right)
    }
    fn or(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Or, right)
    }
    fn add(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Plus, right)
    }
    fn sub(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Minus, right)
    }
    fn mul(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Mul, right)
    }
    fn div(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Div, right)
    }

    fn is_null(self) -> Expr;
    fn is_not_null(self) -> Expr;
    fn in_list(self, values: Vec<Expr>, negated: bool) -> Expr;
    fn like(self, pattern: Expr, case_insensitive: bool, negated: bool) -> Expr;
    fn paren(self) -> Expr;
}

impl ExprExt for Expr {
    fn binary(self, op: BinaryOperator, right: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }

    fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    fn is_not_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    fn in_list(self, values: Vec<Expr>, negated: bool) -> Expr {
        Expr::In {
            expr: Box::new(self),
            values,
            negated,
        }
    }

    fn like(self, pattern: Expr, case_insensitive: bool, negated: bool) -> Expr {
        Expr::Like {
            expr: Box::new(self),
            pattern: Box::new(pattern),
            case_insensitive,
            negated,
        }
    }

    fn paren(self) -> Expr {
        Expr::Paren(Box::new(self))
    }
}

// =============================================================================
// Serialization
// =============================================================================

impl BinaryOperator {
    fn token(self) -> Token {
        match self {
            BinaryOperator::Eq => Token::Eq,
            BinaryOperator::Ne => Token::Ne,
            BinaryOperator::Lt => Token::Lt,
            BinaryOperator::Gt => Token::Gt,
            BinaryOperator::Lte => Token::Lte,
            BinaryOperator::Gte => Token::Gte,
            BinaryOperator::And => Token::And,
            BinaryOperator::Or => Token::Or,
            BinaryOperator::Plus => Token::Plus,
            BinaryOperator::Minus => Token::Minus,
            BinaryOperator::Mul => Token::Mul,
            BinaryOperator::Div => Token::Div,
        }
    }
}

impl Expr {
    /// Convert to tokens using the default dialect.
    pub fn to_tokens(&self) -> TokenStream {
        self.to_tokens_for_dialect(Dialect::default())
    }

    /// Convert to tokens for a specific dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        match self {
            Expr::Column { table, column } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone())).push(Token::Dot);
                }
                ts.push(Token::Ident(column.clone()));
            }

            Expr::Literal(lit) => {
                ts.push(match lit {
                    Literal::Int(n) => Token::LitInt(*n),
                    Literal::Float(f) => Token::LitFloat(*f),
                    Literal::String(s) => Token::LitString(s.clone()),
                    Literal::Bool(b) => Token::LitBool(*b),
                    Literal::Null => Token::LitNull,
                });
            }

            Expr::BinaryOp { left, op, right } => {
                ts.append(&left.to_tokens_for_dialect(dialect));
                ts.space().push(op.token()).space();
                ts.append(&right.to_tokens_for_dialect(dialect));
            }

            Expr::UnaryOp { op, expr } => {
                match op {
                    UnaryOperator::Not => {
                        ts.push(Token::Not).space();
                    }
                    UnaryOperator::Minus => {
                        ts.push(Token::Minus);
                    }
                }
                ts.append(&expr.to_tokens_for_dialect(dialect));
            }

            Expr::Function {
                name,
                args,
                distinct,
            } => {
                ts.push(Token::FunctionName(name.clone())).lparen();
                if *distinct {
                    ts.push(Token::Distinct).space();
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&arg.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }

            Expr::Case {
                when_clauses,
                else_clause,
            } => {
                ts.push(Token::Case);
                for (cond, result) in when_clauses {
                    ts.space().push(Token::When).space();
                    ts.append(&cond.to_tokens_for_dialect(dialect));
                    ts.space().push(Token::Then).space();
                    ts.append(&result.to_tokens_for_dialect(dialect));
                }
                if let Some(e) = else_clause {
                    ts.space().push(Token::Else).space();
                    ts.append(&e.to_tokens_for_dialect(dialect));
                }
                ts.space().push(Token::End);
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                ts.space();
                if *negated {
                    ts.push(Token::Not).space();
                }
                ts.push(Token::In).space().lparen();
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&v.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }

            Expr::IsNull { expr, negated } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                ts.space().push(if *negated {
                    Token::IsNotNull
                } else {
                    Token::IsNull
                });
            }

            Expr::Like {
                expr,
                pattern,
                case_insensitive,
                negated,
            } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                ts.space();
                if *negated {
                    ts.push(Token::Not).space();
                }
                if *case_insensitive && dialect.supports_ilike() {
                    ts.push(Token::ILike);
                } else {
                    ts.push(Token::Like);
                }
                ts.space();
                ts.append(&pattern.to_tokens_for_dialect(dialect));
            }

            Expr::Star { table } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone())).push(Token::Dot);
                }
                ts.push(Token::Star);
            }

            Expr::Paren(inner) => {
                ts.lparen();
                ts.append(&inner.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::Raw(sql) => {
                ts.push(Token::Raw(sql.clone()));
            }
        }
        ts
    }

    /// Render to SQL text for a specific dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}
