//! Arithmetic formulas with variables and function calls.
//!
//! ```text
//! Formula ::= Chain EOF
//! Chain   ::= Operand { ("+" | "-" | "*" | "/") Operand }
//! Operand ::= Number | "{" Identifier "}" | Identifier "(" [ Chain { "," Chain } ] ")" | "(" Chain ")"
//! ```
//!
//! `*` and `/` bind tighter than `+` and `-`; operators of equal precedence associate
//! to the left. There is no unary minus.
//!
//! ```
//! use serde_json::json;
//! use tagjson::formula::Formula;
//!
//! let formula: Formula = "MIN(1+2, 3*4, {x})".parse().unwrap();
//! assert_eq!(formula.evaluate(&json!({"x": 5})).unwrap(), json!(3.0));
//! ```
pub mod ast;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;

use crate::error::FormulaError;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub use ast::{BinaryOp, Expr, ExprKind, Span};
pub use eval::{evaluate, Scope};
pub use functions::{register, Aggregate, Function};

/// Parses `source` into an expression tree.
pub fn parse(source: &str) -> Result<Expr, FormulaError> {
    parser::Parser::new(source).parse_formula()
}

/// A parsed formula together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        Ok(Self {
            source: source.to_string(),
            expr: parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluates against `scope`. The result is a JSON number or `null`.
    pub fn evaluate<S: Scope + ?Sized>(&self, scope: &S) -> Result<Value, FormulaError> {
        evaluate(&self.expr, scope)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

impl FromStr for Formula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Formula::parse(s)
    }
}
