//! JSONPath over [`serde_json::Value`].
//!
//! The accepted dialect is small: `$` followed by `.name`, `.*`, `..name`, `[n]`, `[-n]`
//! and `[a:b:c]` (every part optional). Quoted keys, unions, `[*]` and filter
//! expressions are rejected when the path is compiled.
//!
//! ```
//! use serde_json::json;
//! use tagjson::JsonPath;
//!
//! let doc = json!({"hobbies": ["chess", "netflix"]});
//! let path: JsonPath = "$.hobbies[-1]".parse().unwrap();
//! assert_eq!(path.query(&doc), json!("netflix"));
//! ```
pub mod eval;
pub mod lexer;
pub mod parser;

use crate::error::PathError;
use log::trace;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub use eval::Node;

/// One compiled step of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// `.name`
    Property(String),
    /// `[n]`, negative counts from the end.
    Index(i64),
    /// `[from:to:step]`, step defaults to 1.
    Slice {
        from: Option<i64>,
        to: Option<i64>,
        step: Option<i64>,
    },
    /// `.*`
    Wildcard,
    /// `..name`
    Recursive(String),
}

impl Step {
    /// Steps after which the rest of the path applies to each candidate.
    pub fn is_splitting(&self) -> bool {
        matches!(self, Step::Slice { .. } | Step::Wildcard | Step::Recursive(_))
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn bound(f: &mut fmt::Formatter<'_>, value: &Option<i64>) -> fmt::Result {
            match value {
                Some(value) => write!(f, "{value}"),
                None => Ok(()),
            }
        }

        match self {
            Step::Property(name) => write!(f, ".{name}"),
            Step::Index(index) => write!(f, "[{index}]"),
            Step::Slice { from, to, step } => {
                f.write_str("[")?;
                bound(f, from)?;
                f.write_str(":")?;
                bound(f, to)?;
                if let Some(step) = step {
                    write!(f, ":{step}")?;
                }
                f.write_str("]")
            }
            Step::Wildcard => f.write_str(".*"),
            Step::Recursive(name) => write!(f, "..{name}"),
        }
    }
}

/// A compiled path, reusable across documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    source: String,
    steps: Vec<Step>,
}

impl JsonPath {
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let steps = parser::Parser::new(path).parse_path()?;
        trace!("compiled path `{path}` into {} steps", steps.len());
        Ok(Self {
            source: path.to_string(),
            steps,
        })
    }

    /// The text the path was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Evaluates without copying out of `root`.
    pub fn evaluate<'a>(&self, root: &'a Value) -> Node<'a> {
        eval::evaluate(&self.steps, root)
    }

    /// Evaluates and copies the result. A path that leads nowhere yields `null`.
    pub fn query(&self, root: &Value) -> Value {
        self.evaluate(root).to_value()
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for step in &self.steps {
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

impl FromStr for JsonPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JsonPath::parse(s)
    }
}

/// Compiles `path` and runs it once against `root`.
pub fn query(root: &Value, path: &str) -> Result<Value, PathError> {
    Ok(JsonPath::parse(path)?.query(root))
}
