//! Functions callable from formulas, looked up by upper-cased name.
use super::ast::Expr;
use crate::error::FormulaError;
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

pub trait Function: Send + Sync {
    /// The name formulas call this function by. Matching ignores ASCII case.
    fn name(&self) -> &str;

    /// Checks the argument expressions when a call is parsed. The message ends up in
    /// [`FormulaError::Arity`].
    fn validate(&self, args: &[Expr]) -> Result<(), String>;

    /// Runs the function on eagerly evaluated arguments.
    fn call(&self, args: &[Value]) -> Result<Value, FormulaError>;
}

type Table = HashMap<String, Arc<dyn Function>>;

struct Functions {
    published: RwLock<Arc<Table>>,
    writer: Mutex<()>,
}

fn functions() -> &'static Functions {
    static FUNCTIONS: OnceLock<Functions> = OnceLock::new();
    FUNCTIONS.get_or_init(|| {
        let builtins: [Arc<dyn Function>; 4] = [
            Arc::new(Aggregate::Min),
            Arc::new(Aggregate::Max),
            Arc::new(Aggregate::Avg),
            Arc::new(Aggregate::Sum),
        ];
        let table = builtins
            .into_iter()
            .map(|function| (function.name().to_ascii_uppercase(), function))
            .collect();
        Functions {
            published: RwLock::new(Arc::new(table)),
            writer: Mutex::new(()),
        }
    })
}

/// Makes `function` callable from formulas parsed after this returns.
///
/// # Errors
/// [`FormulaError::DuplicateFunction`] when the name is taken, built-ins included.
pub fn register(function: Arc<dyn Function>) -> Result<(), FormulaError> {
    let name = function.name().to_ascii_uppercase();
    let functions = functions();
    let _writer = functions.writer.lock();
    let current = functions.published.read().clone();
    if current.contains_key(&name) {
        warn!("rejected second registration of formula function {name}");
        return Err(FormulaError::DuplicateFunction { name });
    }
    debug!("registered formula function {name}");
    let mut next = (*current).clone();
    next.insert(name, function);
    *functions.published.write() = Arc::new(next);
    Ok(())
}

/// The function registered under `name`, compared case-insensitively.
pub fn lookup(name: &str) -> Option<Arc<dyn Function>> {
    let table = functions().published.read().clone();
    table.get(&name.to_ascii_uppercase()).cloned()
}

/// The built-in numeric aggregates. Each takes two or more numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Min,
    Max,
    Avg,
    Sum,
}

impl Function for Aggregate {
    fn name(&self) -> &str {
        match self {
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
            Aggregate::Avg => "AVG",
            Aggregate::Sum => "SUM",
        }
    }

    fn validate(&self, args: &[Expr]) -> Result<(), String> {
        if args.len() < 2 {
            return Err(format!(
                "{} takes at least 2 arguments, got {}",
                self.name(),
                args.len()
            ));
        }
        Ok(())
    }

    fn call(&self, args: &[Value]) -> Result<Value, FormulaError> {
        let numbers = args
            .iter()
            .enumerate()
            .map(|(i, arg)| {
                arg.as_f64().ok_or_else(|| FormulaError::TypeMismatch {
                    message: format!(
                        "argument {} of {} is {}, not a number",
                        i + 1,
                        self.name(),
                        crate::codec::kind_of(arg)
                    ),
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let result = match self {
            Aggregate::Min => numbers.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregate::Max => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregate::Sum => numbers.iter().sum(),
            Aggregate::Avg => numbers.iter().sum::<f64>() / numbers.len() as f64,
        };
        Ok(super::eval::number(result))
    }
}
