use super::ast::{BinaryOp, Expr, ExprKind};
use super::functions;
use crate::codec::kind_of;
use crate::error::FormulaError;
use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, HashMap};

/// Where `{name}` references get their values.
pub trait Scope {
    fn lookup(&self, name: &str) -> Option<Value>;
}

impl Scope for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Scope for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Scope for Map<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// Looks names up as members of a JSON object. Any other value binds nothing.
impl Scope for Value {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// A scope with no bindings.
impl Scope for () {
    fn lookup(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Evaluates `expr`. Unbound references are `null`, and `null` on either side of an
/// operator makes the whole operation `null`.
pub fn evaluate<S: Scope + ?Sized>(expr: &Expr, scope: &S) -> Result<Value, FormulaError> {
    match &expr.kind {
        ExprKind::Const { value, .. } => Ok(number(*value)),
        ExprKind::Ref(name) => Ok(scope.lookup(name).unwrap_or(Value::Null)),
        ExprKind::Group(inner) => evaluate(inner, scope),
        ExprKind::Binary { op, lhs, rhs } => {
            let left = evaluate(lhs, scope)?;
            let right = evaluate(rhs, scope)?;
            if left.is_null() || right.is_null() {
                return Ok(Value::Null);
            }
            let x = operand(&left, *op)?;
            let y = operand(&right, *op)?;
            let result = match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div => {
                    if y == 0.0 {
                        return Err(FormulaError::DivideByZero {
                            pos: expr.pos(),
                            end: expr.end(),
                        });
                    }
                    x / y
                }
            };
            Ok(number(result))
        }
        ExprKind::Call { name, args } => {
            let function = functions::lookup(name)
                .ok_or_else(|| FormulaError::UnresolvedFunction { name: name.clone() })?;
            let values = args
                .iter()
                .map(|arg| evaluate(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            function.call(&values)
        }
    }
}

fn operand(value: &Value, op: BinaryOp) -> Result<f64, FormulaError> {
    value.as_f64().ok_or_else(|| FormulaError::TypeMismatch {
        message: format!("`{op}` needs numbers, found {}", kind_of(value)),
    })
}

/// Wraps a result as a JSON number. Infinities and NaN have no JSON form and become `null`.
pub fn number(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}
