use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tagjson::error::FormulaError;
use tagjson::formula::{self, Expr, Formula, Function};

fn eval(source: &str, scope: &Value) -> Result<Value, FormulaError> {
    Formula::parse(source)?.evaluate(scope)
}

/// Raises the first argument to the power of the second.
struct Pow;

impl Function for Pow {
    fn name(&self) -> &str {
        "pow"
    }

    fn validate(&self, args: &[Expr]) -> Result<(), String> {
        if args.len() != 2 {
            return Err(format!("POW takes exactly 2 arguments, got {}", args.len()));
        }
        Ok(())
    }

    fn call(&self, args: &[Value]) -> Result<Value, FormulaError> {
        let base = args[0].as_f64().unwrap_or(f64::NAN);
        let exponent = args[1].as_f64().unwrap_or(f64::NAN);
        Ok(formula::eval::number(base.powf(exponent)))
    }
}

/// Counts its arguments, whatever they are.
struct Count;

impl Function for Count {
    fn name(&self) -> &str {
        "COUNT"
    }

    fn validate(&self, _args: &[Expr]) -> Result<(), String> {
        Ok(())
    }

    fn call(&self, args: &[Value]) -> Result<Value, FormulaError> {
        Ok(json!(args.len()))
    }
}

#[test]
fn test_function_with_reference() {
    assert_eq!(eval("MIN(1+2, 3*4, {x})", &json!({"x": 5})).unwrap(), json!(3.0));
    assert_eq!(eval("MIN(1+2, 3*4, {x})", &json!({"x": -1})).unwrap(), json!(-1.0));
}

#[test]
fn test_precedence() {
    assert_eq!(eval("1 + 2 * 3 - 4 / 2", &Value::Null).unwrap(), json!(5.0));
    assert_eq!(eval("(1 + 2) * 3", &Value::Null).unwrap(), json!(9.0));
    assert_eq!(eval("10 - 4 - 3", &Value::Null).unwrap(), json!(3.0));
    assert_eq!(eval("2 * 3 + 4 * 5", &Value::Null).unwrap(), json!(26.0));
}

#[test]
fn test_aggregates() {
    let scope = json!({"a": 2, "b": 6});
    assert_eq!(eval("max({a}, {b}, 4)", &scope).unwrap(), json!(6.0));
    assert_eq!(eval("AVG({a}, {b})", &scope).unwrap(), json!(4.0));
    assert_eq!(eval("SUM({a}, {b}) * 0.5", &scope).unwrap(), json!(4.0));
}

#[test]
fn test_divide_by_zero_reports_the_division() {
    let err = eval("1/0", &Value::Null).unwrap_err();
    assert!(matches!(err, FormulaError::DivideByZero { .. }));
    assert_eq!((err.pos(), err.end()), (Some(0), Some(3)));

    let err = eval("2 + 6 / ({z} - 1)", &json!({"z": 1})).unwrap_err();
    assert_eq!((err.pos(), err.end()), (Some(4), Some(17)));
}

#[test]
fn test_null_propagates() {
    assert_eq!(eval("{missing} + 1", &json!({})).unwrap(), Value::Null);
    assert_eq!(eval("2 * {n}", &json!({"n": null})).unwrap(), Value::Null);
    assert_eq!(eval("1 / {n}", &json!({})).unwrap(), Value::Null);
}

#[test]
fn test_non_numeric_reference() {
    let err = eval("{name} + 1", &json!({"name": "ann"})).unwrap_err();
    assert!(matches!(err, FormulaError::TypeMismatch { .. }));
    let err = eval("SUM({name}, 1)", &json!({"name": "ann"})).unwrap_err();
    assert!(matches!(err, FormulaError::TypeMismatch { .. }));
}

#[test]
fn test_scopes() {
    let mut map = HashMap::new();
    map.insert("rate".to_string(), json!(0.25));
    let formula = Formula::parse("{rate} * 8").unwrap();
    assert_eq!(formula.evaluate(&map).unwrap(), json!(2.0));
    assert_eq!(formula.evaluate(&()).unwrap(), Value::Null);
}

#[test]
fn test_display_is_stable() {
    for source in [
        "1+2*3",
        "(1 + 2) * {x} / 4",
        "min({a}, 2.50, max(1, 2))",
        "((3))",
        "10 - 4 - 3",
        "0.1 + 7",
    ] {
        let first = Formula::parse(source).unwrap().to_string();
        let second = Formula::parse(&first).unwrap().to_string();
        assert_eq!(first, second, "{source}");
    }
}

#[test]
fn test_render_keeps_the_value() {
    let scope = json!({"x": 3});
    for source in ["1+2*3-{x}", "(1+2)*({x}-1)/4", "8/4/2", "AVG(1, (2+3)*{x})"] {
        let formula = Formula::parse(source).unwrap();
        let rendered = Formula::parse(&formula.to_string()).unwrap();
        assert_eq!(
            formula.evaluate(&scope).unwrap(),
            rendered.evaluate(&scope).unwrap(),
            "{source}"
        );
    }
}

#[test]
fn test_registered_functions() {
    formula::register(Arc::new(Pow)).unwrap();
    assert_eq!(eval("POW(2, 10)", &Value::Null).unwrap(), json!(1024.0));
    assert_eq!(eval("pow({b}, 2) + 1", &json!({"b": 3})).unwrap(), json!(10.0));

    let err = Formula::parse("POW(2)").unwrap_err();
    assert!(matches!(err, FormulaError::Arity { ref name, .. } if name == "POW"));

    let err = formula::register(Arc::new(Pow)).unwrap_err();
    assert!(matches!(err, FormulaError::DuplicateFunction { ref name } if name == "POW"));
}

#[test]
fn test_zero_argument_call() {
    formula::register(Arc::new(Count)).unwrap();
    assert_eq!(eval("count()", &Value::Null).unwrap(), json!(0));
    assert_eq!(eval("COUNT(1, {x}, 3)", &json!({})).unwrap(), json!(3));
    assert!(Formula::parse("MIN()").is_err());
}

#[test]
fn test_unknown_function() {
    let err = Formula::parse("1 + MEDIAN(1, 2)").unwrap_err();
    assert!(matches!(err, FormulaError::UnknownFunction { ref name, .. } if name == "MEDIAN"));
    assert_eq!((err.pos(), err.end()), (Some(4), Some(10)));
}

#[test]
fn test_long_chains_fail_cleanly() {
    let terms = vec!["1"; 100_000].join("+");
    let err = Formula::parse(&terms).unwrap_err();
    assert!(matches!(err, FormulaError::Syntax { .. }));

    let nested = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
    assert!(matches!(Formula::parse(&nested), Err(FormulaError::Syntax { .. })));

    let terms = vec!["1"; 200].join("+");
    assert_eq!(eval(&terms, &Value::Null).unwrap(), json!(200.0));
}

#[test]
fn test_huge_literal_is_rejected() {
    let source = format!("{}*2", "9".repeat(400));
    let err = Formula::parse(&source).unwrap_err();
    assert!(matches!(err, FormulaError::Syntax { .. }));
    assert_eq!((err.pos(), err.end()), (Some(0), Some(400)));
}

#[test]
fn test_syntax_errors() {
    for source in ["", "1 +", "* 2", "1 2", "(1 + 2", "1 + 2)", "{x", "{}", "1.2.3", "-1", "a + 1"] {
        let err = Formula::parse(source).unwrap_err();
        assert!(err.pos().is_some(), "{source} should report a position");
    }
}
