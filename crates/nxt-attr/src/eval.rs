#![forbid(unsafe_code)]

//! Condition evaluation against live namespace data.
//!
//! Compiled conditions hold no state; [`evaluate`] asks a
//! [`NamespaceResolver`] for the current values every time it runs.
//!
//! # Semantics
//!
//! | Form | Result |
//! |------|--------|
//! | reference | truthiness of the resolved value (missing → false) |
//! | call | truthiness of the resolver's answer (unsupported → false) |
//! | `===` / `!==` | same JSON type and equal value |
//! | `==` / `!=` | equal after numeric-string / boolean coercion |
//! | `>` `>=` `<` `<=` | numeric when both sides coerce, else string ordering |
//!
//! Comparisons against the `param` namespace first render the left side as
//! a string, since operands there are always strings.

use crate::condition::{ConditionExpression, Operator, PropertyPath};
use serde_json::Value;
use std::cmp::Ordering;

/// Supplies values for property paths and namespace functions.
pub trait NamespaceResolver {
    /// Current value at `path`, or `None` when it does not exist.
    fn resolve(&self, path: &PropertyPath) -> Option<Value>;

    /// Result of `object.method(args)`, or `None` when unsupported.
    fn call(&self, object: &str, method: &str, args: &[Value]) -> Option<Value> {
        let _ = (object, method, args);
        None
    }
}

/// Evaluate a compiled condition.
pub fn evaluate(expr: &ConditionExpression, resolver: &dyn NamespaceResolver) -> bool {
    match expr {
        ConditionExpression::PropertyReference(path) => resolver.resolve(path).is_some_and(|v| is_truthy(&v)),
        ConditionExpression::FunctionCall { object, method, args } => {
            resolver.call(object, method, args).is_some_and(|v| is_truthy(&v))
        }
        ConditionExpression::Comparison { left, operator, right } => {
            let mut lhs = resolver.resolve(left).unwrap_or(Value::Null);
            if left.is_param() && !lhs.is_null() {
                lhs = Value::String(display_string(&lhs));
            }
            compare(&lhs, *operator, right)
        }
    }
}

/// Script-style truthiness.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Apply `operator` to two values.
#[must_use]
pub fn compare(lhs: &Value, operator: Operator, rhs: &Value) -> bool {
    match operator {
        Operator::StrictEq => strict_eq(lhs, rhs),
        Operator::StrictNe => !strict_eq(lhs, rhs),
        Operator::Eq => loose_eq(lhs, rhs),
        Operator::Ne => !loose_eq(lhs, rhs),
        Operator::Gt => ordering(lhs, rhs) == Some(Ordering::Greater),
        Operator::Ge => matches!(ordering(lhs, rhs), Some(Ordering::Greater | Ordering::Equal)),
        Operator::Lt => ordering(lhs, rhs) == Some(Ordering::Less),
        Operator::Le => matches!(ordering(lhs, rhs), Some(Ordering::Less | Ordering::Equal)),
    }
}

fn strict_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => lhs == rhs,
    }
}

fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    if strict_eq(lhs, rhs) {
        return true;
    }
    match (lhs, rhs) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(a), Value::String(b)) => a == b,
        _ => match (as_number(lhs), as_number(rhs)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn ordering(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (as_number(lhs), as_number(rhs)) {
        return a.partial_cmp(&b);
    }
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Numeric view of a value: numbers, numeric strings and booleans.
#[must_use]
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
            }
        }
        _ => None,
    }
}

/// Render a value the way it would appear as attribute text.
#[must_use]
pub fn display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Look up a dotted path inside a JSON value.
///
/// Segments index objects by key and arrays by position; `length` on an
/// array or string yields its length.
#[must_use]
pub fn json_path(value: &Value, path: &str) -> Option<Value> {
    if path.is_empty() {
        return Some(value.clone());
    }
    let mut current = value;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => match segment {
                "length" => return segments.peek().is_none().then(|| Value::from(items.len())),
                _ => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            },
            Value::String(s) if segment == "length" => {
                return segments.peek().is_none().then(|| Value::from(s.chars().count()));
            }
            _ => None,
        };
        current = next?;
    }
    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::compile_condition;
    use serde_json::json;

    struct Fixed(Value);

    impl NamespaceResolver for Fixed {
        fn resolve(&self, path: &PropertyPath) -> Option<Value> {
            self.0
                .get(&path.object)
                .and_then(|ns| json_path(ns, &path.property))
        }

        fn call(&self, object: &str, method: &str, args: &[Value]) -> Option<Value> {
            match (object, method) {
                ("cart", "hasItem") => {
                    let items = self.0.pointer("/cart/items")?.as_array()?;
                    let wanted = args.first()?;
                    Some(Value::Bool(
                        items.iter().any(|i| loose_eq(&i["packageId"], wanted)),
                    ))
                }
                _ => None,
            }
        }
    }

    fn data() -> Fixed {
        Fixed(json!({
            "cart": {"total": 120.5, "isEmpty": false, "items": [{"packageId": 7}], "code": "SAVE"},
            "param": {"ref": "abc123", "x": "123"},
        }))
    }

    fn check(expr: &str) -> bool {
        evaluate(&compile_condition(expr), &data())
    }

    #[test]
    fn references_use_truthiness() {
        assert!(!check("cart.isEmpty"));
        assert!(check("cart.items"));
        assert!(!check("cart.missing"));
        assert!(check("cart.items.length"));
    }

    #[test]
    fn numeric_comparisons() {
        assert!(check("cart.total > 100"));
        assert!(check("cart.total >= 120.5"));
        assert!(!check("cart.total < 100"));
        assert!(check("cart.items.length == 1"));
    }

    #[test]
    fn strict_vs_loose() {
        assert!(check("cart.items.0.packageId == '7'"));
        assert!(!check("cart.items.0.packageId === '7'"));
        assert!(check("cart.items.0.packageId === 7"));
        assert!(check("cart.code !== 'OTHER'"));
    }

    #[test]
    fn params_compare_as_strings() {
        assert!(check("param.x == 123"));
        assert!(check("param.x === 123"));
        assert!(check("params.ref === \"abc123\""));
        assert!(!check("param.missing == 0"));
    }

    #[test]
    fn function_calls() {
        assert!(check("cart.hasItem(7)"));
        assert!(!check("cart.hasItem(8)"));
        assert!(!check("cart.unknown()"));
    }

    #[test]
    fn json_path_edges() {
        let v = json!({"a": {"b": [10, {"c": "hey"}]}});
        assert_eq!(json_path(&v, "a.b.1.c"), Some(json!("hey")));
        assert_eq!(json_path(&v, "a.b.length"), Some(json!(2)));
        assert_eq!(json_path(&v, "a.b.1.c.length"), Some(json!(3)));
        assert_eq!(json_path(&v, "a.b.9"), None);
        assert_eq!(json_path(&v, "a.x.y"), None);
        assert_eq!(json_path(&v, ""), Some(v.clone()));
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!([])));
        assert!(!is_truthy(&Value::Null));
    }
}
