//! Property-based invariant tests for attribute classification, condition
//! compilation and the rule table.
//!
//! Verifies:
//! 1. Every `-?\d+(\.\d+)?` string classifies as a finite number
//! 2. `true`/`false` classify as booleans, empty as null strings
//! 3. compile_condition never panics on arbitrary input
//! 4. Comparisons against `param` always carry a string operand
//! 5. Numeric comparisons round-trip the literal
//! 6. The rule table never yields duplicate types

use nxt_attr::rules::{AttributeLookup, EnhancerType, enhancer_types_for};
use nxt_attr::vocab;
use nxt_attr::{
    ConditionExpression, InferredType, Operator, PropertyPath, classify, compile_condition,
};
use proptest::prelude::*;
use serde_json::Value;

// ── Strategies ─────────────────────────────────────────────────────────────

fn numeric_literal() -> impl Strategy<Value = String> {
    (any::<bool>(), "[0-9]{1,12}", proptest::option::of("[0-9]{1,6}")).prop_map(|(neg, int, frac)| {
        let mut s = String::new();
        if neg {
            s.push('-');
        }
        s.push_str(&int);
        if let Some(frac) = frac {
            s.push('.');
            s.push_str(&frac);
        }
        s
    })
}

fn identifier() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_]{0,10}"
}

fn operator() -> impl Strategy<Value = Operator> {
    proptest::sample::select(Operator::PRECEDENCE.to_vec())
}

fn attribute_name() -> impl Strategy<Value = String> {
    let mut names: Vec<String> = vocab::TRIGGER_ATTRIBUTES.iter().map(|s| s.to_string()).collect();
    names.push("class".into());
    names.push("id".into());
    proptest::sample::select(names)
}

// ═════════════════════════════════════════════════════════════════════════
// 1-2. Classification
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn numeric_strings_classify_as_numbers(raw in numeric_literal()) {
        let v = classify(Some(&raw));
        prop_assert_eq!(v.inferred_type, InferredType::Number);
        let parsed = v.parsed.as_f64();
        prop_assert!(parsed.is_some_and(f64::is_finite), "{} -> {:?}", raw, v.parsed);
        let expected: f64 = raw.parse().unwrap();
        prop_assert!((parsed.unwrap() - expected).abs() <= expected.abs() * 1e-12);
    }

    #[test]
    fn classify_keeps_raw(raw in ".{1,40}") {
        let v = classify(Some(&raw));
        prop_assert_eq!(v.raw.as_deref(), Some(raw.as_str()));
        if v.inferred_type == InferredType::String {
            prop_assert_eq!(v.parsed, Value::String(raw.clone()));
        }
    }
}

#[test]
fn boolean_and_empty_literals() {
    assert_eq!(classify(Some("true")).inferred_type, InferredType::Boolean);
    assert_eq!(classify(Some("false")).parsed, Value::Bool(false));
    let empty = classify(Some(""));
    assert_eq!(empty.inferred_type, InferredType::String);
    assert_eq!(empty.parsed, Value::Null);
    assert_eq!(classify(None).parsed, Value::Null);
}

// ═════════════════════════════════════════════════════════════════════════
// 3-5. Condition compilation
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn compile_never_panics(expr in ".{0,60}") {
        let _ = compile_condition(&expr);
    }

    #[test]
    fn param_operands_are_strings(
        prop in identifier(),
        op in operator(),
        rhs in prop_oneof![numeric_literal(), Just("true".to_string()), identifier()],
    ) {
        let expr = format!("param.{prop} {} {rhs}", op.symbol());
        let compiled = compile_condition(&expr);
        prop_assert_eq!(
            compiled,
            ConditionExpression::Comparison {
                left: PropertyPath::new("param", prop),
                operator: op,
                right: Value::String(rhs),
            }
        );
    }

    #[test]
    fn numeric_operands_are_numbers(prop in identifier(), op in operator(), rhs in numeric_literal()) {
        let expr = format!("cart.{prop} {} {rhs}", op.symbol());
        let ConditionExpression::Comparison { left, operator, right } = compile_condition(&expr) else {
            return Err(TestCaseError::fail(format!("not a comparison: {expr}")));
        };
        prop_assert_eq!(left, PropertyPath::new("cart", prop));
        prop_assert_eq!(operator, op);
        prop_assert_eq!(right, classify(Some(&rhs)).parsed);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Rule table
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn type_sets_have_no_duplicates(
        attrs in proptest::collection::vec((attribute_name(), "[a-z0-9.-]{0,8}"), 0..12)
    ) {
        let set = enhancer_types_for(&attrs);
        let mut seen: Vec<EnhancerType> = Vec::new();
        for ty in set.iter() {
            prop_assert!(!seen.contains(&ty), "duplicate {}", ty);
            seen.push(ty);
        }
        if set.contains(EnhancerType::Selector) {
            prop_assert!(!attrs.has_attribute(vocab::ACTION));
            prop_assert!(!attrs.has_attribute(vocab::UPSELL));
            prop_assert!(!attrs.has_attribute(vocab::UPSELL_ACTION));
        }
    }
}
