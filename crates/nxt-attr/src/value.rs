#![forbid(unsafe_code)]

//! Attribute value classification.
//!
//! [`classify`] turns a raw attribute string into an [`AttributeValue`]: the
//! raw text, a JSON value and the inferred type. The result is a pure
//! function of the input and is recomputed whenever the attribute changes.
//!
//! | Raw | Inferred | Parsed |
//! |-----|----------|--------|
//! | absent or `""` | `String` | `null` |
//! | `{...}` / `[...]` valid JSON | `Object` / `Array` | the JSON value |
//! | `{...}` / `[...]` invalid JSON | `String` | the raw string |
//! | `true` / `false` | `Boolean` | the boolean |
//! | `-?\d+(\.\d+)?` | `Number` | the number |
//! | anything else | `String` | the raw string |

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Semantic type inferred from a raw attribute string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferredType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

/// A classified attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub raw: Option<String>,
    pub parsed: Value,
    pub inferred_type: InferredType,
}

impl AttributeValue {
    fn string(raw: &str) -> Self {
        Self {
            raw: Some(raw.to_string()),
            parsed: Value::String(raw.to_string()),
            inferred_type: InferredType::String,
        }
    }

    /// Truthiness of the parsed value (see [`crate::eval::is_truthy`]).
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        crate::eval::is_truthy(&self.parsed)
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.parsed.as_f64()
    }
}

/// Classify a raw attribute string.
#[must_use]
pub fn classify(raw: Option<&str>) -> AttributeValue {
    let Some(text) = raw.filter(|s| !s.is_empty()) else {
        return AttributeValue {
            raw: raw.map(str::to_string),
            parsed: Value::Null,
            inferred_type: InferredType::String,
        };
    };

    if text.starts_with('{') || text.starts_with('[') {
        return match serde_json::from_str::<Value>(text) {
            Ok(parsed @ Value::Object(_)) => AttributeValue {
                raw: Some(text.to_string()),
                parsed,
                inferred_type: InferredType::Object,
            },
            Ok(parsed @ Value::Array(_)) => AttributeValue {
                raw: Some(text.to_string()),
                parsed,
                inferred_type: InferredType::Array,
            },
            _ => AttributeValue::string(text),
        };
    }

    if matches!(text, "true" | "false") {
        return AttributeValue {
            raw: Some(text.to_string()),
            parsed: Value::Bool(text == "true"),
            inferred_type: InferredType::Boolean,
        };
    }

    if is_numeric_literal(text)
        && let Some(number) = parse_number(text)
    {
        return AttributeValue {
            raw: Some(text.to_string()),
            parsed: Value::Number(number),
            inferred_type: InferredType::Number,
        };
    }

    AttributeValue::string(text)
}

/// Whether `text` matches `-?\d+(\.\d+)?`.
#[must_use]
pub fn is_numeric_literal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(int) && frac.is_none_or(all_digits)
}

/// Integers that fit `i64` stay integral; everything else goes through `f64`
/// and is rejected when not finite.
fn parse_number(text: &str) -> Option<Number> {
    if !text.contains('.')
        && let Ok(int) = text.parse::<i64>()
    {
        return Some(Number::from(int));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn empty_and_missing_are_null_strings() {
        for raw in [None, Some("")] {
            let v = classify(raw);
            assert_eq!(v.inferred_type, InferredType::String);
            assert_eq!(v.parsed, Value::Null);
        }
    }

    #[test]
    fn booleans() {
        assert_eq!(classify(Some("true")).parsed, json!(true));
        assert_eq!(classify(Some("false")).inferred_type, InferredType::Boolean);
        assert_eq!(classify(Some("True")).inferred_type, InferredType::String);
    }

    #[test]
    fn numbers() {
        assert_eq!(classify(Some("100")).parsed, json!(100));
        assert_eq!(classify(Some("-3")).parsed, json!(-3));
        assert_eq!(classify(Some("42.50")).as_f64(), Some(42.5));
        assert_eq!(classify(Some("1.")).inferred_type, InferredType::String);
        assert_eq!(classify(Some(".5")).inferred_type, InferredType::String);
        assert_eq!(classify(Some("1e3")).inferred_type, InferredType::String);
        assert_eq!(classify(Some("+1")).inferred_type, InferredType::String);
    }

    #[test]
    fn huge_integers_fall_back_to_float() {
        let v = classify(Some("123456789012345678901234567890"));
        assert_eq!(v.inferred_type, InferredType::Number);
        assert!(v.as_f64().is_some());
    }

    #[test]
    fn json_object_and_array() {
        let obj = classify(Some(r#"{"a":1}"#));
        assert_eq!(obj.inferred_type, InferredType::Object);
        assert_eq!(obj.parsed, json!({"a": 1}));
        let arr = classify(Some("[1,2]"));
        assert_eq!(arr.inferred_type, InferredType::Array);
    }

    #[test]
    fn broken_json_is_raw_string() {
        let v = classify(Some("{item.name}"));
        assert_eq!(v.inferred_type, InferredType::String);
        assert_eq!(v.parsed, json!("{item.name}"));
    }

    #[test]
    fn numeric_literal_shape() {
        assert!(is_numeric_literal("0"));
        assert!(is_numeric_literal("-0.25"));
        assert!(!is_numeric_literal("-"));
        assert!(!is_numeric_literal("1.2.3"));
        assert!(!is_numeric_literal(""));
    }
}
