#![forbid(unsafe_code)]

//! Condition mini-language.
//!
//! Conditions appear in `data-next-show` / `data-next-hide` and compile into
//! one of three shapes:
//!
//! ```text
//! condition  := call | comparison | reference
//! call       := ident "." ident "(" args? ")"
//! comparison := path op operand
//! reference  := path
//! path       := segment ("." segment)*
//! op         := "===" | "!==" | ">=" | "<=" | "==" | "!=" | ">" | "<"
//! ```
//!
//! Operators are tried in the order listed, so `===` is never mis-split as
//! `==` and `>=` never as `>`. A single-segment path lives in the `cart`
//! namespace. Operands compared against the `param` namespace (alias
//! `params`) are always strings.
//!
//! # Failure Modes
//!
//! [`compile_condition`] never fails: malformed input degrades to
//! `PropertyReference(cart.isEmpty)` and logs a warning. Use
//! [`try_compile_condition`] to see the structured [`ConditionError`].

use crate::value::classify;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ---------------------------------------------------------------------------
// Namespaces and paths
// ---------------------------------------------------------------------------

/// Logical data domain a property path resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Cart,
    Package,
    Campaign,
    Order,
    Selection,
    Shipping,
    Param,
}

impl Namespace {
    pub const ALL: [Namespace; 7] = [
        Self::Cart,
        Self::Package,
        Self::Campaign,
        Self::Order,
        Self::Selection,
        Self::Shipping,
        Self::Param,
    ];

    /// Parse a namespace name; `params` is accepted for `param`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "cart" => Some(Self::Cart),
            "package" => Some(Self::Package),
            "campaign" => Some(Self::Campaign),
            "order" => Some(Self::Order),
            "selection" => Some(Self::Selection),
            "shipping" => Some(Self::Shipping),
            "param" | "params" => Some(Self::Param),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Package => "package",
            Self::Campaign => "campaign",
            Self::Order => "order",
            Self::Selection => "selection",
            Self::Shipping => "shipping",
            Self::Param => "param",
        }
    }
}

/// `object.property`, where `property` may itself be dotted.
///
/// `object` is kept as written (lowercased `params` folds to `param`) so
/// unknown namespaces survive compilation and resolve to nothing later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyPath {
    pub object: String,
    pub property: String,
}

impl PropertyPath {
    #[must_use]
    pub fn new(object: impl Into<String>, property: impl Into<String>) -> Self {
        let object = object.into();
        let object = if object == "params" { "param".to_string() } else { object };
        Self {
            object,
            property: property.into(),
        }
    }

    /// Split a dotted path. A single segment is a `cart` property.
    #[must_use]
    pub fn from_dotted(path: &str) -> Self {
        match path.split_once('.') {
            Some((object, property)) => Self::new(object, property),
            None => Self::new(Namespace::Cart.as_str(), path),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> Option<Namespace> {
        Namespace::parse(&self.object)
    }

    #[must_use]
    pub fn is_param(&self) -> bool {
        self.namespace() == Some(Namespace::Param)
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.object, self.property)
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    StrictEq,
    StrictNe,
    Ge,
    Le,
    Eq,
    Ne,
    Gt,
    Lt,
}

impl Operator {
    /// Match order. Longer tokens come before their prefixes.
    pub const PRECEDENCE: [Operator; 8] = [
        Self::StrictEq,
        Self::StrictNe,
        Self::Ge,
        Self::Le,
        Self::Eq,
        Self::Ne,
        Self::Gt,
        Self::Lt,
    ];

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::StrictEq => "===",
            Self::StrictNe => "!==",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ---------------------------------------------------------------------------
// Expression
// ---------------------------------------------------------------------------

/// A compiled condition. Pure data; evaluation lives in [`crate::eval`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionExpression {
    FunctionCall {
        object: String,
        method: String,
        args: Vec<Value>,
    },
    Comparison {
        left: PropertyPath,
        operator: Operator,
        right: Value,
    },
    PropertyReference(PropertyPath),
}

impl ConditionExpression {
    /// The degraded form malformed conditions compile to.
    #[must_use]
    pub fn fallback() -> Self {
        Self::PropertyReference(PropertyPath::new("cart", "isEmpty"))
    }
}

/// Why a condition string did not compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    /// Nothing but whitespace.
    Empty,
    /// A path segment is empty or contains characters outside `[A-Za-z0-9_$-]`.
    InvalidPath(String),
    /// An operator is missing its left or right operand.
    MissingOperand(Operator),
    /// A call's argument list has unbalanced quotes or brackets.
    UnbalancedArguments(String),
}

impl fmt::Display for ConditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty condition"),
            Self::InvalidPath(p) => write!(f, "invalid property path `{p}`"),
            Self::MissingOperand(op) => write!(f, "operator `{op}` is missing an operand"),
            Self::UnbalancedArguments(a) => write!(f, "unbalanced argument list `{a}`"),
        }
    }
}

impl std::error::Error for ConditionError {}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// Compile a condition, degrading malformed input to
/// [`ConditionExpression::fallback`].
#[must_use]
pub fn compile_condition(expr: &str) -> ConditionExpression {
    match try_compile_condition(expr) {
        Ok(compiled) => compiled,
        Err(err) => {
            tracing::warn!(condition = expr, error = %err, "malformed condition, using cart.isEmpty");
            ConditionExpression::fallback()
        }
    }
}

/// Compile a condition, reporting why malformed input was rejected.
pub fn try_compile_condition(expr: &str) -> Result<ConditionExpression, ConditionError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(ConditionError::Empty);
    }

    if let Some(call) = parse_call(expr)? {
        return Ok(call);
    }

    for operator in Operator::PRECEDENCE {
        if let Some((lhs, rhs)) = expr.split_once(operator.symbol()) {
            let (lhs, rhs) = (lhs.trim(), rhs.trim());
            if lhs.is_empty() || rhs.is_empty() {
                return Err(ConditionError::MissingOperand(operator));
            }
            let left = parse_path(lhs)?;
            let right = parse_operand(rhs, left.is_param());
            return Ok(ConditionExpression::Comparison { left, operator, right });
        }
    }

    parse_path(expr).map(ConditionExpression::PropertyReference)
}

/// `ident.ident(args)`; `Ok(None)` when the shape does not match.
fn parse_call(expr: &str) -> Result<Option<ConditionExpression>, ConditionError> {
    let Some(open) = expr.find('(') else {
        return Ok(None);
    };
    if !expr.ends_with(')') {
        return Ok(None);
    }
    let Some((object, method)) = expr[..open].split_once('.') else {
        return Ok(None);
    };
    if !is_identifier(object) || !is_identifier(method) {
        return Ok(None);
    }
    let inner = &expr[open + 1..expr.len() - 1];
    let args = split_top_level(inner)?
        .into_iter()
        .map(|arg| parse_operand(arg, false))
        .collect();
    Ok(Some(ConditionExpression::FunctionCall {
        object: object.to_string(),
        method: method.to_string(),
        args,
    }))
}

fn parse_path(text: &str) -> Result<PropertyPath, ConditionError> {
    let valid = text
        .split('.')
        .all(|seg| !seg.is_empty() && seg.chars().all(is_path_char));
    if !valid {
        return Err(ConditionError::InvalidPath(text.to_string()));
    }
    Ok(PropertyPath::from_dotted(text))
}

/// Quoted → literal string; otherwise classified, or kept as a string when
/// `force_string`.
fn parse_operand(text: &str, force_string: bool) -> Value {
    if let Some(literal) = unquote(text) {
        return Value::String(literal.to_string());
    }
    if force_string {
        return Value::String(text.to_string());
    }
    classify(Some(text)).parsed
}

fn unquote(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && matches!(first, b'"' | b'\'') {
            return Some(&text[1..text.len() - 1]);
        }
    }
    None
}

/// Split on commas outside quotes and brackets. Empty input → no args.
fn split_top_level(text: &str) -> Result<Vec<&str>, ConditionError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => {
                depth -= 1;
                if depth < 0 {
                    return Err(ConditionError::UnbalancedArguments(text.to_string()));
                }
            }
            (None, ',') if depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if quote.is_some() || depth != 0 {
        return Err(ConditionError::UnbalancedArguments(text.to_string()));
    }
    parts.push(text[start..].trim());
    Ok(parts)
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '-')
}
