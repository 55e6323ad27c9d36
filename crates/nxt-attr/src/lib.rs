#![forbid(unsafe_code)]

//! Attribute parsing for the nxt enhancement runtime.
//!
//! - [`value`]: raw attribute string → typed [`AttributeValue`].
//! - [`condition`]: the `data-next-show`/`data-next-hide` condition language.
//! - [`eval`]: evaluating compiled conditions against live data.
//! - [`rules`]: attribute set → ordered [`EnhancerTypeSet`].
//! - [`vocab`]: every attribute name the runtime understands.

pub mod condition;
pub mod eval;
pub mod rules;
pub mod value;
pub mod vocab;

pub use condition::{
    ConditionError, ConditionExpression, Namespace, Operator, PropertyPath, compile_condition,
    try_compile_condition,
};
pub use eval::{NamespaceResolver, evaluate, is_truthy, json_path};
pub use rules::{AttributeLookup, EnhancerRule, EnhancerType, EnhancerTypeSet, RULES, enhancer_types_for, rule_for};
pub use value::{AttributeValue, InferredType, classify};
