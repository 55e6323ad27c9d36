#![forbid(unsafe_code)]

//! Error types for the runtime.
//!
//! None of these escape to the page: the scanner logs them and moves on.
//! They exist so tests and the stats surface can tell failures apart.

use nxt_attr::EnhancerType;
use nxt_dom::{DomError, ElementId};
use std::any::Any;
use std::fmt;

/// A behavior failed inside one of its lifecycle hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum EnhancerError {
    /// A required attribute is missing.
    MissingAttribute(&'static str),
    /// An attribute holds a value the behavior cannot use.
    InvalidAttribute { name: &'static str, value: String },
    /// A document operation failed.
    Dom(DomError),
    /// The hook panicked.
    Panicked(String),
    /// Behavior-specific failure.
    Failed(String),
}

impl fmt::Display for EnhancerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAttribute(name) => write!(f, "missing attribute `{name}`"),
            Self::InvalidAttribute { name, value } => {
                write!(f, "invalid value `{value}` for `{name}`")
            }
            Self::Dom(err) => write!(f, "document error: {err}"),
            Self::Panicked(msg) => write!(f, "panicked: {msg}"),
            Self::Failed(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for EnhancerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Dom(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DomError> for EnhancerError {
    fn from(err: DomError) -> Self {
        Self::Dom(err)
    }
}

/// A type tag could not be turned into a behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The type is recognized but no module is registered for it.
    NoImplementation(EnhancerType),
    /// `data-next-action` names an action no module handles.
    UnknownAction(String),
    /// `data-next-display` names a path no display variant can serve.
    UnresolvableDisplay(String),
    /// The element lost the attribute that selected this type.
    MissingDiscriminant(EnhancerType),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoImplementation(ty) => write!(f, "no implementation registered for `{ty}`"),
            Self::UnknownAction(action) => write!(f, "unknown action `{action}`"),
            Self::UnresolvableDisplay(path) => write!(f, "no display variant for `{path}`"),
            Self::MissingDiscriminant(ty) => write!(f, "element no longer carries a `{ty}` attribute"),
        }
    }
}

impl std::error::Error for ResolveError {}

/// A scan request was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// A scan is already in flight; the request was dropped.
    AlreadyScanning,
    /// The scan root is not in the document.
    UnknownRoot(ElementId),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyScanning => write!(f, "a scan is already in progress"),
            Self::UnknownRoot(id) => write!(f, "scan root {id} is not in the document"),
        }
    }
}

impl std::error::Error for ScanError {}

/// A change handler failed while receiving a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    Failed { handler: String, message: String },
    Panicked { handler: String, message: String },
}

impl HandlerError {
    #[must_use]
    pub fn failed(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            handler: handler.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { handler, message } => write!(f, "handler `{handler}` failed: {message}"),
            Self::Panicked { handler, message } => {
                write!(f, "handler `{handler}` panicked: {message}")
            }
        }
    }
}

impl std::error::Error for HandlerError {}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
