#![forbid(unsafe_code)]

//! Element events and document-level host events.

use crate::document::ElementId;
use serde_json::Value;
use std::rc::Rc;

/// Element event kinds the runtime's behaviors listen for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    Change,
    Input,
    MouseEnter,
    MouseLeave,
    Scroll,
}

impl EventKind {
    /// Host-facing event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Change => "change",
            Self::Input => "input",
            Self::MouseEnter => "mouseenter",
            Self::MouseLeave => "mouseleave",
            Self::Scroll => "scroll",
        }
    }

    /// Whether the event travels from the target up through its ancestors.
    #[must_use]
    pub const fn bubbles(self) -> bool {
        !matches!(self, Self::MouseEnter | Self::MouseLeave)
    }
}

/// An event delivered to element listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct DomEvent {
    pub kind: EventKind,
    /// Element the event was dispatched on.
    pub target: ElementId,
    /// Element whose listener is running.
    pub current_target: ElementId,
    /// Form value carried by change/input events.
    pub value: Option<String>,
}

/// Handle for a registered element listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

pub(crate) type ListenerFn = Rc<dyn Fn(&DomEvent)>;

pub(crate) struct Listener {
    pub(crate) id: ListenerId,
    pub(crate) kind: EventKind,
    pub(crate) callback: ListenerFn,
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// A document-level signal for the embedding host (e.g. "display ready").
#[derive(Debug, Clone, PartialEq)]
pub struct HostEvent {
    pub name: String,
    pub detail: Value,
}
