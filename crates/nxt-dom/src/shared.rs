#![forbid(unsafe_code)]

//! Shared handle to a [`Document`].
//!
//! Behaviors, the scanner and the host all touch the same document. The
//! handle keeps every borrow short: callers go through [`SharedDocument::read`]
//! and [`SharedDocument::write`], and event listeners always run after the
//! borrow used to collect them has been released, so a listener may mutate
//! the document freely.
//!
//! # Failure Modes
//!
//! - **Nested borrow**: calling `write` from inside a `read`/`write` closure
//!   panics (RefCell rules). Listeners never run inside one.

use crate::document::{Document, DomError, ElementId};
use crate::event::{DomEvent, EventKind, ListenerId};
use std::cell::RefCell;
use std::rc::Rc;

/// Reference-counted document handle. Clones share the same document.
#[derive(Clone, Debug, Default)]
pub struct SharedDocument {
    inner: Rc<RefCell<Document>>,
}

impl SharedDocument {
    #[must_use]
    pub fn new(document: Document) -> Self {
        Self {
            inner: Rc::new(RefCell::new(document)),
        }
    }

    /// Run `f` with shared access to the document.
    pub fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.inner.borrow())
    }

    /// Run `f` with exclusive access to the document.
    pub fn write<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        f(&mut self.inner.borrow_mut())
    }

    /// Whether both handles point at the same document.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register a listener on `id`.
    pub fn add_listener(
        &self,
        id: ElementId,
        kind: EventKind,
        callback: impl Fn(&DomEvent) + 'static,
    ) -> Result<ListenerId, DomError> {
        self.write(|doc| doc.add_listener(id, kind, Rc::new(callback)))
    }

    pub fn remove_listener(&self, id: ElementId, listener: ListenerId) -> bool {
        self.write(|doc| doc.remove_listener(id, listener))
    }

    /// Dispatch an element event. Returns the number of listeners invoked.
    pub fn dispatch(&self, target: ElementId, kind: EventKind) -> usize {
        self.dispatch_with_value(target, kind, None)
    }

    /// Dispatch an event carrying a form value (change/input).
    pub fn dispatch_with_value(&self, target: ElementId, kind: EventKind, value: Option<&str>) -> usize {
        let path = self.read(|doc| doc.event_path(target, kind, value));
        tracing::trace!(target_element = %target, kind = kind.as_str(), listeners = path.len(), "dispatch");
        for (callback, event) in &path {
            callback(event);
        }
        path.len()
    }
}
