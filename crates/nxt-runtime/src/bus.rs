#![forbid(unsafe_code)]

//! Shared event bus.
//!
//! Behaviors and the scanner publish [`BusEvent`]s; the host and other
//! behaviors subscribe. Delivery is synchronous, in subscription order.
//!
//! # Invariants
//!
//! 1. An event emitted while another is being delivered is queued and
//!    delivered after the current one reaches every subscriber.
//! 2. Subscribers never observe events out of emission order.

use crate::error::panic_message;
use nxt_dom::ElementId;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::rc::{Rc, Weak};

/// Events carried on the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    /// A behavior reported a failure.
    ErrorOccurred {
        element: Option<ElementId>,
        enhancer: String,
        message: String,
    },
    /// The first scan completed.
    DisplayReady { enhanced: usize },
    /// Behavior-defined signal.
    Custom { name: String, detail: Value },
}

impl BusEvent {
    /// Wire name of the event.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::ErrorOccurred { .. } => "error:occurred",
            Self::DisplayReady { .. } => "display:ready",
            Self::Custom { name, .. } => name,
        }
    }
}

type Handler = Rc<dyn Fn(&BusEvent)>;

#[derive(Default)]
struct BusInner {
    subscribers: Vec<Weak<dyn Fn(&BusEvent)>>,
    queue: VecDeque<BusEvent>,
    delivering: bool,
    emitted: u64,
}

/// Cloneable bus handle.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<BusInner>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EventBus")
            .field("subscribers", &inner.subscribers.len())
            .field("queued", &inner.queue.len())
            .field("emitted", &inner.emitted)
            .finish()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an event.
    pub fn emit(&self, event: BusEvent) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.emitted += 1;
            inner.queue.push_back(event);
            if inner.delivering {
                return;
            }
            inner.delivering = true;
        }
        loop {
            let next = {
                let mut inner = self.inner.borrow_mut();
                match inner.queue.pop_front() {
                    Some(event) => {
                        inner.subscribers.retain(|w| w.strong_count() > 0);
                        let handlers: Vec<Handler> = inner.subscribers.iter().filter_map(Weak::upgrade).collect();
                        Some((event, handlers))
                    }
                    None => {
                        inner.delivering = false;
                        None
                    }
                }
            };
            let Some((event, handlers)) = next else {
                break;
            };
            tracing::trace!(event = event.name(), subscribers = handlers.len(), "bus deliver");
            for handler in &handlers {
                let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| handler(&event)));
                if let Err(payload) = outcome {
                    tracing::error!(
                        event = event.name(),
                        panic = %panic_message(payload.as_ref()),
                        "bus subscriber panicked"
                    );
                }
            }
        }
    }

    /// Receive every event until the guard is dropped.
    pub fn subscribe(&self, handler: impl Fn(&BusEvent) + 'static) -> BusSubscription {
        let strong: Handler = Rc::new(handler);
        self.inner.borrow_mut().subscribers.push(Rc::downgrade(&strong));
        BusSubscription { _handler: strong }
    }

    /// Total events emitted.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.inner.borrow().emitted
    }
}

/// Guard for a bus subscription. Dropping it unsubscribes.
pub struct BusSubscription {
    _handler: Handler,
}

impl std::fmt::Debug for BusSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusSubscription").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn custom(name: &str) -> BusEvent {
        BusEvent::Custom {
            name: name.to_string(),
            detail: json!(null),
        }
    }

    #[test]
    fn delivers_to_all_subscribers() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (Rc::clone(&log), Rc::clone(&log));
        let _s1 = bus.subscribe(move |e| a.borrow_mut().push(format!("a:{}", e.name())));
        let _s2 = bus.subscribe(move |e| b.borrow_mut().push(format!("b:{}", e.name())));
        bus.emit(BusEvent::DisplayReady { enhanced: 3 });
        assert_eq!(*log.borrow(), vec!["a:display:ready", "b:display:ready"]);
    }

    #[test]
    fn reentrant_emit_is_queued() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let handle = bus.clone();
        let first = Rc::clone(&log);
        let _s1 = bus.subscribe(move |e| {
            first.borrow_mut().push(format!("1:{}", e.name()));
            if e.name() == "outer" {
                handle.emit(custom("inner"));
            }
        });
        let second = Rc::clone(&log);
        let _s2 = bus.subscribe(move |e| second.borrow_mut().push(format!("2:{}", e.name())));
        bus.emit(custom("outer"));
        assert_eq!(*log.borrow(), vec!["1:outer", "2:outer", "1:inner", "2:inner"]);
        assert_eq!(bus.emitted(), 2);
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let bus = EventBus::new();
        let hits = Rc::new(RefCell::new(0));
        let hits_clone = Rc::clone(&hits);
        let sub = bus.subscribe(move |_| *hits_clone.borrow_mut() += 1);
        bus.emit(custom("x"));
        drop(sub);
        bus.emit(custom("y"));
        assert_eq!(*hits.borrow(), 1);
    }
}
