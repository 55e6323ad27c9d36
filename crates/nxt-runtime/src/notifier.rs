#![forbid(unsafe_code)]

//! Change notifier: host mutation records → normalized [`DomChange`]s.
//!
//! The notifier owns one document observer scoped to a root. Each
//! [`collect`](ChangeNotifier::collect) drains the observer's records,
//! drops everything outside the watched attribute vocabulary and queues the
//! rest. Queued changes are handed to handlers at most once per coalescing
//! window, when [`poll`](ChangeNotifier::poll) sees the window close.
//!
//! # Normalization
//!
//! | Record | Changes |
//! |--------|---------|
//! | child inserted | `Added` for the node and every descendant carrying a trigger attribute |
//! | child removed | one `Removed` per removed root, with the ids the document purged |
//! | watched attribute set/removed | `AttributeChanged { name, old, new }` |
//! | unwatched attribute, text, html | nothing |
//!
//! # Failure Modes
//!
//! - **Handler error or panic**: logged at `error`; remaining handlers still
//!   receive the batch.
//! - **`start` while active**: ignored with a warning.

use crate::error::{HandlerError, panic_message};
use crate::timer::CoalescingTimer;
use nxt_attr::vocab;
use nxt_dom::{Document, ElementId, MutationRecord, ObserveOptions, ObserverId, SharedDocument};
use std::panic::AssertUnwindSafe;
use std::time::Duration;

/// A normalized document change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomChange {
    /// An element carrying a trigger attribute entered the observed subtree.
    Added(ElementId),
    /// An element left the tree. `purged` lists every id destroyed with it;
    /// it is empty when the element was moved rather than destroyed.
    Removed {
        element: ElementId,
        purged: Vec<ElementId>,
    },
    /// A watched attribute changed value.
    AttributeChanged {
        element: ElementId,
        name: String,
        old: Option<String>,
        new: Option<String>,
    },
}

impl DomChange {
    #[must_use]
    pub fn element(&self) -> ElementId {
        match self {
            Self::Added(id) => *id,
            Self::Removed { element, .. } | Self::AttributeChanged { element, .. } => *element,
        }
    }
}

/// Receives batches of changes.
pub trait ChangeHandler {
    fn name(&self) -> &str;

    fn handle_changes(&mut self, changes: &[DomChange], now: Duration) -> Result<(), HandlerError>;
}

/// Observer lifecycle plus change coalescing.
pub struct ChangeNotifier {
    document: SharedDocument,
    observer: Option<ObserverId>,
    root: Option<ElementId>,
    paused: bool,
    pending: Vec<DomChange>,
    timer: CoalescingTimer,
    handlers: Vec<Box<dyn ChangeHandler>>,
    delivered_batches: u64,
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("observer", &self.observer)
            .field("root", &self.root)
            .field("paused", &self.paused)
            .field("pending", &self.pending.len())
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

impl ChangeNotifier {
    #[must_use]
    pub fn new(document: SharedDocument, window: Duration) -> Self {
        Self {
            document,
            observer: None,
            root: None,
            paused: false,
            pending: Vec::new(),
            timer: CoalescingTimer::coalescing(window),
            handlers: Vec::new(),
            delivered_batches: 0,
        }
    }

    /// Begin observing `root`.
    pub fn start(&mut self, root: ElementId) {
        if self.observer.is_some() {
            tracing::warn!(root = %root, "change notifier already active");
            return;
        }
        let options = ObserveOptions::default().with_attribute_filter(vocab::watched_attributes());
        match self.document.write(|doc| doc.observe(root, options)) {
            Ok(observer) => {
                self.observer = Some(observer);
                self.root = Some(root);
                self.paused = false;
                tracing::debug!(root = %root, "change notifier started");
            }
            Err(err) => tracing::warn!(root = %root, error = %err, "cannot observe root"),
        }
    }

    /// Stop observing and discard anything not yet delivered.
    pub fn stop(&mut self) {
        if let Some(observer) = self.observer.take() {
            let dropped = self.document.write(|doc| doc.disconnect(observer)).len();
            tracing::debug!(dropped_records = dropped, pending = self.pending.len(), "change notifier stopped");
        }
        self.pending.clear();
        self.timer.cancel();
        self.root = None;
        self.paused = false;
    }

    /// Suspend observation. Mutations made while paused are never reported.
    pub fn pause(&mut self) {
        if let Some(observer) = self.observer.take() {
            self.document.write(|doc| doc.disconnect(observer));
            self.pending.clear();
            self.timer.cancel();
            self.paused = true;
            tracing::debug!("change notifier paused");
        }
    }

    /// Resume observation on `root`.
    pub fn resume(&mut self, root: ElementId) {
        if self.observer.is_some() {
            return;
        }
        self.start(root);
    }

    /// Observing right now.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.observer.is_some()
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[must_use]
    pub fn root(&self) -> Option<ElementId> {
        self.root
    }

    /// Changes waiting for the window to close.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn delivered_batches(&self) -> u64 {
        self.delivered_batches
    }

    /// Register an additional handler. Handlers run after the primary one
    /// passed to [`deliver`](Self::deliver), in registration order.
    pub fn add_handler(&mut self, handler: Box<dyn ChangeHandler>) {
        self.handlers.push(handler);
    }

    /// Drain host records into the pending batch. Returns how many changes
    /// were queued.
    pub fn collect(&mut self, now: Duration) -> usize {
        let (Some(observer), Some(root)) = (self.observer, self.root) else {
            return 0;
        };
        let changes = self.document.write(|doc| {
            let records = doc.take_records(observer);
            normalize(doc, root, records)
        });
        let queued = changes.len();
        if queued > 0 {
            self.pending.extend(changes);
            self.timer.schedule(now);
        }
        queued
    }

    /// The pending batch, once the coalescing window has closed.
    pub fn poll(&mut self, now: Duration) -> Option<Vec<DomChange>> {
        if self.timer.poll(now) && !self.pending.is_empty() {
            return Some(std::mem::take(&mut self.pending));
        }
        None
    }

    /// The pending batch regardless of the window.
    pub fn flush(&mut self) -> Option<Vec<DomChange>> {
        self.timer.cancel();
        (!self.pending.is_empty()).then(|| std::mem::take(&mut self.pending))
    }

    /// Whether a window is open.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.timer.is_pending() || !self.pending.is_empty()
    }

    /// Hand a batch to `primary` and then to every registered handler,
    /// isolating each. Returns the failures.
    pub fn deliver(
        &mut self,
        changes: &[DomChange],
        primary: &mut dyn ChangeHandler,
        now: Duration,
    ) -> Vec<HandlerError> {
        self.delivered_batches += 1;
        tracing::debug!(changes = changes.len(), handlers = self.handlers.len() + 1, "delivering changes");
        let mut failures = Vec::new();
        failures.extend(run_handler(primary, changes, now));
        for handler in &mut self.handlers {
            failures.extend(run_handler(handler.as_mut(), changes, now));
        }
        failures
    }
}

fn run_handler(handler: &mut dyn ChangeHandler, changes: &[DomChange], now: Duration) -> Option<HandlerError> {
    let name = handler.name().to_string();
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| handler.handle_changes(changes, now)));
    let err = match outcome {
        Ok(Ok(())) => return None,
        Ok(Err(err)) => err,
        Err(payload) => HandlerError::Panicked {
            handler: name,
            message: panic_message(payload.as_ref()),
        },
    };
    tracing::error!(error = %err, "change handler failed");
    Some(err)
}

/// Translate raw records into watched changes.
fn normalize(doc: &Document, root: ElementId, records: Vec<MutationRecord>) -> Vec<DomChange> {
    let mut out = Vec::new();
    for record in records {
        match record {
            MutationRecord::ChildList { added, removed, .. } => {
                for node in removed {
                    out.push(DomChange::Removed {
                        element: node.id,
                        purged: node.purged,
                    });
                }
                for node in added {
                    if !doc.contains(root, node) {
                        continue;
                    }
                    out.extend(
                        doc.subtree(node)
                            .into_iter()
                            .filter(|id| has_trigger(doc, *id))
                            .map(DomChange::Added),
                    );
                }
            }
            MutationRecord::Attributes { target, name, old_value } => {
                if !vocab::is_watched(&name) || !doc.contains(root, target) {
                    continue;
                }
                let new = doc.attribute(target, &name).map(str::to_string);
                if new == old_value {
                    continue;
                }
                out.push(DomChange::AttributeChanged {
                    element: target,
                    name,
                    old: old_value,
                    new,
                });
            }
            MutationRecord::CharacterData { .. } => {}
        }
    }
    out
}

fn has_trigger(doc: &Document, id: ElementId) -> bool {
    doc.attributes(id).iter().any(|(name, _)| vocab::is_trigger(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn setup() -> (SharedDocument, ChangeNotifier, ElementId) {
        let doc = SharedDocument::new(Document::new());
        let body = doc.read(Document::body);
        let notifier = ChangeNotifier::new(doc.clone(), ms(16));
        (doc, notifier, body)
    }

    struct Recorder {
        name: &'static str,
        seen: std::rc::Rc<std::cell::RefCell<Vec<usize>>>,
        fail: bool,
    }

    impl ChangeHandler for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn handle_changes(&mut self, changes: &[DomChange], _now: Duration) -> Result<(), HandlerError> {
            self.seen.borrow_mut().push(changes.len());
            if self.fail {
                panic!("recorder exploded");
            }
            Ok(())
        }
    }

    #[test]
    fn filters_unwatched_mutations() {
        let (doc, mut notifier, body) = setup();
        let el = doc.write(|d| {
            let el = d.create_element("div");
            d.append_child(body, el).unwrap();
            el
        });
        notifier.start(body);
        doc.write(|d| {
            d.set_attribute(el, "class", "x").unwrap();
            d.set_text(el, "hello").unwrap();
            d.set_attribute(el, "data-other", "1").unwrap();
        });
        assert_eq!(notifier.collect(ms(0)), 0);
        assert!(!notifier.has_pending());
    }

    #[test]
    fn insertion_walks_descendants() {
        let (doc, mut notifier, body) = setup();
        notifier.start(body);
        let (outer, inner) = doc.write(|d| {
            let outer = d.create_element("section");
            let plain = d.create_element("div");
            let inner = d.create_element("span");
            d.set_attribute(inner, vocab::DISPLAY, "cart.total").unwrap();
            d.append_child(outer, plain).unwrap();
            d.append_child(plain, inner).unwrap();
            d.append_child(body, outer).unwrap();
            (outer, inner)
        });
        assert_eq!(notifier.collect(ms(0)), 1);
        let _ = outer;
        assert_eq!(notifier.poll(ms(15)), None);
        assert_eq!(notifier.poll(ms(16)), Some(vec![DomChange::Added(inner)]));
    }

    #[test]
    fn removal_is_one_change_per_root() {
        let (doc, mut notifier, body) = setup();
        let (outer, inner) = doc.write(|d| {
            let outer = d.create_element("section");
            let inner = d.create_element("span");
            d.set_attribute(inner, vocab::DISPLAY, "cart.total").unwrap();
            d.append_child(outer, inner).unwrap();
            d.append_child(body, outer).unwrap();
            (outer, inner)
        });
        notifier.start(body);
        doc.write(|d| d.remove(outer).unwrap());
        notifier.collect(ms(0));
        assert_eq!(
            notifier.flush(),
            Some(vec![DomChange::Removed {
                element: outer,
                purged: vec![outer, inner]
            }])
        );
    }

    #[test]
    fn attribute_change_carries_old_and_new() {
        let (doc, mut notifier, body) = setup();
        let el = doc.write(|d| {
            let el = d.create_element("div");
            d.set_attribute(el, vocab::SHOW, "cart.hasItems").unwrap();
            d.append_child(body, el).unwrap();
            el
        });
        notifier.start(body);
        doc.write(|d| d.set_attribute(el, vocab::SHOW, "cart.isEmpty").unwrap());
        notifier.collect(ms(0));
        assert_eq!(
            notifier.flush(),
            Some(vec![DomChange::AttributeChanged {
                element: el,
                name: vocab::SHOW.to_string(),
                old: Some("cart.hasItems".into()),
                new: Some("cart.isEmpty".into()),
            }])
        );
    }

    #[test]
    fn window_coalesces_bursts() {
        let (doc, mut notifier, body) = setup();
        let el = doc.write(|d| {
            let el = d.create_element("div");
            d.append_child(body, el).unwrap();
            el
        });
        notifier.start(body);
        for i in 0..5u64 {
            doc.write(|d| d.set_attribute(el, vocab::DISPLAY, &format!("cart.v{i}")).unwrap());
            notifier.collect(ms(i));
        }
        assert_eq!(notifier.poll(ms(10)), None);
        assert_eq!(notifier.poll(ms(16)).map(|b| b.len()), Some(5));
    }

    #[test]
    fn start_twice_is_noop() {
        let (doc, mut notifier, body) = setup();
        notifier.start(body);
        notifier.start(body);
        assert_eq!(doc.read(Document::observer_count), 1);
        notifier.stop();
        assert!(!notifier.is_active());
        assert_eq!(doc.read(Document::observer_count), 0);
    }

    #[test]
    fn pause_drops_mutations_until_resume() {
        let (doc, mut notifier, body) = setup();
        notifier.start(body);
        notifier.pause();
        assert!(notifier.is_paused());
        let el = doc.write(|d| {
            let el = d.create_element("div");
            d.set_attribute(el, vocab::DISPLAY, "cart.total").unwrap();
            d.append_child(body, el).unwrap();
            el
        });
        assert_eq!(notifier.collect(ms(0)), 0);
        notifier.resume(body);
        doc.write(|d| d.set_attribute(el, vocab::DISPLAY, "cart.subtotal").unwrap());
        assert_eq!(notifier.collect(ms(1)), 1);
    }

    #[test]
    fn failing_handler_does_not_starve_others() {
        let (_doc, mut notifier, _body) = setup();
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        notifier.add_handler(Box::new(Recorder {
            name: "second",
            seen: std::rc::Rc::clone(&seen),
            fail: false,
        }));
        let mut primary = Recorder {
            name: "primary",
            seen: std::rc::Rc::clone(&seen),
            fail: true,
        };
        let batch = vec![DomChange::Added(ElementId::from_raw(99))];
        let failures = notifier.deliver(&batch, &mut primary, ms(0));
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], HandlerError::Panicked { .. }));
        assert_eq!(*seen.borrow(), vec![1, 1]);
    }
}
