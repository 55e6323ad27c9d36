#![forbid(unsafe_code)]

//! The behavior contract and the shared base every behavior gets.
//!
//! A behavior implements [`Enhancer`]. It never owns its element or its
//! subscriptions directly: those live in the [`EnhancerBase`] the lifecycle
//! wrapper passes into every hook. Teardown is always `cleanup` first, then
//! [`EnhancerBase::release`], so a behavior can extend teardown but cannot
//! skip the release of its store subscriptions and element listeners.
//!
//! Store callbacks do not call back into behaviors. [`EnhancerBase::subscribe`]
//! records the instance in the [`UpdateQueue`]; the runtime later runs
//! `update` for each queued instance that is still registered.

use crate::bus::{BusEvent, BusSubscription, EventBus};
use crate::config::RuntimeConfig;
use crate::error::EnhancerError;
use crate::store::{Store, Stores, Subscription};
use nxt_attr::{AttributeValue, EnhancerType, classify};
use nxt_dom::{Document, DomEvent, ElementId, EventKind, ListenerId, SharedDocument};
use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Identity and queues
// ---------------------------------------------------------------------------

/// Identity of one behavior instance. Never reused within a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub(crate) u64);

impl InstanceId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// De-duplicated FIFO of instances whose state changed.
#[derive(Clone, Default)]
pub struct UpdateQueue {
    inner: Rc<RefCell<(VecDeque<InstanceId>, HashSet<InstanceId>)>>,
}

impl fmt::Debug for UpdateQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateQueue").field("len", &self.len()).finish()
    }
}

impl UpdateQueue {
    pub fn push(&self, id: InstanceId) {
        let mut inner = self.inner.borrow_mut();
        if inner.1.insert(id) {
            inner.0.push_back(id);
        }
    }

    /// Take everything queued so far.
    pub fn drain(&self) -> Vec<InstanceId> {
        let mut inner = self.inner.borrow_mut();
        inner.1.clear();
        inner.0.drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Elements a behavior asked the scanner to enhance (e.g. rendered rows).
#[derive(Clone, Default)]
pub struct EnhanceRequests {
    inner: Rc<RefCell<Vec<ElementId>>>,
}

impl fmt::Debug for EnhanceRequests {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnhanceRequests")
            .field("len", &self.inner.borrow().len())
            .finish()
    }
}

impl EnhanceRequests {
    pub fn push(&self, id: ElementId) {
        let mut inner = self.inner.borrow_mut();
        if !inner.contains(&id) {
            inner.push(id);
        }
    }

    pub fn drain(&self) -> Vec<ElementId> {
        std::mem::take(&mut *self.inner.borrow_mut())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

/// Handles shared by the scanner and every behavior. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Services {
    pub document: SharedDocument,
    pub stores: Stores,
    pub bus: EventBus,
    pub config: Rc<RuntimeConfig>,
    pub updates: UpdateQueue,
    pub requests: EnhanceRequests,
}

impl Services {
    #[must_use]
    pub fn new(config: RuntimeConfig, document: SharedDocument, stores: Stores, bus: EventBus) -> Self {
        Self {
            document,
            stores,
            bus,
            config: Rc::new(config),
            updates: UpdateQueue::default(),
            requests: EnhanceRequests::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Lifecycle hooks of a behavior.
///
/// `initialize` runs once. `update` runs after a subscribed store changed or
/// the behavior called [`EnhancerBase::request_update`]. `cleanup` runs once
/// during teardown, before the base releases subscriptions and listeners.
pub trait Enhancer {
    /// Short name for logs and error events.
    fn name(&self) -> &'static str;

    fn initialize(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError>;

    fn update(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        let _ = base;
        Ok(())
    }

    fn cleanup(&mut self, base: &mut EnhancerBase) {
        let _ = base;
    }
}

// ---------------------------------------------------------------------------
// Base
// ---------------------------------------------------------------------------

/// Element handle, services and resource tracking for one instance.
pub struct EnhancerBase {
    element: ElementId,
    instance: InstanceId,
    ty: EnhancerType,
    services: Services,
    subscriptions: Vec<Subscription>,
    bus_subscriptions: Vec<BusSubscription>,
    listeners: Vec<(ElementId, ListenerId)>,
}

impl fmt::Debug for EnhancerBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnhancerBase")
            .field("element", &self.element)
            .field("instance", &self.instance)
            .field("ty", &self.ty)
            .field("subscriptions", &self.subscriptions.len())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl EnhancerBase {
    #[must_use]
    pub fn new(element: ElementId, instance: InstanceId, ty: EnhancerType, services: Services) -> Self {
        Self {
            element,
            instance,
            ty,
            services,
            subscriptions: Vec::new(),
            bus_subscriptions: Vec::new(),
            listeners: Vec::new(),
        }
    }

    #[must_use]
    pub fn element(&self) -> ElementId {
        self.element
    }

    #[must_use]
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    #[must_use]
    pub fn enhancer_type(&self) -> EnhancerType {
        self.ty
    }

    #[must_use]
    pub fn services(&self) -> &Services {
        &self.services
    }

    #[must_use]
    pub fn document(&self) -> &SharedDocument {
        &self.services.document
    }

    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.services.stores
    }

    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.services.bus
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.services.config
    }

    // -- Subscriptions ------------------------------------------------------

    /// Queue an `update` for this instance whenever `store` changes.
    pub fn subscribe<T: Clone + PartialEq + 'static>(&mut self, store: &Store<T>) {
        let updates = self.services.updates.clone();
        let instance = self.instance;
        self.subscriptions
            .push(store.subscribe(move |_| updates.push(instance)));
    }

    /// Run `callback` whenever `store` changes, until teardown.
    pub fn subscribe_with<T: Clone + PartialEq + 'static>(&mut self, store: &Store<T>, callback: impl Fn(&T) + 'static) {
        self.subscriptions.push(store.subscribe(callback));
    }

    /// Run `callback` for every bus event, until teardown.
    pub fn subscribe_bus(&mut self, callback: impl Fn(&BusEvent) + 'static) {
        self.bus_subscriptions.push(self.services.bus.subscribe(callback));
    }

    /// Ask for `update` on the next runtime step.
    pub fn request_update(&self) {
        self.services.updates.push(self.instance);
    }

    /// Ask the scanner to enhance `element` (e.g. a freshly rendered row).
    pub fn request_enhance(&self, element: ElementId) {
        self.services.requests.push(element);
    }

    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len() + self.bus_subscriptions.len()
    }

    // -- Listeners ----------------------------------------------------------

    /// Listen for `kind` on the owning element.
    pub fn listen(&mut self, kind: EventKind, callback: impl Fn(&DomEvent) + 'static) -> Result<ListenerId, EnhancerError> {
        self.listen_on(self.element, kind, callback)
    }

    /// Listen for `kind` on another element (usually a descendant).
    pub fn listen_on(
        &mut self,
        element: ElementId,
        kind: EventKind,
        callback: impl Fn(&DomEvent) + 'static,
    ) -> Result<ListenerId, EnhancerError> {
        let id = self.services.document.add_listener(element, kind, callback)?;
        self.listeners.push((element, id));
        Ok(id)
    }

    /// Listen for `kind` and queue an `update` each time it fires.
    pub fn listen_for_update(&mut self, kind: EventKind) -> Result<ListenerId, EnhancerError> {
        let updates = self.services.updates.clone();
        let instance = self.instance;
        self.listen(kind, move |_| updates.push(instance))
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // -- Document helpers ---------------------------------------------------

    pub fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        self.services.document.read(f)
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        self.services.document.write(f)
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<String> {
        self.read(|doc| doc.attribute(self.element, name).map(str::to_string))
    }

    /// The attribute, or [`EnhancerError::MissingAttribute`].
    pub fn require_attr(&self, name: &'static str) -> Result<String, EnhancerError> {
        self.attr(name).ok_or(EnhancerError::MissingAttribute(name))
    }

    /// The attribute, classified.
    #[must_use]
    pub fn attr_value(&self, name: &str) -> AttributeValue {
        classify(self.attr(name).as_deref())
    }

    /// Whether a flag attribute is present and not `"false"`.
    #[must_use]
    pub fn attr_flag(&self, name: &str) -> bool {
        self.attr(name).is_some_and(|v| v != "false")
    }

    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.read(|doc| doc.has_attribute(self.element, name))
    }

    pub fn set_attr(&self, name: &str, value: &str) -> Result<(), EnhancerError> {
        Ok(self.write(|doc| doc.set_attribute(self.element, name, value))?)
    }

    pub fn remove_attr(&self, name: &str) -> Result<(), EnhancerError> {
        self.write(|doc| doc.remove_attribute(self.element, name))?;
        Ok(())
    }

    pub fn toggle_class(&self, class: &str, on: bool) -> Result<(), EnhancerError> {
        self.write(|doc| doc.toggle_class(self.element, class, on))?;
        Ok(())
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.read(|doc| doc.has_class(self.element, class))
    }

    pub fn set_text(&self, text: &str) -> Result<(), EnhancerError> {
        Ok(self.write(|doc| doc.set_text(self.element, text))?)
    }

    pub fn set_html(&self, html: &str) -> Result<(), EnhancerError> {
        Ok(self.write(|doc| doc.set_html(self.element, html))?)
    }

    pub fn set_hidden(&self, hidden: bool) -> Result<(), EnhancerError> {
        Ok(self.write(|doc| doc.set_hidden(self.element, hidden))?)
    }

    /// `data-next-package-id` of the element or its nearest ancestor.
    #[must_use]
    pub fn package_context(&self) -> Option<String> {
        self.read(|doc| crate::dispatch::package_context(doc, self.element))
    }

    // -- Errors -------------------------------------------------------------

    /// Log `err` and publish [`BusEvent::ErrorOccurred`].
    pub fn handle_error(&self, err: &EnhancerError) {
        tracing::error!(
            element = %self.element,
            enhancer = self.ty.as_str(),
            error = %err,
            "enhancer error"
        );
        self.services.bus.emit(BusEvent::ErrorOccurred {
            element: Some(self.element),
            enhancer: self.ty.as_str().to_string(),
            message: err.to_string(),
        });
    }

    // -- Teardown -----------------------------------------------------------

    /// Drop every subscription and remove every listener.
    pub fn release(&mut self) {
        let subscriptions = self.subscriptions.len() + self.bus_subscriptions.len();
        self.subscriptions.clear();
        self.bus_subscriptions.clear();
        let element = self.element;
        let listeners = std::mem::take(&mut self.listeners);
        let count = listeners.len();
        if count > 0 {
            // Listeners on purged elements are already gone.
            self.services.document.write(|doc| {
                for (target, id) in listeners {
                    doc.remove_listener(target, id);
                }
            });
        }
        tracing::trace!(element = %element, subscriptions, listeners = count, "released");
    }
}
