#![forbid(unsafe_code)]

//! Subscribable state containers.
//!
//! # Design
//!
//! [`Store<T>`] is a shared, version-tracked value. Behaviors see only two
//! methods: [`get_state`](Store::get_state) for a snapshot and
//! [`subscribe`](Store::subscribe) for change notification. Writers (the
//! host, or cart operations triggered by user input) use
//! [`set_state`](Store::set_state) and [`update`](Store::update).
//!
//! Subscribers are held weakly; the strong side lives in the returned
//! [`Subscription`], so dropping the guard is the unsubscribe.
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | `get_state` | O(clone) |
//! | `set_state` | O(S) subscribers |
//! | `subscribe` | O(1) amortized |
//!
//! # Failure Modes
//!
//! - **Writes from a subscriber**: allowed. No borrow is held while callbacks
//!   run, so the nested write notifies immediately and the outer loop then
//!   finishes with the value it snapshotted.

use serde_json::{Value, json};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

type CallbackRc<T> = Rc<dyn Fn(&T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T)>;

struct StoreInner<T> {
    name: &'static str,
    state: T,
    version: u64,
    subscribers: Vec<CallbackWeak<T>>,
}

/// A named, shared state container. Clones share state and subscribers.
pub struct Store<T> {
    inner: Rc<RefCell<StoreInner<T>>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Store")
            .field("name", &inner.name)
            .field("state", &inner.state)
            .field("version", &inner.version)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + PartialEq + 'static> Store<T> {
    #[must_use]
    pub fn new(name: &'static str, state: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StoreInner {
                name,
                state,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.borrow().name
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn get_state(&self) -> T {
        self.inner.borrow().state.clone()
    }

    /// Read the state without cloning it.
    pub fn with_state<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().state)
    }

    /// Replace the state. Equal values do not notify.
    pub fn set_state(&self, state: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state == state {
                return;
            }
            inner.state = state;
            inner.version += 1;
        }
        self.notify();
    }

    /// Mutate the state in place; notifies only if it changed.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let before = inner.state.clone();
            f(&mut inner.state);
            let changed = inner.state != before;
            if changed {
                inner.version += 1;
            }
            changed
        };
        if changed {
            self.notify();
        }
    }

    /// Call `callback` with the new state after every change.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: CallbackRc<T> = Rc::new(callback);
        self.inner.borrow_mut().subscribers.push(Rc::downgrade(&strong));
        Subscription {
            store: self.name(),
            _guard: Box::new(strong),
        }
    }

    /// Increments once per state change.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    fn notify(&self) {
        let (callbacks, state): (Vec<CallbackRc<T>>, T) = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|w| w.strong_count() > 0);
            let callbacks = inner.subscribers.iter().filter_map(Weak::upgrade).collect();
            (callbacks, inner.state.clone())
        };
        for callback in &callbacks {
            callback(&state);
        }
    }
}

/// Guard for a store subscription. Dropping it unsubscribes.
pub struct Subscription {
    store: &'static str,
    _guard: Box<dyn std::any::Any>,
}

impl Subscription {
    /// Name of the store this subscription belongs to.
    #[must_use]
    pub fn store(&self) -> &'static str {
        self.store
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Named stores
// ---------------------------------------------------------------------------

/// The store set behaviors may read and subscribe to.
///
/// Business stores hold JSON documents owned by the host; `clock` holds
/// seconds since the runtime started and is published by the runtime.
#[derive(Clone, Debug)]
pub struct Stores {
    pub cart: Store<Value>,
    pub campaign: Store<Value>,
    pub checkout: Store<Value>,
    pub order: Store<Value>,
    pub profile: Store<Value>,
    pub config: Store<Value>,
    pub attribution: Store<Value>,
    pub params: Store<Value>,
    pub selection: Store<Value>,
    pub shipping: Store<Value>,
    pub clock: Store<u64>,
}

impl Default for Stores {
    fn default() -> Self {
        Self::new()
    }
}

impl Stores {
    /// Empty stores with the shapes behaviors expect.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cart: Store::new("cart", json!({"items": [], "subtotal": 0, "total": 0})),
            campaign: Store::new("campaign", json!({"packages": []})),
            checkout: Store::new("checkout", json!({})),
            order: Store::new("order", json!({})),
            profile: Store::new("profile", json!({})),
            config: Store::new("config", json!({})),
            attribution: Store::new("attribution", json!({})),
            params: Store::new("params", json!({})),
            selection: Store::new("selection", json!({})),
            shipping: Store::new("shipping", json!({})),
            clock: Store::new("clock", 0),
        }
    }

    /// Look up a JSON store by name. `param` is accepted for `params`.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Store<Value>> {
        match name {
            "cart" => Some(&self.cart),
            "campaign" => Some(&self.campaign),
            "checkout" => Some(&self.checkout),
            "order" => Some(&self.order),
            "profile" => Some(&self.profile),
            "config" => Some(&self.config),
            "attribution" => Some(&self.attribution),
            "params" | "param" => Some(&self.params),
            "selection" => Some(&self.selection),
            "shipping" => Some(&self.shipping),
            _ => None,
        }
    }
}
