#![forbid(unsafe_code)]

//! Behavior instances and the per-element enhancement registry.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──initialize──▶ Initializing ──ok──▶ Active ──destroy──▶ Destroyed
//!                                    │                                      ▲
//!                                    └──────────── error / panic ───────────┘
//! ```
//!
//! # Invariants
//!
//! 1. `destroy` runs `cleanup` and releases base resources exactly once.
//! 2. `update` only reaches a behavior in the `Active` state.
//! 3. Every registered instance id maps back to the element that owns it.
//!
//! # Failure Modes
//!
//! - **Panicking hook**: caught and converted to [`EnhancerError::Panicked`];
//!   a panic in `cleanup` is logged and teardown still completes.

use crate::enhancer::{Enhancer, EnhancerBase, InstanceId};
use crate::error::{EnhancerError, panic_message};
use nxt_attr::EnhancerType;
use nxt_dom::ElementId;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Active,
    Destroyed,
}

/// One behavior bound to one element.
pub struct BehaviorInstance {
    id: InstanceId,
    ty: EnhancerType,
    state: LifecycleState,
    base: EnhancerBase,
    behavior: Box<dyn Enhancer>,
}

impl std::fmt::Debug for BehaviorInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorInstance")
            .field("id", &self.id)
            .field("ty", &self.ty)
            .field("behavior", &self.behavior.name())
            .field("state", &self.state)
            .finish()
    }
}

impl BehaviorInstance {
    #[must_use]
    pub fn new(base: EnhancerBase, behavior: Box<dyn Enhancer>) -> Self {
        Self {
            id: base.instance(),
            ty: base.enhancer_type(),
            state: LifecycleState::Uninitialized,
            base,
            behavior,
        }
    }

    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    #[must_use]
    pub fn enhancer_type(&self) -> EnhancerType {
        self.ty
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[must_use]
    pub fn element(&self) -> ElementId {
        self.base.element()
    }

    #[must_use]
    pub fn behavior_name(&self) -> &'static str {
        self.behavior.name()
    }

    #[must_use]
    pub fn base(&self) -> &EnhancerBase {
        &self.base
    }

    /// Run the `initialize` hook. Only valid from `Uninitialized`.
    pub fn initialize(&mut self) -> Result<(), EnhancerError> {
        if self.state != LifecycleState::Uninitialized {
            return Ok(());
        }
        self.state = LifecycleState::Initializing;
        let (behavior, base) = (&mut self.behavior, &mut self.base);
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| behavior.initialize(base)));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(EnhancerError::Panicked(panic_message(payload.as_ref()))),
        };
        if result.is_ok() {
            self.state = LifecycleState::Active;
            tracing::debug!(element = %self.base.element(), enhancer = self.ty.as_str(), instance = %self.id, "initialized");
        }
        result
    }

    /// Run the `update` hook if active. Failures are reported through
    /// [`EnhancerBase::handle_error`] and leave the instance active.
    pub fn update(&mut self) {
        if self.state != LifecycleState::Active {
            return;
        }
        let (behavior, base) = (&mut self.behavior, &mut self.base);
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| behavior.update(base)));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(EnhancerError::Panicked(panic_message(payload.as_ref()))),
        };
        if let Err(err) = result {
            self.base.handle_error(&err);
        }
    }

    /// Tear down: `cleanup`, then release subscriptions and listeners.
    pub fn destroy(&mut self) {
        if self.state == LifecycleState::Destroyed {
            return;
        }
        let (behavior, base) = (&mut self.behavior, &mut self.base);
        if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| behavior.cleanup(base))) {
            tracing::error!(
                element = %self.base.element(),
                enhancer = self.ty.as_str(),
                panic = %panic_message(payload.as_ref()),
                "cleanup panicked"
            );
        }
        self.base.release();
        self.state = LifecycleState::Destroyed;
        tracing::debug!(element = %self.base.element(), enhancer = self.ty.as_str(), instance = %self.id, "destroyed");
    }
}

/// Active behaviors hosted by one element, in initialization order.
#[derive(Debug)]
pub struct EnhancementRecord {
    pub element: ElementId,
    pub instances: Vec<BehaviorInstance>,
}

impl EnhancementRecord {
    #[must_use]
    pub fn types(&self) -> Vec<EnhancerType> {
        self.instances.iter().map(BehaviorInstance::enhancer_type).collect()
    }
}

/// Element → record map plus an instance → element index.
#[derive(Debug, Default)]
pub struct EnhancementRegistry {
    records: HashMap<ElementId, EnhancementRecord>,
    owners: HashMap<InstanceId, ElementId>,
}

impl EnhancementRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, element: ElementId) -> bool {
        self.records.contains_key(&element)
    }

    #[must_use]
    pub fn get(&self, element: ElementId) -> Option<&EnhancementRecord> {
        self.records.get(&element)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total active instances across all records.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.owners.len()
    }

    /// Element hosting instance `id`.
    #[must_use]
    pub fn owner(&self, id: InstanceId) -> Option<ElementId> {
        self.owners.get(&id).copied()
    }

    pub fn elements(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.records.keys().copied()
    }

    /// Store a record. Replaces (and destroys) any record already present.
    pub fn insert(&mut self, record: EnhancementRecord) {
        let element = record.element;
        if let Some(old) = self.remove(element) {
            tracing::warn!(element = %element, "replacing existing enhancement record");
            destroy_record(old);
        }
        for instance in &record.instances {
            self.owners.insert(instance.id(), element);
        }
        self.records.insert(element, record);
    }

    /// Detach a record without destroying it.
    pub fn remove(&mut self, element: ElementId) -> Option<EnhancementRecord> {
        let record = self.records.remove(&element)?;
        for instance in &record.instances {
            self.owners.remove(&instance.id());
        }
        Some(record)
    }

    /// Destroy and forget the record for `element`. Returns whether one
    /// existed.
    pub fn teardown(&mut self, element: ElementId) -> bool {
        match self.remove(element) {
            Some(record) => {
                destroy_record(record);
                true
            }
            None => false,
        }
    }

    /// Destroy every record.
    pub fn teardown_all(&mut self) -> usize {
        let elements: Vec<ElementId> = self.records.keys().copied().collect();
        let count = elements.len();
        for element in elements {
            self.teardown(element);
        }
        count
    }

    /// Run `update` on a registered instance. Returns `false` when the
    /// instance is no longer registered.
    pub fn update_instance(&mut self, id: InstanceId) -> bool {
        let Some(element) = self.owners.get(&id).copied() else {
            return false;
        };
        let Some(record) = self.records.get_mut(&element) else {
            return false;
        };
        match record.instances.iter_mut().find(|i| i.id() == id) {
            Some(instance) => {
                instance.update();
                true
            }
            None => false,
        }
    }

    /// Counts per behavior type.
    #[must_use]
    pub fn type_counts(&self) -> std::collections::BTreeMap<EnhancerType, usize> {
        let mut counts = std::collections::BTreeMap::new();
        for record in self.records.values() {
            for instance in &record.instances {
                *counts.entry(instance.enhancer_type()).or_insert(0) += 1;
            }
        }
        counts
    }
}

fn destroy_record(mut record: EnhancementRecord) {
    for instance in &mut record.instances {
        instance.destroy();
    }
}
