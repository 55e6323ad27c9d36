#![forbid(unsafe_code)]

//! Scan/enhance orchestration.
//!
//! The [`Scanner`] owns the enhancement registry and drives every element
//! through `Unscanned → Enhanced → TornDown`, any number of times.
//!
//! # Flow
//!
//! ```text
//! scan_and_enhance(root) ─▶ candidates ─▶ step_scan() × ⌈n / batch⌉ ─▶ ready signals (first scan)
//!                                                                      │
//!                                                               notifier.start(root)
//!                                                                      │
//! mutations ─▶ pump_changes(now) ─▶ handle_change ─┬─ Removed: teardown now
//!                                                  └─ Added / attribute: pending set
//!                                                                      │
//!                                        poll_queue(now) after debounce ─▶ process_queue()
//! ```
//!
//! # Invariants
//!
//! 1. At most one record per element; `enhance_element` on an enhanced
//!    element does nothing.
//! 2. A watched attribute change destroys the old behaviors before the
//!    element re-enters the pending set.
//! 3. The pending set holds each element once, in first-seen order.
//! 4. Records of elements no longer connected are swept on every flush.
//! 5. The ready class and events are emitted once per scanner lifetime;
//!    `destroy` re-arms them.
//!
//! # Failure Modes
//!
//! | Failure | Effect |
//! |---------|--------|
//! | second `scan_and_enhance` while scanning | `warn`, request dropped |
//! | unresolvable type | `warn`, no behavior for that type |
//! | `initialize` error or panic | `error`, that behavior torn down, siblings kept |
//! | panic while enhancing one queued element | `error`, rest of the batch proceeds |

use crate::dispatch::{DispatchTable, ResolveContext};
use crate::enhancer::{EnhancerBase, InstanceId, Services};
use crate::error::{HandlerError, ScanError, panic_message};
use crate::notifier::{ChangeHandler, ChangeNotifier, DomChange};
use crate::registry::{BehaviorInstance, EnhancementRecord, EnhancementRegistry};
use crate::stats::{ScanStats, TypeTiming};
use crate::timer::CoalescingTimer;
use nxt_attr::{EnhancerType, RULES, enhancer_types_for, vocab};
use nxt_dom::{Document, ElementId};
use serde_json::json;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Candidate filters
// ---------------------------------------------------------------------------

fn has_trigger(doc: &Document, id: ElementId) -> bool {
    doc.attributes(id).iter().any(|(name, _)| vocab::is_trigger(name))
}

/// Inside a row prototype that is cloned rather than enhanced.
fn in_template(doc: &Document, id: ElementId) -> bool {
    doc.closest(id, |d, e| d.has_attribute(e, vocab::TEMPLATE)).is_some()
}

/// Inside a repeating container whose rows are enhanced on request.
fn in_repeater(doc: &Document, id: ElementId) -> bool {
    doc.ancestors(id)
        .into_iter()
        .any(|a| doc.has_attribute(a, vocab::CART_ITEMS))
}

fn has_placeholder(doc: &Document, id: ElementId, services: &Services) -> bool {
    let attrs = doc.attributes(id);
    RULES
        .iter()
        .filter(|rule| rule.matches(attrs))
        .filter_map(|rule| rule.discriminant(attrs))
        .any(|value| services.config.is_placeholder(value))
}

/// Whether a queue flush or an explicit request should enhance `id`.
fn is_candidate(doc: &Document, id: ElementId, services: &Services) -> bool {
    has_trigger(doc, id) && !in_template(doc, id) && !has_placeholder(doc, id, services)
}

/// Whether the initial scan should enhance `id`. Repeater rows are left to
/// the repeater, which requests their enhancement after rendering.
fn is_scan_candidate(doc: &Document, id: ElementId, services: &Services) -> bool {
    is_candidate(doc, id, services) && !in_repeater(doc, id)
}

// ---------------------------------------------------------------------------
// Core
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ScanJob {
    root: ElementId,
    queue: VecDeque<ElementId>,
}

/// Registry, pending set and scan job. Receives notifier batches.
struct ScannerCore {
    services: Services,
    table: DispatchTable,
    registry: EnhancementRegistry,
    pending: VecDeque<ElementId>,
    pending_set: HashSet<ElementId>,
    queue_timer: CoalescingTimer,
    job: Option<ScanJob>,
    root: Option<ElementId>,
    ready_signalled: bool,
    next_instance: u64,
    failures: u64,
    timing: BTreeMap<EnhancerType, TypeTiming>,
}

impl std::fmt::Debug for ScannerCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerCore")
            .field("records", &self.registry.len())
            .field("pending", &self.pending.len())
            .field("scanning", &self.job.is_some())
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

impl ScannerCore {
    fn new(services: Services, table: DispatchTable) -> Self {
        let debounce = services.config.queue_debounce;
        let max_wait = services.config.notifier_window;
        Self {
            services,
            table,
            registry: EnhancementRegistry::new(),
            pending: VecDeque::new(),
            pending_set: HashSet::new(),
            queue_timer: CoalescingTimer::debouncing(debounce).with_max_wait(max_wait),
            job: None,
            root: None,
            ready_signalled: false,
            next_instance: 1,
            failures: 0,
            timing: BTreeMap::new(),
        }
    }

    fn enqueue(&mut self, id: ElementId) {
        if self.pending_set.insert(id) {
            self.pending.push_back(id);
        }
    }

    fn dequeue(&mut self, id: ElementId) {
        if self.pending_set.remove(&id) {
            self.pending.retain(|p| *p != id);
        }
    }

    fn clear_pending(&mut self) {
        self.pending.clear();
        self.pending_set.clear();
        self.queue_timer.cancel();
    }

    fn next_instance_id(&mut self) -> InstanceId {
        let id = InstanceId(self.next_instance);
        self.next_instance += 1;
        id
    }

    fn enhance_element(&mut self, id: ElementId) -> bool {
        if self.registry.contains(id) {
            tracing::trace!(element = %id, "already enhanced");
            return false;
        }
        let document = self.services.document.clone();
        let Some(types) = document.read(|doc| doc.is_connected(id).then(|| enhancer_types_for(doc.attributes(id))))
        else {
            return false;
        };
        if types.is_empty() {
            return false;
        }

        let debug = self.services.config.debug;
        let mut instances: Vec<BehaviorInstance> = Vec::with_capacity(types.len());
        for ty in types.iter() {
            let started = debug.then(Instant::now);
            let resolved = document.read(|doc| {
                let ctx = ResolveContext {
                    element: id,
                    ty,
                    document: doc,
                    config: &self.services.config,
                };
                std::panic::catch_unwind(AssertUnwindSafe(|| self.table.resolve(&ctx)))
            });
            let behavior = match resolved {
                Ok(Ok(behavior)) => behavior,
                Ok(Err(err)) => {
                    tracing::warn!(element = %id, enhancer = ty.as_str(), error = %err, "cannot resolve enhancer");
                    self.failures += 1;
                    continue;
                }
                Err(payload) => {
                    tracing::error!(
                        element = %id,
                        enhancer = ty.as_str(),
                        panic = %panic_message(payload.as_ref()),
                        "enhancer module panicked"
                    );
                    self.failures += 1;
                    continue;
                }
            };

            let base = EnhancerBase::new(id, self.next_instance_id(), ty, self.services.clone());
            let mut instance = BehaviorInstance::new(base, behavior);
            match instance.initialize() {
                Ok(()) => instances.push(instance),
                Err(err) => {
                    instance.base().handle_error(&err);
                    instance.destroy();
                    self.failures += 1;
                }
            }
            if let Some(started) = started {
                self.timing.entry(ty).or_default().record(started.elapsed());
            }
        }

        if instances.is_empty() {
            return false;
        }
        tracing::debug!(element = %id, behaviors = instances.len(), "enhanced");
        self.registry.insert(EnhancementRecord { element: id, instances });
        true
    }

    /// Enhance `id`, containing any panic that escapes the lifecycle guards.
    fn enhance_guarded(&mut self, id: ElementId) -> bool {
        match std::panic::catch_unwind(AssertUnwindSafe(|| self.enhance_element(id))) {
            Ok(enhanced) => enhanced,
            Err(payload) => {
                tracing::error!(element = %id, panic = %panic_message(payload.as_ref()), "enhancement panicked");
                self.failures += 1;
                false
            }
        }
    }

    fn teardown(&mut self, id: ElementId) -> bool {
        self.registry.teardown(id)
    }

    fn handle_change(&mut self, change: &DomChange, now: Duration) {
        match change {
            DomChange::Added(id) => {
                self.enqueue(*id);
            }
            DomChange::Removed { element, purged } => {
                let ids = if purged.is_empty() {
                    // Moved: still in the arena, possibly enhanced below.
                    self.services.document.read(|doc| doc.subtree(*element))
                } else {
                    purged.clone()
                };
                let mut torn = 0usize;
                for id in ids {
                    if self.teardown(id) {
                        torn += 1;
                    }
                    self.dequeue(id);
                }
                if torn > 0 {
                    tracing::debug!(element = %element, torn_down = torn, "removed");
                }
            }
            DomChange::AttributeChanged { element, name, .. } => {
                if vocab::is_context(name) {
                    // Descendants that failed to resolve without a context get another chance.
                    let services = &self.services;
                    let subtree: Vec<(ElementId, bool)> = services.document.read(|doc| {
                        doc.subtree(*element)
                            .into_iter()
                            .map(|id| (id, is_candidate(doc, id, services)))
                            .collect()
                    });
                    for (id, candidate) in subtree {
                        if self.teardown(id) || candidate {
                            self.enqueue(id);
                        }
                    }
                } else {
                    self.teardown(*element);
                    self.enqueue(*element);
                }
            }
        }
        if !self.pending.is_empty() {
            self.queue_timer.schedule(now);
        }
    }

    fn process_queue(&mut self) -> usize {
        let batch: Vec<ElementId> = self.pending.drain(..).collect();
        self.pending_set.clear();
        self.queue_timer.cancel();
        let mut enhanced = 0;
        for id in batch {
            let eligible = self
                .services
                .document
                .read(|doc| doc.is_connected(id) && is_candidate(doc, id, &self.services));
            if eligible && self.enhance_guarded(id) {
                enhanced += 1;
            }
        }
        let swept = self.sweep_detached();
        if enhanced > 0 || swept > 0 {
            tracing::debug!(enhanced, swept, "queue processed");
        }
        enhanced
    }

    fn sweep_detached(&mut self) -> usize {
        let detached: Vec<ElementId> = self.services.document.read(|doc| {
            self.registry
                .elements()
                .filter(|id| !doc.is_connected(*id))
                .collect()
        });
        for id in &detached {
            self.teardown(*id);
        }
        detached.len()
    }

    /// Run one scan batch. Returns the root when the scan just completed.
    fn scan_batch(&mut self) -> (usize, Option<ElementId>) {
        let Some(job) = self.job.as_mut() else {
            return (0, None);
        };
        let take = self.services.config.batch_size.min(job.queue.len());
        let batch: Vec<ElementId> = job.queue.drain(..take).collect();
        for id in &batch {
            self.enhance_guarded(*id);
        }
        let done = self.job.as_ref().is_some_and(|j| j.queue.is_empty());
        if !done {
            return (batch.len(), None);
        }
        let root = self.job.take().map(|j| j.root);
        self.signal_ready();
        (batch.len(), root)
    }

    fn signal_ready(&mut self) {
        let enhanced = self.registry.len();
        if self.ready_signalled {
            tracing::debug!(enhanced, "rescan complete");
            return;
        }
        self.ready_signalled = true;
        let config = &self.services.config;
        self.services.document.write(|doc| {
            let root = doc.root();
            if let Err(err) = doc.toggle_class(root, &config.ready_class, true) {
                tracing::warn!(error = %err, "cannot mark document ready");
            }
            doc.dispatch_host_event(&config.ready_event, json!({ "enhancedElements": enhanced }));
        });
        self.services
            .bus
            .emit(crate::bus::BusEvent::DisplayReady { enhanced });
        tracing::info!(enhanced, failures = self.failures, "scan complete");
    }

    fn run_updates(&mut self) -> usize {
        let queued = self.services.updates.drain();
        let mut ran = 0;
        for id in queued {
            let Some(element) = self.registry.owner(id) else {
                continue;
            };
            // Removed since the update was queued; the removal batch is
            // still inside the notifier window.
            if !self.services.document.read(|doc| doc.is_connected(element)) {
                self.teardown(element);
                continue;
            }
            if self.registry.update_instance(id) {
                ran += 1;
            }
        }
        ran
    }

    fn drain_enhance_requests(&mut self) -> usize {
        let requested = self.services.requests.drain();
        let mut enhanced = 0;
        for root in requested {
            let candidates = self.services.document.read(|doc| {
                if !doc.is_connected(root) {
                    return Vec::new();
                }
                doc.subtree(root)
                    .into_iter()
                    .filter(|id| is_candidate(doc, *id, &self.services))
                    .collect()
            });
            for id in candidates {
                if self.enhance_guarded(id) {
                    enhanced += 1;
                }
            }
        }
        enhanced
    }
}

impl ChangeHandler for ScannerCore {
    fn name(&self) -> &str {
        "scanner"
    }

    fn handle_changes(&mut self, changes: &[DomChange], now: Duration) -> Result<(), HandlerError> {
        for change in changes {
            self.handle_change(change, now);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Scan/enhance orchestrator.
pub struct Scanner {
    notifier: ChangeNotifier,
    core: ScannerCore,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("notifier", &self.notifier)
            .field("core", &self.core)
            .finish()
    }
}

impl Scanner {
    #[must_use]
    pub fn new(services: Services, table: DispatchTable) -> Self {
        let notifier = ChangeNotifier::new(services.document.clone(), services.config.notifier_window);
        Self {
            notifier,
            core: ScannerCore::new(services, table),
        }
    }

    #[must_use]
    pub fn services(&self) -> &Services {
        &self.core.services
    }

    #[must_use]
    pub fn registry(&self) -> &EnhancementRegistry {
        &self.core.registry
    }

    #[must_use]
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Register an additional change handler after the scanner.
    pub fn add_change_handler(&mut self, handler: Box<dyn ChangeHandler>) {
        self.notifier.add_handler(handler);
    }

    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.core.job.is_some()
    }

    #[must_use]
    pub fn is_enhanced(&self, id: ElementId) -> bool {
        self.core.registry.contains(id)
    }

    /// Behavior types active on `id`, in initialization order.
    #[must_use]
    pub fn enhanced_types(&self, id: ElementId) -> Vec<EnhancerType> {
        self.core
            .registry
            .get(id)
            .map(EnhancementRecord::types)
            .unwrap_or_default()
    }

    /// Start a batched scan of `root`. Returns the number of candidates.
    pub fn scan_and_enhance(&mut self, root: ElementId) -> Result<usize, ScanError> {
        if self.core.job.is_some() {
            tracing::warn!(root = %root, "scan already in progress, request dropped");
            return Err(ScanError::AlreadyScanning);
        }
        let services = &self.core.services;
        let candidates = services.document.read(|doc| {
            if !doc.contains_element(root) {
                return None;
            }
            Some(
                doc.subtree(root)
                    .into_iter()
                    .filter(|id| is_scan_candidate(doc, *id, services))
                    .collect::<VecDeque<_>>(),
            )
        });
        let Some(queue) = candidates else {
            return Err(ScanError::UnknownRoot(root));
        };
        let count = queue.len();
        tracing::debug!(root = %root, candidates = count, "scan started");
        self.core.root = Some(root);
        self.core.job = Some(ScanJob { root, queue });
        Ok(count)
    }

    /// Enhance one scan batch. Starts the notifier once the scan completes.
    pub fn step_scan(&mut self) -> usize {
        let (processed, completed) = self.core.scan_batch();
        if let Some(root) = completed
            && !self.notifier.is_active()
        {
            self.notifier.start(root);
        }
        processed
    }

    /// Run the current scan to completion.
    pub fn finish_scan(&mut self) -> usize {
        let mut total = 0;
        while self.is_scanning() {
            total += self.step_scan();
        }
        total
    }

    /// Enhance a single element now. Returns whether a record was created.
    pub fn enhance_element(&mut self, id: ElementId) -> bool {
        self.core.enhance_element(id)
    }

    /// Apply one change directly, bypassing the notifier.
    pub fn handle_change(&mut self, change: &DomChange, now: Duration) {
        self.core.handle_change(change, now);
    }

    /// Collect host mutations and deliver the batch once its window closes.
    /// Returns the number of changes delivered.
    pub fn pump_changes(&mut self, now: Duration) -> usize {
        self.notifier.collect(now);
        let Some(batch) = self.notifier.poll(now) else {
            return 0;
        };
        let failures = self.notifier.deliver(&batch, &mut self.core, now);
        if !failures.is_empty() {
            tracing::warn!(failures = failures.len(), "change handlers failed");
        }
        batch.len()
    }

    /// Flush the pending set once its debounce elapsed.
    pub fn poll_queue(&mut self, now: Duration) -> usize {
        if self.core.queue_timer.poll(now) {
            self.core.process_queue()
        } else {
            0
        }
    }

    /// Enhance everything pending now. Returns the number of new records.
    pub fn process_queue(&mut self) -> usize {
        self.core.process_queue()
    }

    /// Run `update` for instances whose state changed.
    pub fn run_updates(&mut self) -> usize {
        self.core.run_updates()
    }

    /// Enhance subtrees behaviors asked for.
    pub fn drain_enhance_requests(&mut self) -> usize {
        self.core.drain_enhance_requests()
    }

    /// Whether any timer, queue or request is outstanding.
    #[must_use]
    pub fn has_work(&self) -> bool {
        let services = &self.core.services;
        self.core.job.is_some()
            || self.notifier.has_pending()
            || self.core.queue_timer.is_pending()
            || !self.core.pending.is_empty()
            || !services.updates.is_empty()
            || !services.requests.is_empty()
    }

    /// Stop observing. Pending changes are dropped.
    pub fn pause(&mut self) {
        self.notifier.pause();
        self.core.clear_pending();
    }

    pub fn resume(&mut self) {
        if let Some(root) = self.core.root {
            self.notifier.resume(root);
        }
    }

    /// Stop observing and tear every record down.
    pub fn destroy(&mut self) {
        self.notifier.stop();
        let torn = self.core.registry.teardown_all();
        self.core.clear_pending();
        self.core.job = None;
        self.core.root = None;
        self.core.ready_signalled = false;
        self.core.failures = 0;
        self.core.timing.clear();
        self.core.services.updates.drain();
        self.core.services.requests.drain();
        tracing::debug!(torn_down = torn, "scanner destroyed");
    }

    #[must_use]
    pub fn stats(&self) -> ScanStats {
        let core = &self.core;
        ScanStats {
            enhanced_elements: core.registry.len(),
            behaviors: core.registry.instance_count(),
            pending: core.pending.len(),
            observer_active: self.notifier.is_active(),
            scanning: core.job.is_some(),
            loaded_modules: core.table.loaded_count(),
            failures: core.failures,
            type_timing: core.services.config.debug.then(|| core.timing.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::config::RuntimeConfig;
    use crate::enhancer::Enhancer;
    use crate::error::EnhancerError;
    use crate::store::Stores;
    use nxt_dom::SharedDocument;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tracing_test::traced_test;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        tag: &'static str,
        log: Log,
        fail: bool,
    }

    impl Enhancer for Recorder {
        fn name(&self) -> &'static str {
            self.tag
        }

        fn initialize(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
            self.log.borrow_mut().push(format!("init {} {}", self.tag, base.element()));
            if self.fail {
                return Err(EnhancerError::Failed("rejected".into()));
            }
            Ok(())
        }

        fn cleanup(&mut self, base: &mut EnhancerBase) {
            self.log.borrow_mut().push(format!("cleanup {} {}", self.tag, base.element()));
        }
    }

    fn table(log: &Log) -> DispatchTable {
        let mut table = DispatchTable::new();
        for (ty, tag, fail) in [
            (EnhancerType::Display, "display", false),
            (EnhancerType::Toggle, "toggle", false),
            (EnhancerType::Timer, "timer", true),
        ] {
            let log = Rc::clone(log);
            table.register_fn(ty, tag, move |_ctx: &ResolveContext<'_>| {
                Ok(Box::new(Recorder {
                    tag,
                    log: Rc::clone(&log),
                    fail,
                }) as Box<dyn Enhancer>)
            });
        }
        table
    }

    fn scanner(config: RuntimeConfig) -> (Scanner, Log) {
        let log: Log = Rc::default();
        let services = Services::new(config, SharedDocument::new(Document::new()), Stores::new(), EventBus::new());
        (Scanner::new(services, table(&log)), log)
    }

    fn add(scanner: &Scanner, parent: Option<ElementId>, attrs: &[(&str, &str)]) -> ElementId {
        scanner.services().document.write(|doc| {
            let el = doc.create_element("div");
            doc.append_child(parent.unwrap_or(doc.body()), el).unwrap();
            for (k, v) in attrs {
                doc.set_attribute(el, k, v).unwrap();
            }
            el
        })
    }

    #[test]
    fn enhance_twice_keeps_one_record() {
        let (mut scanner, log) = scanner(RuntimeConfig::default());
        let el = add(&scanner, None, &[("data-next-display", "cart.total")]);
        assert!(scanner.enhance_element(el));
        assert!(!scanner.enhance_element(el));
        assert_eq!(scanner.registry().len(), 1);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn failing_initialize_keeps_siblings() {
        let (mut scanner, log) = scanner(RuntimeConfig::default());
        let el = add(&scanner, None, &[("data-next-display", "cart.total"), ("data-next-timer", "60")]);
        assert!(scanner.enhance_element(el));
        assert_eq!(scanner.enhanced_types(el), vec![EnhancerType::Display]);
        assert_eq!(scanner.stats().failures, 1);
        let log = log.borrow();
        assert!(log.contains(&format!("cleanup timer {el}")));
    }

    #[test]
    #[traced_test]
    fn failures_are_logged_at_their_levels() {
        let (mut scanner, _log) = scanner(RuntimeConfig::default());
        let coupon = add(&scanner, None, &[("data-next-coupon", "")]);
        let timer = add(&scanner, None, &[("data-next-timer", "60")]);
        scanner.enhance_element(coupon);
        scanner.enhance_element(timer);
        assert!(logs_contain("WARN"));
        assert!(logs_contain("cannot resolve enhancer"));
        assert!(logs_contain("ERROR"));
        assert!(logs_contain("enhancer error"));
        assert!(logs_contain("rejected"));
    }

    #[test]
    fn unregistered_type_counts_failure_and_skips_record() {
        let (mut scanner, _log) = scanner(RuntimeConfig::default());
        let el = add(&scanner, None, &[("data-next-coupon", "")]);
        assert!(!scanner.enhance_element(el));
        assert!(!scanner.is_enhanced(el));
        assert_eq!(scanner.stats().failures, 1);
    }

    #[test]
    fn scan_runs_in_batches_and_signals_ready() {
        let (mut scanner, _log) = scanner(RuntimeConfig::default().with_batch_size(2));
        for _ in 0..5 {
            add(&scanner, None, &[("data-next-toggle", "1")]);
        }
        let root = scanner.services().document.read(Document::root);
        assert_eq!(scanner.scan_and_enhance(root), Ok(5));
        assert_eq!(scanner.scan_and_enhance(root), Err(ScanError::AlreadyScanning));
        assert_eq!(scanner.step_scan(), 2);
        assert!(scanner.is_scanning());
        assert_eq!(scanner.step_scan(), 2);
        assert_eq!(scanner.step_scan(), 1);
        assert!(!scanner.is_scanning());
        assert!(scanner.notifier().is_active());

        let doc = &scanner.services().document;
        assert!(doc.read(|d| d.has_class(d.root(), "next-display-ready")));
        let events = doc.write(Document::take_host_events);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "next:display-ready");
        assert_eq!(events[0].detail, json!({"enhancedElements": 5}));
    }

    #[test]
    fn scan_skips_templates_repeaters_and_placeholders() {
        let (mut scanner, _log) = scanner(RuntimeConfig::default());
        let list = add(&scanner, None, &[("data-next-cart-items", "")]);
        let proto = add(&scanner, Some(list), &[("data-next-template", "")]);
        let inner = add(&scanner, Some(proto), &[("data-next-display", "item.price")]);
        let pending = add(&scanner, None, &[("data-next-display", "package-{id}.price")]);
        let plain = add(&scanner, None, &[("data-next-display", "cart.total")]);
        let root = scanner.services().document.read(Document::root);
        assert_eq!(scanner.scan_and_enhance(root), Ok(2));
        scanner.finish_scan();
        assert!(!scanner.is_enhanced(inner));
        assert!(!scanner.is_enhanced(pending));
        assert!(scanner.is_enhanced(plain));
    }

    #[test]
    fn unknown_root_is_rejected() {
        let (mut scanner, _log) = scanner(RuntimeConfig::default());
        let ghost = ElementId::from_raw(404);
        assert_eq!(scanner.scan_and_enhance(ghost), Err(ScanError::UnknownRoot(ghost)));
    }

    #[test]
    fn attribute_change_tears_down_before_reenhancing() {
        let (mut scanner, log) = scanner(RuntimeConfig::default());
        let el = add(&scanner, None, &[("data-next-display", "cart.total")]);
        scanner.enhance_element(el);
        log.borrow_mut().clear();
        let change = DomChange::AttributeChanged {
            element: el,
            name: "data-next-display".into(),
            old: Some("cart.total".into()),
            new: Some("cart.subtotal".into()),
        };
        scanner.handle_change(&change, Duration::ZERO);
        assert!(!scanner.is_enhanced(el));
        assert_eq!(scanner.stats().pending, 1);
        assert_eq!(scanner.poll_queue(Duration::from_millis(5)), 0);
        assert_eq!(scanner.poll_queue(Duration::from_millis(10)), 1);
        assert_eq!(
            *log.borrow(),
            vec![format!("cleanup display {el}"), format!("init display {el}")]
        );
    }

    #[test]
    fn steady_additions_flush_within_the_window() {
        let config = RuntimeConfig::default()
            .with_queue_debounce(Duration::from_millis(40))
            .with_notifier_window(Duration::from_millis(16));
        let (mut scanner, _log) = scanner(config);
        let mut flushed = 0;
        for tick in 0..10u64 {
            let now = Duration::from_millis(tick * 8);
            let el = add(&scanner, None, &[("data-next-toggle", "1")]);
            scanner.handle_change(&DomChange::Added(el), now);
            flushed += scanner.poll_queue(now);
        }
        assert!(flushed >= 4);
        assert_eq!(scanner.stats().enhanced_elements, flushed);
    }

    #[test]
    fn removal_purges_descendant_records() {
        let (mut scanner, log) = scanner(RuntimeConfig::default());
        let outer = add(&scanner, None, &[]);
        let a = add(&scanner, Some(outer), &[("data-next-toggle", "1")]);
        let b = add(&scanner, Some(outer), &[("data-next-display", "cart.total")]);
        scanner.enhance_element(a);
        scanner.enhance_element(b);
        let purged = scanner.services().document.write(|d| d.remove(outer).unwrap());
        scanner.handle_change(&DomChange::Removed { element: outer, purged }, Duration::ZERO);
        assert!(scanner.registry().is_empty());
        let cleanups = log.borrow().iter().filter(|l| l.starts_with("cleanup")).count();
        assert_eq!(cleanups, 2);
    }

    #[test]
    fn sweep_catches_missed_removals() {
        let (mut scanner, _log) = scanner(RuntimeConfig::default());
        let el = add(&scanner, None, &[("data-next-toggle", "1")]);
        scanner.enhance_element(el);
        scanner.services().document.write(|d| d.remove(el).unwrap());
        scanner.process_queue();
        assert!(!scanner.is_enhanced(el));
    }

    #[test]
    fn context_change_reenhances_descendants() {
        let (mut scanner, log) = scanner(RuntimeConfig::default());
        let card = add(&scanner, None, &[("data-next-package-id", "7")]);
        let price = add(&scanner, Some(card), &[("data-next-display", "package.price")]);
        scanner.enhance_element(price);
        let change = DomChange::AttributeChanged {
            element: card,
            name: "data-next-package-id".into(),
            old: Some("7".into()),
            new: Some("9".into()),
        };
        scanner.handle_change(&change, Duration::ZERO);
        assert!(!scanner.is_enhanced(price));
        scanner.process_queue();
        assert!(scanner.is_enhanced(price));
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn context_added_later_enhances_unresolved_descendants() {
        let (mut scanner, _log) = scanner(RuntimeConfig::default());
        let holder = add(&scanner, None, &[]);
        let price = add(&scanner, Some(holder), &[("data-next-display", "package.price")]);
        let plain = add(&scanner, Some(holder), &[("class", "label")]);
        let change = DomChange::AttributeChanged {
            element: holder,
            name: "data-next-package-id".into(),
            old: None,
            new: Some("7".into()),
        };
        scanner.handle_change(&change, Duration::ZERO);
        assert_eq!(scanner.stats().pending, 1);
        assert_eq!(scanner.process_queue(), 1);
        assert!(scanner.is_enhanced(price));
        assert!(!scanner.is_enhanced(plain));
    }

    #[test]
    fn ready_signals_fire_once_across_rescans() {
        let (mut scanner, _log) = scanner(RuntimeConfig::default());
        add(&scanner, None, &[("data-next-toggle", "1")]);
        let root = scanner.services().document.read(Document::root);
        let ready = Rc::new(RefCell::new(0usize));
        let seen = Rc::clone(&ready);
        let _sub = scanner.services().bus.subscribe(move |event| {
            if matches!(event, crate::bus::BusEvent::DisplayReady { .. }) {
                *seen.borrow_mut() += 1;
            }
        });
        for _ in 0..2 {
            scanner.scan_and_enhance(root).unwrap();
            scanner.finish_scan();
        }
        let events = scanner.services().document.write(Document::take_host_events);
        assert_eq!(events.len(), 1);
        assert_eq!(*ready.borrow(), 1);

        scanner.destroy();
        scanner.scan_and_enhance(root).unwrap();
        scanner.finish_scan();
        let events = scanner.services().document.write(Document::take_host_events);
        assert_eq!(events.len(), 1);
        assert_eq!(*ready.borrow(), 2);
    }

    #[test]
    fn destroy_clears_everything() {
        let (mut scanner, log) = scanner(RuntimeConfig::default());
        let el = add(&scanner, None, &[("data-next-toggle", "1")]);
        let root = scanner.services().document.read(Document::root);
        scanner.scan_and_enhance(root).unwrap();
        scanner.finish_scan();
        assert!(scanner.is_enhanced(el));
        scanner.destroy();
        let stats = scanner.stats();
        assert_eq!(stats.enhanced_elements, 0);
        assert!(!stats.observer_active);
        assert_eq!(log.borrow().last(), Some(&format!("cleanup toggle {el}")));
    }

    #[test]
    fn debug_mode_collects_timing() {
        let (mut scanner, _log) = scanner(RuntimeConfig::default().with_debug(true));
        let el = add(&scanner, None, &[("data-next-toggle", "1")]);
        scanner.enhance_element(el);
        let timing = scanner.stats().type_timing.unwrap();
        assert_eq!(timing[&EnhancerType::Toggle].count, 1);
        let (plain, _) = self::scanner(RuntimeConfig::default());
        assert!(plain.stats().type_timing.is_none());
    }
}
