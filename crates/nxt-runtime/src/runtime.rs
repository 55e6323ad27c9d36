#![forbid(unsafe_code)]

//! Host-driven composition root.
//!
//! [`Runtime`] owns the services and the scanner. It never reads a clock or
//! spawns anything: the host calls [`step`](Runtime::step) from its own loop
//! with a monotonic timestamp.
//!
//! ```text
//! host loop
//!   → mutate the document / write stores
//!   → step(now)
//!       1. publish the clock store
//!       2. start the deferred first scan once the document left `Loading`
//!       3. enhance one scan batch
//!       4. collect mutations, deliver the batch when its window closed
//!       5. flush the pending set when its debounce elapsed
//!       6. enhance subtrees behaviors asked for
//!       7. run queued `update` calls
//! ```

use crate::bus::EventBus;
use crate::config::RuntimeConfig;
use crate::dispatch::DispatchTable;
use crate::enhancer::Services;
use crate::error::ScanError;
use crate::scanner::Scanner;
use crate::stats::ScanStats;
use crate::store::Stores;
use nxt_dom::{HostEvent, ReadyState, SharedDocument};
use std::time::Duration;

/// Upper bound on steps taken by [`Runtime::run_until_idle`].
const MAX_IDLE_STEPS: usize = 10_000;

/// Outcome of a single [`Runtime::step`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepResult {
    /// Elements visited by the scan batch.
    pub scanned: usize,
    /// Whether the first scan completed in this step.
    pub scan_completed: bool,
    /// Changes pulled from the document observer.
    pub changes_collected: usize,
    /// Changes handed to the scanner.
    pub changes_delivered: usize,
    /// Records created from the pending set and from enhance requests.
    pub enhanced: usize,
    /// `update` calls made.
    pub updates: usize,
}

impl StepResult {
    /// Nothing happened.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// Runtime instance bound to one document.
#[derive(Debug)]
pub struct Runtime {
    scanner: Scanner,
    origin: Option<Duration>,
    start_requested: bool,
    scan_started: bool,
}

impl Runtime {
    #[must_use]
    pub fn new(config: RuntimeConfig, document: SharedDocument, table: DispatchTable) -> Self {
        Self::with_stores(config, document, Stores::new(), table)
    }

    /// Build with host-provided stores.
    #[must_use]
    pub fn with_stores(config: RuntimeConfig, document: SharedDocument, stores: Stores, table: DispatchTable) -> Self {
        let services = Services::new(config, document, stores, EventBus::new());
        Self {
            scanner: Scanner::new(services, table),
            origin: None,
            start_requested: false,
            scan_started: false,
        }
    }

    #[must_use]
    pub fn services(&self) -> &Services {
        self.scanner.services()
    }

    #[must_use]
    pub fn document(&self) -> &SharedDocument {
        &self.scanner.services().document
    }

    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.scanner.services().stores
    }

    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.scanner.services().bus
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.scanner.services().config
    }

    #[must_use]
    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn scanner_mut(&mut self) -> &mut Scanner {
        &mut self.scanner
    }

    #[must_use]
    pub fn stats(&self) -> ScanStats {
        self.scanner.stats()
    }

    /// Drain document-level events queued for the host.
    pub fn take_host_events(&self) -> Vec<HostEvent> {
        self.document().write(nxt_dom::Document::take_host_events)
    }

    /// Request the first scan. It begins immediately unless the document is
    /// still loading, in which case a later `step` begins it.
    pub fn start(&mut self, now: Duration) {
        self.origin.get_or_insert(now);
        self.start_requested = true;
        if !self.try_begin_scan() {
            tracing::debug!("document loading, first scan deferred");
        }
    }

    fn try_begin_scan(&mut self) -> bool {
        if self.scan_started {
            return true;
        }
        let (state, root) = self.document().read(|doc| (doc.ready_state(), doc.root()));
        if state == ReadyState::Loading {
            return false;
        }
        match self.scanner.scan_and_enhance(root) {
            Ok(candidates) => {
                tracing::debug!(candidates, "first scan begun");
                self.scan_started = true;
                true
            }
            Err(ScanError::AlreadyScanning) => {
                self.scan_started = true;
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "cannot begin scan");
                false
            }
        }
    }

    /// Advance the runtime to `now`.
    pub fn step(&mut self, now: Duration) -> StepResult {
        let origin = *self.origin.get_or_insert(now);
        let elapsed = now.saturating_sub(origin).as_secs();
        self.stores().clock.set_state(elapsed);

        let mut result = StepResult::default();
        if self.start_requested && !self.scan_started {
            self.try_begin_scan();
        }
        if self.scanner.is_scanning() {
            result.scanned = self.scanner.step_scan();
            result.scan_completed = !self.scanner.is_scanning();
        }

        let before = self.scanner.notifier().pending_len();
        let delivered = self.scanner.pump_changes(now);
        let after = self.scanner.notifier().pending_len();
        result.changes_delivered = delivered;
        result.changes_collected = (after + delivered).saturating_sub(before);

        result.enhanced = self.scanner.poll_queue(now);
        result.enhanced += self.scanner.drain_enhance_requests();
        result.updates = self.scanner.run_updates();
        result
    }

    /// Step from `now` in small increments until nothing is left to do.
    /// Returns the time of the last step.
    pub fn run_until_idle(&mut self, now: Duration) -> Duration {
        let config = self.config();
        let tick = config
            .notifier_window
            .min(config.queue_debounce)
            .max(Duration::from_millis(1));
        let mut t = now;
        for _ in 0..MAX_IDLE_STEPS {
            let result = self.step(t);
            if result.is_idle() && !self.scanner.has_work() {
                return t;
            }
            t += tick;
        }
        tracing::warn!(steps = MAX_IDLE_STEPS, "runtime did not settle");
        t
    }

    /// Stop observing the document.
    pub fn pause(&mut self) {
        self.scanner.pause();
    }

    pub fn resume(&mut self) {
        self.scanner.resume();
    }

    /// Tear down every behavior and stop observing.
    pub fn shutdown(&mut self) {
        self.scanner.destroy();
        self.start_requested = false;
        self.scan_started = false;
        tracing::debug!("runtime shut down");
    }
}
