#![forbid(unsafe_code)]

//! Enhancement runtime: finds elements carrying `data-next-*` attributes,
//! attaches behaviors to them and keeps those behaviors in step with the
//! document as it changes.
//!
//! # Modules
//!
//! - [`runtime`]: host-driven composition root ([`Runtime::step`]).
//! - [`scanner`]: scan/enhance orchestration and the pending set.
//! - [`notifier`]: mutation records → coalesced [`DomChange`] batches.
//! - [`enhancer`] / [`registry`]: the behavior contract and lifecycle.
//! - [`dispatch`]: type → lazily-loaded behavior module.
//! - [`store`] / [`bus`]: shared state and events.
//! - [`resolver`]: namespace paths → store values.
//!
//! # Example
//!
//! ```
//! use nxt_dom::{Document, ReadyState, SharedDocument};
//! use nxt_runtime::{DispatchTable, Runtime, RuntimeConfig};
//! use std::time::Duration;
//!
//! let document = SharedDocument::new(Document::new());
//! document.write(|doc| doc.set_ready_state(ReadyState::Complete));
//! let mut runtime = Runtime::new(RuntimeConfig::default(), document, DispatchTable::new());
//! runtime.start(Duration::ZERO);
//! runtime.run_until_idle(Duration::ZERO);
//! assert!(runtime.stats().observer_active);
//! ```

pub mod bus;
pub mod config;
pub mod dispatch;
pub mod enhancer;
pub mod error;
#[cfg(feature = "logging")]
pub mod logging;
pub mod notifier;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod scanner;
pub mod stats;
pub mod store;
pub mod timer;

pub use bus::{BusEvent, BusSubscription, EventBus};
pub use config::RuntimeConfig;
pub use dispatch::{DispatchTable, EnhancerModule, ResolveContext, package_context};
pub use enhancer::{EnhanceRequests, Enhancer, EnhancerBase, InstanceId, Services, UpdateQueue};
pub use error::{EnhancerError, HandlerError, ResolveError, ScanError};
pub use notifier::{ChangeHandler, ChangeNotifier, DomChange};
pub use registry::{BehaviorInstance, EnhancementRecord, EnhancementRegistry, LifecycleState};
pub use resolver::StoreResolver;
pub use runtime::{Runtime, StepResult};
pub use scanner::Scanner;
pub use stats::{ScanStats, TypeTiming};
pub use store::{Store, Stores, Subscription};
pub use timer::{CoalescingTimer, TimerMode};
