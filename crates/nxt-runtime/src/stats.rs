#![forbid(unsafe_code)]

//! Scanner introspection snapshot.

use nxt_attr::EnhancerType;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Accumulated initialization time for one behavior type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeTiming {
    pub count: u64,
    #[serde(serialize_with = "as_micros")]
    pub total: Duration,
}

impl TypeTiming {
    pub fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
    }

    #[must_use]
    pub fn average(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        let count = u32::try_from(self.count).unwrap_or(u32::MAX);
        self.total / count
    }
}

fn as_micros<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
}

/// Point-in-time view of the scanner.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    /// Elements with an enhancement record.
    pub enhanced_elements: usize,
    /// Active behavior instances.
    pub behaviors: usize,
    /// Elements waiting in the pending set.
    pub pending: usize,
    pub observer_active: bool,
    pub scanning: bool,
    /// Modules built by the dispatch table.
    pub loaded_modules: usize,
    /// Behaviors that failed to resolve or initialize since the last reset.
    pub failures: u64,
    /// Per-type initialization timing; only collected in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_timing: Option<BTreeMap<EnhancerType, TypeTiming>>,
}
