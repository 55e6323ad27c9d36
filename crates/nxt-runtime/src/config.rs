#![forbid(unsafe_code)]

//! Runtime configuration.

use std::time::Duration;

/// Configuration for the runtime and its scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Elements enhanced per scan step.
    pub batch_size: usize,
    /// Coalescing window of the change notifier.
    pub notifier_window: Duration,
    /// Debounce before the pending set is flushed, never longer than
    /// `notifier_window` after the first pending change.
    pub queue_debounce: Duration,
    /// Collect per-type timing and log lifecycle traffic.
    pub debug: bool,
    /// Class added to the root when the first scan completes.
    pub ready_class: String,
    /// Host event dispatched when the first scan completes.
    pub ready_event: String,
    /// ISO currency code used by display formatting.
    pub default_currency: String,
    /// Opening and closing delimiters of an unresolved template placeholder.
    pub placeholder: (String, String),
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            notifier_window: Duration::from_millis(16),
            queue_debounce: Duration::from_millis(10),
            debug: false,
            ready_class: "next-display-ready".to_string(),
            ready_event: "next:display-ready".to_string(),
            default_currency: "USD".to_string(),
            placeholder: ("{".to_string(), "}".to_string()),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `NXT_DEBUG`, `NXT_BATCH_SIZE` and `NXT_CURRENCY`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom environment lookup.
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = get_env("NXT_DEBUG") {
            config.debug = env_flag(&value);
        }
        if let Some(value) = get_env("NXT_BATCH_SIZE") {
            match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.batch_size = n,
                _ => tracing::warn!(value = %value, "ignoring invalid NXT_BATCH_SIZE"),
            }
        }
        if let Some(value) = get_env("NXT_CURRENCY") {
            let code = value.trim().to_ascii_uppercase();
            if !code.is_empty() {
                config.default_currency = code;
            }
        }
        config
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_notifier_window(mut self, window: Duration) -> Self {
        self.notifier_window = window;
        self
    }

    #[must_use]
    pub fn with_queue_debounce(mut self, debounce: Duration) -> Self {
        self.queue_debounce = debounce;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn with_currency(mut self, code: impl Into<String>) -> Self {
        self.default_currency = code.into();
        self
    }

    #[must_use]
    pub fn with_ready_class(mut self, class: impl Into<String>) -> Self {
        self.ready_class = class.into();
        self
    }

    /// Whether `value` still holds an unresolved `{...}` placeholder.
    #[must_use]
    pub fn is_placeholder(&self, value: &str) -> bool {
        let (open, close) = (&self.placeholder.0, &self.placeholder.1);
        value
            .find(open.as_str())
            .is_some_and(|start| value[start + open.len()..].contains(close.as_str()))
    }
}

fn env_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
