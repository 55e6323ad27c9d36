#![forbid(unsafe_code)]

//! Subscriber setup for hosts that do not install their own.
//!
//! Filtering follows `RUST_LOG` (default `info`). `NXT_LOG_JSON=1` switches
//! to JSON lines on stderr. Installing twice is a no-op.

use tracing_subscriber::{EnvFilter, fmt};

/// Install the global subscriber.
pub fn init_logging() {
    init_logging_with(|key| std::env::var(key).ok());
}

/// Like [`init_logging`] with a custom environment lookup.
pub fn init_logging_with<F>(get_env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env_filter = get_env("RUST_LOG")
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    let use_json = get_env("NXT_LOG_JSON").is_some_and(|value| value.trim() == "1");

    if use_json {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .json()
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}
