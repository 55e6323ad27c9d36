#![forbid(unsafe_code)]

//! `data-next-timer="<seconds>"`: countdown driven by the runtime clock.
//!
//! The countdown starts at the clock reading taken when the element is
//! enhanced. On reaching zero the element gets `next-timer-expired`, its
//! text becomes `data-next-expired-text` (or `00:00`), and a
//! `timer:expired` bus event is published once.

use nxt_attr::vocab;
use nxt_runtime::{BusEvent, Enhancer, EnhancerBase, EnhancerError, EnhancerModule, ResolveContext, ResolveError};
use serde_json::json;

pub const EXPIRED_CLASS: &str = "next-timer-expired";

/// `75` → `01:15`, `3725` → `1:02:05`.
#[must_use]
pub fn format_countdown(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 { format!("{h}:{m:02}:{s:02}") } else { format!("{m:02}:{s:02}") }
}

#[derive(Debug, Default)]
pub struct TimerEnhancer {
    duration: u64,
    started_at: u64,
    expired: bool,
}

impl TimerEnhancer {
    #[must_use]
    pub fn remaining(&self, clock: u64) -> u64 {
        self.duration.saturating_sub(clock.saturating_sub(self.started_at))
    }

    fn render(&mut self, base: &EnhancerBase) -> Result<(), EnhancerError> {
        let remaining = self.remaining(base.stores().clock.get_state());
        if remaining > 0 {
            return base.set_text(&format_countdown(remaining));
        }
        let text = base.attr(vocab::EXPIRED_TEXT).unwrap_or_else(|| format_countdown(0));
        base.set_text(&text)?;
        base.toggle_class(EXPIRED_CLASS, true)?;
        if !self.expired {
            self.expired = true;
            base.bus().emit(BusEvent::Custom {
                name: "timer:expired".to_string(),
                detail: json!({ "element": base.element().get() }),
            });
        }
        Ok(())
    }
}

impl Enhancer for TimerEnhancer {
    fn name(&self) -> &'static str {
        "timer"
    }

    fn initialize(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        let raw = base.require_attr(vocab::TIMER)?;
        self.duration = raw.trim().parse().map_err(|_| EnhancerError::InvalidAttribute {
            name: vocab::TIMER,
            value: raw.clone(),
        })?;
        self.started_at = base.stores().clock.get_state();
        let clock = base.stores().clock.clone();
        base.subscribe(&clock);
        self.render(base)
    }

    fn update(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        if self.expired {
            return Ok(());
        }
        self.render(base)
    }
}

#[derive(Debug, Default)]
pub struct TimerModule;

impl EnhancerModule for TimerModule {
    fn name(&self) -> &'static str {
        "timer"
    }

    fn construct(&self, _: &ResolveContext<'_>) -> Result<Box<dyn Enhancer>, ResolveError> {
        Ok(Box::new(TimerEnhancer::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_text() {
        assert_eq!(format_countdown(0), "00:00");
        assert_eq!(format_countdown(75), "01:15");
        assert_eq!(format_countdown(3725), "1:02:05");
    }

    #[test]
    fn remaining_saturates() {
        let timer = TimerEnhancer {
            duration: 10,
            started_at: 5,
            expired: false,
        };
        assert_eq!(timer.remaining(5), 10);
        assert_eq!(timer.remaining(12), 3);
        assert_eq!(timer.remaining(100), 0);
    }
}
