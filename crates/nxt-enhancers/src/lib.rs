#![forbid(unsafe_code)]

//! Built-in behaviors for the nxt enhancement runtime.
//!
//! [`register_builtin`] installs a loader for every behavior type this crate
//! implements. Modules are built on first use.
//!
//! | Type | Module |
//! |------|--------|
//! | display | [`display::DisplayModule`] |
//! | conditional | [`conditional::ConditionalModule`] |
//! | toggle | [`toggle::ToggleModule`] |
//! | action | [`action::ActionModule`] |
//! | timer | [`timer::TimerModule`] |
//! | cart-items | [`cart_items::CartItemsModule`] |
//! | selector | [`selector::SelectorModule`] |
//! | quantity | [`quantity::QuantityModule`] |
//! | remove-item | [`remove_item::RemoveItemModule`] |
//! | accordion, tooltip, scroll-hint | [`widgets`] |
//!
//! Checkout, express checkout, profile, profile switcher, upsell, coupon and
//! quantity-text stay unregistered; elements carrying them are reported as
//! resolution failures.
//!
//! # Example
//!
//! ```
//! use nxt_dom::{Document, ReadyState, SharedDocument};
//! use nxt_runtime::{DispatchTable, Runtime, RuntimeConfig};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let document = SharedDocument::new(Document::new());
//! let total = document.write(|doc| {
//!     doc.set_ready_state(ReadyState::Complete);
//!     let el = doc.create_element("span");
//!     doc.set_attribute(el, "data-next-display", "cart.total").unwrap();
//!     doc.append_child(doc.body(), el).unwrap();
//!     el
//! });
//!
//! let mut table = DispatchTable::new();
//! nxt_enhancers::register_builtin(&mut table);
//! let mut runtime = Runtime::new(RuntimeConfig::default(), document.clone(), table);
//! runtime.stores().cart.update(|cart| cart["total"] = json!(42.5));
//! runtime.start(Duration::ZERO);
//! runtime.run_until_idle(Duration::ZERO);
//!
//! assert_eq!(document.read(|doc| doc.text(total).map(str::to_string)), Some("$42.50".into()));
//! ```

pub mod action;
pub mod cart_items;
pub mod cart_ops;
pub mod conditional;
pub mod display;
pub mod format;
pub mod quantity;
pub mod remove_item;
pub mod selector;
pub mod timer;
pub mod toggle;
pub mod widgets;

use nxt_attr::{EnhancerType, vocab};
use nxt_runtime::{DispatchTable, EnhancerBase, EnhancerError};

pub use display::{DisplayEnhancer, DisplaySource};
pub use format::DisplayFormat;

/// Register every built-in behavior.
pub fn register_builtin(table: &mut DispatchTable) {
    table.register(EnhancerType::Display, || Box::new(display::DisplayModule));
    table.register(EnhancerType::Conditional, || Box::new(conditional::ConditionalModule));
    table.register(EnhancerType::Toggle, || Box::new(toggle::ToggleModule));
    table.register(EnhancerType::Action, || Box::new(action::ActionModule));
    table.register(EnhancerType::Timer, || Box::new(timer::TimerModule));
    table.register(EnhancerType::CartItems, || Box::new(cart_items::CartItemsModule));
    table.register(EnhancerType::Selector, || Box::new(selector::SelectorModule));
    table.register(EnhancerType::Quantity, || Box::new(quantity::QuantityModule));
    table.register(EnhancerType::RemoveItem, || Box::new(remove_item::RemoveItemModule));
    table.register(EnhancerType::Accordion, || Box::new(widgets::AccordionModule));
    table.register(EnhancerType::Tooltip, || Box::new(widgets::TooltipModule));
    table.register(EnhancerType::ScrollHint, || Box::new(widgets::ScrollHintModule));
}

/// The package a cart control acts on: the value of `attr` when it names
/// one, else the package context.
pub(crate) fn target_package(base: &EnhancerBase, attr: Option<&'static str>) -> Result<String, EnhancerError> {
    attr.and_then(|name| base.attr(name))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "true")
        .or_else(|| base.package_context())
        .ok_or(EnhancerError::MissingAttribute(vocab::PACKAGE_ID))
}
