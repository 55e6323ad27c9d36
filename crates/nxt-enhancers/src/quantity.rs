#![forbid(unsafe_code)]

//! `data-next-quantity="increase|decrease|set"` for the context package.
//!
//! `increase` and `decrease` act on click; `set` reads the value carried by
//! a `change` event. Decreasing to zero removes the line. A `decrease`
//! control carries `next-disabled` while the package is not in the cart.

use crate::cart_ops;
use nxt_dom::EventKind;
use nxt_runtime::{Enhancer, EnhancerBase, EnhancerError, EnhancerModule, ResolveContext, ResolveError};

pub const DISABLED_CLASS: &str = "next-disabled";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityControl {
    Increase,
    Decrease,
    Set,
}

impl QuantityControl {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "increase" | "+" => Some(Self::Increase),
            "decrease" | "-" => Some(Self::Decrease),
            "set" | "input" => Some(Self::Set),
            _ => None,
        }
    }

    /// Quantity after applying this control to `current`.
    #[must_use]
    pub fn apply(self, current: u64, input: Option<&str>) -> Option<u64> {
        match self {
            Self::Increase => Some(current.saturating_add(1)),
            Self::Decrease => Some(current.saturating_sub(1)),
            Self::Set => input?.trim().parse().ok(),
        }
    }
}

#[derive(Debug)]
pub struct QuantityEnhancer {
    control: QuantityControl,
    package_id: String,
}

impl QuantityEnhancer {
    #[must_use]
    pub fn new(control: QuantityControl) -> Self {
        Self {
            control,
            package_id: String::new(),
        }
    }
}

impl Enhancer for QuantityEnhancer {
    fn name(&self) -> &'static str {
        "quantity"
    }

    fn initialize(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        self.package_id = crate::target_package(base, None)?;
        let kind = match self.control {
            QuantityControl::Set => EventKind::Change,
            _ => EventKind::Click,
        };
        let control = self.control;
        let stores = base.stores().clone();
        let id = self.package_id.clone();
        base.listen(kind, move |event| {
            let current = cart_ops::quantity_of(&stores, &id);
            match control.apply(current, event.value.as_deref()) {
                Some(next) if next != current => cart_ops::set_quantity(&stores, &id, next),
                Some(_) => {}
                None => tracing::warn!(package = %id, value = ?event.value, "ignoring quantity input"),
            }
        })?;

        if self.control == QuantityControl::Decrease {
            let cart = base.stores().cart.clone();
            base.subscribe(&cart);
        }
        self.update(base)
    }

    fn update(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        if self.control == QuantityControl::Decrease {
            let empty = !cart_ops::in_cart(base.stores(), &self.package_id);
            base.toggle_class(DISABLED_CLASS, empty)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct QuantityModule;

impl EnhancerModule for QuantityModule {
    fn name(&self) -> &'static str {
        "quantity"
    }

    fn construct(&self, ctx: &ResolveContext<'_>) -> Result<Box<dyn Enhancer>, ResolveError> {
        let raw = ctx.discriminant()?;
        // An empty or unknown value behaves as the input form.
        let control = QuantityControl::parse(raw).unwrap_or(QuantityControl::Set);
        Ok(Box::new(QuantityEnhancer::new(control)))
    }
}
