#![forbid(unsafe_code)]

//! `data-next-toggle`: click adds the package to the cart, or removes it
//! when it is already there.
//!
//! The package is the attribute value, or the package context when the
//! value is empty or `true`. The element carries `next-in-cart` while the
//! package is in the cart.

use crate::cart_ops;
use nxt_attr::vocab;
use nxt_dom::EventKind;
use nxt_runtime::{Enhancer, EnhancerBase, EnhancerError, EnhancerModule, ResolveContext, ResolveError};

pub const IN_CART_CLASS: &str = "next-in-cart";

#[derive(Debug, Default)]
pub struct ToggleEnhancer {
    package_id: String,
}

impl ToggleEnhancer {
    #[must_use]
    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    fn sync(&self, base: &EnhancerBase) -> Result<(), EnhancerError> {
        let in_cart = cart_ops::in_cart(base.stores(), &self.package_id);
        base.toggle_class(IN_CART_CLASS, in_cart)
    }
}

impl Enhancer for ToggleEnhancer {
    fn name(&self) -> &'static str {
        "toggle"
    }

    fn initialize(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        self.package_id = crate::target_package(base, Some(vocab::TOGGLE))?;
        let cart = base.stores().cart.clone();
        base.subscribe(&cart);

        let stores = base.stores().clone();
        let id = self.package_id.clone();
        base.listen(EventKind::Click, move |_| {
            if cart_ops::in_cart(&stores, &id) {
                cart_ops::remove_item(&stores, &id);
            } else {
                cart_ops::add_item(&stores, &id, 1);
            }
        })?;
        self.sync(base)
    }

    fn update(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        self.sync(base)
    }

    fn cleanup(&mut self, base: &mut EnhancerBase) {
        if let Err(err) = base.toggle_class(IN_CART_CLASS, false) {
            tracing::debug!(element = %base.element(), error = %err, "toggle cleanup skipped");
        }
    }
}

#[derive(Debug, Default)]
pub struct ToggleModule;

impl EnhancerModule for ToggleModule {
    fn name(&self) -> &'static str {
        "toggle"
    }

    fn construct(&self, _: &ResolveContext<'_>) -> Result<Box<dyn Enhancer>, ResolveError> {
        Ok(Box::new(ToggleEnhancer::default()))
    }
}
