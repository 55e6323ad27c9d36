#![forbid(unsafe_code)]

//! `data-next-remove-item`: click removes a package from the cart.
//!
//! The package is the attribute value, or the package context (the usual
//! case inside a cart row).

use crate::cart_ops;
use nxt_attr::vocab;
use nxt_dom::EventKind;
use nxt_runtime::{Enhancer, EnhancerBase, EnhancerError, EnhancerModule, ResolveContext, ResolveError};

#[derive(Debug, Default)]
pub struct RemoveItemEnhancer {
    package_id: String,
}

impl Enhancer for RemoveItemEnhancer {
    fn name(&self) -> &'static str {
        "remove-item"
    }

    fn initialize(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        self.package_id = crate::target_package(base, Some(vocab::REMOVE_ITEM))?;
        let stores = base.stores().clone();
        let id = self.package_id.clone();
        base.listen(EventKind::Click, move |_| cart_ops::remove_item(&stores, &id))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RemoveItemModule;

impl EnhancerModule for RemoveItemModule {
    fn name(&self) -> &'static str {
        "remove-item"
    }

    fn construct(&self, _: &ResolveContext<'_>) -> Result<Box<dyn Enhancer>, ResolveError> {
        Ok(Box::new(RemoveItemEnhancer::default()))
    }
}
