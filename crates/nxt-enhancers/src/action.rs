#![forbid(unsafe_code)]

//! `data-next-action`: one-shot cart commands on click.
//!
//! | Value | Effect |
//! |-------|--------|
//! | `add-to-cart` | add `data-next-quantity-value` (default 1) of the context package |
//! | `remove-from-cart` | remove the context package |
//! | `clear-cart` | empty the cart |
//!
//! Any other value is a resolution error; the element gets no behavior.

use crate::cart_ops;
use nxt_attr::vocab;
use nxt_dom::EventKind;
use nxt_runtime::{Enhancer, EnhancerBase, EnhancerError, EnhancerModule, ResolveContext, ResolveError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartAction {
    AddToCart,
    RemoveFromCart,
    ClearCart,
}

impl CartAction {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "add-to-cart" => Some(Self::AddToCart),
            "remove-from-cart" => Some(Self::RemoveFromCart),
            "clear-cart" => Some(Self::ClearCart),
            _ => None,
        }
    }

    #[must_use]
    pub fn needs_package(self) -> bool {
        !matches!(self, Self::ClearCart)
    }
}

#[derive(Debug)]
pub struct ActionEnhancer {
    action: CartAction,
}

impl ActionEnhancer {
    #[must_use]
    pub fn new(action: CartAction) -> Self {
        Self { action }
    }
}

impl Enhancer for ActionEnhancer {
    fn name(&self) -> &'static str {
        "action"
    }

    fn initialize(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        let package = if self.action.needs_package() {
            Some(crate::target_package(base, None)?)
        } else {
            None
        };
        let quantity = match base.attr(vocab::QUANTITY_ATTR) {
            None => 1,
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| EnhancerError::InvalidAttribute {
                name: vocab::QUANTITY_ATTR,
                value: raw.clone(),
            })?,
        };

        let action = self.action;
        let stores = base.stores().clone();
        base.listen(EventKind::Click, move |_| match (action, package.as_deref()) {
            (CartAction::AddToCart, Some(id)) => cart_ops::add_item(&stores, id, quantity),
            (CartAction::RemoveFromCart, Some(id)) => cart_ops::remove_item(&stores, id),
            (CartAction::ClearCart, _) => cart_ops::clear(&stores),
            _ => {}
        })?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ActionModule;

impl EnhancerModule for ActionModule {
    fn name(&self) -> &'static str {
        "action"
    }

    fn construct(&self, ctx: &ResolveContext<'_>) -> Result<Box<dyn Enhancer>, ResolveError> {
        let name = ctx.discriminant()?;
        let action = CartAction::parse(name).ok_or_else(|| ResolveError::UnknownAction(name.to_string()))?;
        Ok(Box::new(ActionEnhancer::new(action)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names() {
        assert_eq!(CartAction::parse(" add-to-cart "), Some(CartAction::AddToCart));
        assert_eq!(CartAction::parse("clear-cart"), Some(CartAction::ClearCart));
        assert_eq!(CartAction::parse("apply-coupon"), None);
        assert!(!CartAction::ClearCart.needs_package());
    }
}
