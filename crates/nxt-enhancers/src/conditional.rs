#![forbid(unsafe_code)]

//! `data-next-show` / `data-next-hide`: visibility from a condition.
//!
//! The condition is compiled once when the element is enhanced (malformed
//! input degrades to `cart.isEmpty` with a warning) and re-evaluated after
//! every change of a store it reads. With both attributes present the
//! element shows while the show condition holds and the hide condition
//! does not.

use nxt_attr::{ConditionExpression, Namespace, compile_condition, evaluate, vocab};
use nxt_runtime::{
    Enhancer, EnhancerBase, EnhancerError, EnhancerModule, ResolveContext, ResolveError, Store, StoreResolver, Stores,
};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Visible while the condition holds.
    ShowWhen,
    /// Hidden while the condition holds.
    HideWhen,
}

fn namespace_of(condition: &ConditionExpression) -> Option<Namespace> {
    match condition {
        ConditionExpression::PropertyReference(path) | ConditionExpression::Comparison { left: path, .. } => {
            path.namespace()
        }
        ConditionExpression::FunctionCall { object, .. } => Namespace::parse(object),
    }
}

fn store_for(namespace: Option<Namespace>, stores: &Stores) -> &Store<Value> {
    match namespace {
        Some(Namespace::Package | Namespace::Campaign) => &stores.campaign,
        Some(Namespace::Order) => &stores.order,
        Some(Namespace::Selection) => &stores.selection,
        Some(Namespace::Shipping) => &stores.shipping,
        Some(Namespace::Param) => &stores.params,
        Some(Namespace::Cart) | None => &stores.cart,
    }
}

/// Visible only while every clause allows it.
#[derive(Debug)]
pub struct ConditionalEnhancer {
    clauses: Vec<(Visibility, ConditionExpression)>,
}

impl ConditionalEnhancer {
    #[must_use]
    pub fn new(mode: Visibility, condition: ConditionExpression) -> Self {
        Self {
            clauses: vec![(mode, condition)],
        }
    }

    /// Add a clause; an element carrying both attributes shows while the
    /// show condition holds and the hide condition does not.
    #[must_use]
    pub fn and(mut self, mode: Visibility, condition: ConditionExpression) -> Self {
        self.clauses.push((mode, condition));
        self
    }

    /// Namespace of the first clause.
    #[must_use]
    pub fn namespace(&self) -> Option<Namespace> {
        self.clauses.first().and_then(|(_, c)| namespace_of(c))
    }

    fn apply(&self, base: &EnhancerBase) -> Result<(), EnhancerError> {
        let package = base.package_context();
        let resolver = StoreResolver::new(base.stores()).with_package(package.as_deref());
        let visible = self.clauses.iter().all(|(mode, condition)| {
            let holds = evaluate(condition, &resolver);
            match mode {
                Visibility::ShowWhen => holds,
                Visibility::HideWhen => !holds,
            }
        });
        base.set_hidden(!visible)
    }
}

impl Enhancer for ConditionalEnhancer {
    fn name(&self) -> &'static str {
        "conditional"
    }

    fn initialize(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        let mut stores: Vec<Store<Value>> = Vec::new();
        for (_, condition) in &self.clauses {
            let store = store_for(namespace_of(condition), base.stores());
            if !stores.iter().any(|s| s.name() == store.name()) {
                stores.push(store.clone());
            }
        }
        for store in &stores {
            base.subscribe(store);
        }
        self.apply(base)
    }

    fn update(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        self.apply(base)
    }
}

#[derive(Debug, Default)]
pub struct ConditionalModule;

impl EnhancerModule for ConditionalModule {
    fn name(&self) -> &'static str {
        "conditional"
    }

    fn construct(&self, ctx: &ResolveContext<'_>) -> Result<Box<dyn Enhancer>, ResolveError> {
        let enhancer = match (ctx.attr(vocab::SHOW), ctx.attr(vocab::HIDE)) {
            (Some(show), Some(hide)) => ConditionalEnhancer::new(Visibility::ShowWhen, compile_condition(show))
                .and(Visibility::HideWhen, compile_condition(hide)),
            (Some(show), None) => ConditionalEnhancer::new(Visibility::ShowWhen, compile_condition(show)),
            (None, _) => ConditionalEnhancer::new(Visibility::HideWhen, compile_condition(ctx.discriminant()?)),
        };
        Ok(Box::new(enhancer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nxt_attr::PropertyPath;

    #[test]
    fn namespace_of_each_form() {
        let reference = ConditionalEnhancer::new(Visibility::ShowWhen, compile_condition("selection.main"));
        assert_eq!(reference.namespace(), Some(Namespace::Selection));
        let call = ConditionalEnhancer::new(Visibility::ShowWhen, compile_condition("cart.hasItem(3)"));
        assert_eq!(call.namespace(), Some(Namespace::Cart));
        let cmp = ConditionalEnhancer::new(Visibility::HideWhen, compile_condition("param.ref == x"));
        assert_eq!(cmp.namespace(), Some(Namespace::Param));
    }

    #[test]
    fn both_attributes_yield_two_clauses() {
        let both = ConditionalEnhancer::new(Visibility::ShowWhen, compile_condition("cart.hasItems"))
            .and(Visibility::HideWhen, compile_condition("param.ref == promo"));
        assert_eq!(both.clauses.len(), 2);
        assert_eq!(both.namespace(), Some(Namespace::Cart));
        assert_eq!(namespace_of(&both.clauses[1].1), Some(Namespace::Param));
    }

    #[test]
    fn fallback_reads_the_cart() {
        let degraded = ConditionalEnhancer::new(Visibility::ShowWhen, compile_condition("   "));
        assert_eq!(
            degraded.clauses[0].1,
            ConditionExpression::PropertyReference(PropertyPath::new("cart", "isEmpty"))
        );
        let stores = Stores::new();
        assert_eq!(store_for(degraded.namespace(), &stores).name(), "cart");
    }
}
