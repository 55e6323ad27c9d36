#![forbid(unsafe_code)]

//! Type → behavior dispatch.
//!
//! Each [`EnhancerType`] maps to at most one [`EnhancerModule`]. Modules are
//! registered as loaders and only built the first time an element needs
//! them, so pages that never use a behavior never pay for it. A module may
//! dispatch a second time on the element's attributes (display sources,
//! action names) inside [`EnhancerModule::construct`].

use crate::config::RuntimeConfig;
use crate::enhancer::Enhancer;
use crate::error::ResolveError;
use nxt_attr::{EnhancerType, rule_for, vocab};
use nxt_dom::{Document, ElementId};
use std::cell::OnceCell;
use std::collections::HashMap;

/// What a module sees when asked for a behavior.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub element: ElementId,
    pub ty: EnhancerType,
    pub document: &'a Document,
    pub config: &'a RuntimeConfig,
}

impl<'a> ResolveContext<'a> {
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.document.attribute(self.element, name)
    }

    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.document.has_attribute(self.element, name)
    }

    /// Value of the attribute that selected this type.
    pub fn discriminant(&self) -> Result<&'a str, ResolveError> {
        rule_for(self.ty)
            .and_then(|rule| rule.discriminant(self.document.attributes(self.element)))
            .ok_or(ResolveError::MissingDiscriminant(self.ty))
    }

    /// Package id from the element or its nearest ancestor.
    #[must_use]
    pub fn package_context(&self) -> Option<String> {
        package_context(self.document, self.element)
    }
}

/// `data-next-package-id` of `element` or its nearest ancestor.
#[must_use]
pub fn package_context(doc: &Document, element: ElementId) -> Option<String> {
    let holder = doc.closest(element, |d, id| d.has_attribute(id, vocab::PACKAGE_ID))?;
    doc.attribute(holder, vocab::PACKAGE_ID).map(str::to_string)
}

/// Builds behaviors for one type.
pub trait EnhancerModule {
    fn name(&self) -> &'static str;

    fn construct(&self, ctx: &ResolveContext<'_>) -> Result<Box<dyn Enhancer>, ResolveError>;
}

type Constructor = Box<dyn Fn(&ResolveContext<'_>) -> Result<Box<dyn Enhancer>, ResolveError>>;

struct FnModule {
    name: &'static str,
    construct: Constructor,
}

impl EnhancerModule for FnModule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn construct(&self, ctx: &ResolveContext<'_>) -> Result<Box<dyn Enhancer>, ResolveError> {
        (self.construct)(ctx)
    }
}

type Loader = Box<dyn Fn() -> Box<dyn EnhancerModule>>;

struct ModuleSlot {
    loader: Loader,
    module: OnceCell<Box<dyn EnhancerModule>>,
}

/// Registration table of lazily-loaded modules.
#[derive(Default)]
pub struct DispatchTable {
    slots: HashMap<EnhancerType, ModuleSlot>,
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.slots.keys().map(|t| t.as_str()).collect();
        types.sort_unstable();
        f.debug_struct("DispatchTable")
            .field("registered", &types)
            .field("loaded", &self.loaded_count())
            .finish()
    }
}

impl DispatchTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loader for `ty`, replacing any earlier registration.
    pub fn register(&mut self, ty: EnhancerType, loader: impl Fn() -> Box<dyn EnhancerModule> + 'static) {
        let replaced = self
            .slots
            .insert(
                ty,
                ModuleSlot {
                    loader: Box::new(loader),
                    module: OnceCell::new(),
                },
            )
            .is_some();
        if replaced {
            tracing::debug!(enhancer = ty.as_str(), "module registration replaced");
        }
    }

    /// Register a plain constructor function as the module for `ty`.
    pub fn register_fn<F>(&mut self, ty: EnhancerType, name: &'static str, construct: F)
    where
        F: Fn(&ResolveContext<'_>) -> Result<Box<dyn Enhancer>, ResolveError> + Clone + 'static,
    {
        self.register(ty, move || {
            Box::new(FnModule {
                name,
                construct: Box::new(construct.clone()),
            })
        });
    }

    #[must_use]
    pub fn is_registered(&self, ty: EnhancerType) -> bool {
        self.slots.contains_key(&ty)
    }

    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.slots.len()
    }

    /// Modules built so far.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.slots.values().filter(|s| s.module.get().is_some()).count()
    }

    /// Build the behavior for `ctx.ty`, loading its module on first use.
    pub fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<Box<dyn Enhancer>, ResolveError> {
        let slot = self
            .slots
            .get(&ctx.ty)
            .ok_or(ResolveError::NoImplementation(ctx.ty))?;
        let module = slot.module.get_or_init(|| {
            let module = (slot.loader)();
            tracing::debug!(enhancer = ctx.ty.as_str(), module = module.name(), "module loaded");
            module
        });
        module.construct(ctx)
    }
}
