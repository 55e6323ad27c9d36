#![forbid(unsafe_code)]

//! `data-next-display`: render a store value as text.
//!
//! The module dispatches a second time on the path's namespace to pick a
//! [`DisplaySource`]. Paths under `package` (and paths whose namespace is
//! not recognized) bind to the nearest `data-next-package-id`, read when the
//! element is enhanced; a later change of that attribute re-enhances the
//! element.
//!
//! Modifiers: `data-format`, `data-prefix`, `data-suffix`,
//! `data-hide-if-zero`.

use crate::format::{DisplayFormat, render_value};
use nxt_attr::eval::as_number;
use nxt_attr::{Namespace, NamespaceResolver, PropertyPath, vocab};
use nxt_runtime::{
    Enhancer, EnhancerBase, EnhancerError, EnhancerModule, ResolveContext, ResolveError, Store, StoreResolver, Stores,
};
use serde_json::Value;

/// Where a displayed value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplaySource {
    Cart,
    Package(String),
    Campaign,
    Order,
    Selection,
    Shipping,
}

impl DisplaySource {
    /// Pick the source for `path`, falling back to the package context when
    /// the namespace is `package` or not recognized.
    #[must_use]
    pub fn for_path(path: &PropertyPath, package_context: Option<String>) -> Option<Self> {
        match path.namespace() {
            Some(Namespace::Cart) => Some(Self::Cart),
            Some(Namespace::Campaign) => Some(Self::Campaign),
            Some(Namespace::Order) => Some(Self::Order),
            Some(Namespace::Selection) => Some(Self::Selection),
            Some(Namespace::Shipping) => Some(Self::Shipping),
            Some(Namespace::Param) => None,
            Some(Namespace::Package) | None => package_context.map(Self::Package),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> Namespace {
        match self {
            Self::Cart => Namespace::Cart,
            Self::Package(_) => Namespace::Package,
            Self::Campaign => Namespace::Campaign,
            Self::Order => Namespace::Order,
            Self::Selection => Namespace::Selection,
            Self::Shipping => Namespace::Shipping,
        }
    }

    /// The store whose changes re-render this source.
    #[must_use]
    pub fn store<'a>(&self, stores: &'a Stores) -> &'a Store<Value> {
        match self {
            Self::Cart => &stores.cart,
            Self::Package(_) | Self::Campaign => &stores.campaign,
            Self::Order => &stores.order,
            Self::Selection => &stores.selection,
            Self::Shipping => &stores.shipping,
        }
    }

    fn package_id(&self) -> Option<&str> {
        match self {
            Self::Package(id) => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct DisplayEnhancer {
    source: DisplaySource,
    path: PropertyPath,
    format: DisplayFormat,
}

impl DisplayEnhancer {
    #[must_use]
    pub fn new(source: DisplaySource, property: &str, format: DisplayFormat) -> Self {
        let path = PropertyPath::new(source.namespace().as_str(), property);
        Self { source, path, format }
    }

    #[must_use]
    pub fn source(&self) -> &DisplaySource {
        &self.source
    }

    fn render(&self, base: &EnhancerBase) -> Result<(), EnhancerError> {
        let resolver = StoreResolver::new(base.stores()).with_package(self.source.package_id());
        let value = resolver.resolve(&self.path);

        if base.attr_flag(vocab::HIDE_IF_ZERO) {
            let zero = value.as_ref().and_then(as_number).is_none_or(|n| n == 0.0);
            base.set_hidden(zero)?;
            if zero {
                return Ok(());
            }
        }

        let text = render_value(value.as_ref(), self.format, &self.path.property, &base.config().default_currency);
        let text = if text.is_empty() {
            text
        } else {
            format!(
                "{}{text}{}",
                base.attr(vocab::PREFIX).unwrap_or_default(),
                base.attr(vocab::SUFFIX).unwrap_or_default()
            )
        };
        base.set_text(&text)?;
        Ok(())
    }
}

impl Enhancer for DisplayEnhancer {
    fn name(&self) -> &'static str {
        "display"
    }

    fn initialize(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        let store = self.source.store(base.stores()).clone();
        base.subscribe(&store);
        self.render(base)
    }

    fn update(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        self.render(base)
    }
}

/// Secondary dispatch for `display`.
#[derive(Debug, Default)]
pub struct DisplayModule;

impl EnhancerModule for DisplayModule {
    fn name(&self) -> &'static str {
        "display"
    }

    fn construct(&self, ctx: &ResolveContext<'_>) -> Result<Box<dyn Enhancer>, ResolveError> {
        let raw = ctx.discriminant()?.trim();
        let path = PropertyPath::from_dotted(raw);
        let source = DisplaySource::for_path(&path, ctx.package_context())
            .ok_or_else(|| ResolveError::UnresolvableDisplay(raw.to_string()))?;
        let format = DisplayFormat::parse(ctx.attr(vocab::FORMAT));
        Ok(Box::new(DisplayEnhancer::new(source, &path.property, format)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> PropertyPath {
        PropertyPath::from_dotted(s)
    }

    #[test]
    fn namespace_dispatch() {
        assert_eq!(DisplaySource::for_path(&path("cart.total"), None), Some(DisplaySource::Cart));
        assert_eq!(DisplaySource::for_path(&path("order.number"), None), Some(DisplaySource::Order));
        assert_eq!(DisplaySource::for_path(&path("param.ref"), None), None);
    }

    #[test]
    fn package_paths_need_context() {
        assert_eq!(DisplaySource::for_path(&path("package.price"), None), None);
        assert_eq!(
            DisplaySource::for_path(&path("package.price"), Some("7".into())),
            Some(DisplaySource::Package("7".into()))
        );
    }

    #[test]
    fn unknown_namespace_sniffs_package_context() {
        assert_eq!(
            DisplaySource::for_path(&path("item.price"), Some("9".into())),
            Some(DisplaySource::Package("9".into()))
        );
        assert_eq!(DisplaySource::for_path(&path("item.price"), None), None);
    }
}
