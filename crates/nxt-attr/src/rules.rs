#![forbid(unsafe_code)]

//! Enhancer types and the ordered rule table that maps an element's
//! attributes to them.
//!
//! [`RULES`] is the single source of truth. Each rule fires when any of its
//! trigger attributes is present (or, for component rules, when
//! `data-next-component` has the given value) and none of its exclusion
//! attributes are. Rules are evaluated top to bottom; the resulting
//! [`EnhancerTypeSet`] keeps that order and drops duplicates.
//!
//! # Exclusion chain
//!
//! `action`, `selector` and `upsell` compete for the same markup:
//!
//! | Attributes present | Types |
//! |--------------------|-------|
//! | `action` | action |
//! | `action` + `upsell-action` | upsell |
//! | `selector-id` | selector |
//! | `selector-id` + any of `action`/`upsell`/`upsell-action` | not selector |
//! | `upsell` or `upsell-action` | upsell |
//!
//! Adding a behavior type means one [`EnhancerType`] variant and one rule.

use crate::vocab;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::BuildHasher;

// ---------------------------------------------------------------------------
// Attribute access
// ---------------------------------------------------------------------------

/// Read-only access to an element's attributes.
pub trait AttributeLookup {
    fn attribute(&self, name: &str) -> Option<&str>;

    fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }
}

impl AttributeLookup for [(String, String)] {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }
}

impl AttributeLookup for Vec<(String, String)> {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.as_slice().attribute(name)
    }
}

impl<S: BuildHasher> AttributeLookup for HashMap<String, String, S> {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Behavior type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnhancerType {
    Display,
    Conditional,
    Toggle,
    Action,
    Timer,
    Checkout,
    ExpressCheckout,
    CartItems,
    Profile,
    ProfileSwitcher,
    Selector,
    Upsell,
    Coupon,
    Accordion,
    Tooltip,
    Quantity,
    QuantityText,
    RemoveItem,
    ScrollHint,
}

impl EnhancerType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Display => "display",
            Self::Conditional => "conditional",
            Self::Toggle => "toggle",
            Self::Action => "action",
            Self::Timer => "timer",
            Self::Checkout => "checkout",
            Self::ExpressCheckout => "express-checkout",
            Self::CartItems => "cart-items",
            Self::Profile => "profile",
            Self::ProfileSwitcher => "profile-switcher",
            Self::Selector => "selector",
            Self::Upsell => "upsell",
            Self::Coupon => "coupon",
            Self::Accordion => "accordion",
            Self::Tooltip => "tooltip",
            Self::Quantity => "quantity",
            Self::QuantityText => "quantity-text",
            Self::RemoveItem => "remove-item",
            Self::ScrollHint => "scroll-hint",
        }
    }
}

impl fmt::Display for EnhancerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, de-duplicated set of types for one element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnhancerTypeSet {
    types: Vec<EnhancerType>,
}

impl EnhancerTypeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `ty` unless already present. Returns whether it was added.
    pub fn insert(&mut self, ty: EnhancerType) -> bool {
        if self.types.contains(&ty) {
            return false;
        }
        self.types.push(ty);
        true
    }

    #[must_use]
    pub fn contains(&self, ty: EnhancerType) -> bool {
        self.types.contains(&ty)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = EnhancerType> + '_ {
        self.types.iter().copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[EnhancerType] {
        &self.types
    }
}

impl FromIterator<EnhancerType> for EnhancerTypeSet {
    fn from_iter<I: IntoIterator<Item = EnhancerType>>(iter: I) -> Self {
        let mut set = Self::new();
        for ty in iter {
            set.insert(ty);
        }
        set
    }
}

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

/// One row of the rule table.
#[derive(Debug, Clone, Copy)]
pub struct EnhancerRule {
    pub ty: EnhancerType,
    /// Any of these present fires the rule.
    pub triggers: &'static [&'static str],
    /// `data-next-component` value that also fires the rule.
    pub component: Option<&'static str>,
    /// Any of these present blocks the rule.
    pub unless: &'static [&'static str],
}

impl EnhancerRule {
    const fn new(ty: EnhancerType, triggers: &'static [&'static str]) -> Self {
        Self {
            ty,
            triggers,
            component: None,
            unless: &[],
        }
    }

    const fn unless(mut self, attrs: &'static [&'static str]) -> Self {
        self.unless = attrs;
        self
    }

    const fn component(mut self, value: &'static str) -> Self {
        self.component = Some(value);
        self
    }

    /// Whether the rule fires for these attributes.
    pub fn matches<A: AttributeLookup + ?Sized>(&self, attrs: &A) -> bool {
        let triggered = self.triggers.iter().any(|t| attrs.has_attribute(t))
            || self
                .component
                .is_some_and(|c| attrs.attribute(vocab::COMPONENT) == Some(c));
        triggered && !self.unless.iter().any(|u| attrs.has_attribute(u))
    }

    /// Value of the first trigger attribute present: the attribute whose
    /// content identifies what the behavior is about.
    pub fn discriminant<'a, A: AttributeLookup + ?Sized>(&self, attrs: &'a A) -> Option<&'a str> {
        self.triggers
            .iter()
            .find_map(|t| attrs.attribute(t))
            .or_else(|| self.component.and_then(|_| attrs.attribute(vocab::COMPONENT)))
    }
}

pub const RULES: &[EnhancerRule] = &[
    EnhancerRule::new(EnhancerType::Display, &[vocab::DISPLAY]),
    EnhancerRule::new(EnhancerType::Conditional, &[vocab::SHOW, vocab::HIDE]),
    EnhancerRule::new(EnhancerType::Toggle, &[vocab::TOGGLE]),
    EnhancerRule::new(EnhancerType::Action, &[vocab::ACTION]).unless(&[vocab::UPSELL_ACTION]),
    EnhancerRule::new(EnhancerType::Timer, &[vocab::TIMER]),
    EnhancerRule::new(EnhancerType::Checkout, &[vocab::CHECKOUT]),
    EnhancerRule::new(EnhancerType::ExpressCheckout, &[vocab::EXPRESS_CHECKOUT]),
    EnhancerRule::new(EnhancerType::CartItems, &[vocab::CART_ITEMS]),
    EnhancerRule::new(EnhancerType::Profile, &[vocab::PROFILE]),
    EnhancerRule::new(EnhancerType::ProfileSwitcher, &[vocab::PROFILE_SWITCHER]),
    EnhancerRule::new(EnhancerType::Selector, &[vocab::SELECTOR_ID]).unless(&[
        vocab::ACTION,
        vocab::UPSELL,
        vocab::UPSELL_ACTION,
    ]),
    EnhancerRule::new(EnhancerType::Upsell, &[vocab::UPSELL, vocab::UPSELL_ACTION]),
    EnhancerRule::new(EnhancerType::Coupon, &[vocab::COUPON]),
    EnhancerRule::new(EnhancerType::Accordion, &[vocab::ACCORDION]),
    EnhancerRule::new(EnhancerType::Tooltip, &[vocab::TOOLTIP]),
    EnhancerRule::new(EnhancerType::Quantity, &[vocab::QUANTITY]),
    EnhancerRule::new(EnhancerType::QuantityText, &[vocab::QUANTITY_TEXT]),
    EnhancerRule::new(EnhancerType::RemoveItem, &[vocab::REMOVE_ITEM]),
    EnhancerRule::new(EnhancerType::ScrollHint, &[vocab::SCROLL_HINT]).component(vocab::COMPONENT_SCROLL_HINT),
];

/// The rule for `ty`.
#[must_use]
pub fn rule_for(ty: EnhancerType) -> Option<&'static EnhancerRule> {
    RULES.iter().find(|r| r.ty == ty)
}

/// Behavior types an element with these attributes hosts, in rule order.
pub fn enhancer_types_for<A: AttributeLookup + ?Sized>(attrs: &A) -> EnhancerTypeSet {
    RULES.iter().filter(|r| r.matches(attrs)).map(|r| r.ty).collect()
}
