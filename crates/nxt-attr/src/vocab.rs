#![forbid(unsafe_code)]

//! The attribute vocabulary: the only contract between page markup and the
//! runtime.

pub const DISPLAY: &str = "data-next-display";
pub const TOGGLE: &str = "data-next-toggle";
pub const ACTION: &str = "data-next-action";
pub const TIMER: &str = "data-next-timer";
pub const SHOW: &str = "data-next-show";
pub const HIDE: &str = "data-next-hide";
pub const CHECKOUT: &str = "data-next-checkout";
pub const EXPRESS_CHECKOUT: &str = "data-next-express-checkout";
pub const CART_ITEMS: &str = "data-next-cart-items";
pub const PROFILE: &str = "data-next-profile";
pub const PROFILE_SWITCHER: &str = "data-next-profile-switcher";
pub const SELECTOR_ID: &str = "data-next-selector-id";
pub const UPSELL: &str = "data-next-upsell";
pub const UPSELL_ACTION: &str = "data-next-upsell-action";
pub const COUPON: &str = "data-next-coupon";
pub const ACCORDION: &str = "data-next-accordion";
pub const TOOLTIP: &str = "data-next-tooltip";
pub const QUANTITY: &str = "data-next-quantity";
pub const QUANTITY_TEXT: &str = "data-next-quantity-text";
pub const REMOVE_ITEM: &str = "data-next-remove-item";
pub const SCROLL_HINT: &str = "data-next-scroll-hint";
pub const COMPONENT: &str = "data-next-component";

/// `data-next-component` value that selects the scroll hint.
pub const COMPONENT_SCROLL_HINT: &str = "scroll-hint";

/// Context attribute: the package an element's subtree is about.
pub const PACKAGE_ID: &str = "data-next-package-id";

// Modifiers read by individual behaviors. Not triggers.
pub const HIDE_IF_ZERO: &str = "data-hide-if-zero";
pub const FORMAT: &str = "data-format";
pub const PREFIX: &str = "data-prefix";
pub const SUFFIX: &str = "data-suffix";
pub const QUANTITY_ATTR: &str = "data-next-quantity-value";
pub const SELECTED: &str = "data-next-selected";
pub const SELECTOR_CARD: &str = "data-next-selector-card";
pub const TEMPLATE: &str = "data-next-template";
pub const ACCORDION_TRIGGER: &str = "data-next-accordion-trigger";
pub const EMPTY_TEMPLATE: &str = "data-next-empty-template";
pub const EXPIRED_TEXT: &str = "data-next-expired-text";

/// Attributes whose presence makes an element a behavior candidate.
pub const TRIGGER_ATTRIBUTES: &[&str] = &[
    DISPLAY,
    TOGGLE,
    ACTION,
    TIMER,
    SHOW,
    HIDE,
    CHECKOUT,
    EXPRESS_CHECKOUT,
    CART_ITEMS,
    PROFILE,
    PROFILE_SWITCHER,
    SELECTOR_ID,
    UPSELL,
    UPSELL_ACTION,
    COUPON,
    ACCORDION,
    TOOLTIP,
    QUANTITY,
    QUANTITY_TEXT,
    REMOVE_ITEM,
    SCROLL_HINT,
    COMPONENT,
];

/// Attributes that change how descendants resolve, not which behaviors exist.
pub const CONTEXT_ATTRIBUTES: &[&str] = &[PACKAGE_ID];

/// Every attribute the change notifier reports on.
#[must_use]
pub fn is_watched(name: &str) -> bool {
    is_trigger(name) || CONTEXT_ATTRIBUTES.contains(&name)
}

#[must_use]
pub fn is_trigger(name: &str) -> bool {
    TRIGGER_ATTRIBUTES.contains(&name)
}

#[must_use]
pub fn is_context(name: &str) -> bool {
    CONTEXT_ATTRIBUTES.contains(&name)
}

/// Names to hand a host observer as its attribute filter.
#[must_use]
pub fn watched_attributes() -> Vec<&'static str> {
    TRIGGER_ATTRIBUTES
        .iter()
        .chain(CONTEXT_ATTRIBUTES)
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_and_text_are_not_watched() {
        assert!(!is_watched("class"));
        assert!(!is_watched("hidden"));
        assert!(!is_watched(HIDE_IF_ZERO));
    }

    #[test]
    fn context_is_watched_but_not_a_trigger() {
        assert!(is_watched(PACKAGE_ID));
        assert!(!is_trigger(PACKAGE_ID));
    }

    #[test]
    fn filter_has_no_duplicates() {
        let mut names = watched_attributes();
        let len = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), len);
    }
}
