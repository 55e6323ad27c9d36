#![forbid(unsafe_code)]

//! `data-next-selector-id`: pick one package from a group of cards.
//!
//! Cards are descendants carrying `data-next-selector-card` or
//! `data-next-package-id`. Clicking a card writes
//! `selection.<selector-id> = { "packageId": <id> }`; every card mirrors the
//! store with the `next-selected` class and `data-next-selected`.
//!
//! When the store has no choice yet, the card marked `data-next-selected`
//! (or the first card) is chosen on enhancement.

use nxt_attr::eval::display_string;
use nxt_attr::{classify, vocab};
use nxt_dom::{Document, ElementId, EventKind};
use nxt_runtime::{Enhancer, EnhancerBase, EnhancerError, EnhancerModule, ResolveContext, ResolveError, Stores};
use serde_json::{Value, json};

pub const SELECTED_CLASS: &str = "next-selected";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Card {
    element: ElementId,
    package_id: String,
}

fn card_package(doc: &Document, id: ElementId) -> Option<String> {
    doc.attribute(id, vocab::SELECTOR_CARD)
        .filter(|v| !v.trim().is_empty())
        .or_else(|| doc.attribute(id, vocab::PACKAGE_ID))
        .map(|v| v.trim().to_string())
}

fn find_cards(doc: &Document, root: ElementId) -> Vec<Card> {
    doc.descendants(root)
        .into_iter()
        .filter_map(|element| card_package(doc, element).map(|package_id| Card { element, package_id }))
        .collect()
}

/// Current choice of `selector` in the selection store.
#[must_use]
pub fn selected_package(stores: &Stores, selector: &str) -> Option<String> {
    stores.selection.with_state(|selection| {
        selection
            .get(selector)
            .and_then(|choice| choice.get("packageId"))
            .filter(|v| !v.is_null())
            .map(display_string)
    })
}

/// Record `package_id` as the choice of `selector`.
pub fn select(stores: &Stores, selector: &str, package_id: &str) {
    let parsed = classify(Some(package_id)).parsed;
    let id = if parsed.is_number() { parsed } else { Value::String(package_id.to_string()) };
    stores.selection.update(|selection| {
        if !selection.is_object() {
            *selection = json!({});
        }
        selection[selector] = json!({ "packageId": id });
    });
    tracing::debug!(selector, package = package_id, "package selected");
}

#[derive(Debug, Default)]
pub struct SelectorEnhancer {
    selector_id: String,
    cards: Vec<Card>,
}

impl SelectorEnhancer {
    fn sync(&self, base: &EnhancerBase) -> Result<(), EnhancerError> {
        let chosen = selected_package(base.stores(), &self.selector_id);
        base.write(|doc| -> Result<(), nxt_dom::DomError> {
            for card in &self.cards {
                if !doc.contains_element(card.element) {
                    continue;
                }
                let on = chosen.as_deref() == Some(card.package_id.as_str());
                doc.toggle_class(card.element, SELECTED_CLASS, on)?;
                if on {
                    doc.set_attribute(card.element, vocab::SELECTED, "true")?;
                } else {
                    doc.remove_attribute(card.element, vocab::SELECTED)?;
                }
            }
            Ok(())
        })?;
        Ok(())
    }
}

impl Enhancer for SelectorEnhancer {
    fn name(&self) -> &'static str {
        "selector"
    }

    fn initialize(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        self.selector_id = base.require_attr(vocab::SELECTOR_ID)?.trim().to_string();
        let root = base.element();
        self.cards = base.read(|doc| find_cards(doc, root));

        let stores = base.stores().clone();
        for card in &self.cards {
            let stores = stores.clone();
            let selector = self.selector_id.clone();
            let package = card.package_id.clone();
            base.listen_on(card.element, EventKind::Click, move |_| {
                select(&stores, &selector, &package);
            })?;
        }

        let selection = stores.selection.clone();
        base.subscribe(&selection);

        if selected_package(&stores, &self.selector_id).is_none() {
            let preset = base.read(|doc| {
                self.cards
                    .iter()
                    .find(|c| doc.attribute(c.element, vocab::SELECTED).is_some_and(|v| v != "false"))
                    .or_else(|| self.cards.first())
                    .map(|c| c.package_id.clone())
            });
            if let Some(package) = preset {
                select(&stores, &self.selector_id, &package);
            }
        }
        self.sync(base)
    }

    fn update(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        self.sync(base)
    }
}

#[derive(Debug, Default)]
pub struct SelectorModule;

impl EnhancerModule for SelectorModule {
    fn name(&self) -> &'static str {
        "selector"
    }

    fn construct(&self, _: &ResolveContext<'_>) -> Result<Box<dyn Enhancer>, ResolveError> {
        Ok(Box::new(SelectorEnhancer::default()))
    }
}
