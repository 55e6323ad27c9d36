#![forbid(unsafe_code)]

//! Presentation widgets that touch no store.
//!
//! | Type | Markup | Behavior |
//! |------|--------|----------|
//! | accordion | `data-next-accordion[="open"]` | trigger click toggles `next-accordion-open` |
//! | tooltip | `data-next-tooltip="text"` | hover adds a `.next-tooltip` child |
//! | scroll-hint | `data-next-scroll-hint` / `data-next-component="scroll-hint"` | `next-scroll-hint` until the first scroll, then `next-scrolled` |
//!
//! Listener callbacks write the document directly; they run outside any
//! document borrow.

use nxt_attr::vocab;
use nxt_dom::{ElementId, EventKind, SharedDocument};
use nxt_runtime::{Enhancer, EnhancerBase, EnhancerError, EnhancerModule, ResolveContext, ResolveError};
use std::cell::Cell;
use std::rc::Rc;

pub const ACCORDION_OPEN_CLASS: &str = "next-accordion-open";
pub const TOOLTIP_CLASS: &str = "next-tooltip";
pub const SCROLL_HINT_CLASS: &str = "next-scroll-hint";
pub const SCROLLED_CLASS: &str = "next-scrolled";

fn set_class(document: &SharedDocument, element: ElementId, class: &str, on: bool) {
    if let Err(err) = document.write(|doc| doc.toggle_class(element, class, on)) {
        tracing::warn!(element = %element, class, error = %err, "cannot update class");
    }
}

// ---------------------------------------------------------------------------
// Accordion
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct AccordionEnhancer;

impl Enhancer for AccordionEnhancer {
    fn name(&self) -> &'static str {
        "accordion"
    }

    fn initialize(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        let panel = base.element();
        let trigger = base
            .read(|doc| {
                doc.descendants(panel)
                    .into_iter()
                    .find(|id| doc.has_attribute(*id, vocab::ACCORDION_TRIGGER))
            })
            .unwrap_or(panel);
        let open = base.attr(vocab::ACCORDION).is_some_and(|v| v.trim() == "open");
        base.toggle_class(ACCORDION_OPEN_CLASS, open)?;

        let document = base.document().clone();
        base.listen_on(trigger, EventKind::Click, move |_| {
            let open = document.read(|doc| doc.has_class(panel, ACCORDION_OPEN_CLASS));
            set_class(&document, panel, ACCORDION_OPEN_CLASS, !open);
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tooltip
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct TooltipEnhancer {
    bubble: Rc<Cell<Option<ElementId>>>,
}

fn remove_bubble(document: &SharedDocument, bubble: &Cell<Option<ElementId>>) {
    if let Some(id) = bubble.take() {
        let removed = document.write(|doc| if doc.contains_element(id) { doc.remove(id) } else { Ok(Vec::new()) });
        if let Err(err) = removed {
            tracing::debug!(tooltip = %id, error = %err, "tooltip already gone");
        }
    }
}

impl Enhancer for TooltipEnhancer {
    fn name(&self) -> &'static str {
        "tooltip"
    }

    fn initialize(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        let text = base.require_attr(vocab::TOOLTIP)?;
        let host = base.element();

        let document = base.document().clone();
        let bubble = Rc::clone(&self.bubble);
        base.listen(EventKind::MouseEnter, move |_| {
            if bubble.get().is_some() {
                return;
            }
            let created = document.write(|doc| {
                let id = doc.create_element("span");
                doc.toggle_class(id, TOOLTIP_CLASS, true)?;
                doc.set_text(id, &text)?;
                doc.append_child(host, id)?;
                Ok::<_, nxt_dom::DomError>(id)
            });
            match created {
                Ok(id) => bubble.set(Some(id)),
                Err(err) => tracing::warn!(element = %host, error = %err, "cannot show tooltip"),
            }
        })?;

        let document = base.document().clone();
        let bubble = Rc::clone(&self.bubble);
        base.listen(EventKind::MouseLeave, move |_| remove_bubble(&document, &bubble))?;
        Ok(())
    }

    fn cleanup(&mut self, base: &mut EnhancerBase) {
        remove_bubble(base.document(), &self.bubble);
    }
}

impl TooltipEnhancer {
    #[must_use]
    pub fn is_showing(&self) -> bool {
        self.bubble.get().is_some()
    }
}

// ---------------------------------------------------------------------------
// Scroll hint
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ScrollHintEnhancer;

impl Enhancer for ScrollHintEnhancer {
    fn name(&self) -> &'static str {
        "scroll-hint"
    }

    fn initialize(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        base.toggle_class(SCROLL_HINT_CLASS, true)?;
        let element = base.element();
        let document = base.document().clone();
        base.listen(EventKind::Scroll, move |_| {
            set_class(&document, element, SCROLL_HINT_CLASS, false);
            set_class(&document, element, SCROLLED_CLASS, true);
        })?;
        Ok(())
    }

    fn cleanup(&mut self, base: &mut EnhancerBase) {
        let document = base.document().clone();
        let element = base.element();
        if document.read(|doc| doc.contains_element(element)) {
            set_class(&document, element, SCROLL_HINT_CLASS, false);
            set_class(&document, element, SCROLLED_CLASS, false);
        }
    }
}

// ---------------------------------------------------------------------------
// Modules
// ---------------------------------------------------------------------------

macro_rules! widget_module {
    ($module:ident, $enhancer:ident, $name:literal) => {
        #[derive(Debug, Default)]
        pub struct $module;

        impl EnhancerModule for $module {
            fn name(&self) -> &'static str {
                $name
            }

            fn construct(&self, _: &ResolveContext<'_>) -> Result<Box<dyn Enhancer>, ResolveError> {
                Ok(Box::new($enhancer::default()))
            }
        }
    };
}

widget_module!(AccordionModule, AccordionEnhancer, "accordion");
widget_module!(TooltipModule, TooltipEnhancer, "tooltip");
widget_module!(ScrollHintModule, ScrollHintEnhancer, "scroll-hint");
