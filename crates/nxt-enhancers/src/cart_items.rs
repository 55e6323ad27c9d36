#![forbid(unsafe_code)]

//! `data-next-cart-items`: one row per cart line.
//!
//! ```text
//! <div data-next-cart-items>
//!   <div data-next-template hidden>        ← prototype, never enhanced
//!     <span>{item.name}</span>
//!     <span>{item.lineTotal}</span>
//!     <button data-next-remove-item>x</button>
//!   </div>
//!   <p data-next-empty-template>Empty</p>  ← shown while the cart is empty
//! </div>
//! ```
//!
//! Each render removes the previous rows, clones the prototype once per
//! line, substitutes `{item.*}` placeholders in attributes and text, tags
//! the row with `data-next-package-id` and asks the scanner to enhance it.
//! Rows are not enhanced by the initial scan.
//!
//! Placeholders: `packageId`, `name`, `quantity`, `price`, `lineTotal`, and
//! any other field of the line. Unknown fields render empty.

use crate::format::{DisplayFormat, render_value};
use nxt_attr::vocab;
use nxt_attr::eval::as_number;
use nxt_dom::{Document, DomError, ElementId};
use nxt_runtime::resolver::item_quantity;
use nxt_runtime::{Enhancer, EnhancerBase, EnhancerError, EnhancerModule, ResolveContext, ResolveError};
use serde_json::{Value, json};

pub const EMPTY_CLASS: &str = "next-cart-empty";

const OPEN: &str = "{item.";

/// Replace `{item.<field>}` placeholders using `field`.
#[must_use]
pub fn substitute(text: &str, field: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(OPEN) {
        let after = &rest[start + OPEN.len()..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push_str(&field(&after[..end]));
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Placeholder value for one cart line.
fn line_field(item: &Value, name: &str, currency: &str) -> String {
    let value = match name {
        "quantity" => Some(json!(item_quantity(item))),
        "lineTotal" => {
            let price = item.get("price").and_then(as_number).unwrap_or(0.0);
            Some(json!(price * item_quantity(item) as f64))
        }
        _ => item.get(name).cloned(),
    };
    render_value(value.as_ref(), DisplayFormat::Auto, name, currency)
}

fn package_id_text(item: &Value) -> Option<String> {
    match item.get("packageId")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct CartItemsEnhancer {
    prototype: Option<ElementId>,
    empty: Option<ElementId>,
    rows: Vec<ElementId>,
}

impl CartItemsEnhancer {
    #[must_use]
    pub fn rows(&self) -> &[ElementId] {
        &self.rows
    }

    fn clear_rows(&mut self, doc: &mut Document) -> Result<(), DomError> {
        for row in self.rows.drain(..) {
            if doc.contains_element(row) {
                doc.remove(row)?;
            }
        }
        Ok(())
    }

    fn build_row(doc: &mut Document, prototype: ElementId, item: &Value, currency: &str) -> Result<ElementId, DomError> {
        let row = doc.deep_clone(prototype)?;
        for id in doc.subtree(row) {
            let attrs: Vec<(String, String)> = doc
                .attributes(id)
                .iter()
                .filter(|(_, v)| v.contains(OPEN))
                .cloned()
                .collect();
            for (name, value) in attrs {
                let value = substitute(&value, |f| line_field(item, f, currency));
                doc.set_attribute(id, &name, &value)?;
            }
            if let Some(text) = doc.text(id).filter(|t| t.contains(OPEN)).map(str::to_string) {
                doc.set_text(id, &substitute(&text, |f| line_field(item, f, currency)))?;
            }
        }
        doc.remove_attribute(row, vocab::TEMPLATE)?;
        doc.set_hidden(row, false)?;
        if let Some(id) = package_id_text(item) {
            doc.set_attribute(row, vocab::PACKAGE_ID, &id)?;
        }
        Ok(row)
    }

    fn render(&mut self, base: &EnhancerBase) -> Result<(), EnhancerError> {
        let Some(prototype) = self.prototype else {
            return Ok(());
        };
        let items = base
            .stores()
            .cart
            .with_state(|cart| cart.get("items").and_then(Value::as_array).cloned().unwrap_or_default());
        let currency = base.config().default_currency.clone();
        let container = base.element();
        let empty = self.empty;

        let rows = base.write(|doc| -> Result<Vec<ElementId>, DomError> {
            self.clear_rows(doc)?;
            let mut rows = Vec::with_capacity(items.len());
            for item in &items {
                let row = Self::build_row(doc, prototype, item, &currency)?;
                doc.append_child(container, row)?;
                rows.push(row);
            }
            if let Some(empty) = empty {
                doc.set_hidden(empty, !items.is_empty())?;
            }
            doc.toggle_class(container, EMPTY_CLASS, items.is_empty())?;
            Ok(rows)
        })?;

        for row in &rows {
            base.request_enhance(*row);
        }
        tracing::debug!(element = %container, rows = rows.len(), "cart rows rendered");
        self.rows = rows;
        Ok(())
    }
}

impl Enhancer for CartItemsEnhancer {
    fn name(&self) -> &'static str {
        "cart-items"
    }

    fn initialize(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        let container = base.element();
        let (prototype, empty) = base.read(|doc| {
            let find = |attr: &str| {
                doc.descendants(container)
                    .into_iter()
                    .find(|id| doc.has_attribute(*id, attr))
            };
            (find(vocab::TEMPLATE), find(vocab::EMPTY_TEMPLATE))
        });
        let prototype = prototype.ok_or(EnhancerError::MissingAttribute(vocab::TEMPLATE))?;
        base.write(|doc| doc.set_hidden(prototype, true))?;
        self.prototype = Some(prototype);
        self.empty = empty;

        let cart = base.stores().cart.clone();
        base.subscribe(&cart);
        self.render(base)
    }

    fn update(&mut self, base: &mut EnhancerBase) -> Result<(), EnhancerError> {
        self.render(base)
    }

    fn cleanup(&mut self, base: &mut EnhancerBase) {
        if let Err(err) = base.write(|doc| self.clear_rows(doc)) {
            tracing::debug!(element = %base.element(), error = %err, "cart rows already gone");
        }
    }
}

#[derive(Debug, Default)]
pub struct CartItemsModule;

impl EnhancerModule for CartItemsModule {
    fn name(&self) -> &'static str {
        "cart-items"
    }

    fn construct(&self, _: &ResolveContext<'_>) -> Result<Box<dyn Enhancer>, ResolveError> {
        Ok(Box::new(CartItemsEnhancer::default()))
    }
}
