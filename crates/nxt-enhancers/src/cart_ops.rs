#![forbid(unsafe_code)]

//! Cart mutations shared by the cart-facing behaviors.
//!
//! The cart store holds `{ "items": [{ "packageId", "quantity", "price",
//! "name" }], "subtotal", "total" }`. Every mutation recomputes the totals
//! from line prices, so subscribers always see a consistent cart.

use nxt_attr::classify;
use nxt_attr::eval::as_number;
use nxt_runtime::Stores;
use nxt_runtime::resolver::{find_item, find_package, item_quantity};
use serde_json::{Value, json};

fn package_id_value(id: &str) -> Value {
    let parsed = classify(Some(id)).parsed;
    if parsed.is_number() { parsed } else { Value::String(id.to_string()) }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

fn items_mut(cart: &mut Value) -> Option<&mut Vec<Value>> {
    if !cart.get("items").is_some_and(Value::is_array) {
        cart["items"] = json!([]);
    }
    cart.get_mut("items").and_then(Value::as_array_mut)
}

fn position(cart: &Value, id: &str) -> Option<usize> {
    let target = find_item(cart, id)?;
    cart["items"].as_array()?.iter().position(|item| std::ptr::eq(item, target))
}

/// Recompute `subtotal` and `total` from line prices and quantities.
pub fn recompute(cart: &mut Value) {
    let subtotal: f64 = cart
        .get("items")
        .and_then(Value::as_array)
        .map_or(0.0, |items| {
            items
                .iter()
                .map(|item| {
                    let price = item.get("price").and_then(as_number).unwrap_or(0.0);
                    price * item_quantity(item) as f64
                })
                .sum()
        });
    let subtotal = round_cents(subtotal);
    cart["subtotal"] = json!(subtotal);
    cart["total"] = json!(subtotal);
}

/// Add `quantity` of package `id`, merging with an existing line.
pub fn add_item(stores: &Stores, id: &str, quantity: u64) {
    if quantity == 0 {
        return;
    }
    let package = stores.campaign.with_state(|campaign| find_package(campaign, id));
    stores.cart.update(|cart| {
        match position(cart, id) {
            Some(idx) => {
                let merged = item_quantity(&cart["items"][idx]) + quantity;
                cart["items"][idx]["quantity"] = json!(merged);
            }
            None => {
                let price = package.as_ref().and_then(|p| p.get("price")).and_then(as_number);
                let name = package.as_ref().and_then(|p| p.get("name")).cloned();
                if let Some(items) = items_mut(cart) {
                    items.push(json!({
                        "packageId": package_id_value(id),
                        "quantity": quantity,
                        "price": price.map_or(0.0, round_cents),
                        "name": name.unwrap_or(Value::Null),
                    }));
                }
            }
        }
        recompute(cart);
    });
    tracing::debug!(package = id, quantity, "cart add");
}

/// Set the quantity of package `id`; zero removes the line.
pub fn set_quantity(stores: &Stores, id: &str, quantity: u64) {
    if quantity == 0 {
        remove_item(stores, id);
        return;
    }
    let present = stores.cart.with_state(|cart| find_item(cart, id).is_some());
    if !present {
        add_item(stores, id, quantity);
        return;
    }
    stores.cart.update(|cart| {
        if let Some(idx) = position(cart, id) {
            cart["items"][idx]["quantity"] = json!(quantity);
        }
        recompute(cart);
    });
}

/// Remove every line for package `id`.
pub fn remove_item(stores: &Stores, id: &str) {
    stores.cart.update(|cart| {
        if let Some(idx) = position(cart, id)
            && let Some(items) = items_mut(cart)
        {
            items.remove(idx);
        }
        recompute(cart);
    });
    tracing::debug!(package = id, "cart remove");
}

/// Empty the cart.
pub fn clear(stores: &Stores) {
    stores.cart.update(|cart| {
        if let Some(items) = items_mut(cart) {
            items.clear();
        }
        recompute(cart);
    });
}

/// Quantity of package `id` in the cart (0 when absent).
#[must_use]
pub fn quantity_of(stores: &Stores, id: &str) -> u64 {
    stores
        .cart
        .with_state(|cart| find_item(cart, id).map_or(0, item_quantity))
}

#[must_use]
pub fn in_cart(stores: &Stores, id: &str) -> bool {
    quantity_of(stores, id) > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stores() -> Stores {
        let stores = Stores::new();
        stores.campaign.set_state(json!({
            "packages": [
                {"ref_id": 7, "price": "19.99", "name": "One"},
                {"ref_id": 9, "price": 5, "name": "Two"},
            ]
        }));
        stores
    }

    #[test]
    fn add_merges_lines_and_totals() {
        let stores = stores();
        add_item(&stores, "7", 1);
        add_item(&stores, "7", 2);
        add_item(&stores, "9", 1);
        let cart = stores.cart.get_state();
        assert_eq!(cart["items"].as_array().unwrap().len(), 2);
        assert_eq!(cart["items"][0]["packageId"], json!(7));
        assert_eq!(quantity_of(&stores, "7"), 3);
        assert_eq!(cart["subtotal"], json!(64.97));
        assert_eq!(cart["total"], json!(64.97));
    }

    #[test]
    fn set_quantity_zero_removes() {
        let stores = stores();
        set_quantity(&stores, "9", 4);
        assert_eq!(quantity_of(&stores, "9"), 4);
        assert_eq!(stores.cart.get_state()["total"], json!(20.0));
        set_quantity(&stores, "9", 0);
        assert!(!in_cart(&stores, "9"));
        assert_eq!(stores.cart.get_state()["total"], json!(0.0));
    }

    #[test]
    fn clear_empties() {
        let stores = stores();
        add_item(&stores, "7", 1);
        clear(&stores);
        assert_eq!(stores.cart.get_state()["items"], json!([]));
    }

    #[test]
    fn unknown_package_is_added_at_zero_price() {
        let stores = stores();
        add_item(&stores, "sku-x", 1);
        let cart = stores.cart.get_state();
        assert_eq!(cart["items"][0]["packageId"], json!("sku-x"));
        assert_eq!(cart["items"][0]["price"], json!(0.0));
    }
}
