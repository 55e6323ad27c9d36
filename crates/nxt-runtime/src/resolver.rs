#![forbid(unsafe_code)]

//! Namespace resolution against the live stores.
//!
//! | Namespace | Source |
//! |-----------|--------|
//! | `cart` | cart store, plus derived `isEmpty`, `hasItems`, `itemCount` |
//! | `package` | `campaign.packages[*]` whose `ref_id` matches the package context |
//! | `campaign`, `order`, `selection`, `shipping` | the store of the same name |
//! | `param` | URL parameter store |
//!
//! Functions: `cart.hasItem(id)`, `cart.itemQuantity(id)`.

use crate::store::Stores;
use nxt_attr::eval::display_string;
use nxt_attr::{Namespace, NamespaceResolver, PropertyPath, json_path};
use serde_json::Value;

/// Resolves condition and display paths for one element.
#[derive(Debug, Clone, Copy)]
pub struct StoreResolver<'a> {
    stores: &'a Stores,
    package_id: Option<&'a str>,
}

impl<'a> StoreResolver<'a> {
    #[must_use]
    pub fn new(stores: &'a Stores) -> Self {
        Self {
            stores,
            package_id: None,
        }
    }

    /// Resolve `package.*` against this package id.
    #[must_use]
    pub fn with_package(mut self, package_id: Option<&'a str>) -> Self {
        self.package_id = package_id;
        self
    }
}

impl NamespaceResolver for StoreResolver<'_> {
    fn resolve(&self, path: &PropertyPath) -> Option<Value> {
        match path.namespace()? {
            Namespace::Cart => {
                let cart = self.stores.cart.get_state();
                derived_cart_value(&cart, &path.property).or_else(|| json_path(&cart, &path.property))
            }
            Namespace::Package => {
                let id = self.package_id?;
                let campaign = self.stores.campaign.get_state();
                let package = find_package(&campaign, id)?;
                json_path(&package, &path.property)
            }
            Namespace::Campaign => self.stores.campaign.with_state(|v| json_path(v, &path.property)),
            Namespace::Order => self.stores.order.with_state(|v| json_path(v, &path.property)),
            Namespace::Selection => self.stores.selection.with_state(|v| json_path(v, &path.property)),
            Namespace::Shipping => self.stores.shipping.with_state(|v| json_path(v, &path.property)),
            Namespace::Param => self.stores.params.with_state(|v| json_path(v, &path.property)),
        }
    }

    fn call(&self, object: &str, method: &str, args: &[Value]) -> Option<Value> {
        if Namespace::parse(object)? != Namespace::Cart {
            return None;
        }
        let id = display_string(args.first()?);
        let cart = self.stores.cart.get_state();
        match method {
            "hasItem" => Some(Value::Bool(find_item(&cart, &id).is_some())),
            "itemQuantity" => Some(Value::from(find_item(&cart, &id).map_or(0, item_quantity))),
            _ => None,
        }
    }
}

fn derived_cart_value(cart: &Value, property: &str) -> Option<Value> {
    let count = cart_item_count(cart);
    match property {
        "isEmpty" => Some(Value::Bool(count == 0)),
        "hasItems" => Some(Value::Bool(count > 0)),
        "itemCount" => Some(Value::from(count)),
        _ => None,
    }
}

fn id_matches(candidate: Option<&Value>, id: &str) -> bool {
    candidate.is_some_and(|v| !v.is_null() && display_string(v) == id)
}

/// The campaign package whose `ref_id` (or `id`) equals `id`.
#[must_use]
pub fn find_package(campaign: &Value, id: &str) -> Option<Value> {
    campaign
        .get("packages")?
        .as_array()?
        .iter()
        .find(|p| id_matches(p.get("ref_id"), id) || id_matches(p.get("id"), id))
        .cloned()
}

/// The cart line for package `id`.
#[must_use]
pub fn find_item<'a>(cart: &'a Value, id: &str) -> Option<&'a Value> {
    cart.get("items")?
        .as_array()?
        .iter()
        .find(|item| id_matches(item.get("packageId"), id))
}

/// Quantity of one cart line (missing → 1).
#[must_use]
pub fn item_quantity(item: &Value) -> u64 {
    item.get("quantity").and_then(Value::as_u64).unwrap_or(1)
}

/// Sum of line quantities.
#[must_use]
pub fn cart_item_count(cart: &Value) -> u64 {
    cart.get("items")
        .and_then(Value::as_array)
        .map_or(0, |items| items.iter().map(item_quantity).sum())
}
