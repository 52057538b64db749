//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::value_objects::{Money, Quantity};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    user_key: String,
    items: Vec<CartItem>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub name: String,
    pub size: Option<String>,
    pub image: Option<String>,
    pub unit_price: Money,
    pub quantity: Quantity,
}

impl CartItem {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity.value()) }
    fn same_line(&self, product_id: &str, size: Option<&str>) -> bool {
        self.product_id == product_id && self.size.as_deref() == size
    }
}

impl Cart {
    pub fn new(user_key: impl Into<String>) -> Self {
        Self { user_key: user_key.into(), items: vec![], updated_at: Utc::now() }
    }

    pub(crate) fn restore(user_key: impl Into<String>, items: Vec<CartItem>, updated_at: DateTime<Utc>) -> Self {
        Self { user_key: user_key.into(), items, updated_at }
    }

    pub fn user_key(&self) -> &str { &self.user_key }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn item_count(&self) -> u32 { self.items.iter().map(|i| i.quantity.value()).sum() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Sum of `unit_price × quantity` over every line, before any discount.
    pub fn subtotal(&self) -> Money { self.items.iter().map(CartItem::line_total).sum() }

    pub fn add_item(&mut self, item: CartItem) -> Result<(), CartError> {
        if item.unit_price.is_negative() { return Err(CartError::InvalidPrice); }
        let mut items = self.items.clone();
        if let Some(existing) = items.iter_mut().find(|i| i.same_line(&item.product_id, item.size.as_deref())) {
            existing.quantity = existing.quantity.add(item.quantity);
            existing.unit_price = item.unit_price;
        } else {
            items.push(item);
        }
        self.replace_items(items)
    }

    /// Sets the quantity of a line; zero removes it.
    pub fn update_quantity(&mut self, product_id: &str, size: Option<&str>, quantity: u32) -> Result<(), CartError> {
        let mut items = self.items.clone();
        let item = items.iter_mut().find(|i| i.same_line(product_id, size)).ok_or(CartError::ItemNotFound)?;
        match Quantity::new(quantity) {
            Ok(q) => item.quantity = q,
            Err(_) => items.retain(|i| !i.same_line(product_id, size)),
        }
        self.replace_items(items)
    }

    pub fn remove_item(&mut self, product_id: &str, size: Option<&str>) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| !i.same_line(product_id, size));
        if self.items.len() == before { return Err(CartError::ItemNotFound); }
        self.touch();
        Ok(())
    }

    pub fn clear(&mut self) { self.items.clear(); self.touch(); }

    /// Swaps in `items` unless their subtotal would exceed [`Money::MAX`].
    fn replace_items(&mut self, items: Vec<CartItem>) -> Result<(), CartError> {
        let subtotal = items.iter().try_fold(Money::ZERO, |acc, i| acc.checked_add(i.unit_price.checked_multiply(i.quantity.value())?));
        if !subtotal.is_some_and(|s| s <= Money::MAX) { return Err(CartError::TotalTooLarge); }
        self.items = items;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Item not found in cart")]
    ItemNotFound,
    #[error("Item price cannot be negative")]
    InvalidPrice,
    #[error("Cart total cannot exceed {}", Money::MAX)]
    TotalTooLarge,
}
