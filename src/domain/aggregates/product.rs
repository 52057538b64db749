//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::Money;

/// Sizes a garment is offered in when the admin lists none.
pub const DEFAULT_SIZES: [&str; 5] = ["XS", "S", "M", "L", "XL"];

/// Admin-editable fields of a product.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub images: Vec<String>,
    pub mrp: Money,
    pub price: Money,
    pub category_id: Uuid,
    pub sizes: Vec<String>,
    pub count_in_stock: u32,
    pub rating: Decimal,
    pub num_reviews: u32,
    pub is_featured: bool,
}

impl ProductDraft {
    fn check(mut self) -> Result<Self, CatalogError> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() { return Err(CatalogError::MissingName); }
        self.images.retain(|i| !i.trim().is_empty());
        if self.images.is_empty() { return Err(CatalogError::MissingImage); }
        if !self.mrp.is_storable() { return Err(CatalogError::InvalidAmount("mrp")); }
        if !self.price.is_storable() { return Err(CatalogError::InvalidAmount("price")); }
        if self.price > self.mrp { return Err(CatalogError::PriceAboveMrp); }
        if self.rating.is_sign_negative() || self.rating > Decimal::from(5) { return Err(CatalogError::InvalidRating); }
        self.rating = self.rating.round_dp(2);
        if self.sizes.iter().any(|s| s.trim().is_empty()) { return Err(CatalogError::BlankSize); }
        if self.sizes.is_empty() {
            self.sizes = DEFAULT_SIZES.iter().map(|s| s.to_string()).collect();
        }
        Ok(self)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) images: Vec<String>,
    pub(crate) mrp: Money,
    pub(crate) price: Money,
    pub(crate) category_id: Uuid,
    pub(crate) sizes: Vec<String>,
    pub(crate) count_in_stock: u32,
    pub(crate) rating: Decimal,
    pub(crate) num_reviews: u32,
    pub(crate) is_featured: bool,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

impl Product {
    pub fn create(draft: ProductDraft) -> Result<Self, CatalogError> {
        let d = draft.check()?;
        let now = Utc::now();
        let mut product = Self {
            id: Uuid::now_v7(), name: d.name, description: d.description, images: d.images,
            mrp: d.mrp, price: d.price, category_id: d.category_id, sizes: d.sizes,
            count_in_stock: d.count_in_stock, rating: d.rating, num_reviews: d.num_reviews,
            is_featured: d.is_featured, created_at: now, updated_at: now, events: vec![],
        };
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: product.id, name: product.name.clone() }));
        Ok(product)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn description(&self) -> &str { &self.description }
    pub fn images(&self) -> &[String] { &self.images }
    pub fn mrp(&self) -> Money { self.mrp }
    pub fn price(&self) -> Money { self.price }
    pub fn category_id(&self) -> Uuid { self.category_id }
    pub fn sizes(&self) -> &[String] { &self.sizes }
    pub fn count_in_stock(&self) -> u32 { self.count_in_stock }
    pub fn rating(&self) -> Decimal { self.rating }
    pub fn num_reviews(&self) -> u32 { self.num_reviews }
    pub fn is_featured(&self) -> bool { self.is_featured }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn is_in_stock(&self) -> bool { self.count_in_stock > 0 }

    pub fn update(&mut self, draft: ProductDraft) -> Result<(), CatalogError> {
        let d = draft.check()?;
        let repriced = d.price != self.price;
        self.name = d.name;
        self.description = d.description;
        self.images = d.images;
        self.mrp = d.mrp;
        self.price = d.price;
        self.category_id = d.category_id;
        self.sizes = d.sizes;
        self.count_in_stock = d.count_in_stock;
        self.rating = d.rating;
        self.num_reviews = d.num_reviews;
        self.is_featured = d.is_featured;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Updated { product_id: self.id }));
        if repriced {
            self.raise_event(DomainEvent::Product(ProductEvent::PriceChanged { product_id: self.id, price: self.price }));
        }
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Name is required")]
    MissingName,
    #[error("Product needs at least one image")]
    MissingImage,
    #[error("{0} must be between 0 and {} with at most 2 decimal places", Money::MAX)]
    InvalidAmount(&'static str),
    #[error("Price cannot be above MRP")]
    PriceAboveMrp,
    #[error("Rating must be between 0 and 5")]
    InvalidRating,
    #[error("Sizes cannot be blank")]
    BlankSize,
}
