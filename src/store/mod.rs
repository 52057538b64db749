//! Storage seams for the catalog, coupons, carts and orders.
//!
//! Every store has an in-memory implementation (tests, local runs without a
//! database) and a Postgres one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, Category, Coupon, Order, Product};
use crate::domain::value_objects::CouponCode;
use crate::Result;

pub mod memory;
pub mod postgres;

pub use memory::{MemoryCartStore, MemoryCategoryStore, MemoryCouponStore, MemoryOrderStore, MemoryProductStore};
pub use postgres::{PgCartStore, PgCategoryStore, PgCouponStore, PgOrderStore, PgProductStore};

/// One store per aggregate, all on the same backend.
#[derive(Clone)]
pub struct Stores {
    pub coupons: Arc<dyn CouponStore>,
    pub carts: Arc<dyn CartStore>,
    pub orders: Arc<dyn OrderStore>,
    pub products: Arc<dyn ProductStore>,
    pub categories: Arc<dyn CategoryStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            coupons: Arc::new(MemoryCouponStore::new()),
            carts: Arc::new(MemoryCartStore::new()),
            orders: Arc::new(MemoryOrderStore::new()),
            products: Arc::new(MemoryProductStore::new()),
            categories: Arc::new(MemoryCategoryStore::new()),
        }
    }

    pub fn postgres(db: sqlx::PgPool) -> Self {
        Self {
            coupons: Arc::new(PgCouponStore::new(db.clone())),
            carts: Arc::new(PgCartStore::new(db.clone())),
            orders: Arc::new(PgOrderStore::new(db.clone())),
            products: Arc::new(PgProductStore::new(db.clone())),
            categories: Arc::new(PgCategoryStore::new(db)),
        }
    }
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    /// All coupons, newest first.
    async fn list(&self) -> Result<Vec<Coupon>>;
    async fn get(&self, id: Uuid) -> Result<Option<Coupon>>;
    async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>>;

    async fn find_active_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>> {
        Ok(self.find_by_code(code).await?.filter(Coupon::is_active))
    }

    /// Fails with `CouponAlreadyExists` when the code is taken.
    async fn insert(&self, coupon: &Coupon) -> Result<()>;
    /// Fails with `CouponNotFound` for an unknown id.
    async fn update(&self, coupon: &Coupon) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<Option<Coupon>>;

    /// Adds one use to the coupon if, at this instant, it is active, inside
    /// its window and below its usage limit. Check and increment happen as a
    /// single step; `None` means the coupon did not qualify.
    async fn increment_usage_if_available(&self, code: &CouponCode, now: DateTime<Utc>) -> Result<Option<Coupon>>;

    /// Takes back one use recorded by `increment_usage_if_available`. The
    /// count never drops below zero.
    async fn release_usage(&self, code: &CouponCode) -> Result<()>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// The user's cart; an empty one if nothing was stored yet.
    async fn get(&self, user_key: &str) -> Result<Cart>;
    async fn set(&self, cart: &Cart) -> Result<()>;
    async fn clear(&self, user_key: &str) -> Result<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: &Order) -> Result<()>;

    /// Stores `order` and consumes one use of `code`, both or neither.
    /// `Ok(None)` means the coupon no longer qualified and nothing was stored.
    ///
    /// The default records the use first and releases it again if the insert
    /// fails. Stores that share a database with the coupons should do both in
    /// one transaction instead.
    async fn insert_redeeming(&self, order: &Order, coupons: &dyn CouponStore, code: &CouponCode, now: DateTime<Utc>) -> Result<Option<Coupon>> {
        let Some(coupon) = coupons.increment_usage_if_available(code, now).await? else {
            return Ok(None);
        };
        if let Err(e) = self.insert(order).await {
            if let Err(release) = coupons.release_usage(code).await {
                tracing::error!(%code, order = %order.id(), error = %release, "coupon use not released after failed order insert");
            }
            return Err(e);
        }
        Ok(Some(coupon))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>>;
    /// A user's orders, newest first.
    async fn list_for_user(&self, user_key: &str) -> Result<Vec<Order>>;
    /// All orders, newest first.
    async fn list(&self) -> Result<Vec<Order>>;
    /// Fails with `OrderNotFound` for an unknown id.
    async fn update(&self, order: &Order) -> Result<()>;
}

/// Which products to list. Pages start at 1.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductFilter {
    pub category: Option<Uuid>,
    pub featured: Option<bool>,
    /// Case-insensitive match anywhere in the name.
    pub search: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

impl ProductFilter {
    pub const MAX_PER_PAGE: u32 = 100;

    pub fn page(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            category: None,
            featured: None,
            search: None,
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(20).clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> u64 { u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page) }

    pub fn matches(&self, p: &Product) -> bool {
        self.category.map_or(true, |c| p.category_id() == c)
            && self.featured.map_or(true, |f| p.is_featured() == f)
            && self.search.as_deref().map_or(true, |q| p.name().to_lowercase().contains(&q.to_lowercase()))
    }
}

impl Default for ProductFilter {
    fn default() -> Self { Self::page(None, None) }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Matching products, newest first.
    async fn list(&self, filter: &ProductFilter) -> Result<ProductPage>;
    async fn get(&self, id: Uuid) -> Result<Option<Product>>;
    async fn insert(&self, product: &Product) -> Result<()>;
    /// Fails with `ProductNotFound` for an unknown id.
    async fn update(&self, product: &Product) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<Option<Product>>;
    async fn count(&self) -> Result<u64>;
    async fn count_in_category(&self, category_id: Uuid) -> Result<u64>;
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    /// All categories by name.
    async fn list(&self) -> Result<Vec<Category>>;
    async fn get(&self, id: Uuid) -> Result<Option<Category>>;
    /// Fails with `CategoryAlreadyExists` when the slug is taken.
    async fn insert(&self, category: &Category) -> Result<()>;
    /// Fails with `CategoryNotFound` for an unknown id.
    async fn update(&self, category: &Category) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<Option<Category>>;
}
