//! In-memory stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, Category, Coupon, CouponError, Order, Product};
use crate::domain::value_objects::CouponCode;
use crate::store::{CartStore, CategoryStore, CouponStore, OrderStore, ProductFilter, ProductPage, ProductStore};
use crate::{CheckoutError, Result};

#[derive(Debug, Default)]
pub struct MemoryCouponStore {
    coupons: RwLock<HashMap<Uuid, Coupon>>,
}

impl MemoryCouponStore {
    pub fn new() -> Self { Self::default() }
}

fn stored(coupon: &Coupon) -> Coupon {
    let mut c = coupon.clone();
    c.events.clear();
    c
}

#[async_trait]
impl CouponStore for MemoryCouponStore {
    async fn list(&self) -> Result<Vec<Coupon>> {
        let mut all: Vec<Coupon> = self.coupons.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Coupon>> {
        Ok(self.coupons.read().await.get(&id).cloned())
    }

    async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>> {
        Ok(self.coupons.read().await.values().find(|c| &c.code == code).cloned())
    }

    async fn insert(&self, coupon: &Coupon) -> Result<()> {
        let mut coupons = self.coupons.write().await;
        if coupons.values().any(|c| c.code == coupon.code) { return Err(CheckoutError::CouponAlreadyExists); }
        coupons.insert(coupon.id, stored(coupon));
        Ok(())
    }

    async fn update(&self, coupon: &Coupon) -> Result<()> {
        let mut coupons = self.coupons.write().await;
        if coupons.values().any(|c| c.code == coupon.code && c.id != coupon.id) { return Err(CheckoutError::CouponAlreadyExists); }
        let slot = coupons.get_mut(&coupon.id).ok_or(CheckoutError::CouponNotFound)?;
        // The caller's copy may predate uses recorded since it was read.
        let used_count = slot.used_count;
        if coupon.usage_limit.is_some_and(|limit| limit < used_count) {
            return Err(CouponError::InvalidUsageLimit.into());
        }
        *slot = stored(coupon);
        slot.used_count = used_count;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Coupon>> {
        Ok(self.coupons.write().await.remove(&id))
    }

    async fn increment_usage_if_available(&self, code: &CouponCode, now: DateTime<Utc>) -> Result<Option<Coupon>> {
        let mut coupons = self.coupons.write().await;
        let Some(coupon) = coupons.values_mut().find(|c| &c.code == code) else { return Ok(None) };
        if !(coupon.is_active && coupon.is_live(now) && coupon.has_remaining_uses()) { return Ok(None); }
        coupon.record_use();
        Ok(Some(coupon.clone()))
    }

    async fn release_usage(&self, code: &CouponCode) -> Result<()> {
        if let Some(coupon) = self.coupons.write().await.values_mut().find(|c| &c.code == code) {
            coupon.release_use();
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCartStore {
    carts: RwLock<HashMap<String, Cart>>,
}

impl MemoryCartStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn get(&self, user_key: &str) -> Result<Cart> {
        Ok(self.carts.read().await.get(user_key).cloned().unwrap_or_else(|| Cart::new(user_key)))
    }

    async fn set(&self, cart: &Cart) -> Result<()> {
        self.carts.write().await.insert(cart.user_key().to_string(), cart.clone());
        Ok(())
    }

    async fn clear(&self, user_key: &str) -> Result<()> {
        self.carts.write().await.remove(user_key);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: RwLock<Vec<Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let mut o = order.clone();
        o.events.clear();
        self.orders.write().await.push(o);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.orders.read().await.iter().find(|o| o.id == id).cloned())
    }

    async fn list_for_user(&self, user_key: &str) -> Result<Vec<Order>> {
        Ok(self.orders.read().await.iter().rev().filter(|o| o.user_key == user_key).cloned().collect())
    }

    async fn list(&self) -> Result<Vec<Order>> {
        Ok(self.orders.read().await.iter().rev().cloned().collect())
    }

    async fn update(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        let slot = orders.iter_mut().find(|o| o.id == order.id).ok_or(CheckoutError::OrderNotFound)?;
        *slot = order.clone();
        slot.events.clear();
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryProductStore {
    products: RwLock<Vec<Product>>,
}

impl MemoryProductStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn list(&self, filter: &ProductFilter) -> Result<ProductPage> {
        let products = self.products.read().await;
        let matching: Vec<&Product> = products.iter().rev().filter(|p| filter.matches(p)).collect();
        let offset = usize::try_from(filter.offset()).unwrap_or(usize::MAX);
        Ok(ProductPage {
            total: matching.len() as u64,
            products: matching.into_iter().skip(offset).take(filter.per_page as usize).cloned().collect(),
            page: filter.page,
            per_page: filter.per_page,
        })
    }

    async fn get(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.products.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn insert(&self, product: &Product) -> Result<()> {
        let mut p = product.clone();
        p.events.clear();
        self.products.write().await.push(p);
        Ok(())
    }

    async fn update(&self, product: &Product) -> Result<()> {
        let mut products = self.products.write().await;
        let slot = products.iter_mut().find(|p| p.id == product.id).ok_or(CheckoutError::ProductNotFound)?;
        *slot = product.clone();
        slot.events.clear();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Product>> {
        let mut products = self.products.write().await;
        Ok(products.iter().position(|p| p.id == id).map(|i| products.remove(i)))
    }

    async fn count(&self) -> Result<u64> { Ok(self.products.read().await.len() as u64) }

    async fn count_in_category(&self, category_id: Uuid) -> Result<u64> {
        Ok(self.products.read().await.iter().filter(|p| p.category_id == category_id).count() as u64)
    }
}

#[derive(Debug, Default)]
pub struct MemoryCategoryStore {
    categories: RwLock<HashMap<Uuid, Category>>,
}

impl MemoryCategoryStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl CategoryStore for MemoryCategoryStore {
    async fn list(&self) -> Result<Vec<Category>> {
        let mut all: Vec<Category> = self.categories.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Category>> { Ok(self.categories.read().await.get(&id).cloned()) }

    async fn insert(&self, category: &Category) -> Result<()> {
        let mut categories = self.categories.write().await;
        if categories.values().any(|c| c.slug == category.slug) { return Err(CheckoutError::CategoryAlreadyExists); }
        let mut c = category.clone();
        c.events.clear();
        categories.insert(c.id, c);
        Ok(())
    }

    async fn update(&self, category: &Category) -> Result<()> {
        let mut categories = self.categories.write().await;
        if categories.values().any(|c| c.slug == category.slug && c.id != category.id) { return Err(CheckoutError::CategoryAlreadyExists); }
        let slot = categories.get_mut(&category.id).ok_or(CheckoutError::CategoryNotFound)?;
        *slot = category.clone();
        slot.events.clear();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Category>> { Ok(self.categories.write().await.remove(&id)) }
}
