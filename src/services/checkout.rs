//! Cart handling, order placement and order tracking.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartItem, Order, OrderStatus, PaymentMethod, ShippingAddress};
use crate::domain::pricing::{self, Quote};
use crate::domain::value_objects::Money;
use crate::services::{CouponService, EventPublisher};
use crate::store::{CartStore, OrderStore};
use crate::{CheckoutError, Result};

#[derive(Clone, Debug)]
pub struct PlaceOrder {
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub total_orders: usize,
    pub pending_orders: usize,
    /// Sum of delivered order totals.
    pub total_revenue: Money,
}

/// One async mutex per user. Cart edits and order placement for the same
/// user run one at a time inside this process.
#[derive(Clone, Default)]
struct CartLocks(Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>);

impl CartLocks {
    async fn lock(&self, user_key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.0.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries nobody holds or waits on.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks.entry(user_key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[derive(Clone)]
pub struct CheckoutService {
    coupons: CouponService,
    carts: Arc<dyn CartStore>,
    orders: Arc<dyn OrderStore>,
    publisher: EventPublisher,
    locks: CartLocks,
}

impl CheckoutService {
    pub fn new(coupons: CouponService, carts: Arc<dyn CartStore>, orders: Arc<dyn OrderStore>, publisher: EventPublisher) -> Self {
        Self { coupons, carts, orders, publisher, locks: CartLocks::default() }
    }

    pub async fn cart(&self, user_key: &str) -> Result<Cart> { self.carts.get(user_key).await }

    pub async fn add_item(&self, user_key: &str, item: CartItem) -> Result<Cart> {
        let _guard = self.locks.lock(user_key).await;
        let mut cart = self.carts.get(user_key).await?;
        cart.add_item(item)?;
        self.carts.set(&cart).await?;
        Ok(cart)
    }

    pub async fn update_quantity(&self, user_key: &str, product_id: &str, size: Option<&str>, quantity: u32) -> Result<Cart> {
        let _guard = self.locks.lock(user_key).await;
        let mut cart = self.carts.get(user_key).await?;
        cart.update_quantity(product_id, size, quantity)?;
        self.carts.set(&cart).await?;
        Ok(cart)
    }

    pub async fn remove_item(&self, user_key: &str, product_id: &str, size: Option<&str>) -> Result<Cart> {
        let _guard = self.locks.lock(user_key).await;
        let mut cart = self.carts.get(user_key).await?;
        cart.remove_item(product_id, size)?;
        self.carts.set(&cart).await?;
        Ok(cart)
    }

    pub async fn clear_cart(&self, user_key: &str) -> Result<()> {
        let _guard = self.locks.lock(user_key).await;
        self.carts.clear(user_key).await
    }

    /// Prices the cart, with the coupon when one is given. Nothing is
    /// consumed.
    pub async fn quote(&self, user_key: &str, coupon_code: Option<&str>, now: DateTime<Utc>) -> Result<Quote> {
        let cart = self.carts.get(user_key).await?;
        let applied = match coupon_code {
            Some(code) => Some(self.coupons.validate(code, cart.subtotal(), now).await?),
            None => None,
        };
        Ok(pricing::quote(&cart, applied))
    }

    /// Turns the user's cart into an order.
    ///
    /// The coupon is re-validated against the current subtotal and then
    /// applied exactly once, together with storing the order. If it was used
    /// up in between, placement aborts with `CouponNoLongerValid` and nothing
    /// is stored. The cart stays locked until it has been cleared.
    pub async fn place_order(&self, user_key: &str, request: PlaceOrder, now: DateTime<Utc>) -> Result<Order> {
        let _guard = self.locks.lock(user_key).await;
        let cart = self.carts.get(user_key).await?;
        if cart.is_empty() { return Err(CheckoutError::EmptyCart); }

        let applied = match request.coupon_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => Some(self.coupons.validate(code, cart.subtotal(), now).await?),
            None => None,
        };
        let quote = pricing::quote(&cart, applied);
        let mut order = Order::place(user_key, &quote, request.payment_method, request.shipping_address)?;
        let events = order.take_events();

        match &quote.coupon {
            Some(applied) => {
                let code = applied.coupon.code();
                let Some(coupon) = self.orders.insert_redeeming(&order, self.coupons.store(), code, now).await? else {
                    tracing::warn!(%code, user = user_key, "coupon could not be applied");
                    return Err(CheckoutError::CouponNoLongerValid);
                };
                self.coupons.applied(&coupon).await;
            }
            None => self.orders.insert(&order).await?,
        }
        self.carts.clear(user_key).await?;

        tracing::info!(order = %order.id(), number = order.order_number(), user = user_key, total = %order.total(), "order placed");
        self.publisher.publish(events).await;
        Ok(order)
    }

    pub async fn my_orders(&self, user_key: &str) -> Result<Vec<Order>> { self.orders.list_for_user(user_key).await }

    /// A single order, visible to the user who placed it.
    pub async fn order(&self, user_key: &str, id: Uuid) -> Result<Order> {
        let order = self.orders.get(id).await?.ok_or(CheckoutError::OrderNotFound)?;
        if order.user_key() != user_key { return Err(CheckoutError::Forbidden); }
        Ok(order)
    }

    pub async fn orders(&self) -> Result<Vec<Order>> { self.orders.list().await }

    pub async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<Order> {
        let mut order = self.orders.get(id).await?.ok_or(CheckoutError::OrderNotFound)?;
        order.transition(status)?;
        self.orders.update(&order).await?;
        tracing::info!(order = %id, status = status.as_str(), "order status updated");
        self.publisher.publish(order.take_events()).await;
        Ok(order)
    }

    pub async fn summary(&self) -> Result<OrderSummary> {
        let orders = self.orders.list().await?;
        Ok(OrderSummary {
            total_orders: orders.len(),
            pending_orders: orders.iter().filter(|o| o.status() == OrderStatus::Pending).count(),
            total_revenue: orders.iter().filter(|o| o.status() == OrderStatus::Delivered).map(Order::total).sum(),
        })
    }
}
