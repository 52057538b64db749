//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::DiscountType;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::pricing::Quote;
use crate::domain::value_objects::{CouponCode, Money, Quantity};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub(crate) id: Uuid,
    pub(crate) order_number: String,
    pub(crate) user_key: String,
    pub(crate) lines: Vec<OrderLine>,
    pub(crate) subtotal: Money,
    pub(crate) discount: Option<DiscountSnapshot>,
    pub(crate) total: Money,
    pub(crate) payment_method: PaymentMethod,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) status: OrderStatus,
    pub(crate) shipping_address: ShippingAddress,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

/// A purchased line. `original_price` is the list price, `price` the unit
/// price after the coupon share.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: String,
    pub name: String,
    pub size: Option<String>,
    pub image: Option<String>,
    pub quantity: Quantity,
    pub original_price: Money,
    pub price: Money,
    pub total: Money,
}

/// Coupon terms as they were when the order was placed. Never recomputed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountSnapshot {
    pub code: CouponCode,
    #[serde(rename = "type")]
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub amount: Money,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingAddress {
    pub full_name: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub pincode: Option<String>,
    pub phone: String,
    pub email: Option<String>,
}

impl ShippingAddress {
    fn check(&self) -> Result<(), OrderError> {
        if self.full_name.trim().is_empty() { return Err(OrderError::MissingAddressField("fullName")); }
        if self.address_line1.trim().is_empty() { return Err(OrderError::MissingAddressField("addressLine1")); }
        if self.phone.trim().is_empty() { return Err(OrderError::MissingAddressField("phone")); }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus { #[default] Pending, Processing, Shipped, Delivered, Cancelled }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod { #[default] Cod, Online }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus { #[default] Pending, Paid }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [Self::Pending, Self::Processing, Self::Shipped, Self::Delivered, Self::Cancelled]
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(value))
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }

    fn rank(&self) -> u8 {
        match self { Self::Pending => 0, Self::Processing => 1, Self::Shipped => 2, Self::Delivered => 3, Self::Cancelled => 4 }
    }
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str { match self { Self::Cod => "COD", Self::Online => "ONLINE" } }
    pub fn parse(value: &str) -> Option<Self> {
        match value { "COD" => Some(Self::Cod), "ONLINE" => Some(Self::Online), _ => None }
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str { match self { Self::Pending => "Pending", Self::Paid => "Paid" } }
    pub fn parse(value: &str) -> Option<Self> {
        match value { "Pending" => Some(Self::Pending), "Paid" => Some(Self::Paid), _ => None }
    }
}

impl Order {
    /// Freezes a priced cart into an order.
    pub fn place(user_key: impl Into<String>, quote: &Quote, payment_method: PaymentMethod, shipping_address: ShippingAddress) -> Result<Self, OrderError> {
        if quote.lines.is_empty() { return Err(OrderError::NoItems); }
        shipping_address.check()?;
        let id = Uuid::now_v7();
        let now = Utc::now();
        let lines = quote.lines.iter().map(|l| OrderLine {
            product_id: l.product_id.clone(), name: l.name.clone(), size: l.size.clone(), image: l.image.clone(),
            quantity: l.quantity, original_price: l.unit_price, price: l.discounted_price, total: l.line_total,
        }).collect();
        let discount = quote.coupon.as_ref().map(|a| DiscountSnapshot {
            code: a.coupon.code().clone(), discount_type: a.coupon.discount_type(),
            value: a.coupon.discount_value(), amount: a.calculated_discount,
        });
        let mut order = Self {
            id, order_number: order_number(id), user_key: user_key.into(), lines,
            subtotal: quote.subtotal, discount, total: quote.total, payment_method,
            payment_status: PaymentStatus::Pending, status: OrderStatus::Pending, shipping_address,
            created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id, order_number: order.order_number.clone(), user_key: order.user_key.clone(),
            total: order.total, coupon: order.discount.as_ref().map(|d| d.code.clone()),
        }));
        Ok(order)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn user_key(&self) -> &str { &self.user_key }
    pub fn lines(&self) -> &[OrderLine] { &self.lines }
    pub fn subtotal(&self) -> Money { self.subtotal }
    pub fn discount(&self) -> Option<&DiscountSnapshot> { self.discount.as_ref() }
    pub fn total(&self) -> Money { self.total }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn shipping_address(&self) -> &ShippingAddress { &self.shipping_address }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    /// Moves the order forward. Delivered and cancelled orders are final;
    /// setting the current status again is a no-op.
    pub fn transition(&mut self, to: OrderStatus) -> Result<(), OrderError> {
        let from = self.status;
        if from == to { return Ok(()); }
        let allowed = !from.is_terminal() && (to == OrderStatus::Cancelled || to.rank() > from.rank());
        if !allowed { return Err(OrderError::InvalidTransition { from, to }); }
        self.status = to;
        if to == OrderStatus::Delivered && self.payment_method == PaymentMethod::Cod {
            self.payment_status = PaymentStatus::Paid;
        }
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

fn order_number(id: Uuid) -> String {
    let hex = id.simple().to_string().to_uppercase();
    format!("EVQ-{}", &hex[hex.len() - 10..])
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Order must contain at least one item")]
    NoItems,
    #[error("Shipping address is missing {0}")]
    MissingAddressField(&'static str),
    #[error("Cannot move order from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}
