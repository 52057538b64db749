//! Domain events
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::OrderStatus;
use crate::domain::value_objects::{CouponCode, Money};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Coupon(CouponEvent),
    Order(OrderEvent),
    Product(ProductEvent),
    Category(CategoryEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouponEvent {
    Created { coupon_id: Uuid, code: CouponCode },
    Updated { coupon_id: Uuid, code: CouponCode },
    Deactivated { coupon_id: Uuid, code: CouponCode },
    Deleted { coupon_id: Uuid, code: CouponCode },
    Applied { code: CouponCode, used_count: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, order_number: String, user_key: String, total: Money, coupon: Option<CouponCode> },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: Uuid, name: String },
    Updated { product_id: Uuid },
    PriceChanged { product_id: Uuid, price: Money },
    Deleted { product_id: Uuid },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CategoryEvent {
    Created { category_id: Uuid, slug: String },
    Updated { category_id: Uuid, slug: String },
    Deleted { category_id: Uuid },
}

impl DomainEvent {
    /// Subject suffix the event is published under.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Coupon(CouponEvent::Created { .. }) => "coupon.created",
            Self::Coupon(CouponEvent::Updated { .. }) => "coupon.updated",
            Self::Coupon(CouponEvent::Deactivated { .. }) => "coupon.deactivated",
            Self::Coupon(CouponEvent::Deleted { .. }) => "coupon.deleted",
            Self::Coupon(CouponEvent::Applied { .. }) => "coupon.applied",
            Self::Order(OrderEvent::Placed { .. }) => "order.placed",
            Self::Order(OrderEvent::StatusChanged { .. }) => "order.status_changed",
            Self::Product(ProductEvent::Created { .. }) => "product.created",
            Self::Product(ProductEvent::Updated { .. }) => "product.updated",
            Self::Product(ProductEvent::PriceChanged { .. }) => "product.price_changed",
            Self::Product(ProductEvent::Deleted { .. }) => "product.deleted",
            Self::Category(CategoryEvent::Created { .. }) => "category.created",
            Self::Category(CategoryEvent::Updated { .. }) => "category.updated",
            Self::Category(CategoryEvent::Deleted { .. }) => "category.deleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_subject_and_payload() {
        let event = DomainEvent::Coupon(CouponEvent::Applied { code: CouponCode::parse("WELCOME").unwrap(), used_count: 3 });
        assert_eq!(event.subject(), "coupon.applied");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "applied");
        assert_eq!(json["code"], "WELCOME");
        assert_eq!(json["used_count"], 3);
    }

    #[test]
    fn test_catalog_event_subjects() {
        let id = Uuid::now_v7();
        let event = DomainEvent::Product(ProductEvent::PriceChanged { product_id: id, price: Money::rupees(999) });
        assert_eq!(event.subject(), "product.price_changed");
        assert_eq!(serde_json::to_value(&event).unwrap()["price"], "999");
        assert_eq!(DomainEvent::Category(CategoryEvent::Deleted { category_id: id }).subject(), "category.deleted");
    }
}
