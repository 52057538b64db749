//! Application services tying the domain to the stores.
pub mod catalog;
pub mod checkout;
pub mod coupons;
pub mod publisher;

pub use catalog::CatalogService;
pub use checkout::{CheckoutService, OrderSummary, PlaceOrder};
pub use coupons::CouponService;
pub use publisher::EventPublisher;
