//! Aggregates module
pub mod coupon;
pub mod cart;
pub mod order;
pub mod product;
pub mod category;

pub use coupon::{Coupon, CouponDraft, CouponError, DiscountType};
pub use cart::{Cart, CartError, CartItem};
pub use order::{DiscountSnapshot, Order, OrderError, OrderLine, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress};
pub use product::{CatalogError, Product, ProductDraft, DEFAULT_SIZES};
pub use category::Category;
