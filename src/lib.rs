//! Evoque Commerce
//!
//! Catalog, coupon, cart and checkout backend for the Evoque clothing storefront.
//!
//! ## Features
//! - Product and category catalog with admin CRUD, paging and featured picks
//! - Coupon administration with validity windows, usage limits and minimum purchase
//! - Percentage and fixed discounts, spread across cart lines for receipts
//! - Per-user carts behind a pluggable store
//! - Order placement with a frozen discount snapshot, order tracking
//! - Postgres or in-memory persistence, optional NATS event publishing

use thiserror::Error;

pub mod api;
pub mod config;
pub mod domain;
pub mod services;
pub mod store;

use domain::aggregates::{CartError, CatalogError, CouponError, OrderError};
use domain::pricing::CouponRejection;
use domain::value_objects::CouponCodeError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error(transparent)]
    Coupon(#[from] CouponRejection),

    /// The coupon passed validation but could not be applied to the order.
    #[error("Coupon is no longer valid")]
    CouponNoLongerValid,

    #[error("Coupon not found")]
    CouponNotFound,

    #[error("Coupon code already exists")]
    CouponAlreadyExists,

    #[error(transparent)]
    InvalidCoupon(#[from] CouponError),

    #[error(transparent)]
    InvalidCouponCode(#[from] CouponCodeError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("Cart is empty")]
    EmptyCart,

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Order not found")]
    OrderNotFound,

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Product not found")]
    ProductNotFound,

    #[error("Category not found")]
    CategoryNotFound,

    /// A product names a category that does not exist.
    #[error("Invalid Category")]
    InvalidCategory,

    #[error("Category already exists")]
    CategoryAlreadyExists,

    #[error("Category still has products")]
    CategoryInUse,

    #[error("Not authorized")]
    Forbidden,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self { Self::StorageError(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, CheckoutError>;
