//! HTTP API.
//!
//! Responses follow the storefront's envelope: `{"success": true, ...}` on
//! success and `{"success": false, "message": "..."}` on failure.

use axum::{http::StatusCode, response::{IntoResponse, Response}, routing::{get, patch, post, put}, Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use validator::{Validate, ValidationError};

use crate::domain::aggregates::{CartError, OrderError};
use crate::domain::value_objects::Money;
use crate::services::{CatalogService, CheckoutService, CouponService, EventPublisher};
use crate::store::Stores;
use crate::CheckoutError;

pub mod cart;
pub mod catalog;
pub mod coupons;
pub mod orders;

#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub coupons: CouponService,
    pub checkout: CheckoutService,
}

impl AppState {
    pub fn new(stores: Stores, publisher: EventPublisher) -> Self {
        let catalog = CatalogService::new(stores.products, stores.categories, publisher.clone());
        let coupons = CouponService::new(stores.coupons, publisher.clone());
        let checkout = CheckoutService::new(coupons.clone(), stores.carts, stores.orders, publisher);
        Self { catalog, coupons, checkout }
    }

    pub fn in_memory(publisher: EventPublisher) -> Self { Self::new(Stores::in_memory(), publisher) }

    pub fn postgres(db: sqlx::PgPool, publisher: EventPublisher) -> Self { Self::new(Stores::postgres(db), publisher) }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "evoque-commerce"})) }))
        .route("/api/v1/products", get(catalog::list_products))
        .route("/api/v1/products/count", get(catalog::product_count))
        .route("/api/v1/products/featured/:count", get(catalog::featured_products))
        .route("/api/v1/products/:id", get(catalog::get_product))
        .route("/api/v1/categories", get(catalog::list_categories))
        .route("/api/v1/categories/:id", get(catalog::get_category))
        .route("/api/v1/admin/products", post(catalog::create_product))
        .route("/api/v1/admin/products/:id", put(catalog::update_product).delete(catalog::delete_product))
        .route("/api/v1/admin/categories", post(catalog::create_category))
        .route("/api/v1/admin/categories/:id", put(catalog::update_category).delete(catalog::delete_category))
        .route("/api/v1/coupons/validate", post(coupons::validate_coupon))
        .route("/api/v1/coupons/apply", post(coupons::apply_coupon))
        .route("/api/v1/admin/coupons", get(coupons::list_coupons).post(coupons::create_coupon))
        .route("/api/v1/admin/coupons/:id", get(coupons::get_coupon).put(coupons::update_coupon).delete(coupons::delete_coupon))
        .route("/api/v1/cart/:user", get(cart::get_cart).delete(cart::clear_cart))
        .route("/api/v1/cart/:user/items", post(cart::add_item))
        .route("/api/v1/cart/:user/items/:product_id", put(cart::update_item).delete(cart::remove_item))
        .route("/api/v1/cart/:user/quote", get(cart::quote))
        .route("/api/v1/orders/:user", get(orders::my_orders).post(orders::place_order))
        .route("/api/v1/orders/:user/:id", get(orders::get_order))
        .route("/api/v1/admin/orders", get(orders::list_orders))
        .route("/api/v1/admin/orders/summary", get(orders::summary))
        .route("/api/v1/admin/orders/:id/status", patch(orders::update_status))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

/// Error half of every handler's result.
#[derive(Debug)]
pub struct ApiError(CheckoutError);

impl<E: Into<CheckoutError>> From<E> for ApiError {
    fn from(e: E) -> Self { Self(e.into()) }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            CheckoutError::Coupon(_)
            | CheckoutError::InvalidCoupon(_)
            | CheckoutError::InvalidCouponCode(_)
            | CheckoutError::Cart(CartError::InvalidPrice | CartError::TotalTooLarge)
            | CheckoutError::EmptyCart
            | CheckoutError::Order(OrderError::NoItems | OrderError::MissingAddressField(_))
            | CheckoutError::Catalog(_)
            | CheckoutError::InvalidCategory
            | CheckoutError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CheckoutError::CouponNotFound
            | CheckoutError::OrderNotFound
            | CheckoutError::ProductNotFound
            | CheckoutError::CategoryNotFound
            | CheckoutError::Cart(CartError::ItemNotFound) => StatusCode::NOT_FOUND,
            CheckoutError::CouponNoLongerValid
            | CheckoutError::CouponAlreadyExists
            | CheckoutError::CategoryAlreadyExists
            | CheckoutError::CategoryInUse
            | CheckoutError::Order(OrderError::InvalidTransition { .. }) => StatusCode::CONFLICT,
            CheckoutError::Forbidden => StatusCode::FORBIDDEN,
            CheckoutError::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };
        (status, Json(serde_json::json!({"success": false, "message": message}))).into_response()
    }
}

/// Prices and thresholds must fit the `NUMERIC(12, 2)` columns.
pub(crate) fn valid_amount(value: &Money) -> Result<(), ValidationError> {
    if value.is_negative() {
        Err(ValidationError::new("negative_amount"))
    } else if *value > Money::MAX {
        Err(ValidationError::new("amount_too_large"))
    } else if !value.is_storable() {
        Err(ValidationError::new("too_precise"))
    } else {
        Ok(())
    }
}

/// Runs the request's `validator` rules.
pub(crate) fn check<T: Validate>(request: &T) -> Result<(), ApiError> {
    request.validate().map_err(|e| ApiError(CheckoutError::InvalidRequest(e.to_string())))
}
