//! Coupon endpoints: shopper validation/application and admin CRUD.

use axum::{extract::{Path, State}, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::api::{check, ApiError, AppState};
use crate::domain::aggregates::{CouponDraft, DiscountType};
use crate::domain::value_objects::{CouponCode, Money};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CouponRequest {
    #[validate(length(min = 3, max = 30))]
    pub code: String,
    #[validate(length(max = 200))]
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    #[validate(custom = "crate::api::valid_amount")]
    pub min_purchase: Money,
    #[validate(custom = "crate::api::valid_amount")]
    pub max_discount: Option<Money>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[validate(range(min = 1))]
    pub usage_limit: Option<u32>,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

fn active_by_default() -> bool { true }

impl CouponRequest {
    fn into_draft(self) -> Result<CouponDraft, ApiError> {
        Ok(CouponDraft {
            code: CouponCode::parse(&self.code)?,
            description: self.description.filter(|d| !d.trim().is_empty()),
            discount_type: self.discount_type,
            discount_value: self.discount_value,
            min_purchase: self.min_purchase,
            max_discount: self.max_discount,
            start_date: self.start_date,
            end_date: self.end_date,
            usage_limit: self.usage_limit,
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    pub code: String,
    #[validate(custom = "crate::api::valid_amount")]
    pub cart_total: Money,
}

#[derive(Debug, Deserialize)]
pub struct ApplyCouponRequest {
    pub code: String,
}

pub async fn validate_coupon(State(s): State<AppState>, Json(r): Json<ValidateCouponRequest>) -> Result<Json<Value>, ApiError> {
    check(&r)?;
    let applied = s.coupons.validate(&r.code, r.cart_total, Utc::now()).await?;
    Ok(Json(json!({"success": true, "coupon": applied})))
}

pub async fn apply_coupon(State(s): State<AppState>, Json(r): Json<ApplyCouponRequest>) -> Result<Json<Value>, ApiError> {
    s.coupons.apply(&r.code, Utc::now()).await?;
    Ok(Json(json!({"success": true, "message": "Coupon applied successfully"})))
}

pub async fn list_coupons(State(s): State<AppState>) -> Result<Json<Value>, ApiError> {
    let coupons = s.coupons.list().await?;
    Ok(Json(json!({"success": true, "coupons": coupons})))
}

pub async fn get_coupon(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    let coupon = s.coupons.get(id).await?;
    Ok(Json(json!({"success": true, "coupon": coupon})))
}

pub async fn create_coupon(State(s): State<AppState>, Json(r): Json<CouponRequest>) -> Result<(StatusCode, Json<Value>), ApiError> {
    check(&r)?;
    let coupon = s.coupons.create(r.into_draft()?).await?;
    Ok((StatusCode::CREATED, Json(json!({"success": true, "coupon": coupon}))))
}

pub async fn update_coupon(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<CouponRequest>) -> Result<Json<Value>, ApiError> {
    check(&r)?;
    let coupon = s.coupons.update(id, r.into_draft()?).await?;
    Ok(Json(json!({"success": true, "coupon": coupon})))
}

pub async fn delete_coupon(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    s.coupons.delete(id).await?;
    Ok(Json(json!({"success": true, "message": "Coupon deleted successfully"})))
}
