//! Order placement and tracking for shoppers, plus the admin order desk.

use axum::{extract::{Path, State}, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::{ApiError, AppState};
use crate::domain::aggregates::{OrderStatus, PaymentMethod, ShippingAddress};
use crate::services::PlaceOrder;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

pub async fn place_order(State(s): State<AppState>, Path(user): Path<String>, Json(r): Json<PlaceOrderRequest>) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request = PlaceOrder { coupon_code: r.coupon_code, payment_method: r.payment_method, shipping_address: r.shipping_address };
    let order = s.checkout.place_order(&user, request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(json!({"success": true, "message": "Order placed successfully", "order": order}))))
}

pub async fn my_orders(State(s): State<AppState>, Path(user): Path<String>) -> Result<Json<Value>, ApiError> {
    let orders = s.checkout.my_orders(&user).await?;
    Ok(Json(json!({"success": true, "orders": orders})))
}

pub async fn get_order(State(s): State<AppState>, Path((user, id)): Path<(String, Uuid)>) -> Result<Json<Value>, ApiError> {
    let order = s.checkout.order(&user, id).await?;
    Ok(Json(json!({"success": true, "order": order})))
}

pub async fn list_orders(State(s): State<AppState>) -> Result<Json<Value>, ApiError> {
    let orders = s.checkout.orders().await?;
    Ok(Json(json!({"success": true, "orders": orders})))
}

pub async fn summary(State(s): State<AppState>) -> Result<Json<Value>, ApiError> {
    let summary = s.checkout.summary().await?;
    Ok(Json(json!({"success": true, "summary": summary})))
}

pub async fn update_status(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<UpdateStatusRequest>) -> Result<Json<Value>, ApiError> {
    let order = s.checkout.update_status(id, r.status).await?;
    Ok(Json(json!({"success": true, "order": order})))
}
