//! Cart endpoints, keyed by the shopper in the path.

use axum::{extract::{Path, Query, State}, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::api::{check, ApiError, AppState};
use crate::domain::aggregates::{Cart, CartItem};
use crate::domain::value_objects::{Money, Quantity};

fn one() -> u32 { 1 }

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    #[validate(length(min = 1))]
    pub product_id: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub size: Option<String>,
    pub image: Option<String>,
    #[serde(alias = "unitPrice")]
    #[validate(custom = "crate::api::valid_amount")]
    pub price: Money,
    #[serde(default = "one")]
    #[validate(range(min = 1, max = 100))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemRequest {
    #[validate(range(max = 100))]
    pub quantity: u32,
    pub size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SizeQuery {
    pub size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub code: Option<String>,
}

fn cart_body(cart: &Cart) -> Json<Value> {
    Json(json!({"success": true, "cart": cart, "itemCount": cart.item_count(), "subtotal": cart.subtotal()}))
}

pub async fn get_cart(State(s): State<AppState>, Path(user): Path<String>) -> Result<Json<Value>, ApiError> {
    Ok(cart_body(&s.checkout.cart(&user).await?))
}

pub async fn clear_cart(State(s): State<AppState>, Path(user): Path<String>) -> Result<Json<Value>, ApiError> {
    s.checkout.clear_cart(&user).await?;
    Ok(Json(json!({"success": true, "message": "Cart cleared"})))
}

pub async fn add_item(State(s): State<AppState>, Path(user): Path<String>, Json(r): Json<AddToCartRequest>) -> Result<Json<Value>, ApiError> {
    check(&r)?;
    let quantity = Quantity::new(r.quantity).map_err(|e| crate::CheckoutError::InvalidRequest(e.to_string()))?;
    let item = CartItem { product_id: r.product_id, name: r.name, size: r.size, image: r.image, unit_price: r.price, quantity };
    Ok(cart_body(&s.checkout.add_item(&user, item).await?))
}

/// A quantity of zero removes the line.
pub async fn update_item(
    State(s): State<AppState>,
    Path((user, product_id)): Path<(String, String)>,
    Json(r): Json<UpdateItemRequest>,
) -> Result<Json<Value>, ApiError> {
    check(&r)?;
    Ok(cart_body(&s.checkout.update_quantity(&user, &product_id, r.size.as_deref(), r.quantity).await?))
}

pub async fn remove_item(
    State(s): State<AppState>,
    Path((user, product_id)): Path<(String, String)>,
    Query(q): Query<SizeQuery>,
) -> Result<Json<Value>, ApiError> {
    Ok(cart_body(&s.checkout.remove_item(&user, &product_id, q.size.as_deref()).await?))
}

pub async fn quote(State(s): State<AppState>, Path(user): Path<String>, Query(q): Query<QuoteQuery>) -> Result<Json<Value>, ApiError> {
    let code = q.code.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let quote = s.checkout.quote(&user, code, Utc::now()).await?;
    Ok(Json(json!({"success": true, "quote": quote})))
}

#[cfg(test)]
mod tests {
    use crate::api::tests::{amount, app, send};
    use axum::http::StatusCode;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[tokio::test]
    async fn test_cart_lifecycle() {
        let app = app();
        let (status, body) = send(&app, "POST", "/api/v1/cart/asha/items", Some(json!({
            "productId": "KURTA-01", "name": "Linen Kurta", "size": "M", "price": 1299, "quantity": 2
        }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["itemCount"], 2);
        assert_eq!(amount(&body["subtotal"]), dec!(2598));

        send(&app, "POST", "/api/v1/cart/asha/items", Some(json!({"productId": "KURTA-01", "name": "Linen Kurta", "size": "M", "price": 1299}))).await;
        let (_, body) = send(&app, "POST", "/api/v1/cart/asha/items", Some(json!({"productId": "KURTA-01", "name": "Linen Kurta", "size": "L", "price": 1299}))).await;
        assert_eq!(body["cart"]["items"].as_array().unwrap().len(), 2);
        assert_eq!(body["itemCount"], 4);

        let (status, body) = send(&app, "PUT", "/api/v1/cart/asha/items/KURTA-01", Some(json!({"quantity": 0, "size": "L"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["itemCount"], 3);

        let (status, _) = send(&app, "DELETE", "/api/v1/cart/asha/items/KURTA-01?size=XL", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, body) = send(&app, "DELETE", "/api/v1/cart/asha/items/KURTA-01?size=M", None).await;
        assert_eq!(body["itemCount"], 0);

        send(&app, "POST", "/api/v1/cart/asha/items", Some(json!({"productId": "SCARF", "name": "Scarf", "price": 300}))).await;
        send(&app, "DELETE", "/api/v1/cart/asha", None).await;
        let (_, body) = send(&app, "GET", "/api/v1/cart/asha", None).await;
        assert_eq!(amount(&body["subtotal"]), dec!(0));
    }

    #[tokio::test]
    async fn test_add_item_validation() {
        let app = app();
        let (status, _) = send(&app, "POST", "/api/v1/cart/asha/items", Some(json!({"productId": "X", "name": "X", "price": -5}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, "POST", "/api/v1/cart/asha/items", Some(json!({"productId": "X", "name": "X", "price": 5, "quantity": 0}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_amounts_rejected() {
        let app = app();
        let body = json!({"productId": "X", "name": "X", "price": "79228162514264337593543950335", "quantity": 2});
        let (status, resp) = send(&app, "POST", "/api/v1/cart/asha/items", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["success"], false);

        let body = json!({"productId": "X", "name": "X", "price": "9999999999.99", "quantity": 1});
        let (status, _) = send(&app, "POST", "/api/v1/cart/asha/items", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, resp) = send(&app, "POST", "/api/v1/cart/asha/items", Some(json!({"productId": "Y", "name": "Y", "price": 1}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["message"], "Cart total cannot exceed ₹9999999999.99");
        let (status, _) = send(&app, "PUT", "/api/v1/cart/asha/items/X", Some(json!({"quantity": 2}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, cart) = send(&app, "GET", "/api/v1/cart/asha", None).await;
        assert_eq!(cart["itemCount"], 1);
        assert_eq!(amount(&cart["subtotal"]), dec!(9999999999.99));
    }

    #[tokio::test]
    async fn test_quote_with_and_without_coupon() {
        let app = app();
        send(&app, "POST", "/api/v1/admin/coupons", Some(json!({
            "code": "SAVE10", "discountType": "PERCENTAGE", "discountValue": 10,
            "startDate": "2020-01-01T00:00:00Z", "endDate": "2099-01-01T00:00:00Z"
        }))).await;
        send(&app, "POST", "/api/v1/cart/asha/items", Some(json!({"productId": "KURTA", "name": "Kurta", "price": 500, "quantity": 2}))).await;

        let (status, body) = send(&app, "GET", "/api/v1/cart/asha/quote?code=save10", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(amount(&body["quote"]["total"]), dec!(900.00));
        assert_eq!(amount(&body["quote"]["lines"][0]["discountedPrice"]), dec!(450.00));
        assert_eq!(body["quote"]["coupon"]["code"], "SAVE10");

        let (_, body) = send(&app, "GET", "/api/v1/cart/asha/quote", None).await;
        assert_eq!(amount(&body["quote"]["total"]), dec!(1000));
        assert!(body["quote"]["coupon"].is_null());

        let (status, body) = send(&app, "GET", "/api/v1/cart/asha/quote?code=NOPE", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid coupon code");
    }
}
