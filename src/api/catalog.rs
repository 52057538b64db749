//! Storefront browsing and admin CRUD for products and categories.

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::api::{check, ApiError, AppState};
use crate::domain::aggregates::ProductDraft;
use crate::domain::value_objects::Money;
use crate::store::ProductFilter;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<Uuid>,
    pub featured: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    #[validate(length(min = 1, max = 20))]
    pub images: Vec<String>,
    #[validate(custom = "crate::api::valid_amount")]
    pub mrp: Money,
    #[validate(custom = "crate::api::valid_amount")]
    pub price: Money,
    #[serde(alias = "category")]
    pub category_id: Uuid,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub count_in_stock: u32,
    #[serde(default)]
    pub rating: Decimal,
    #[serde(default)]
    pub num_reviews: u32,
    #[serde(default)]
    pub is_featured: bool,
}

impl From<ProductRequest> for ProductDraft {
    fn from(r: ProductRequest) -> Self {
        ProductDraft {
            name: r.name, description: r.description, images: r.images, mrp: r.mrp, price: r.price,
            category_id: r.category_id, sizes: r.sizes, count_in_stock: r.count_in_stock,
            rating: r.rating, num_reviews: r.num_reviews, is_featured: r.is_featured,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub images: Vec<String>,
}

pub async fn list_products(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<Value>, ApiError> {
    let filter = ProductFilter {
        category: p.category,
        featured: p.featured,
        search: p.search.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()),
        ..ProductFilter::page(p.page, p.per_page)
    };
    let page = s.catalog.products(&filter).await?;
    Ok(Json(json!({"success": true, "products": page.products, "total": page.total, "page": page.page, "perPage": page.per_page})))
}

pub async fn product_count(State(s): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({"success": true, "productCount": s.catalog.product_count().await?})))
}

pub async fn featured_products(State(s): State<AppState>, Path(count): Path<u32>) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({"success": true, "products": s.catalog.featured(count).await?})))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({"success": true, "product": s.catalog.product(id).await?})))
}

pub async fn create_product(State(s): State<AppState>, Json(r): Json<ProductRequest>) -> Result<(StatusCode, Json<Value>), ApiError> {
    check(&r)?;
    let product = s.catalog.create_product(r.into()).await?;
    Ok((StatusCode::CREATED, Json(json!({"success": true, "product": product}))))
}

pub async fn update_product(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<ProductRequest>) -> Result<Json<Value>, ApiError> {
    check(&r)?;
    let product = s.catalog.update_product(id, r.into()).await?;
    Ok(Json(json!({"success": true, "product": product})))
}

pub async fn delete_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    s.catalog.delete_product(id).await?;
    Ok(Json(json!({"success": true, "message": "Product deleted successfully"})))
}

pub async fn list_categories(State(s): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({"success": true, "categories": s.catalog.categories().await?})))
}

pub async fn get_category(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({"success": true, "category": s.catalog.category(id).await?})))
}

pub async fn create_category(State(s): State<AppState>, Json(r): Json<CategoryRequest>) -> Result<(StatusCode, Json<Value>), ApiError> {
    check(&r)?;
    let category = s.catalog.create_category(&r.name, r.images).await?;
    Ok((StatusCode::CREATED, Json(json!({"success": true, "category": category}))))
}

pub async fn update_category(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<CategoryRequest>) -> Result<Json<Value>, ApiError> {
    check(&r)?;
    let category = s.catalog.update_category(id, &r.name, r.images).await?;
    Ok(Json(json!({"success": true, "category": category})))
}

pub async fn delete_category(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    s.catalog.delete_category(id).await?;
    Ok(Json(json!({"success": true, "message": "Category deleted successfully"})))
}

#[cfg(test)]
mod tests {
    use crate::api::tests::{amount, app, send};
    use axum::{http::StatusCode, Router};
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    async fn category(app: &Router, name: &str) -> String {
        let (status, body) = send(app, "POST", "/api/v1/admin/categories", Some(json!({"name": name}))).await;
        assert_eq!(status, StatusCode::CREATED);
        body["category"]["id"].as_str().unwrap().to_string()
    }

    fn product(name: &str, category: &str, featured: bool) -> Value {
        json!({
            "name": name, "description": "Handwoven", "images": [format!("/uploads/{name}.jpg")],
            "mrp": 1499, "price": "1199.50", "category": category, "countInStock": 5, "isFeatured": featured
        })
    }

    #[tokio::test]
    async fn test_product_crud() {
        let app = app();
        let ethnic = category(&app, "Ethnic Wear").await;
        let (status, body) = send(&app, "POST", "/api/v1/admin/products", Some(product("Kurta", &ethnic, true))).await;
        assert_eq!(status, StatusCode::CREATED);
        let created = &body["product"];
        assert_eq!(created["categoryId"], ethnic.as_str());
        assert_eq!(created["sizes"], json!(["XS", "S", "M", "L", "XL"]));
        assert_eq!(amount(&created["price"]), dec!(1199.50));
        let id = created["id"].as_str().unwrap().to_string();

        let mut edit = product("Kurta", &ethnic, true);
        edit["price"] = json!(999);
        edit["sizes"] = json!(["Free"]);
        let (status, body) = send(&app, "PUT", &format!("/api/v1/admin/products/{id}"), Some(edit)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["product"]["sizes"], json!(["Free"]));

        let (_, body) = send(&app, "GET", &format!("/api/v1/products/{id}"), None).await;
        assert_eq!(amount(&body["product"]["price"]), dec!(999));
        let (_, body) = send(&app, "GET", "/api/v1/products/count", None).await;
        assert_eq!(body["productCount"], 1);

        let (status, _) = send(&app, "DELETE", &format!("/api/v1/admin/products/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, "GET", &format!("/api/v1/products/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Product not found");
    }

    #[tokio::test]
    async fn test_product_rejections() {
        let app = app();
        let missing = uuid::Uuid::now_v7().to_string();
        let (status, body) = send(&app, "POST", "/api/v1/admin/products", Some(product("Kurta", &missing, false))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid Category");

        let ethnic = category(&app, "Ethnic Wear").await;
        let mut body = product("Kurta", &ethnic, false);
        body["price"] = json!(2000);
        let (status, resp) = send(&app, "POST", "/api/v1/admin/products", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["message"], "Price cannot be above MRP");

        let mut body = product("Kurta", &ethnic, false);
        body["mrp"] = json!("79228162514264337593543950335");
        let (status, _) = send(&app, "POST", "/api/v1/admin/products", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut body = product("Kurta", &ethnic, false);
        body["images"] = json!([]);
        let (status, _) = send(&app, "POST", "/api/v1/admin/products", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_listing_filters_and_featured() {
        let app = app();
        let ethnic = category(&app, "Ethnic Wear").await;
        let western = category(&app, "Western").await;
        for (name, cat, featured) in [("Kurta", &ethnic, true), ("Saree", &ethnic, false), ("Denim", &western, true)] {
            send(&app, "POST", "/api/v1/admin/products", Some(product(name, cat, featured))).await;
        }

        let (_, body) = send(&app, "GET", "/api/v1/products?perPage=2", None).await;
        assert_eq!(body["total"], 3);
        assert_eq!(body["products"].as_array().unwrap().len(), 2);
        assert_eq!(body["products"][0]["name"], "Denim");

        let (_, body) = send(&app, "GET", &format!("/api/v1/products?category={ethnic}&featured=true"), None).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["products"][0]["name"], "Kurta");

        let (_, body) = send(&app, "GET", "/api/v1/products?search=sar", None).await;
        assert_eq!(body["products"][0]["name"], "Saree");

        let (_, body) = send(&app, "GET", "/api/v1/products/featured/1", None).await;
        assert_eq!(body["products"].as_array().unwrap().len(), 1);
        assert_eq!(body["products"][0]["name"], "Denim");
    }

    #[tokio::test]
    async fn test_category_crud() {
        let app = app();
        let id = category(&app, "Ethnic Wear").await;
        let (status, _) = send(&app, "POST", "/api/v1/admin/categories", Some(json!({"name": "ethnic wear"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(&app, "PUT", &format!("/api/v1/admin/categories/{id}"), Some(json!({"name": "Festive", "images": ["/uploads/festive.jpg"]}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["category"]["slug"], "festive");

        send(&app, "POST", "/api/v1/admin/products", Some(product("Kurta", &id, false))).await;
        let (status, body) = send(&app, "DELETE", &format!("/api/v1/admin/categories/{id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Category still has products");

        let (_, body) = send(&app, "GET", "/api/v1/categories", None).await;
        assert_eq!(body["categories"][0]["name"], "Festive");
        let missing = uuid::Uuid::now_v7();
        let (status, _) = send(&app, "GET", &format!("/api/v1/categories/{missing}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
