//! Postgres stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartItem, Category, Coupon, CouponError, DiscountSnapshot, Product, DiscountType, Order, OrderLine, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress};
use crate::domain::value_objects::{CouponCode, Money};
use crate::store::{CartStore, CategoryStore, CouponStore, OrderStore, ProductFilter, ProductPage, ProductStore};
use crate::{CheckoutError, Result};

const COUPON_COLUMNS: &str = "id, code, description, discount_type, discount_value, min_purchase, max_discount, start_date, end_date, usage_limit, used_count, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: Uuid,
    code: String,
    description: Option<String>,
    discount_type: String,
    discount_value: Decimal,
    min_purchase: Decimal,
    max_discount: Option<Decimal>,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    usage_limit: Option<i32>,
    used_count: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn corrupt(column: &str, value: impl std::fmt::Display) -> CheckoutError {
    CheckoutError::StorageError(format!("unexpected {column} value: {value}"))
}

fn to_count(column: &str, value: i32) -> Result<u32> { u32::try_from(value).map_err(|_| corrupt(column, value)) }

fn to_db_count(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| CheckoutError::InvalidRequest(format!("count {value} is too large")))
}

impl TryFrom<CouponRow> for Coupon {
    type Error = CheckoutError;

    fn try_from(r: CouponRow) -> Result<Self> {
        Ok(Coupon {
            id: r.id,
            code: CouponCode::parse(&r.code).map_err(|_| corrupt("code", &r.code))?,
            description: r.description,
            discount_type: DiscountType::parse(&r.discount_type).ok_or_else(|| corrupt("discount_type", &r.discount_type))?,
            discount_value: r.discount_value,
            min_purchase: Money::new(r.min_purchase),
            max_discount: r.max_discount.map(Money::new),
            start_date: r.start_date,
            end_date: r.end_date,
            usage_limit: r.usage_limit.map(|l| to_count("usage_limit", l)).transpose()?,
            used_count: to_count("used_count", r.used_count)?,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
            events: vec![],
        })
    }
}

fn unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error().is_some_and(|d| d.is_unique_violation())
}

fn check_violation(e: &sqlx::Error) -> bool {
    e.as_database_error().is_some_and(|d| d.is_check_violation())
}

fn foreign_key_violation(e: &sqlx::Error) -> bool {
    e.as_database_error().is_some_and(|d| d.is_foreign_key_violation())
}

#[derive(Clone, Debug)]
pub struct PgCouponStore {
    db: PgPool,
}

impl PgCouponStore {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl CouponStore for PgCouponStore {
    async fn list(&self) -> Result<Vec<Coupon>> {
        let rows = sqlx::query_as::<_, CouponRow>(&format!("SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC"))
            .fetch_all(&self.db).await?;
        rows.into_iter().map(Coupon::try_from).collect()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Coupon>> {
        sqlx::query_as::<_, CouponRow>(&format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE id = $1"))
            .bind(id).fetch_optional(&self.db).await?
            .map(Coupon::try_from).transpose()
    }

    async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>> {
        sqlx::query_as::<_, CouponRow>(&format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1"))
            .bind(code.as_str()).fetch_optional(&self.db).await?
            .map(Coupon::try_from).transpose()
    }

    async fn find_active_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>> {
        sqlx::query_as::<_, CouponRow>(&format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1 AND is_active"))
            .bind(code.as_str()).fetch_optional(&self.db).await?
            .map(Coupon::try_from).transpose()
    }

    async fn insert(&self, c: &Coupon) -> Result<()> {
        sqlx::query("INSERT INTO coupons (id, code, description, discount_type, discount_value, min_purchase, max_discount, start_date, end_date, usage_limit, used_count, is_active, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)")
            .bind(c.id).bind(c.code.as_str()).bind(&c.description).bind(c.discount_type.as_str()).bind(c.discount_value)
            .bind(c.min_purchase.amount()).bind(c.max_discount.map(|m| m.amount())).bind(c.start_date).bind(c.end_date)
            .bind(c.usage_limit.map(to_db_count).transpose()?).bind(to_db_count(c.used_count)?).bind(c.is_active)
            .bind(c.created_at).bind(c.updated_at)
            .execute(&self.db).await
            .map_err(|e| if unique_violation(&e) { CheckoutError::CouponAlreadyExists } else { e.into() })?;
        Ok(())
    }

    async fn update(&self, c: &Coupon) -> Result<()> {
        // used_count is owned by increment_usage_if_available and never written here.
        let result = sqlx::query("UPDATE coupons SET code = $2, description = $3, discount_type = $4, discount_value = $5, min_purchase = $6, max_discount = $7, start_date = $8, end_date = $9, usage_limit = $10, is_active = $11, updated_at = $12 WHERE id = $1")
            .bind(c.id).bind(c.code.as_str()).bind(&c.description).bind(c.discount_type.as_str()).bind(c.discount_value)
            .bind(c.min_purchase.amount()).bind(c.max_discount.map(|m| m.amount())).bind(c.start_date).bind(c.end_date)
            .bind(c.usage_limit.map(to_db_count).transpose()?).bind(c.is_active).bind(c.updated_at)
            .execute(&self.db).await
            .map_err(|e| {
                if unique_violation(&e) {
                    CheckoutError::CouponAlreadyExists
                } else if check_violation(&e) {
                    // usage_limit below a used_count that moved since the read
                    CouponError::InvalidUsageLimit.into()
                } else {
                    e.into()
                }
            })?;
        if result.rows_affected() == 0 { return Err(CheckoutError::CouponNotFound); }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Coupon>> {
        sqlx::query_as::<_, CouponRow>(&format!("DELETE FROM coupons WHERE id = $1 RETURNING {COUPON_COLUMNS}"))
            .bind(id).fetch_optional(&self.db).await?
            .map(Coupon::try_from).transpose()
    }

    async fn increment_usage_if_available(&self, code: &CouponCode, now: DateTime<Utc>) -> Result<Option<Coupon>> {
        let mut conn = self.db.acquire().await?;
        increment_usage(&mut conn, code, now).await
    }

    async fn release_usage(&self, code: &CouponCode) -> Result<()> {
        sqlx::query("UPDATE coupons SET used_count = used_count - 1, updated_at = NOW() WHERE code = $1 AND used_count > 0")
            .bind(code.as_str()).execute(&self.db).await?;
        Ok(())
    }
}

async fn increment_usage(conn: &mut PgConnection, code: &CouponCode, now: DateTime<Utc>) -> Result<Option<Coupon>> {
    sqlx::query_as::<_, CouponRow>(&format!(
        "UPDATE coupons SET used_count = used_count + 1, updated_at = NOW() \
         WHERE code = $1 AND is_active AND start_date <= $2 AND end_date >= $2 \
         AND (usage_limit IS NULL OR used_count < usage_limit) RETURNING {COUPON_COLUMNS}"
    ))
    .bind(code.as_str()).bind(now).fetch_optional(conn).await?
    .map(Coupon::try_from).transpose()
}

#[derive(Clone, Debug)]
pub struct PgCartStore {
    db: PgPool,
}

impl PgCartStore {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn get(&self, user_key: &str) -> Result<Cart> {
        let row: Option<(Json<Vec<CartItem>>, DateTime<Utc>)> = sqlx::query_as("SELECT items, updated_at FROM carts WHERE user_key = $1")
            .bind(user_key).fetch_optional(&self.db).await?;
        Ok(match row {
            Some((Json(items), updated_at)) => Cart::restore(user_key, items, updated_at),
            None => Cart::new(user_key),
        })
    }

    async fn set(&self, cart: &Cart) -> Result<()> {
        sqlx::query("INSERT INTO carts (user_key, items, updated_at) VALUES ($1, $2, $3) ON CONFLICT (user_key) DO UPDATE SET items = EXCLUDED.items, updated_at = EXCLUDED.updated_at")
            .bind(cart.user_key()).bind(Json(cart.items())).bind(cart.updated_at())
            .execute(&self.db).await?;
        Ok(())
    }

    async fn clear(&self, user_key: &str) -> Result<()> {
        sqlx::query("DELETE FROM carts WHERE user_key = $1").bind(user_key).execute(&self.db).await?;
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_key: String,
    lines: Json<Vec<OrderLine>>,
    subtotal: Decimal,
    discount: Option<Json<DiscountSnapshot>>,
    total: Decimal,
    payment_method: String,
    payment_status: String,
    status: String,
    shipping_address: Json<ShippingAddress>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = CheckoutError;

    fn try_from(r: OrderRow) -> Result<Self> {
        Ok(Order {
            id: r.id,
            order_number: r.order_number,
            user_key: r.user_key,
            lines: r.lines.0,
            subtotal: Money::new(r.subtotal),
            discount: r.discount.map(|d| d.0),
            total: Money::new(r.total),
            payment_method: PaymentMethod::parse(&r.payment_method).ok_or_else(|| corrupt("payment_method", &r.payment_method))?,
            payment_status: PaymentStatus::parse(&r.payment_status).ok_or_else(|| corrupt("payment_status", &r.payment_status))?,
            status: OrderStatus::parse(&r.status).ok_or_else(|| corrupt("status", &r.status))?,
            shipping_address: r.shipping_address.0,
            created_at: r.created_at,
            updated_at: r.updated_at,
            events: vec![],
        })
    }
}

const ORDER_COLUMNS: &str = "id, order_number, user_key, lines, subtotal, discount, total, payment_method, payment_status, status, shipping_address, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct PgOrderStore {
    db: PgPool,
}

impl PgOrderStore {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, o: &Order) -> Result<()> {
        let mut conn = self.db.acquire().await?;
        insert_order(&mut conn, o).await
    }

    async fn insert_redeeming(&self, o: &Order, _coupons: &dyn CouponStore, code: &CouponCode, now: DateTime<Utc>) -> Result<Option<Coupon>> {
        let mut tx = self.db.begin().await?;
        // Dropping an uncommitted transaction rolls it back.
        let Some(coupon) = increment_usage(&mut tx, code, now).await? else { return Ok(None) };
        insert_order(&mut tx, o).await?;
        tx.commit().await?;
        Ok(Some(coupon))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id).fetch_optional(&self.db).await?
            .map(Order::try_from).transpose()
    }

    async fn list_for_user(&self, user_key: &str) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_key = $1 ORDER BY created_at DESC"))
            .bind(user_key).fetch_all(&self.db).await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn list(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"))
            .fetch_all(&self.db).await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn update(&self, o: &Order) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $2, payment_status = $3, updated_at = $4 WHERE id = $1")
            .bind(o.id).bind(o.status.as_str()).bind(o.payment_status.as_str()).bind(o.updated_at)
            .execute(&self.db).await?;
        if result.rows_affected() == 0 { return Err(CheckoutError::OrderNotFound); }
        Ok(())
    }
}

async fn insert_order(conn: &mut PgConnection, o: &Order) -> Result<()> {
    sqlx::query("INSERT INTO orders (id, order_number, user_key, lines, subtotal, discount, total, payment_method, payment_status, status, shipping_address, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)")
        .bind(o.id).bind(&o.order_number).bind(&o.user_key).bind(Json(&o.lines)).bind(o.subtotal.amount())
        .bind(o.discount.as_ref().map(Json)).bind(o.total.amount()).bind(o.payment_method.as_str())
        .bind(o.payment_status.as_str()).bind(o.status.as_str()).bind(Json(&o.shipping_address))
        .bind(o.created_at).bind(o.updated_at)
        .execute(conn).await?;
    Ok(())
}

const PRODUCT_COLUMNS: &str = "id, name, description, images, mrp, price, category_id, sizes, count_in_stock, rating, num_reviews, is_featured, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: String,
    images: Vec<String>,
    mrp: Decimal,
    price: Decimal,
    category_id: Uuid,
    sizes: Vec<String>,
    count_in_stock: i32,
    rating: Decimal,
    num_reviews: i32,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = CheckoutError;

    fn try_from(r: ProductRow) -> Result<Self> {
        Ok(Product {
            id: r.id,
            name: r.name,
            description: r.description,
            images: r.images,
            mrp: Money::new(r.mrp),
            price: Money::new(r.price),
            category_id: r.category_id,
            sizes: r.sizes,
            count_in_stock: to_count("count_in_stock", r.count_in_stock)?,
            rating: r.rating,
            num_reviews: to_count("num_reviews", r.num_reviews)?,
            is_featured: r.is_featured,
            created_at: r.created_at,
            updated_at: r.updated_at,
            events: vec![],
        })
    }
}

/// `%` and `_` in the search text match themselves.
fn like_pattern(search: &str) -> String {
    let escaped = search.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

const PRODUCT_FILTER: &str = "($1::uuid IS NULL OR category_id = $1) AND ($2::boolean IS NULL OR is_featured = $2) AND ($3::text IS NULL OR name ILIKE $3)";

#[derive(Clone, Debug)]
pub struct PgProductStore {
    db: PgPool,
}

impl PgProductStore {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn list(&self, filter: &ProductFilter) -> Result<ProductPage> {
        let search = filter.search.as_deref().map(like_pattern);
        let offset = i64::try_from(filter.offset()).map_err(|_| CheckoutError::InvalidRequest("page is too large".into()))?;
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE {PRODUCT_FILTER} ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(filter.category).bind(filter.featured).bind(&search).bind(i64::from(filter.per_page)).bind(offset)
        .fetch_all(&self.db).await?;
        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM products WHERE {PRODUCT_FILTER}"))
            .bind(filter.category).bind(filter.featured).bind(&search)
            .fetch_one(&self.db).await?;
        Ok(ProductPage {
            products: rows.into_iter().map(Product::try_from).collect::<Result<_>>()?,
            total: u64::try_from(total).map_err(|_| corrupt("count", total))?,
            page: filter.page,
            per_page: filter.per_page,
        })
    }

    async fn get(&self, id: Uuid) -> Result<Option<Product>> {
        sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id).fetch_optional(&self.db).await?
            .map(Product::try_from).transpose()
    }

    async fn insert(&self, p: &Product) -> Result<()> {
        sqlx::query("INSERT INTO products (id, name, description, images, mrp, price, category_id, sizes, count_in_stock, rating, num_reviews, is_featured, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)")
            .bind(p.id).bind(&p.name).bind(&p.description).bind(&p.images).bind(p.mrp.amount()).bind(p.price.amount())
            .bind(p.category_id).bind(&p.sizes).bind(to_db_count(p.count_in_stock)?).bind(p.rating)
            .bind(to_db_count(p.num_reviews)?).bind(p.is_featured).bind(p.created_at).bind(p.updated_at)
            .execute(&self.db).await
            .map_err(|e| if foreign_key_violation(&e) { CheckoutError::InvalidCategory } else { e.into() })?;
        Ok(())
    }

    async fn update(&self, p: &Product) -> Result<()> {
        let result = sqlx::query("UPDATE products SET name = $2, description = $3, images = $4, mrp = $5, price = $6, category_id = $7, sizes = $8, count_in_stock = $9, rating = $10, num_reviews = $11, is_featured = $12, updated_at = $13 WHERE id = $1")
            .bind(p.id).bind(&p.name).bind(&p.description).bind(&p.images).bind(p.mrp.amount()).bind(p.price.amount())
            .bind(p.category_id).bind(&p.sizes).bind(to_db_count(p.count_in_stock)?).bind(p.rating)
            .bind(to_db_count(p.num_reviews)?).bind(p.is_featured).bind(p.updated_at)
            .execute(&self.db).await
            .map_err(|e| if foreign_key_violation(&e) { CheckoutError::InvalidCategory } else { e.into() })?;
        if result.rows_affected() == 0 { return Err(CheckoutError::ProductNotFound); }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Product>> {
        sqlx::query_as::<_, ProductRow>(&format!("DELETE FROM products WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"))
            .bind(id).fetch_optional(&self.db).await?
            .map(Product::try_from).transpose()
    }

    async fn count(&self) -> Result<u64> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products").fetch_one(&self.db).await?;
        u64::try_from(total).map_err(|_| corrupt("count", total))
    }

    async fn count_in_category(&self, category_id: Uuid) -> Result<u64> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE category_id = $1")
            .bind(category_id).fetch_one(&self.db).await?;
        u64::try_from(total).map_err(|_| corrupt("count", total))
    }
}

#[derive(Clone, Debug)]
pub struct PgCategoryStore {
    db: PgPool,
}

impl PgCategoryStore {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

type CategoryRow = (Uuid, String, String, Vec<String>, DateTime<Utc>, DateTime<Utc>);

fn to_category((id, name, slug, images, created_at, updated_at): CategoryRow) -> Category {
    Category { id, name, slug, images, created_at, updated_at, events: vec![] }
}

const CATEGORY_COLUMNS: &str = "id, name, slug, images, created_at, updated_at";

#[async_trait]
impl CategoryStore for PgCategoryStore {
    async fn list(&self) -> Result<Vec<Category>> {
        let rows: Vec<CategoryRow> = sqlx::query_as(&format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name"))
            .fetch_all(&self.db).await?;
        Ok(rows.into_iter().map(to_category).collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Category>> {
        let row: Option<CategoryRow> = sqlx::query_as(&format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"))
            .bind(id).fetch_optional(&self.db).await?;
        Ok(row.map(to_category))
    }

    async fn insert(&self, c: &Category) -> Result<()> {
        sqlx::query("INSERT INTO categories (id, name, slug, images, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(c.id).bind(&c.name).bind(&c.slug).bind(&c.images).bind(c.created_at).bind(c.updated_at)
            .execute(&self.db).await
            .map_err(|e| if unique_violation(&e) { CheckoutError::CategoryAlreadyExists } else { e.into() })?;
        Ok(())
    }

    async fn update(&self, c: &Category) -> Result<()> {
        let result = sqlx::query("UPDATE categories SET name = $2, slug = $3, images = $4, updated_at = $5 WHERE id = $1")
            .bind(c.id).bind(&c.name).bind(&c.slug).bind(&c.images).bind(c.updated_at)
            .execute(&self.db).await
            .map_err(|e| if unique_violation(&e) { CheckoutError::CategoryAlreadyExists } else { e.into() })?;
        if result.rows_affected() == 0 { return Err(CheckoutError::CategoryNotFound); }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Category>> {
        let row: Option<CategoryRow> = sqlx::query_as(&format!("DELETE FROM categories WHERE id = $1 RETURNING {CATEGORY_COLUMNS}"))
            .bind(id).fetch_optional(&self.db).await
            .map_err(|e| if foreign_key_violation(&e) { CheckoutError::CategoryInUse } else { e.into() })?;
        Ok(row.map(to_category))
    }
}
