//! Coupon administration, validation and application.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::{Coupon, CouponDraft};
use crate::domain::events::{CouponEvent, DomainEvent};
use crate::domain::pricing::{self, AppliedCoupon, CouponRejection};
use crate::domain::value_objects::{CouponCode, Money};
use crate::services::EventPublisher;
use crate::store::CouponStore;
use crate::{CheckoutError, Result};

#[derive(Clone)]
pub struct CouponService {
    coupons: Arc<dyn CouponStore>,
    publisher: EventPublisher,
}

impl CouponService {
    pub fn new(coupons: Arc<dyn CouponStore>, publisher: EventPublisher) -> Self { Self { coupons, publisher } }

    pub async fn list(&self) -> Result<Vec<Coupon>> { self.coupons.list().await }

    pub async fn get(&self, id: Uuid) -> Result<Coupon> {
        self.coupons.get(id).await?.ok_or(CheckoutError::CouponNotFound)
    }

    pub async fn create(&self, draft: CouponDraft) -> Result<Coupon> {
        let mut coupon = Coupon::create(draft)?;
        self.coupons.insert(&coupon).await?;
        tracing::info!(code = %coupon.code(), id = %coupon.id(), "coupon created");
        self.publisher.publish(coupon.take_events()).await;
        Ok(coupon)
    }

    pub async fn update(&self, id: Uuid, draft: CouponDraft) -> Result<Coupon> {
        let mut coupon = self.get(id).await?;
        coupon.update(draft)?;
        self.coupons.update(&coupon).await?;
        tracing::info!(code = %coupon.code(), %id, "coupon updated");
        self.publisher.publish(coupon.take_events()).await;
        Ok(coupon)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let coupon = self.coupons.delete(id).await?.ok_or(CheckoutError::CouponNotFound)?;
        tracing::info!(code = %coupon.code(), %id, "coupon deleted");
        self.publisher.publish(vec![DomainEvent::Coupon(CouponEvent::Deleted { coupon_id: id, code: coupon.code().clone() })]).await;
        Ok(())
    }

    /// Checks `code` against a cart subtotal and prices the discount. The
    /// usage counter is left alone.
    pub async fn validate(&self, code: &str, cart_subtotal: Money, now: DateTime<Utc>) -> Result<AppliedCoupon> {
        let Ok(code) = CouponCode::parse(code) else {
            return Err(CouponRejection::NotFound.into());
        };
        let found = self.coupons.find_active_by_code(&code).await?;
        let applied = pricing::validate(found, cart_subtotal, now).map_err(|reason| {
            tracing::debug!(%code, %cart_subtotal, %reason, "coupon rejected");
            reason
        })?;
        tracing::debug!(%code, discount = %applied.calculated_discount, "coupon validated");
        Ok(applied)
    }

    /// Consumes one use of the coupon. Not idempotent: call once per order.
    pub async fn apply(&self, code: &str, now: DateTime<Utc>) -> Result<Coupon> {
        let code = CouponCode::parse(code).map_err(|_| CheckoutError::CouponNoLongerValid)?;
        let Some(coupon) = self.coupons.increment_usage_if_available(&code, now).await? else {
            tracing::warn!(%code, "coupon could not be applied");
            return Err(CheckoutError::CouponNoLongerValid);
        };
        self.applied(&coupon).await;
        Ok(coupon)
    }

    pub(crate) fn store(&self) -> &dyn CouponStore { self.coupons.as_ref() }

    /// Logs and announces a use recorded in the store.
    pub(crate) async fn applied(&self, coupon: &Coupon) {
        let code = coupon.code().clone();
        tracing::info!(%code, used = coupon.used_count(), limit = ?coupon.usage_limit(), "coupon applied");
        self.publisher.publish(vec![DomainEvent::Coupon(CouponEvent::Applied { code, used_count: coupon.used_count() })]).await;
    }
}
