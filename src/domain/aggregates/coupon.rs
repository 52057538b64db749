//! Coupon Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::{CouponEvent, DomainEvent};
use crate::domain::value_objects::{CouponCode, Money};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Percentage => "PERCENTAGE", Self::Fixed => "FIXED" }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PERCENTAGE" => Some(Self::Percentage),
            "FIXED" => Some(Self::Fixed),
            _ => None,
        }
    }
}

/// Admin-editable fields of a coupon.
#[derive(Clone, Debug, PartialEq)]
pub struct CouponDraft {
    pub code: CouponCode,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_purchase: Money,
    pub max_discount: Option<Money>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub usage_limit: Option<u32>,
    pub is_active: bool,
}

impl CouponDraft {
    fn check(&self) -> Result<(), CouponError> {
        if self.start_date > self.end_date { return Err(CouponError::InvalidWindow); }
        if self.discount_value.is_sign_negative() && !self.discount_value.is_zero() { return Err(CouponError::NegativeValue); }
        if self.discount_type == DiscountType::Percentage && self.discount_value > Decimal::ONE_HUNDRED {
            return Err(CouponError::PercentageOutOfRange);
        }
        if self.discount_value.normalize().scale() > 2 { return Err(CouponError::TooPrecise("discountValue")); }
        if Money::new(self.discount_value) > Money::MAX { return Err(CouponError::AmountTooLarge("discountValue")); }
        check_amount(self.min_purchase, "minPurchase")?;
        if let Some(max) = self.max_discount { check_amount(max, "maxDiscount")?; }
        if self.usage_limit == Some(0) { return Err(CouponError::InvalidUsageLimit); }
        Ok(())
    }
}

fn check_amount(amount: Money, field: &'static str) -> Result<(), CouponError> {
    if amount.is_negative() { return Err(CouponError::NegativeAmount(field)); }
    if amount > Money::MAX { return Err(CouponError::AmountTooLarge(field)); }
    if !amount.is_storable() { return Err(CouponError::TooPrecise(field)); }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub(crate) id: Uuid,
    pub(crate) code: CouponCode,
    pub(crate) description: Option<String>,
    pub(crate) discount_type: DiscountType,
    pub(crate) discount_value: Decimal,
    pub(crate) min_purchase: Money,
    pub(crate) max_discount: Option<Money>,
    pub(crate) start_date: DateTime<Utc>,
    pub(crate) end_date: DateTime<Utc>,
    pub(crate) usage_limit: Option<u32>,
    pub(crate) used_count: u32,
    pub(crate) is_active: bool,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

impl Coupon {
    pub fn create(draft: CouponDraft) -> Result<Self, CouponError> {
        draft.check()?;
        let now = Utc::now();
        let mut coupon = Self {
            id: Uuid::now_v7(), code: draft.code, description: draft.description,
            discount_type: draft.discount_type, discount_value: draft.discount_value,
            min_purchase: draft.min_purchase, max_discount: draft.max_discount,
            start_date: draft.start_date, end_date: draft.end_date,
            usage_limit: draft.usage_limit, used_count: 0, is_active: draft.is_active,
            created_at: now, updated_at: now, events: vec![],
        };
        coupon.raise_event(DomainEvent::Coupon(CouponEvent::Created { coupon_id: coupon.id, code: coupon.code.clone() }));
        Ok(coupon)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn code(&self) -> &CouponCode { &self.code }
    pub fn description(&self) -> Option<&str> { self.description.as_deref() }
    pub fn discount_type(&self) -> DiscountType { self.discount_type }
    pub fn discount_value(&self) -> Decimal { self.discount_value }
    pub fn min_purchase(&self) -> Money { self.min_purchase }
    pub fn max_discount(&self) -> Option<Money> { self.max_discount }
    pub fn start_date(&self) -> DateTime<Utc> { self.start_date }
    pub fn end_date(&self) -> DateTime<Utc> { self.end_date }
    pub fn usage_limit(&self) -> Option<u32> { self.usage_limit }
    pub fn used_count(&self) -> u32 { self.used_count }
    pub fn is_active(&self) -> bool { self.is_active }

    /// Whether `now` falls inside the inclusive validity window.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool { self.start_date <= now && now <= self.end_date }

    pub fn has_remaining_uses(&self) -> bool { self.usage_limit.map_or(true, |limit| self.used_count < limit) }

    /// Replaces the editable fields. The usage counter is carried over and
    /// may not end up above the new limit.
    pub fn update(&mut self, draft: CouponDraft) -> Result<(), CouponError> {
        draft.check()?;
        if draft.usage_limit.is_some_and(|limit| limit < self.used_count) { return Err(CouponError::InvalidUsageLimit); }
        let deactivated = self.is_active && !draft.is_active;
        self.code = draft.code;
        self.description = draft.description;
        self.discount_type = draft.discount_type;
        self.discount_value = draft.discount_value;
        self.min_purchase = draft.min_purchase;
        self.max_discount = draft.max_discount;
        self.start_date = draft.start_date;
        self.end_date = draft.end_date;
        self.usage_limit = draft.usage_limit;
        self.is_active = draft.is_active;
        self.touch();
        self.raise_event(DomainEvent::Coupon(CouponEvent::Updated { coupon_id: self.id, code: self.code.clone() }));
        if deactivated {
            self.raise_event(DomainEvent::Coupon(CouponEvent::Deactivated { coupon_id: self.id, code: self.code.clone() }));
        }
        Ok(())
    }

    pub fn deactivate(&mut self) {
        if !self.is_active { return; }
        self.is_active = false;
        self.touch();
        self.raise_event(DomainEvent::Coupon(CouponEvent::Deactivated { coupon_id: self.id, code: self.code.clone() }));
    }

    /// Counts one more successful application. Callers guarantee the coupon
    /// still has remaining uses.
    pub(crate) fn record_use(&mut self) { self.used_count += 1; self.touch(); }
    /// Gives back a use whose order was never stored.
    pub(crate) fn release_use(&mut self) { self.used_count = self.used_count.saturating_sub(1); self.touch(); }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error("End date must be after start date")]
    InvalidWindow,
    #[error("Percentage discount cannot be more than 100%")]
    PercentageOutOfRange,
    #[error("Discount value cannot be negative")]
    NegativeValue,
    #[error("{0} cannot be negative")]
    NegativeAmount(&'static str),
    #[error("{0} cannot exceed {}", Money::MAX)]
    AmountTooLarge(&'static str),
    #[error("{0} cannot have more than 2 decimal places")]
    TooPrecise(&'static str),
    #[error("Usage limit must be at least 1 and not below the current usage count")]
    InvalidUsageLimit,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    pub(crate) fn draft(code: &str, discount_type: DiscountType, value: Decimal) -> CouponDraft {
        let now = Utc::now();
        CouponDraft {
            code: CouponCode::parse(code).unwrap(), description: None, discount_type, discount_value: value,
            min_purchase: Money::ZERO, max_discount: None, start_date: now - Duration::days(1),
            end_date: now + Duration::days(30), usage_limit: None, is_active: true,
        }
    }

    #[test]
    fn test_create_raises_event() {
        let mut c = Coupon::create(draft("FESTIVE", DiscountType::Percentage, dec!(15))).unwrap();
        assert_eq!(c.used_count(), 0);
        assert!(matches!(c.take_events().as_slice(), [DomainEvent::Coupon(CouponEvent::Created { .. })]));
        assert!(c.take_events().is_empty());
    }

    #[test]
    fn test_invariants_rejected() {
        let mut d = draft("FESTIVE", DiscountType::Percentage, dec!(101));
        assert_eq!(Coupon::create(d.clone()).unwrap_err(), CouponError::PercentageOutOfRange);
        d.discount_value = dec!(10);
        d.end_date = d.start_date - Duration::seconds(1);
        assert_eq!(Coupon::create(d).unwrap_err(), CouponError::InvalidWindow);
        let f = draft("FLAT", DiscountType::Fixed, dec!(-5));
        assert_eq!(Coupon::create(f).unwrap_err(), CouponError::NegativeValue);
        let mut z = draft("LIMITED", DiscountType::Fixed, dec!(100));
        z.usage_limit = Some(0);
        assert_eq!(Coupon::create(z).unwrap_err(), CouponError::InvalidUsageLimit);
    }

    #[test]
    fn test_values_fit_paisa_columns() {
        let d = draft("ODDPCT", DiscountType::Percentage, dec!(12.345));
        assert_eq!(Coupon::create(d).unwrap_err(), CouponError::TooPrecise("discountValue"));
        assert!(Coupon::create(draft("EVENPCT", DiscountType::Percentage, dec!(12.50))).is_ok());

        let mut d = draft("MINPAISA", DiscountType::Fixed, dec!(100));
        d.min_purchase = Money::new(dec!(99.999));
        assert_eq!(Coupon::create(d).unwrap_err(), CouponError::TooPrecise("minPurchase"));

        let mut d = draft("BIGCAP", DiscountType::Percentage, dec!(10));
        d.max_discount = Some(Money::new(dec!(10000000000)));
        assert_eq!(Coupon::create(d).unwrap_err(), CouponError::AmountTooLarge("maxDiscount"));
        let d = draft("BIGFLAT", DiscountType::Fixed, dec!(10000000000));
        assert_eq!(Coupon::create(d).unwrap_err(), CouponError::AmountTooLarge("discountValue"));
    }

    #[test]
    fn test_fixed_above_hundred_allowed() {
        assert!(Coupon::create(draft("FLAT500", DiscountType::Fixed, dec!(500))).is_ok());
    }

    #[test]
    fn test_update_keeps_used_count_and_guards_limit() {
        let mut c = Coupon::create(draft("LIMITED", DiscountType::Fixed, dec!(100))).unwrap();
        c.record_use();
        c.record_use();
        let mut d = draft("LIMITED", DiscountType::Fixed, dec!(150));
        d.usage_limit = Some(1);
        assert_eq!(c.update(d.clone()).unwrap_err(), CouponError::InvalidUsageLimit);
        d.usage_limit = Some(2);
        c.update(d).unwrap();
        assert_eq!(c.used_count(), 2);
        assert_eq!(c.discount_value(), dec!(150));
        assert!(!c.has_remaining_uses());
    }

    #[test]
    fn test_deactivate_once() {
        let mut c = Coupon::create(draft("WINTER", DiscountType::Fixed, dec!(100))).unwrap();
        c.take_events();
        c.deactivate();
        c.deactivate();
        assert!(!c.is_active());
        assert_eq!(c.take_events().len(), 1);
    }

    #[test]
    fn test_window_is_inclusive() {
        let c = Coupon::create(draft("WINTER", DiscountType::Fixed, dec!(100))).unwrap();
        assert!(c.is_live(c.start_date()));
        assert!(c.is_live(c.end_date()));
        assert!(!c.is_live(c.end_date() + Duration::milliseconds(1)));
    }
}
