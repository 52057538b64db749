//! Coupon eligibility and order total calculation.
//!
//! Everything here is pure: the coupon store supplies the candidate coupon and
//! the caller supplies the cart subtotal and the current time.
//!
//! The flow for a checkout is
//! 1. [`validate`] the looked-up coupon against the cart subtotal,
//! 2. build a [`Quote`] with per-line [`discounted_price`]s,
//! 3. charge [`final_total`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::domain::aggregates::{Cart, CartItem, Coupon, DiscountType};
use crate::domain::value_objects::{Money, Quantity};

/// A coupon that passed validation, with the discount it is worth against the
/// subtotal it was validated for. Recompute when the cart changes.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCoupon {
    #[serde(flatten)]
    pub coupon: Coupon,
    pub calculated_discount: Money,
}

/// Why a coupon cannot be used. These are shown to the shopper as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponRejection {
    #[error("Invalid coupon code")]
    NotFound,
    #[error("Coupon has expired or is not active yet")]
    Expired,
    #[error("Coupon usage limit exceeded")]
    LimitExceeded,
    #[error("Minimum purchase amount of {minimum} required")]
    BelowMinimum { minimum: Money },
}

/// Checks a looked-up coupon against the cart, in order: existence and active
/// flag, validity window, usage limit, minimum purchase.
///
/// Does not touch the usage counter.
pub fn validate(found: Option<Coupon>, cart_subtotal: Money, now: DateTime<Utc>) -> Result<AppliedCoupon, CouponRejection> {
    let coupon = found.filter(Coupon::is_active).ok_or(CouponRejection::NotFound)?;
    if !coupon.is_live(now) {
        return Err(CouponRejection::Expired);
    }
    if !coupon.has_remaining_uses() {
        return Err(CouponRejection::LimitExceeded);
    }
    if cart_subtotal < coupon.min_purchase() {
        return Err(CouponRejection::BelowMinimum { minimum: coupon.min_purchase() });
    }
    let calculated_discount = compute_discount(&coupon, cart_subtotal);
    Ok(AppliedCoupon { coupon, calculated_discount })
}

/// Discount a coupon is worth against `cart_subtotal`.
///
/// Fixed discounts are returned as configured, even when larger than the
/// subtotal; [`final_total`] is what floors the payable amount.
pub fn compute_discount(coupon: &Coupon, cart_subtotal: Money) -> Money {
    match coupon.discount_type() {
        DiscountType::Percentage => {
            let discount = percentage_of(cart_subtotal, coupon.discount_value()).round();
            match coupon.max_discount() {
                Some(max) => discount.min(max),
                None => discount,
            }
        }
        DiscountType::Fixed => Money::new(coupon.discount_value()),
    }
}

/// Unit price of `item` after the coupon, for receipts.
///
/// Percentage coupons take the flat rate off every unit, cap or no cap.
/// Fixed coupons are spread in proportion to price. Either way the lines only
/// approximate the charged total.
pub fn discounted_price(item: &CartItem, applied: Option<&AppliedCoupon>, cart_subtotal: Money) -> Money {
    let Some(applied) = applied else { return item.unit_price };
    match applied.coupon.discount_type() {
        DiscountType::Percentage => {
            let factor = Decimal::ONE - applied.coupon.discount_value() / Decimal::ONE_HUNDRED;
            item.unit_price.scale(factor.max(Decimal::ZERO)).round()
        }
        DiscountType::Fixed => item.unit_price.scale(allocation_ratio(cart_subtotal, applied.calculated_discount)).round(),
    }
}

/// Amount to charge: subtotal minus discount, never below zero.
pub fn final_total(cart_subtotal: Money, applied: Option<&AppliedCoupon>) -> Money {
    match applied {
        Some(applied) => cart_subtotal.saturating_sub(applied.calculated_discount),
        None => cart_subtotal,
    }
}

/// Share of each price kept after a discount spread proportionally over the
/// cart. An empty subtotal keeps everything.
fn allocation_ratio(cart_subtotal: Money, discount: Money) -> Decimal {
    if cart_subtotal.is_zero() {
        return Decimal::ONE;
    }
    (Decimal::ONE - discount.amount() / cart_subtotal.amount()).max(Decimal::ZERO)
}

fn percentage_of(amount: Money, percent: Decimal) -> Money {
    amount.scale(percent / Decimal::ONE_HUNDRED)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteLine {
    pub product_id: String,
    pub name: String,
    pub size: Option<String>,
    pub image: Option<String>,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub discounted_price: Money,
    pub line_total: Money,
}

/// Priced view of a cart, with or without a coupon.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub lines: Vec<QuoteLine>,
    pub subtotal: Money,
    /// Discount as calculated for the coupon.
    pub discount: Money,
    /// Amount actually taken off the subtotal.
    pub deducted: Money,
    pub total: Money,
    pub coupon: Option<AppliedCoupon>,
}

pub fn quote(cart: &Cart, applied: Option<AppliedCoupon>) -> Quote {
    let subtotal = cart.subtotal();
    let lines = cart
        .items()
        .iter()
        .map(|item| {
            let discounted = discounted_price(item, applied.as_ref(), subtotal);
            QuoteLine {
                product_id: item.product_id.clone(),
                name: item.name.clone(),
                size: item.size.clone(),
                image: item.image.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                discounted_price: discounted,
                line_total: discounted.multiply(item.quantity.value()),
            }
        })
        .collect();
    let total = final_total(subtotal, applied.as_ref());
    let discount = applied.as_ref().map_or(Money::ZERO, |a| a.calculated_discount);
    Quote { lines, subtotal, discount, deducted: subtotal.saturating_sub(total), total, coupon: applied }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::cart::tests::item;
    use crate::domain::aggregates::coupon::tests::draft;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn coupon(discount_type: DiscountType, value: Decimal) -> Coupon {
        Coupon::create(draft("SAVEBIG", discount_type, value)).unwrap()
    }

    fn applied(coupon: Coupon, subtotal: Money) -> AppliedCoupon {
        validate(Some(coupon), subtotal, Utc::now()).unwrap()
    }

    #[test]
    fn test_percentage_clamped_by_max_discount() {
        let mut c = coupon(DiscountType::Percentage, dec!(10));
        c.max_discount = Some(Money::rupees(50));
        let a = applied(c, Money::rupees(1000));
        assert_eq!(a.calculated_discount, Money::rupees(50));
        assert_eq!(final_total(Money::rupees(1000), Some(&a)), Money::rupees(950));
    }

    #[test]
    fn test_percentage_without_cap() {
        let c = coupon(DiscountType::Percentage, dec!(12.5));
        assert_eq!(compute_discount(&c, Money::rupees(999)), Money::new(dec!(124.88)));
        let c = coupon(DiscountType::Percentage, dec!(10));
        assert_eq!(compute_discount(&c, Money::rupees(1000)), Money::rupees(100));
    }

    #[test]
    fn test_percentage_never_exceeds_cap() {
        let mut c = coupon(DiscountType::Percentage, dec!(40));
        c.max_discount = Some(Money::rupees(75));
        for subtotal in [0, 1, 100, 187, 188, 1000, 250_000] {
            assert!(compute_discount(&c, Money::rupees(subtotal)) <= Money::rupees(75));
        }
    }

    #[test]
    fn test_fixed_discount_and_allocation() {
        let a = applied(coupon(DiscountType::Fixed, dec!(200)), Money::rupees(1000));
        assert_eq!(a.calculated_discount, Money::rupees(200));
        assert_eq!(final_total(Money::rupees(1000), Some(&a)), Money::rupees(800));
        assert_eq!(discounted_price(&item("P1", 500, 1), Some(&a), Money::rupees(1000)), Money::rupees(400));
    }

    #[test]
    fn test_fixed_allocation_with_empty_subtotal() {
        let a = applied(coupon(DiscountType::Fixed, dec!(200)), Money::ZERO);
        assert_eq!(discounted_price(&item("P1", 500, 1), Some(&a), Money::ZERO), Money::rupees(500));
        assert_eq!(final_total(Money::ZERO, Some(&a)), Money::ZERO);
    }

    #[test]
    fn test_fixed_larger_than_subtotal() {
        let a = applied(coupon(DiscountType::Fixed, dec!(2000)), Money::rupees(1000));
        assert_eq!(a.calculated_discount, Money::rupees(2000));
        assert_eq!(final_total(Money::rupees(1000), Some(&a)), Money::ZERO);
        assert_eq!(discounted_price(&item("P1", 500, 2), Some(&a), Money::rupees(1000)), Money::ZERO);
    }

    #[test]
    fn test_no_coupon_keeps_prices() {
        let subtotal = Money::rupees(1350);
        for i in [item("A", 500, 1), item("B", 425, 2)] {
            assert_eq!(discounted_price(&i, None, subtotal), i.unit_price);
        }
        assert_eq!(final_total(subtotal, None), subtotal);
    }

    #[test]
    fn test_percentage_line_price() {
        let a = applied(coupon(DiscountType::Percentage, dec!(15)), Money::rupees(1000));
        assert_eq!(discounted_price(&item("P1", 999, 1), Some(&a), Money::rupees(1000)), Money::new(dec!(849.15)));
        let full = applied(coupon(DiscountType::Percentage, dec!(100)), Money::rupees(1000));
        assert_eq!(discounted_price(&item("P1", 999, 1), Some(&full), Money::rupees(1000)), Money::ZERO);
    }

    #[test]
    fn test_final_total_never_negative() {
        for value in [dec!(0), dec!(1), dec!(999.99), dec!(1000), dec!(1_000_000)] {
            let c = coupon(DiscountType::Fixed, value);
            for subtotal in [0, 1, 500, 1000] {
                let a = applied(c.clone(), Money::rupees(subtotal));
                assert!(!final_total(Money::rupees(subtotal), Some(&a)).is_negative());
            }
        }
    }

    #[test]
    fn test_expired_regardless_of_subtotal() {
        let mut c = coupon(DiscountType::Fixed, dec!(100));
        c.min_purchase = Money::rupees(10_000);
        let after = c.end_date() + Duration::seconds(1);
        for subtotal in [0, 50, 1_000_000] {
            assert_eq!(validate(Some(c.clone()), Money::rupees(subtotal), after), Err(CouponRejection::Expired));
        }
        let before = c.start_date() - Duration::seconds(1);
        assert_eq!(validate(Some(c), Money::rupees(50), before), Err(CouponRejection::Expired));
    }

    #[test]
    fn test_usage_limit_boundary() {
        let mut c = coupon(DiscountType::Fixed, dec!(100));
        c.usage_limit = Some(5);
        c.used_count = 4;
        assert!(validate(Some(c.clone()), Money::rupees(500), Utc::now()).is_ok());
        c.used_count = 5;
        assert_eq!(validate(Some(c), Money::rupees(500), Utc::now()), Err(CouponRejection::LimitExceeded));
    }

    #[test]
    fn test_missing_or_inactive_is_not_found() {
        assert_eq!(validate(None, Money::rupees(500), Utc::now()), Err(CouponRejection::NotFound));
        let mut c = coupon(DiscountType::Fixed, dec!(100));
        c.deactivate();
        assert_eq!(validate(Some(c), Money::rupees(500), Utc::now()), Err(CouponRejection::NotFound));
    }

    #[test]
    fn test_below_minimum_message() {
        let mut c = coupon(DiscountType::Fixed, dec!(100));
        c.min_purchase = Money::rupees(1499);
        let err = validate(Some(c), Money::rupees(1000), Utc::now()).unwrap_err();
        assert_eq!(err, CouponRejection::BelowMinimum { minimum: Money::rupees(1499) });
        assert_eq!(err.to_string(), "Minimum purchase amount of ₹1499 required");
    }

    #[test]
    fn test_checks_short_circuit_in_order() {
        let mut c = coupon(DiscountType::Fixed, dec!(100));
        c.usage_limit = Some(1);
        c.used_count = 1;
        c.min_purchase = Money::rupees(5000);
        assert_eq!(validate(Some(c.clone()), Money::rupees(10), Utc::now()), Err(CouponRejection::LimitExceeded));
        let expired_at = c.end_date() + Duration::days(1);
        assert_eq!(validate(Some(c), Money::rupees(10), expired_at), Err(CouponRejection::Expired));
    }

    #[test]
    fn test_quote_lines_approximate_total() {
        let mut cart = Cart::new("u1");
        cart.add_item(item("A", 333, 1)).unwrap();
        cart.add_item(item("B", 333, 2)).unwrap();
        cart.add_item(item("C", 1, 1)).unwrap();
        let a = applied(coupon(DiscountType::Fixed, dec!(100)), cart.subtotal());
        let q = quote(&cart, Some(a));
        assert_eq!(q.subtotal, Money::rupees(1000));
        assert_eq!(q.total, Money::rupees(900));
        let lines: Money = q.lines.iter().map(|l| l.line_total).sum();
        assert!((lines.amount() - q.total.amount()).abs() <= dec!(0.05));
    }

    #[test]
    fn test_capped_percentage_lines_keep_flat_rate() {
        let mut cart = Cart::new("u1");
        cart.add_item(item("A", 500, 2)).unwrap();
        let mut c = coupon(DiscountType::Percentage, dec!(10));
        c.max_discount = Some(Money::rupees(50));
        let a = applied(c, cart.subtotal());
        assert_eq!(discounted_price(&item("A", 500, 2), Some(&a), cart.subtotal()), Money::rupees(450));
        let q = quote(&cart, Some(a));
        assert_eq!(q.lines[0].discounted_price, Money::rupees(450));
        assert_eq!(q.total, Money::rupees(950));
    }

    #[test]
    fn test_quote_reports_deducted_amount() {
        let mut cart = Cart::new("u1");
        cart.add_item(item("A", 150, 1)).unwrap();
        let q = quote(&cart, Some(applied(coupon(DiscountType::Fixed, dec!(200)), cart.subtotal())));
        assert_eq!(q.discount, Money::rupees(200));
        assert_eq!(q.deducted, Money::rupees(150));
        assert_eq!(q.total, Money::ZERO);
    }
}
