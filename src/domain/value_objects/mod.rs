//! Value Objects for the storefront

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use thiserror::Error;

/// Money value object.
///
/// Amounts are rupees with paisa precision. Arithmetic is exact and saturates
/// instead of overflowing; rounding to paisa happens only where a computed
/// amount is handed back to a caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    /// Largest amount a price, coupon or cart may carry (`NUMERIC(12, 2)`).
    pub const MAX: Money = Money(Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2));

    pub fn new(amount: Decimal) -> Self { Self(amount) }
    pub fn rupees(amount: i64) -> Self { Self(Decimal::from(amount)) }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn is_zero(&self) -> bool { self.0.is_zero() }
    pub fn is_negative(&self) -> bool { self.0.is_sign_negative() && !self.0.is_zero() }

    /// Zero up to [`Money::MAX`], with no more than paisa precision.
    pub fn is_storable(&self) -> bool {
        !self.is_negative() && *self <= Self::MAX && self.0.normalize().scale() <= 2
    }

    pub fn add(&self, other: Money) -> Money { Money(self.0.saturating_add(other.0)) }
    pub fn checked_add(&self, other: Money) -> Option<Money> { self.0.checked_add(other.0).map(Money) }

    /// Subtracts `other`, flooring the result at zero.
    pub fn saturating_sub(&self, other: Money) -> Money {
        Money((self.0 - other.0).max(Decimal::ZERO))
    }

    pub fn multiply(&self, qty: u32) -> Money { Money(self.0.saturating_mul(Decimal::from(qty))) }
    pub fn checked_multiply(&self, qty: u32) -> Option<Money> { self.0.checked_mul(Decimal::from(qty)).map(Money) }
    pub fn scale(&self, factor: Decimal) -> Money { Money(self.0.saturating_mul(factor)) }

    /// Rounds to paisa, midpoint away from zero.
    pub fn round(&self) -> Money {
        Money(self.0.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "₹{}", self.0.normalize()) }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self { iter.fold(Money::ZERO, |acc, m| acc.add(m)) }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self { Self(amount) }
}

/// Coupon code value object.
///
/// Codes are matched case-insensitively, so they are stored upper-cased.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    pub const MIN_LEN: usize = 3;
    pub const MAX_LEN: usize = 30;

    pub fn parse(value: impl AsRef<str>) -> Result<Self, CouponCodeError> {
        let value = value.as_ref().trim().to_uppercase();
        if value.is_empty() { return Err(CouponCodeError::Empty); }
        if value.chars().count() < Self::MIN_LEN { return Err(CouponCodeError::TooShort); }
        if value.chars().count() > Self::MAX_LEN { return Err(CouponCodeError::TooLong); }
        if let Some(c) = value.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_')) {
            return Err(CouponCodeError::InvalidCharacter(c));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for CouponCode {
    type Error = CouponCodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::parse(value) }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> Self { code.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponCodeError {
    #[error("coupon code is empty")]
    Empty,
    #[error("coupon code must be at least {} characters", CouponCode::MIN_LEN)]
    TooShort,
    #[error("coupon code must be at most {} characters", CouponCode::MAX_LEN)]
    TooLong,
    #[error("coupon code contains invalid character '{0}'")]
    InvalidCharacter(char),
}

/// Quantity value object. A line always holds at least one unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 { return Err(QuantityError::Zero); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: Quantity) -> Self { Self(self.0.saturating_add(other.0)) }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self { q.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity must be at least 1")]
    Zero,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_coupon_code_normalized() {
        let code = CouponCode::parse("  summer10 ").unwrap();
        assert_eq!(code.as_str(), "SUMMER10");
        assert_eq!(code, CouponCode::parse("SUMMER10").unwrap());
    }

    #[test]
    fn test_coupon_code_rejects_bad_input() {
        assert_eq!(CouponCode::parse(""), Err(CouponCodeError::Empty));
        assert_eq!(CouponCode::parse("ab"), Err(CouponCodeError::TooShort));
        assert_eq!(CouponCode::parse("a".repeat(31)), Err(CouponCodeError::TooLong));
        assert_eq!(CouponCode::parse("SAVE 10"), Err(CouponCodeError::InvalidCharacter(' ')));
    }

    #[test]
    fn test_money_saturating_sub() {
        assert_eq!(Money::rupees(100).saturating_sub(Money::rupees(30)), Money::rupees(70));
        assert_eq!(Money::rupees(100).saturating_sub(Money::rupees(300)), Money::ZERO);
    }

    #[test]
    fn test_money_round_and_display() {
        assert_eq!(Money::new(dec!(10.005)).round(), Money::new(dec!(10.01)));
        assert_eq!(Money::new(dec!(500.00)).to_string(), "₹500");
        assert_eq!(Money::new(dec!(99.50)).to_string(), "₹99.5");
    }

    #[test]
    fn test_money_bounds() {
        assert_eq!(Money::MAX, Money::new(dec!(9999999999.99)));
        assert!(Money::MAX.is_storable());
        assert!(Money::new(dec!(12.50)).is_storable());
        assert!(!Money::new(dec!(12.345)).is_storable());
        assert!(!Money::MAX.add(Money::new(dec!(0.01))).is_storable());
        assert!(!Money::new(dec!(-1)).is_storable());
    }

    #[test]
    fn test_money_arithmetic_does_not_overflow() {
        let huge = Money::new(Decimal::MAX);
        assert_eq!(huge.checked_multiply(2), None);
        assert_eq!(huge.checked_add(Money::rupees(1)), None);
        assert_eq!(huge.multiply(2), huge);
        assert_eq!([huge, huge].into_iter().sum::<Money>(), huge);
        assert_eq!(Money::rupees(5).checked_multiply(3), Some(Money::rupees(15)));
    }

    #[test]
    fn test_money_deserializes_from_number() {
        let m: Money = serde_json::from_str("1299.5").unwrap();
        assert_eq!(m, Money::new(dec!(1299.5)));
    }

    #[test]
    fn test_quantity() {
        assert_eq!(Quantity::new(0), Err(QuantityError::Zero));
        assert_eq!(Quantity::new(2).unwrap().add(Quantity::new(3).unwrap()).value(), 5);
        assert!(serde_json::from_str::<Quantity>("0").is_err());
    }
}
