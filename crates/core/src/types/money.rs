//! Monetary amounts in Nigerian naira.
//!
//! The storefront sells in a single currency, so the money type carries no
//! currency code. Arithmetic goes through [`rust_decimal::Decimal`] to avoid
//! float drift in totals and tax.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// A naira amount.
///
/// Display formatting matches the storefront convention: `₦` prefix,
/// thousands grouping, and no fraction digits for whole amounts
/// (`₦14,800`, `₦800.50`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    /// Zero naira.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount from a decimal value.
    #[must_use]
    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Create an amount from whole naira.
    #[must_use]
    pub fn from_naira(naira: i64) -> Self {
        Self(Decimal::from(naira))
    }

    /// The underlying decimal value.
    #[must_use]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The amount in kobo (1/100 naira), rounded to the nearest kobo.
    ///
    /// The payment gateway charges in the minor unit.
    #[must_use]
    pub fn to_kobo(&self) -> i64 {
        let kobo = (self.0 * Decimal::from(100)).round();
        kobo.to_i64().unwrap_or(i64::MAX)
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Mul<u32> for Amount {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self {
        Self(self.0 * Decimal::from(rhs))
    }
}

impl Mul<Decimal> for Amount {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self {
        Self(self.0 * rhs)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let normalized = self.0.normalize();
        let body = if normalized.is_integer() {
            normalized.trunc().to_string()
        } else {
            normalized.round_dp(2).to_string()
        };

        let (int_part, frac_part) = body.split_once('.').map_or((body.as_str(), None), |(i, d)| (i, Some(d)));
        let (sign, digits) = int_part
            .strip_prefix('-')
            .map_or(("", int_part), |rest| ("-", rest));

        let mut grouped = String::new();
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i).is_multiple_of(3) {
                grouped.push(',');
            }
            grouped.push(c);
        }

        match frac_part {
            Some(d) => write!(f, "{sign}\u{20a6}{grouped}.{d}"),
            None => write!(f, "{sign}\u{20a6}{grouped}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Amount::from_naira(14_800).to_string(), "₦14,800");
        assert_eq!(Amount::from_naira(800).to_string(), "₦800");
        assert_eq!(Amount::from_naira(1_234_567).to_string(), "₦1,234,567");
        assert_eq!(Amount::ZERO.to_string(), "₦0");
    }

    #[test]
    fn test_display_fractional() {
        let amount = Amount::new(Decimal::from_str("1800.50").unwrap());
        assert_eq!(amount.to_string(), "₦1,800.5");
    }

    #[test]
    fn test_arithmetic() {
        let subtotal = Amount::from_naira(10_000);
        let tax = subtotal * Decimal::from_str("0.08").unwrap();
        assert_eq!(tax, Amount::from_naira(800));
        assert_eq!(
            subtotal + tax + Amount::from_naira(4_000),
            Amount::from_naira(14_800)
        );
    }

    #[test]
    fn test_mul_quantity() {
        assert_eq!(Amount::from_naira(2_500) * 3_u32, Amount::from_naira(7_500));
    }

    #[test]
    fn test_sum() {
        let total: Amount = [Amount::from_naira(1), Amount::from_naira(2)]
            .into_iter()
            .sum();
        assert_eq!(total, Amount::from_naira(3));
    }

    #[test]
    fn test_to_kobo() {
        assert_eq!(Amount::from_naira(14_800).to_kobo(), 1_480_000);
        let fractional = Amount::new(Decimal::from_str("10.505").unwrap());
        assert_eq!(fractional.to_kobo(), 1050);
    }

    #[test]
    fn test_serde_accepts_numbers_and_strings() {
        let from_number: Amount = serde_json::from_str("4000").unwrap();
        let from_string: Amount = serde_json::from_str("\"4000\"").unwrap();
        assert_eq!(from_number, from_string);
        assert_eq!(from_number, Amount::from_naira(4_000));
    }
}
