// src/models/money.rs

use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{PayrollError, PayrollResult};

/// A non-negative amount of dirhams. Construction rejects negative values,
/// so a `Money` in hand is always `>= 0`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Largest amount accepted from outside: one billion dirhams. Keeps every
    /// product and sum the pipeline forms far inside `Decimal`'s range.
    pub const MAX: Money = Money(dec!(1_000_000_000));

    pub fn new(amount: Decimal) -> PayrollResult<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PayrollError::InvalidInput(format!(
                "monetary amount must not be negative, got {amount}"
            )));
        }
        if amount > Money::MAX.0 {
            return Err(PayrollError::InvalidInput(format!(
                "monetary amount {amount} exceeds the limit of {}",
                Money::MAX
            )));
        }
        Ok(Money(amount))
    }

    /// Rounds a computed figure to the centime, half away from zero, and
    /// floors it at zero.
    pub fn round_non_negative(amount: Decimal) -> Self {
        let mut rounded = amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            .max(Decimal::ZERO);
        rounded.rescale(2);
        Money(rounded)
    }

    pub fn amount(self) -> Decimal {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// `self × rate / 100`, rate given as a percentage.
    pub fn percent(self, rate: Decimal) -> Money {
        Money::round_non_negative(self.0 * rate / dec!(100))
    }

    /// Subtracts a deduction, or `None` when the result would go below zero.
    pub fn checked_deduct(self, deduction: DeductionAmount) -> Option<Money> {
        let rest = self.0 - deduction.0.0;
        (rest >= Decimal::ZERO).then_some(Money(rest))
    }

    /// Subtracts a deduction and floors the result at zero.
    pub fn saturating_deduct(self, deduction: DeductionAmount) -> Money {
        self.checked_deduct(deduction).unwrap_or(Money::ZERO)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = PayrollError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// A positive magnitude that is taken away from pay. Deductions never carry
/// a sign; the only way to apply one is `Money::checked_deduct` /
/// `Money::saturating_deduct`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct DeductionAmount(Money);

impl DeductionAmount {
    pub const ZERO: DeductionAmount = DeductionAmount(Money::ZERO);

    pub fn new(magnitude: Money) -> Self {
        DeductionAmount(magnitude)
    }

    pub fn magnitude(self) -> Money {
        self.0
    }
}

impl Add for DeductionAmount {
    type Output = DeductionAmount;

    fn add(self, rhs: DeductionAmount) -> DeductionAmount {
        DeductionAmount(self.0 + rhs.0)
    }
}

impl Sum for DeductionAmount {
    fn sum<I: Iterator<Item = DeductionAmount>>(iter: I) -> DeductionAmount {
        iter.fold(DeductionAmount::ZERO, Add::add)
    }
}

impl fmt::Display for DeductionAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_amounts() {
        assert!(matches!(
            Money::new(dec!(-0.01)),
            Err(PayrollError::InvalidInput(_))
        ));
        assert!(Money::new(dec!(0)).is_ok());
    }

    #[test]
    fn rejects_amounts_beyond_the_limit() {
        assert_eq!(Money::MAX.amount(), dec!(1000000000));
        assert!(Money::new(dec!(1000000000)).is_ok());
        assert!(matches!(
            Money::new(dec!(1000000000.01)),
            Err(PayrollError::InvalidInput(_))
        ));
        assert!(matches!(Money::new(Decimal::MAX), Err(PayrollError::InvalidInput(_))));
        assert!(serde_json::from_str::<Money>("\"79228162514264337593543950335\"").is_err());
    }

    #[test]
    fn percent_rounds_half_away_from_zero() {
        let gross = Money::new(dec!(1234.50)).unwrap();
        // 1234.50 × 2.26% = 27.8997
        assert_eq!(gross.percent(dec!(2.26)).amount(), dec!(27.90));
        let small = Money::new(dec!(0.5)).unwrap();
        // 0.5 × 1% = 0.005
        assert_eq!(small.percent(dec!(1)).amount(), dec!(0.01));
    }

    #[test]
    fn deductions_never_go_below_zero() {
        let pay = Money::new(dec!(100)).unwrap();
        let big = DeductionAmount::new(Money::new(dec!(150)).unwrap());
        assert_eq!(pay.checked_deduct(big), None);
        assert_eq!(pay.saturating_deduct(big), Money::ZERO);

        let small = DeductionAmount::new(Money::new(dec!(40)).unwrap());
        assert_eq!(pay.checked_deduct(small).unwrap().amount(), dec!(60));
    }

    #[test]
    fn deserializes_from_string_and_rejects_negative() {
        let ok: Money = serde_json::from_str("\"6000.00\"").unwrap();
        assert_eq!(ok.amount(), dec!(6000.00));
        assert!(serde_json::from_str::<Money>("\"-1\"").is_err());
    }
}
