//! Money amounts.

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Money amount represented in cents to avoid floating point issues.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Multiplies a unit price by a quantity.
    pub fn times(&self, quantity: u32) -> Result<Money, DomainError> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Money)
            .ok_or(DomainError::AmountOverflow)
    }

    /// Adds two amounts.
    pub fn checked_add(self, rhs: Money) -> Result<Money, DomainError> {
        self.0
            .checked_add(rhs.0)
            .map(Money)
            .ok_or(DomainError::AmountOverflow)
    }

    /// Subtracts `rhs` from this amount.
    pub fn checked_sub(self, rhs: Money) -> Result<Money, DomainError> {
        self.0
            .checked_sub(rhs.0)
            .map(Money)
            .ok_or(DomainError::AmountOverflow)
    }

    /// Sums amounts, failing instead of wrapping.
    pub fn total(amounts: impl IntoIterator<Item = Money>) -> Result<Money, DomainError> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, amount| acc.checked_add(amount))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}
