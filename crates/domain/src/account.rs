//! User accounts.

use common::UserId;
use serde::{Deserialize, Serialize};

use crate::{DomainError, Money};

/// E-mail of the placeholder account that inherits products of deleted
/// sellers which are still referenced by orders.
pub const ANONYMOUS_EMAIL: &str = "anonymous@deleted.invalid";

/// A user account with its ledger balance and activity counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub balance: Money,
    pub purchases_count: u64,
    pub sales_count: u64,
}

impl User {
    /// Creates an account with a fresh id and zeroed counters.
    pub fn new(name: impl Into<String>, email: impl Into<String>, balance: Money) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            email: email.into(),
            balance,
            purchases_count: 0,
            sales_count: 0,
        }
    }

    /// Creates the anonymous placeholder account.
    pub fn anonymous() -> Self {
        Self::new("Anonymous", ANONYMOUS_EMAIL, Money::zero())
    }

    /// Returns true if this is the anonymous placeholder account.
    pub fn is_anonymous(&self) -> bool {
        self.email == ANONYMOUS_EMAIL
    }

    /// Returns the first word of the display name, used to greet the user.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }

    /// Debits `amount`, refusing to overdraw.
    pub fn debit(&mut self, amount: Money) -> Result<(), DomainError> {
        if self.balance < amount {
            return Err(DomainError::InsufficientBalance {
                user_id: self.id,
                required: amount,
                available: self.balance,
            });
        }
        self.balance = self.balance.checked_sub(amount)?;
        Ok(())
    }

    /// Credits `amount`.
    pub fn credit(&mut self, amount: Money) -> Result<(), DomainError> {
        self.balance = self.balance.checked_add(amount)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debit_and_credit() {
        let mut user = User::new("Ada Lovelace", "ada@example.com", Money::from_cents(5000));
        user.debit(Money::from_cents(2000)).unwrap();
        user.credit(Money::from_cents(500)).unwrap();
        assert_eq!(user.balance, Money::from_cents(3500));
    }

    #[test]
    fn test_debit_refuses_overdraft() {
        let mut user = User::new("Ada", "ada@example.com", Money::from_cents(100));
        let err = user.debit(Money::from_cents(101)).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientBalance { .. }));
        assert_eq!(user.balance, Money::from_cents(100));
    }

    #[test]
    fn test_credit_refuses_overflow() {
        let mut user = User::new("Sam", "sam@example.com", Money::from_cents(i64::MAX));
        assert_eq!(
            user.credit(Money::from_cents(1)),
            Err(DomainError::AmountOverflow)
        );
        assert_eq!(user.balance, Money::from_cents(i64::MAX));
    }

    #[test]
    fn test_first_name() {
        let user = User::new("Ada Lovelace", "ada@example.com", Money::zero());
        assert_eq!(user.first_name(), "Ada");
    }

    #[test]
    fn test_anonymous() {
        let anonymous = User::anonymous();
        assert!(anonymous.is_anonymous());
        assert_eq!(anonymous.balance, Money::zero());
    }
}
