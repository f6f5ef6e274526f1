//! Catalog products.

use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::{DomainError, Money};

/// A product listed by a seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    /// The owning seller. Reassigned to the anonymous account when the
    /// seller deletes their account while orders still reference the product.
    pub seller_id: UserId,
    pub name: String,
    pub price: Money,
    /// Units in stock.
    pub quantity: u32,
}

impl Product {
    /// Creates a product with a fresh id.
    pub fn new(seller_id: UserId, name: impl Into<String>, price: Money, quantity: u32) -> Self {
        Self {
            id: ProductId::new(),
            seller_id,
            name: name.into(),
            price,
            quantity,
        }
    }

    /// Removes `quantity` units from stock if at least that many are available.
    pub fn decrement_stock(&mut self, quantity: u32) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity {
                product_id: self.id,
                quantity,
            });
        }
        if self.quantity < quantity {
            return Err(DomainError::InsufficientStock {
                product_id: self.id,
                requested: quantity,
                available: self.quantity,
            });
        }
        self.quantity -= quantity;
        Ok(())
    }

    /// Returns `quantity` units to stock.
    pub fn increment_stock(&mut self, quantity: u32) {
        self.quantity += quantity;
    }
}
