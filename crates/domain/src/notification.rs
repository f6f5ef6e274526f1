//! Sale notification payloads.

use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::{DomainError, Money};

/// A purchased line as shown to a seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub price: Money,
}

/// Everything a seller is told about one checkout: who bought which of
/// their products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerNotification {
    pub seller_id: UserId,
    pub buyer_id: UserId,
    pub lines: Vec<NotificationLine>,
}

impl SellerNotification {
    /// Total units of the seller's products in this checkout.
    pub fn units_sold(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Total amount owed to the seller for this checkout.
    pub fn amount(&self) -> Result<Money, DomainError> {
        Money::total(self.lines.iter().map(|line| line.price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_and_amount() {
        let notification = SellerNotification {
            seller_id: UserId::new(),
            buyer_id: UserId::new(),
            lines: vec![
                NotificationLine {
                    product_id: ProductId::new(),
                    product_name: "Widget".to_string(),
                    quantity: 2,
                    price: Money::from_cents(2000),
                },
                NotificationLine {
                    product_id: ProductId::new(),
                    product_name: "Gadget".to_string(),
                    quantity: 1,
                    price: Money::from_cents(2500),
                },
            ],
        };
        assert_eq!(notification.units_sold(), 3);
        assert_eq!(notification.amount(), Ok(Money::from_cents(4500)));
    }
}
