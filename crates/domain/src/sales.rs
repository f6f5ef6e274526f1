//! Orders created by a completed checkout.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::Money;

/// One purchased product within an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Line price: unit price times quantity at the time of purchase.
    pub price: Money,
}

/// A buyer's order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: UserId,
    pub total: Money,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Creates an order with a fresh id.
    pub fn new(buyer_id: UserId, total: Money, items: Vec<OrderItem>) -> Self {
        Self {
            id: OrderId::new(),
            buyer_id,
            total,
            items,
            created_at: Utc::now(),
        }
    }

    /// Returns true if any line of this order is for `product_id`.
    pub fn references(&self, product_id: ProductId) -> bool {
        self.items.iter().any(|item| item.product_id == product_id)
    }
}
