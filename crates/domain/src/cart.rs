//! Cart lines.

use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};

/// A line in a buyer's cart: a product and how many units of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartItem {
    /// Creates a cart line.
    pub fn new(user_id: UserId, product_id: ProductId, quantity: u32) -> Self {
        Self {
            user_id,
            product_id,
            quantity,
        }
    }
}
