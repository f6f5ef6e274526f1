//! Domain error types.

use common::{OrderId, ProductId, UserId};
use thiserror::Error;

use crate::Money;

/// Business-rule violations raised by the commerce entities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A stock decrement asked for more units than are available.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A settlement would overdraw the paying account.
    #[error("Insufficient balance for user {user_id}: required {required}, available {available}")]
    InsufficientBalance {
        user_id: UserId,
        required: Money,
        available: Money,
    },

    /// Quantities must be positive.
    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// An amount left the representable range.
    #[error("Amount overflow")]
    AmountOverflow,

    /// Product not found.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// User not found.
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),
}
