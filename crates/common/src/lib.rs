//! Identifier types shared across the checkout fulfillment crates.

pub mod ids;

pub use ids::{IdempotencyKey, OrderId, ProductId, SagaStateId, UserId};
