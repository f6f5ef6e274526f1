//! Saga error types.

use common::UserId;
use domain::DomainError;
use saga_store::StoreError;
use thiserror::Error;

/// Errors that can occur while running a saga step.
///
/// Step handlers never surface these to the transport; the retry controller
/// turns them into a re-emission or a compensation.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Cart service error.
    #[error("Cart service error: {0}")]
    Cart(String),

    /// Catalog service error.
    #[error("Catalog service error: {0}")]
    Catalog(String),

    /// Identity/ledger service error.
    #[error("Identity service error: {0}")]
    Identity(String),

    /// Order service error.
    #[error("Order service error: {0}")]
    Orders(String),

    /// Notification sender error.
    #[error("Notification error: {0}")]
    Notification(String),

    /// Saga state store error.
    #[error("Saga state store error: {0}")]
    Store(#[from] StoreError),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A message names a topic outside the step vocabulary.
    #[error("Unknown step: {0}")]
    UnknownStep(String),

    /// A message carries a subject that no step accepts.
    #[error("Invalid message subject: {0}")]
    InvalidSubject(String),

    /// Checkout was triggered for a buyer with nothing in their cart.
    #[error("Cart of user {0} is empty")]
    EmptyCart(UserId),

    /// The broker refused a message.
    #[error("Broker error: {0}")]
    Broker(String),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
