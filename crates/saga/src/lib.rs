//! Message-driven sagas for checkout fulfillment and account deletion.
//!
//! Each broker message names a [`Step`] and carries a [`StepEnvelope`]. The
//! [`StepDispatcher`] runs the matching handler, which reads the saga state,
//! calls collaborator services and returns the next message to publish.
//! Failures are retried by re-emitting the same step (see [`RetryPolicy`]);
//! exhausted checkout steps trigger a compensation cascade that walks back
//! one step at a time.

pub mod broker;
pub mod checkout;
pub mod deletion;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod payload;
pub mod retry;
pub mod services;
pub mod step;

pub use broker::{Broker, InMemoryBroker, SagaWorker};
pub use checkout::CheckoutSaga;
pub use deletion::AccountDeletionSaga;
pub use dispatcher::StepDispatcher;
pub use envelope::{SagaMessage, StepEnvelope, Subject};
pub use error::{Result, SagaError};
pub use payload::{CheckoutPayload, PaymentCompleted};
pub use retry::{Attempt, RetryPolicy};
pub use services::{
    CartService, CatalogService, FaultPlan, IdentityService, InMemoryCartService,
    InMemoryCatalogService, InMemoryIdentityService, InMemoryNotifier, InMemoryOrderService,
    InMemoryServices, Notifier, OrderService, SentNotification, Services,
};
pub use step::Step;
