//! Message transport and the worker loop that drives the sagas.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use crate::dispatcher::StepDispatcher;
use crate::envelope::SagaMessage;
use crate::error::{Result, SagaError};

/// Trait for publishing saga messages.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Publishes a message for some worker to pick up.
    async fn publish(&self, message: SagaMessage) -> Result<()>;
}

/// Broker over a bounded in-process channel. Messages travel in their JSON
/// wire form.
#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    sender: mpsc::Sender<String>,
}

impl InMemoryBroker {
    /// Creates a broker and the receiving end of its deliveries.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish(&self, message: SagaMessage) -> Result<()> {
        let raw = message.to_json()?;
        self.sender
            .send(raw)
            .await
            .map_err(|_| SagaError::Broker("delivery channel closed".to_string()))
    }
}

/// Consumes deliveries, dispatches each in its own task and publishes the
/// continuation.
///
/// There is no per-saga lock: two deliveries for the same saga may run at
/// the same time.
#[derive(Clone)]
pub struct SagaWorker {
    dispatcher: StepDispatcher,
    broker: Arc<dyn Broker>,
}

impl SagaWorker {
    /// Creates a worker.
    pub fn new(dispatcher: StepDispatcher, broker: Arc<dyn Broker>) -> Self {
        Self { dispatcher, broker }
    }

    /// Runs until `shutdown` flips (or its sender is dropped) or the delivery
    /// channel closes, then waits for in-flight deliveries.
    ///
    /// The channel is closed before waiting, so continuations published by
    /// in-flight deliveries fail with [`SagaError::Broker`] instead of
    /// blocking on a full channel.
    pub async fn run(self, mut deliveries: mpsc::Receiver<String>, mut shutdown: watch::Receiver<bool>) {
        let mut in_flight = JoinSet::new();
        tracing::info!("saga worker started");

        loop {
            tokio::select! {
                delivery = deliveries.recv() => {
                    let Some(raw) = delivery else {
                        tracing::info!("delivery channel closed");
                        break;
                    };
                    let worker = self.clone();
                    in_flight.spawn(async move { worker.handle_delivery(&raw).await });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("saga worker shutting down");
                        break;
                    }
                }
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            }
        }

        // Nothing reads deliveries from here on. Publishes blocked on a full
        // channel must fail, or the drain below never finishes.
        deliveries.close();
        while in_flight.join_next().await.is_some() {}

        let mut undelivered = 0usize;
        while deliveries.try_recv().is_ok() {
            undelivered += 1;
        }
        if undelivered > 0 {
            tracing::warn!(undelivered, "saga worker stopped with queued deliveries");
        }
        tracing::info!("saga worker stopped");
    }

    /// Decodes, dispatches and publishes the continuation of one delivery.
    ///
    /// Undecodable deliveries are logged and dropped.
    pub async fn handle_delivery(&self, raw: &str) {
        let message = match SagaMessage::from_json(raw) {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(%error, "dropping undecodable delivery");
                return;
            }
        };

        if let Some(next) = self.dispatcher.dispatch(message).await {
            if let Err(error) = self.broker.publish(next).await {
                tracing::error!(step = %next.step, %error, "failed to publish continuation");
            }
        }
    }
}
