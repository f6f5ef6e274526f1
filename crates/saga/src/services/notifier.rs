//! Notification sender trait and in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{NotificationLine, User};
use tokio::sync::RwLock;

use super::fault::FaultPlan;
use crate::error::{Result, SagaError};

/// Trait for outbound buyer and seller notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tells the buyer their order is confirmed.
    async fn send_order_confirmation(&self, buyer: &User) -> Result<()>;

    /// Tells a seller which of their products a buyer bought.
    async fn send_sale_notification(
        &self,
        seller: &User,
        buyer: &User,
        lines: &[NotificationLine],
    ) -> Result<()>;
}

/// A notification handed to the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentNotification {
    OrderConfirmation {
        email: String,
        first_name: String,
    },
    Sale {
        email: String,
        first_name: String,
        buyer_name: String,
        lines: Vec<NotificationLine>,
    },
}

/// Notifier that records what it sends and logs it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<RwLock<Vec<SentNotification>>>,
    confirmation_faults: FaultPlan,
    sale_faults: FaultPlan,
}

impl InMemoryNotifier {
    /// Creates a notifier with nothing sent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Failure injection for [`Notifier::send_order_confirmation`].
    pub fn confirmation_faults(&self) -> &FaultPlan {
        &self.confirmation_faults
    }

    /// Failure injection for [`Notifier::send_sale_notification`].
    pub fn sale_faults(&self) -> &FaultPlan {
        &self.sale_faults
    }

    /// Returns everything sent so far.
    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send_order_confirmation(&self, buyer: &User) -> Result<()> {
        if self.confirmation_faults.trip() {
            return Err(SagaError::Notification("Mail provider unavailable".to_string()));
        }

        tracing::info!(email = %buyer.email, "order confirmation sent");
        self.sent.write().await.push(SentNotification::OrderConfirmation {
            email: buyer.email.clone(),
            first_name: buyer.first_name().to_string(),
        });
        Ok(())
    }

    async fn send_sale_notification(
        &self,
        seller: &User,
        buyer: &User,
        lines: &[NotificationLine],
    ) -> Result<()> {
        if self.sale_faults.trip() {
            return Err(SagaError::Notification("Mail provider unavailable".to_string()));
        }

        tracing::info!(email = %seller.email, lines = lines.len(), "sale notification sent");
        self.sent.write().await.push(SentNotification::Sale {
            email: seller.email.clone(),
            first_name: seller.first_name().to_string(),
            buyer_name: buyer.name.clone(),
            lines: lines.to_vec(),
        });
        Ok(())
    }
}
