//! Account deletion saga.
//!
//! ```text
//! clear-cart(userId) -> remove-products-cart-items -> remove-or-anonymize-products
//!   -> remove-user -> remove-orphaned-products
//! ```
//!
//! Deletion is forward-only: a step that exhausts its retries is logged and
//! the flow stops there.

use std::future::Future;

use common::{ProductId, UserId};

use crate::envelope::SagaMessage;
use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::services::Services;
use crate::step::Step;

const SAGA: &str = "account_deletion";

/// Runs account deletion steps against the collaborators.
#[derive(Clone)]
pub struct AccountDeletionSaga {
    services: Services,
    retry: RetryPolicy,
}

impl AccountDeletionSaga {
    /// Creates an account deletion saga runner.
    pub fn new(services: Services, retry: RetryPolicy) -> Self {
        Self { services, retry }
    }

    /// Returns the first message of an account deletion.
    pub fn start(&self, user_id: UserId) -> SagaMessage {
        metrics::counter!("saga_started_total", "saga" => SAGA).increment(1);
        tracing::info!(%user_id, "account deletion saga started");
        SagaMessage::for_user(Step::ClearCart, user_id)
    }

    /// Empties the deleted user's own cart.
    pub async fn clear_cart(&self, message: &SagaMessage) -> Option<SagaMessage> {
        let user_id = message.require_user()?;
        self.step(message, async {
            self.services.cart.clear(user_id).await?;
            Ok(Some(message.advance(Step::RemoveProductsCartItems)))
        })
        .await
    }

    /// Removes the user's products from every buyer's cart.
    pub async fn remove_products_cart_items(&self, message: &SagaMessage) -> Option<SagaMessage> {
        let user_id = message.require_user()?;
        self.step(message, async {
            let product_ids = self.products_of(user_id).await?;
            let removed = self.services.cart.remove_by_products(&product_ids).await?;
            tracing::debug!(%user_id, removed, "cart lines removed");
            Ok(Some(message.advance(Step::RemoveOrAnonymizeProducts)))
        })
        .await
    }

    /// Hands products that orders still reference to the anonymous account
    /// and deletes the rest.
    pub async fn remove_or_anonymize_products(&self, message: &SagaMessage) -> Option<SagaMessage> {
        let user_id = message.require_user()?;
        self.step(message, async {
            let product_ids = self.products_of(user_id).await?;
            let referenced = self
                .services
                .orders
                .referenced_product_ids(&product_ids)
                .await?;

            let (kept, unreferenced): (Vec<ProductId>, Vec<ProductId>) = product_ids
                .into_iter()
                .partition(|id| referenced.contains(id));

            if !kept.is_empty() {
                let anonymous = self.services.identity.find_or_create_anonymous().await?;
                self.services.catalog.reassign(&kept, anonymous.id).await?;
            }
            self.services.catalog.delete_many(&unreferenced).await?;

            tracing::info!(
                %user_id,
                anonymized = kept.len(),
                deleted = unreferenced.len(),
                "seller products resolved"
            );
            Ok(Some(message.advance(Step::RemoveUser)))
        })
        .await
    }

    /// Deletes the account record.
    pub async fn remove_user(&self, message: &SagaMessage) -> Option<SagaMessage> {
        let user_id = message.require_user()?;
        self.step(message, async {
            if !self.services.identity.delete_user(user_id).await? {
                tracing::info!(%user_id, "account already deleted");
            }
            Ok(Some(SagaMessage::unscoped(Step::RemoveOrphanedProducts)))
        })
        .await
    }

    /// Deletes anonymous-owned products that no order references any more.
    ///
    /// Carries no subject and may run any number of times.
    pub async fn remove_orphaned_products(&self, message: &SagaMessage) -> Option<SagaMessage> {
        self.step(message, async {
            if let Some(anonymous) = self.services.identity.find_anonymous().await? {
                let product_ids = self.products_of(anonymous.id).await?;
                let referenced = self
                    .services
                    .orders
                    .referenced_product_ids(&product_ids)
                    .await?;
                let orphaned: Vec<ProductId> = product_ids
                    .into_iter()
                    .filter(|id| !referenced.contains(id))
                    .collect();
                let deleted = self.services.catalog.delete_many(&orphaned).await?;
                tracing::info!(deleted, "orphaned products swept");
            }
            metrics::counter!("saga_completed_total", "saga" => SAGA).increment(1);
            Ok(None)
        })
        .await
    }

    async fn step<F>(&self, message: &SagaMessage, work: F) -> Option<SagaMessage>
    where
        F: Future<Output = Result<Option<SagaMessage>>>,
    {
        self.retry
            .run(message, work)
            .await
            .or_on_exhausted(|| {
                tracing::error!(
                    step = %message.step,
                    subject = %message.envelope.subject,
                    "account deletion stopped"
                );
                None
            })
    }

    async fn products_of(&self, seller_id: UserId) -> Result<Vec<ProductId>> {
        Ok(self
            .services
            .catalog
            .find_by_seller(seller_id)
            .await?
            .into_iter()
            .map(|product| product.id)
            .collect())
    }
}
