//! Checkout fulfillment saga.
//!
//! Forward chain, one handler per step:
//!
//! ```text
//! update-quantities -> update-financial-infos -> clear-cart -> create-order
//!   -> update-purchases-and-sales-counts -> notify-buyer -> notify-admins
//! ```
//!
//! When a forward step `X` exhausts its retries it emits `X-failed`. The
//! handler for `X-failed` undoes the step before `X` and emits that step's
//! failure, so the cascade walks back one step at a time until it reaches
//! `update-quantities`, which needs no undoing.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;

use common::{IdempotencyKey, ProductId, SagaStateId, UserId};
use domain::{DomainError, NotificationLine, OrderItem, Product, SellerNotification, SettlementRequest};
use saga_store::SagaStateStore;

use crate::envelope::SagaMessage;
use crate::error::{Result, SagaError};
use crate::payload::{CheckoutPayload, PaymentCompleted};
use crate::retry::{Attempt, RetryPolicy};
use crate::services::Services;
use crate::step::Step;

const SAGA: &str = "checkout";

/// Runs checkout steps against the saga state store and collaborators.
#[derive(Clone)]
pub struct CheckoutSaga {
    store: SagaStateStore,
    services: Services,
    retry: RetryPolicy,
}

impl CheckoutSaga {
    /// Creates a checkout saga runner.
    pub fn new(store: SagaStateStore, services: Services, retry: RetryPolicy) -> Self {
        Self {
            store,
            services,
            retry,
        }
    }

    /// Starts a checkout for a paid cart and returns its first message.
    ///
    /// Snapshots the buyer's cart, prices each line at the current unit
    /// price and builds one settlement and one notification per seller.
    #[tracing::instrument(skip(self, trigger), fields(buyer_id = %trigger.buyer_id))]
    pub async fn start(&self, trigger: PaymentCompleted) -> Result<SagaMessage> {
        let buyer_id = trigger.buyer_id;
        let cart_items = self.services.cart.list(buyer_id).await?;
        if cart_items.is_empty() {
            return Err(SagaError::EmptyCart(buyer_id));
        }

        let product_ids: Vec<ProductId> = cart_items.iter().map(|item| item.product_id).collect();
        let products: HashMap<ProductId, Product> = self
            .services
            .catalog
            .find_by_ids(&product_ids)
            .await?
            .into_iter()
            .map(|product| (product.id, product))
            .collect();

        let mut order_items = Vec::with_capacity(cart_items.len());
        let mut lines_by_seller: BTreeMap<UserId, Vec<NotificationLine>> = BTreeMap::new();
        for item in &cart_items {
            let product = products
                .get(&item.product_id)
                .ok_or(DomainError::ProductNotFound(item.product_id))?;
            let price = product.price.times(item.quantity)?;

            order_items.push(OrderItem {
                product_id: item.product_id,
                quantity: item.quantity,
                price,
            });
            lines_by_seller
                .entry(product.seller_id)
                .or_default()
                .push(NotificationLine {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    quantity: item.quantity,
                    price,
                });
        }

        let seller_notifications: Vec<SellerNotification> = lines_by_seller
            .into_iter()
            .map(|(seller_id, lines)| SellerNotification {
                seller_id,
                buyer_id,
                lines,
            })
            .collect();
        let settlements = seller_notifications
            .iter()
            .map(|notification| -> Result<SettlementRequest> {
                Ok(SettlementRequest::new(
                    buyer_id,
                    notification.seller_id,
                    notification.amount()?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let payload = CheckoutPayload {
            buyer_id,
            total: trigger.amount_total,
            cart_items,
            order_items,
            settlements,
            seller_notifications,
            order_id: None,
        };
        let id = self.store.create(&payload).await?;

        metrics::counter!("saga_started_total", "saga" => SAGA).increment(1);
        tracing::info!(saga_state_id = %id, total = %payload.total, "checkout saga started");
        Ok(SagaMessage::for_saga(Step::UpdateQuantities, id))
    }

    /// Decrements stock for every purchased line.
    ///
    /// Exhaustion abandons the checkout without compensation: nothing has
    /// been committed yet.
    pub async fn update_quantities(&self, message: &SagaMessage) -> Option<SagaMessage> {
        let id = message.require_saga_state()?;
        self.retry
            .run(message, async {
                let payload = self.load(id).await?;
                self.services
                    .catalog
                    .decrement_stock(&payload.stock_lines())
                    .await?;
                Ok(Some(message.advance(Step::UpdateFinancialInfos)))
            })
            .await
            .or_on_exhausted(|| {
                tracing::error!(saga_state_id = %id, "inventory update failed, checkout abandoned");
                None
            })
    }

    /// Applies every buyer to seller settlement under its idempotency key.
    ///
    /// Once the step is resolved, whether it succeeded or exhausted its
    /// retries, the forward keys are released.
    pub async fn update_financial_infos(&self, message: &SagaMessage) -> Option<SagaMessage> {
        let id = message.require_saga_state()?;
        let mut keys = None;
        let attempt = self
            .retry
            .run(message, async {
                let payload = self.load(id).await?;
                keys = Some(payload.settlement_keys());
                self.services
                    .identity
                    .apply_settlements(&payload.settlements)
                    .await?;
                Ok(Some(message.advance(Step::ClearCart)))
            })
            .await;

        if !matches!(attempt, Attempt::Retry(_)) {
            match keys {
                Some(keys) => self.release_keys(&keys).await,
                None => tracing::warn!(saga_state_id = %id, "settlement keys unknown, records kept"),
            }
        }

        attempt.or_on_exhausted(|| message.failed())
    }

    /// Empties the buyer's cart.
    pub async fn clear_cart(&self, message: &SagaMessage) -> Option<SagaMessage> {
        let id = message.require_saga_state()?;
        self.retry
            .run(message, async {
                let payload = self.load(id).await?;
                self.services.cart.clear(payload.buyer_id).await?;
                Ok(Some(message.advance(Step::CreateOrder)))
            })
            .await
            .or_on_exhausted(|| message.failed())
    }

    /// Creates the order and records its id in the payload.
    ///
    /// A payload that already has an order id is not ordered twice.
    pub async fn create_order(&self, message: &SagaMessage) -> Option<SagaMessage> {
        let id = message.require_saga_state()?;
        self.retry
            .run(message, async {
                let mut payload = self.load(id).await?;
                if let Some(order_id) = payload.order_id {
                    tracing::info!(%order_id, "order already created");
                } else {
                    let order = self
                        .services
                        .orders
                        .create(payload.buyer_id, payload.total, payload.order_items.clone())
                        .await?;
                    payload.order_id = Some(order.id);
                    self.store.update(id, &payload).await?;
                }
                Ok(Some(message.advance(Step::UpdatePurchasesAndSalesCounts)))
            })
            .await
            .or_on_exhausted(|| message.failed())
    }

    /// Adds the units bought to the buyer's counter and the units sold to
    /// each seller's.
    pub async fn update_purchases_and_sales_counts(
        &self,
        message: &SagaMessage,
    ) -> Option<SagaMessage> {
        let id = message.require_saga_state()?;
        self.retry
            .run(message, async {
                let payload = self.load(id).await?;
                self.services
                    .identity
                    .increment_counters(payload.buyer_id, payload.units_bought(), &payload.units_sold())
                    .await?;
                Ok(Some(message.advance(Step::NotifyBuyer)))
            })
            .await
            .or_on_exhausted(|| message.failed())
    }

    /// Sends the buyer their order confirmation.
    ///
    /// The order is already paid for, so exhaustion only logs and the chain
    /// continues to the seller notifications.
    pub async fn notify_buyer(&self, message: &SagaMessage) -> Option<SagaMessage> {
        let id = message.require_saga_state()?;
        self.retry
            .run(message, async {
                let payload = self.load(id).await?;
                let buyer = self.services.identity.find_user(payload.buyer_id).await?;
                self.services.notifier.send_order_confirmation(&buyer).await?;
                Ok(Some(message.advance(Step::NotifyAdmins)))
            })
            .await
            .or_on_exhausted(|| {
                tracing::error!(saga_state_id = %id, "buyer was not notified");
                Some(message.advance(Step::NotifyAdmins))
            })
    }

    /// Sends each seller their sale notification, then deletes the saga
    /// state.
    ///
    /// Exhaustion only logs; the saga state is then left behind.
    pub async fn notify_admins(&self, message: &SagaMessage) -> Option<SagaMessage> {
        let id = message.require_saga_state()?;
        self.retry
            .run(message, async {
                let payload = self.load(id).await?;
                let users: HashMap<UserId, _> = self
                    .services
                    .identity
                    .find_users(&payload.notified_user_ids())
                    .await?
                    .into_iter()
                    .map(|user| (user.id, user))
                    .collect();

                for notification in &payload.seller_notifications {
                    let (Some(seller), Some(buyer)) = (
                        users.get(&notification.seller_id),
                        users.get(&notification.buyer_id),
                    ) else {
                        tracing::warn!(
                            seller_id = %notification.seller_id,
                            "skipping sale notification for a missing account"
                        );
                        continue;
                    };
                    self.services
                        .notifier
                        .send_sale_notification(seller, buyer, &notification.lines)
                        .await?;
                }

                self.store.delete(id).await?;
                metrics::counter!("saga_completed_total", "saga" => SAGA).increment(1);
                Ok(None)
            })
            .await
            .or_on_exhausted(|| {
                tracing::error!(
                    saga_state_id = %id,
                    "sellers were not notified, saga state left in place"
                );
                None
            })
    }

    /// Undoes `update-quantities` by returning the purchased stock.
    ///
    /// Last link of the cascade.
    pub async fn update_financial_infos_failed(&self, message: &SagaMessage) -> Option<SagaMessage> {
        let id = message.require_saga_state()?;
        self.compensate(message, async {
            let payload = self.load(id).await?;
            self.services
                .catalog
                .increment_stock(&payload.stock_lines())
                .await?;
            tracing::warn!(saga_state_id = %id, "checkout rolled back, payment left unreconciled");
            Ok(None)
        })
        .await
    }

    /// Undoes `update-financial-infos` by paying every seller's amount back
    /// to the buyer, then releases the settlement keys.
    pub async fn clear_cart_failed(&self, message: &SagaMessage) -> Option<SagaMessage> {
        let id = message.require_saga_state()?;
        self.compensate(message, async {
            let payload = self.load(id).await?;
            self.services
                .identity
                .reverse_settlements(&payload.settlements)
                .await?;
            self.services
                .identity
                .remove_idempotency_keys(&payload.all_settlement_keys())
                .await?;
            Ok(Some(message.advance(Step::UpdateFinancialInfosFailed)))
        })
        .await
    }

    /// Undoes `clear-cart` by putting the purchased lines back in the cart.
    pub async fn create_order_failed(&self, message: &SagaMessage) -> Option<SagaMessage> {
        let id = message.require_saga_state()?;
        self.compensate(message, async {
            let payload = self.load(id).await?;
            self.services.cart.insert_many(payload.cart_items).await?;
            Ok(Some(message.advance(Step::ClearCartFailed)))
        })
        .await
    }

    /// Undoes `create-order` by deleting the order and clearing its id from
    /// the payload.
    pub async fn update_purchases_and_sales_counts_failed(
        &self,
        message: &SagaMessage,
    ) -> Option<SagaMessage> {
        let id = message.require_saga_state()?;
        self.compensate(message, async {
            let mut payload = self.load(id).await?;
            if let Some(order_id) = payload.order_id.take() {
                self.services.orders.delete(order_id).await?;
                self.store.update(id, &payload).await?;
            }
            Ok(Some(message.advance(Step::CreateOrderFailed)))
        })
        .await
    }

    async fn compensate<F>(&self, message: &SagaMessage, work: F) -> Option<SagaMessage>
    where
        F: Future<Output = Result<Option<SagaMessage>>>,
    {
        let attempt = self.retry.run(message, work).await;
        if matches!(attempt, Attempt::Completed(_)) {
            metrics::counter!("saga_compensations_total", "step" => message.step.as_str())
                .increment(1);
        }
        attempt.or_on_exhausted(|| {
            tracing::error!(
                step = %message.step,
                subject = %message.envelope.subject,
                "compensation abandoned"
            );
            None
        })
    }

    async fn load(&self, id: SagaStateId) -> Result<CheckoutPayload> {
        Ok(self.store.get(id).await?)
    }

    async fn release_keys(&self, keys: &[IdempotencyKey]) {
        if let Err(error) = self.services.identity.remove_idempotency_keys(keys).await {
            tracing::warn!(%error, "failed to release settlement keys");
        }
    }
}
