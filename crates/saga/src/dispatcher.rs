//! Routes each step to its handler.

use crate::checkout::CheckoutSaga;
use crate::deletion::AccountDeletionSaga;
use crate::envelope::{SagaMessage, Subject};
use crate::step::Step;

/// The single dispatch table from [`Step`] to handler.
///
/// Dispatch never fails at the transport level: every handler turns its
/// failures into a retry, a compensation or the end of the chain, and the
/// returned continuation is what the caller publishes next.
#[derive(Clone)]
pub struct StepDispatcher {
    checkout: CheckoutSaga,
    deletion: AccountDeletionSaga,
}

impl StepDispatcher {
    /// Creates a dispatcher over both sagas.
    pub fn new(checkout: CheckoutSaga, deletion: AccountDeletionSaga) -> Self {
        Self { checkout, deletion }
    }

    /// Returns the checkout saga.
    pub fn checkout(&self) -> &CheckoutSaga {
        &self.checkout
    }

    /// Returns the account deletion saga.
    pub fn deletion(&self) -> &AccountDeletionSaga {
        &self.deletion
    }

    /// Runs the handler bound to `message.step` and returns the next message.
    #[tracing::instrument(
        skip(self, message),
        fields(
            step = %message.step,
            retry_count = message.envelope.retry_count,
            subject = %message.envelope.subject
        )
    )]
    pub async fn dispatch(&self, message: SagaMessage) -> Option<SagaMessage> {
        let message = &message;
        match message.step {
            Step::UpdateQuantities => self.checkout.update_quantities(message).await,
            Step::UpdateFinancialInfos => self.checkout.update_financial_infos(message).await,
            Step::UpdateFinancialInfosFailed => {
                self.checkout.update_financial_infos_failed(message).await
            }
            // Shared by both flows: the subject decides which one this is.
            Step::ClearCart => match message.envelope.subject {
                Subject::SagaState(_) => self.checkout.clear_cart(message).await,
                Subject::User(_) => self.deletion.clear_cart(message).await,
                Subject::Unscoped => {
                    tracing::warn!("dropping clear-cart without a subject");
                    None
                }
            },
            Step::ClearCartFailed => self.checkout.clear_cart_failed(message).await,
            Step::CreateOrder => self.checkout.create_order(message).await,
            Step::CreateOrderFailed => self.checkout.create_order_failed(message).await,
            Step::UpdatePurchasesAndSalesCounts => {
                self.checkout
                    .update_purchases_and_sales_counts(message)
                    .await
            }
            Step::UpdatePurchasesAndSalesCountsFailed => {
                self.checkout
                    .update_purchases_and_sales_counts_failed(message)
                    .await
            }
            Step::NotifyBuyer => self.checkout.notify_buyer(message).await,
            Step::NotifyAdmins => self.checkout.notify_admins(message).await,
            Step::RemoveProductsCartItems => self.deletion.remove_products_cart_items(message).await,
            Step::RemoveOrAnonymizeProducts => {
                self.deletion.remove_or_anonymize_products(message).await
            }
            Step::RemoveUser => self.deletion.remove_user(message).await,
            Step::RemoveOrphanedProducts => self.deletion.remove_orphaned_products(message).await,
        }
    }
}
