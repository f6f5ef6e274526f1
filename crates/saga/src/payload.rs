//! The checkout saga's persisted payload.

use common::{IdempotencyKey, OrderId, ProductId, UserId};
use domain::{CartItem, Money, OrderItem, SellerNotification, SettlementRequest};
use serde::{Deserialize, Serialize};

/// Upstream notification that a buyer has paid. Starts a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCompleted {
    pub buyer_id: UserId,
    /// Amount charged, which becomes the order total.
    pub amount_total: Money,
}

/// Everything the checkout steps need, snapshotted when the saga starts.
///
/// Steps read the payload once at entry and write back a full replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPayload {
    pub buyer_id: UserId,
    pub total: Money,
    /// The buyer's cart at the time of purchase.
    pub cart_items: Vec<CartItem>,
    /// Cart lines priced at the time of purchase.
    pub order_items: Vec<OrderItem>,
    /// One transfer per distinct seller.
    pub settlements: Vec<SettlementRequest>,
    /// One notification per distinct seller.
    pub seller_notifications: Vec<SellerNotification>,
    /// Present iff `create-order` has completed and its order has not been
    /// deleted by compensation.
    #[serde(default)]
    pub order_id: Option<OrderId>,
}

impl CheckoutPayload {
    /// Returns `(product, quantity)` for every purchased line.
    pub fn stock_lines(&self) -> Vec<(ProductId, u32)> {
        self.cart_items
            .iter()
            .map(|item| (item.product_id, item.quantity))
            .collect()
    }

    /// Returns the forward settlement keys.
    pub fn settlement_keys(&self) -> Vec<IdempotencyKey> {
        self.settlements
            .iter()
            .map(|settlement| settlement.idempotency_key)
            .collect()
    }

    /// Returns both forward and reversal keys of every settlement.
    pub fn all_settlement_keys(&self) -> Vec<IdempotencyKey> {
        self.settlements
            .iter()
            .flat_map(|settlement| [settlement.idempotency_key, settlement.reversal_key])
            .collect()
    }

    /// Total units bought.
    pub fn units_bought(&self) -> u64 {
        self.cart_items
            .iter()
            .map(|item| u64::from(item.quantity))
            .sum()
    }

    /// Units sold per seller.
    pub fn units_sold(&self) -> Vec<(UserId, u64)> {
        self.seller_notifications
            .iter()
            .map(|notification| (notification.seller_id, u64::from(notification.units_sold())))
            .collect()
    }

    /// Every user the notifications mention: the buyer and each seller.
    pub fn notified_user_ids(&self) -> Vec<UserId> {
        let mut ids = vec![self.buyer_id];
        for notification in &self.seller_notifications {
            if !ids.contains(&notification.seller_id) {
                ids.push(notification.seller_id);
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use domain::NotificationLine;

    use super::*;

    fn payload() -> CheckoutPayload {
        let buyer = UserId::new();
        let seller = UserId::new();
        let product = ProductId::new();
        CheckoutPayload {
            buyer_id: buyer,
            total: Money::from_cents(2000),
            cart_items: vec![CartItem::new(buyer, product, 2)],
            order_items: vec![OrderItem {
                product_id: product,
                quantity: 2,
                price: Money::from_cents(2000),
            }],
            settlements: vec![SettlementRequest::new(buyer, seller, Money::from_cents(2000))],
            seller_notifications: vec![SellerNotification {
                seller_id: seller,
                buyer_id: buyer,
                lines: vec![NotificationLine {
                    product_id: product,
                    product_name: "Widget".to_string(),
                    quantity: 2,
                    price: Money::from_cents(2000),
                }],
            }],
            order_id: None,
        }
    }

    #[test]
    fn test_order_id_defaults_to_none() {
        let mut json = serde_json::to_value(payload()).unwrap();
        json.as_object_mut().unwrap().remove("orderId");

        let decoded: CheckoutPayload = serde_json::from_value(json).unwrap();

        assert_eq!(decoded.order_id, None);
    }

    #[test]
    fn test_counts() {
        let payload = payload();
        let seller = payload.seller_notifications[0].seller_id;

        assert_eq!(payload.units_bought(), 2);
        assert_eq!(payload.units_sold(), vec![(seller, 2)]);
        assert_eq!(payload.notified_user_ids(), vec![payload.buyer_id, seller]);
        assert_eq!(payload.all_settlement_keys().len(), 2);
    }
}
