//! Buyer to seller balance transfers.

use common::{IdempotencyKey, UserId};
use serde::{Deserialize, Serialize};

use crate::Money;

/// A single buyer→seller balance transfer.
///
/// One is built per distinct seller in a checkout, each with its own fresh
/// idempotency key. The ledger applies a transfer bound to a given key at
/// most once, and its reversal at most once under `reversal_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRequest {
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub amount: Money,
    pub idempotency_key: IdempotencyKey,
    pub reversal_key: IdempotencyKey,
}

impl SettlementRequest {
    /// Creates a settlement request with a fresh idempotency key.
    pub fn new(buyer_id: UserId, seller_id: UserId, amount: Money) -> Self {
        Self {
            buyer_id,
            seller_id,
            amount,
            idempotency_key: IdempotencyKey::new(),
            reversal_key: IdempotencyKey::new(),
        }
    }

    /// Returns the payer and payee of the transfer.
    pub fn parties(&self) -> (UserId, UserId) {
        (self.buyer_id, self.seller_id)
    }

    /// Returns the opposite transfer: the seller pays the buyer back.
    pub fn reversed(&self) -> (UserId, UserId) {
        (self.seller_id, self.buyer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_keys_per_request() {
        let buyer = UserId::new();
        let seller = UserId::new();
        let a = SettlementRequest::new(buyer, seller, Money::from_cents(100));
        let b = SettlementRequest::new(buyer, seller, Money::from_cents(100));
        assert_ne!(a.idempotency_key, b.idempotency_key);
        assert_ne!(a.idempotency_key, a.reversal_key);
    }

    #[test]
    fn test_reversed_swaps_direction() {
        let buyer = UserId::new();
        let seller = UserId::new();
        let request = SettlementRequest::new(buyer, seller, Money::from_cents(100));
        assert_eq!(request.parties(), (buyer, seller));
        assert_eq!(request.reversed(), (seller, buyer));
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let request = SettlementRequest::new(UserId::new(), UserId::new(), Money::from_cents(2000));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["amount"], 2000);
        assert!(json.get("idempotencyKey").is_some());
        assert!(json.get("buyerId").is_some());
    }
}
