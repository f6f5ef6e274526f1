//! Identity/ledger service trait and in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use common::{IdempotencyKey, UserId};
use domain::{DomainError, Money, SettlementRequest, User};
use saga_store::IdempotencyGuard;

use super::fault::FaultPlan;
use crate::error::{Result, SagaError};

/// Trait for user accounts and their balances.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Moves each amount from buyer to seller. A settlement whose
    /// idempotency key was already applied is skipped.
    async fn apply_settlements(&self, settlements: &[SettlementRequest]) -> Result<()>;

    /// Moves each amount back from seller to buyer, at most once per
    /// settlement's reversal key.
    async fn reverse_settlements(&self, settlements: &[SettlementRequest]) -> Result<()>;

    /// Forgets idempotency records. Unknown keys are ignored.
    async fn remove_idempotency_keys(&self, keys: &[IdempotencyKey]) -> Result<()>;

    /// Fetches one user.
    async fn find_user(&self, id: UserId) -> Result<User>;

    /// Fetches the users that exist among `ids`.
    async fn find_users(&self, ids: &[UserId]) -> Result<Vec<User>>;

    /// Returns the anonymous placeholder account, if it has been created.
    async fn find_anonymous(&self) -> Result<Option<User>>;

    /// Returns the anonymous placeholder account, creating it on first use.
    async fn find_or_create_anonymous(&self) -> Result<User>;

    /// Adds to the buyer's purchase counter and each seller's sale counter.
    async fn increment_counters(
        &self,
        buyer_id: UserId,
        purchases: u64,
        sales: &[(UserId, u64)],
    ) -> Result<()>;

    /// Deletes an account. Returns false if it did not exist.
    async fn delete_user(&self, id: UserId) -> Result<bool>;
}

type Accounts = HashMap<UserId, User>;

fn transfer(accounts: &mut Accounts, from: UserId, to: UserId, amount: Money) -> Result<()> {
    accounts
        .get_mut(&from)
        .ok_or(DomainError::UserNotFound(from))?
        .debit(amount)?;
    accounts
        .get_mut(&to)
        .ok_or(DomainError::UserNotFound(to))?
        .credit(amount)?;
    Ok(())
}

/// In-memory identity service for testing.
///
/// Accounts live behind an [`IdempotencyGuard`]: settlements for one saga are
/// applied as a single guarded batch, so an attempt either settles every
/// seller or none.
#[derive(Clone, Default)]
pub struct InMemoryIdentityService {
    accounts: IdempotencyGuard<Accounts>,
    settlement_faults: FaultPlan,
    reversal_faults: FaultPlan,
    counter_faults: FaultPlan,
}

impl InMemoryIdentityService {
    /// Creates a service with no accounts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Failure injection for [`IdentityService::apply_settlements`].
    pub fn settlement_faults(&self) -> &FaultPlan {
        &self.settlement_faults
    }

    /// Failure injection for [`IdentityService::reverse_settlements`].
    pub fn reversal_faults(&self) -> &FaultPlan {
        &self.reversal_faults
    }

    /// Failure injection for [`IdentityService::increment_counters`].
    pub fn counter_faults(&self) -> &FaultPlan {
        &self.counter_faults
    }

    /// Registers an account.
    pub async fn add(&self, user: User) {
        self.accounts
            .write(|accounts| accounts.insert(user.id, user))
            .await;
    }

    /// Returns an account by id.
    pub async fn user(&self, id: UserId) -> Option<User> {
        self.accounts.read(|accounts| accounts.get(&id).cloned()).await
    }

    /// Returns an account's balance.
    pub async fn balance(&self, id: UserId) -> Option<Money> {
        self.user(id).await.map(|user| user.balance)
    }

    /// Returns true if an idempotency record exists for `key`.
    pub async fn has_record(&self, key: IdempotencyKey) -> bool {
        self.accounts.contains(key).await
    }

    /// Returns the number of idempotency records held.
    pub async fn record_count(&self) -> usize {
        self.accounts.record_count().await
    }
}

#[async_trait]
impl IdentityService for InMemoryIdentityService {
    async fn apply_settlements(&self, settlements: &[SettlementRequest]) -> Result<()> {
        if self.settlement_faults.trip() {
            return Err(SagaError::Identity("Ledger unavailable".to_string()));
        }

        let keys: Vec<IdempotencyKey> = settlements.iter().map(|s| s.idempotency_key).collect();
        let outcome = self
            .accounts
            .apply_batch(&keys, |accounts, fresh| {
                for settlement in settlements
                    .iter()
                    .filter(|s| fresh.contains(&s.idempotency_key))
                {
                    let (from, to) = settlement.parties();
                    transfer(accounts, from, to, settlement.amount)?;
                }
                Ok::<_, SagaError>(())
            })
            .await?;

        if outcome.is_duplicate() {
            tracing::info!(count = settlements.len(), "settlements already applied");
        }
        Ok(())
    }

    async fn reverse_settlements(&self, settlements: &[SettlementRequest]) -> Result<()> {
        if self.reversal_faults.trip() {
            return Err(SagaError::Identity("Ledger unavailable".to_string()));
        }

        let keys: Vec<IdempotencyKey> = settlements.iter().map(|s| s.reversal_key).collect();
        self.accounts
            .apply_batch(&keys, |accounts, fresh| {
                for settlement in settlements
                    .iter()
                    .filter(|s| fresh.contains(&s.reversal_key))
                {
                    let (from, to) = settlement.reversed();
                    transfer(accounts, from, to, settlement.amount)?;
                }
                Ok::<_, SagaError>(())
            })
            .await?;
        Ok(())
    }

    async fn remove_idempotency_keys(&self, keys: &[IdempotencyKey]) -> Result<()> {
        let removed = self.accounts.remove_keys(keys).await;
        tracing::debug!(requested = keys.len(), removed, "idempotency records removed");
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> Result<User> {
        Ok(self
            .user(id)
            .await
            .ok_or(DomainError::UserNotFound(id))?)
    }

    async fn find_users(&self, ids: &[UserId]) -> Result<Vec<User>> {
        Ok(self
            .accounts
            .read(|accounts| ids.iter().filter_map(|id| accounts.get(id).cloned()).collect())
            .await)
    }

    async fn find_anonymous(&self) -> Result<Option<User>> {
        Ok(self
            .accounts
            .read(|accounts| accounts.values().find(|user| user.is_anonymous()).cloned())
            .await)
    }

    async fn find_or_create_anonymous(&self) -> Result<User> {
        Ok(self
            .accounts
            .write(|accounts| {
                if let Some(existing) = accounts.values().find(|user| user.is_anonymous()) {
                    return existing.clone();
                }
                let anonymous = User::anonymous();
                accounts.insert(anonymous.id, anonymous.clone());
                anonymous
            })
            .await)
    }

    async fn increment_counters(
        &self,
        buyer_id: UserId,
        purchases: u64,
        sales: &[(UserId, u64)],
    ) -> Result<()> {
        if self.counter_faults.trip() {
            return Err(SagaError::Identity("Ledger unavailable".to_string()));
        }

        self.accounts
            .write(|accounts| {
                let mut involved = std::iter::once(buyer_id).chain(sales.iter().map(|(id, _)| *id));
                if let Some(missing) = involved.find(|id| !accounts.contains_key(id)) {
                    return Err(DomainError::UserNotFound(missing));
                }
                if let Some(buyer) = accounts.get_mut(&buyer_id) {
                    buyer.purchases_count += purchases;
                }
                for &(seller_id, count) in sales {
                    if let Some(seller) = accounts.get_mut(&seller_id) {
                        seller.sales_count += count;
                    }
                }
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<bool> {
        Ok(self
            .accounts
            .write(|accounts| accounts.remove(&id).is_some())
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ledger() -> (InMemoryIdentityService, User, User) {
        let service = InMemoryIdentityService::new();
        let buyer = User::new("Ada Buyer", "ada@example.com", Money::from_cents(10_000));
        let seller = User::new("Sam Seller", "sam@example.com", Money::zero());
        service.add(buyer.clone()).await;
        service.add(seller.clone()).await;
        (service, buyer, seller)
    }

    #[tokio::test]
    async fn test_duplicate_settlement_moves_money_once() {
        let (service, buyer, seller) = ledger().await;
        let settlement = SettlementRequest::new(buyer.id, seller.id, Money::from_cents(2000));

        service.apply_settlements(&[settlement.clone()]).await.unwrap();
        service.apply_settlements(&[settlement.clone()]).await.unwrap();

        assert_eq!(service.balance(buyer.id).await, Some(Money::from_cents(8000)));
        assert_eq!(service.balance(seller.id).await, Some(Money::from_cents(2000)));
        assert!(service.has_record(settlement.idempotency_key).await);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_settlements_move_money_once() {
        let (service, buyer, seller) = ledger().await;
        let settlement = SettlementRequest::new(buyer.id, seller.id, Money::from_cents(500));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let service = service.clone();
                let settlement = settlement.clone();
                tokio::spawn(async move { service.apply_settlements(&[settlement]).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(service.balance(seller.id).await, Some(Money::from_cents(500)));
    }

    #[tokio::test]
    async fn test_batch_settles_every_seller_or_none() {
        let (service, buyer, seller) = ledger().await;
        let ghost = UserId::new();
        let settlements = vec![
            SettlementRequest::new(buyer.id, seller.id, Money::from_cents(1000)),
            SettlementRequest::new(buyer.id, ghost, Money::from_cents(1000)),
        ];

        let result = service.apply_settlements(&settlements).await;

        assert!(matches!(
            result,
            Err(SagaError::Domain(DomainError::UserNotFound(id))) if id == ghost
        ));
        assert_eq!(service.balance(buyer.id).await, Some(Money::from_cents(10_000)));
        assert_eq!(service.balance(seller.id).await, Some(Money::zero()));
        assert_eq!(service.record_count().await, 0);
    }

    #[tokio::test]
    async fn test_reversal_applies_once() {
        let (service, buyer, seller) = ledger().await;
        let settlement = SettlementRequest::new(buyer.id, seller.id, Money::from_cents(2000));
        service.apply_settlements(&[settlement.clone()]).await.unwrap();

        service.reverse_settlements(&[settlement.clone()]).await.unwrap();
        service.reverse_settlements(&[settlement.clone()]).await.unwrap();

        assert_eq!(service.balance(buyer.id).await, Some(Money::from_cents(10_000)));
        assert_eq!(service.balance(seller.id).await, Some(Money::zero()));
    }

    #[tokio::test]
    async fn test_anonymous_account_is_created_once() {
        let service = InMemoryIdentityService::new();
        assert_eq!(service.find_anonymous().await.unwrap(), None);

        let first = service.find_or_create_anonymous().await.unwrap();
        let second = service.find_or_create_anonymous().await.unwrap();

        assert_eq!(first.id, second.id);
        assert!(first.is_anonymous());
    }

    #[tokio::test]
    async fn test_increment_counters() {
        let (service, buyer, seller) = ledger().await;

        service
            .increment_counters(buyer.id, 3, &[(seller.id, 3)])
            .await
            .unwrap();

        assert_eq!(service.user(buyer.id).await.unwrap().purchases_count, 3);
        assert_eq!(service.user(seller.id).await.unwrap().sales_count, 3);
    }

    #[tokio::test]
    async fn test_increment_counters_rejects_unknown_seller() {
        let (service, buyer, _) = ledger().await;

        let result = service
            .increment_counters(buyer.id, 1, &[(UserId::new(), 1)])
            .await;

        assert!(result.is_err());
        assert_eq!(service.user(buyer.id).await.unwrap().purchases_count, 0);
    }
}
