//! Cart service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{ProductId, UserId};
use domain::CartItem;
use tokio::sync::RwLock;

use super::fault::FaultPlan;
use crate::error::{Result, SagaError};

/// Trait for buyers' carts.
#[async_trait]
pub trait CartService: Send + Sync {
    /// Lists the lines in a buyer's cart.
    async fn list(&self, user_id: UserId) -> Result<Vec<CartItem>>;

    /// Removes every line from a buyer's cart.
    async fn clear(&self, user_id: UserId) -> Result<()>;

    /// Puts lines back. A line for a product already in that buyer's cart
    /// replaces it, so re-inserting the same lines is harmless.
    async fn insert_many(&self, items: Vec<CartItem>) -> Result<()>;

    /// Removes lines for any of `product_ids` from every cart, returning how
    /// many were removed.
    async fn remove_by_products(&self, product_ids: &[ProductId]) -> Result<usize>;
}

/// In-memory cart service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartService {
    carts: Arc<RwLock<HashMap<UserId, Vec<CartItem>>>>,
    clear_faults: FaultPlan,
    insert_faults: FaultPlan,
}

impl InMemoryCartService {
    /// Creates an empty cart service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Failure injection for [`CartService::clear`].
    pub fn clear_faults(&self) -> &FaultPlan {
        &self.clear_faults
    }

    /// Failure injection for [`CartService::insert_many`].
    pub fn insert_faults(&self) -> &FaultPlan {
        &self.insert_faults
    }

    /// Adds a line to a buyer's cart.
    pub async fn add(&self, item: CartItem) {
        upsert(&mut *self.carts.write().await, item);
    }

    /// Returns a buyer's cart.
    pub async fn cart_of(&self, user_id: UserId) -> Vec<CartItem> {
        self.carts
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }
}

fn upsert(carts: &mut HashMap<UserId, Vec<CartItem>>, item: CartItem) {
    let cart = carts.entry(item.user_id).or_default();
    match cart
        .iter_mut()
        .find(|line| line.product_id == item.product_id)
    {
        Some(line) => line.quantity = item.quantity,
        None => cart.push(item),
    }
}

#[async_trait]
impl CartService for InMemoryCartService {
    async fn list(&self, user_id: UserId) -> Result<Vec<CartItem>> {
        Ok(self.cart_of(user_id).await)
    }

    async fn clear(&self, user_id: UserId) -> Result<()> {
        if self.clear_faults.trip() {
            return Err(SagaError::Cart("Cart store unavailable".to_string()));
        }
        self.carts.write().await.remove(&user_id);
        Ok(())
    }

    async fn insert_many(&self, items: Vec<CartItem>) -> Result<()> {
        if self.insert_faults.trip() {
            return Err(SagaError::Cart("Cart store unavailable".to_string()));
        }
        let mut carts = self.carts.write().await;
        for item in items {
            upsert(&mut carts, item);
        }
        Ok(())
    }

    async fn remove_by_products(&self, product_ids: &[ProductId]) -> Result<usize> {
        let mut carts = self.carts.write().await;
        let mut removed = 0;
        for cart in carts.values_mut() {
            let before = cart.len();
            cart.retain(|line| !product_ids.contains(&line.product_id));
            removed += before - cart.len();
        }
        carts.retain(|_, cart| !cart.is_empty());
        Ok(removed)
    }
}
