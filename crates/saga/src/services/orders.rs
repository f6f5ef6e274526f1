//! Order service trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};
use domain::{Money, Order, OrderItem};
use tokio::sync::RwLock;

use super::fault::FaultPlan;
use crate::error::{Result, SagaError};

/// Trait for order records.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Creates an order with its line items.
    async fn create(&self, buyer_id: UserId, total: Money, items: Vec<OrderItem>) -> Result<Order>;

    /// Deletes an order. Returns false if it did not exist.
    async fn delete(&self, id: OrderId) -> Result<bool>;

    /// Returns which of `product_ids` appear in at least one order.
    async fn referenced_product_ids(&self, product_ids: &[ProductId]) -> Result<HashSet<ProductId>>;
}

/// In-memory order service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderService {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    create_faults: FaultPlan,
}

impl InMemoryOrderService {
    /// Creates an order service with no orders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Failure injection for [`OrderService::create`].
    pub fn create_faults(&self) -> &FaultPlan {
        &self.create_faults
    }

    /// Stores an existing order.
    pub async fn add(&self, order: Order) {
        self.orders.write().await.insert(order.id, order);
    }

    /// Returns the number of orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Returns all orders placed by a buyer.
    pub async fn orders_of(&self, buyer_id: UserId) -> Vec<Order> {
        self.orders
            .read()
            .await
            .values()
            .filter(|order| order.buyer_id == buyer_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl OrderService for InMemoryOrderService {
    async fn create(&self, buyer_id: UserId, total: Money, items: Vec<OrderItem>) -> Result<Order> {
        if self.create_faults.trip() {
            return Err(SagaError::Orders("Order store unavailable".to_string()));
        }

        let order = Order::new(buyer_id, total, items);
        self.orders.write().await.insert(order.id, order.clone());
        Ok(order)
    }

    async fn delete(&self, id: OrderId) -> Result<bool> {
        Ok(self.orders.write().await.remove(&id).is_some())
    }

    async fn referenced_product_ids(&self, product_ids: &[ProductId]) -> Result<HashSet<ProductId>> {
        let orders = self.orders.read().await;
        Ok(product_ids
            .iter()
            .copied()
            .filter(|product_id| orders.values().any(|order| order.references(*product_id)))
            .collect())
    }
}
