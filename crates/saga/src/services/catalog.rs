//! Catalog service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{ProductId, UserId};
use domain::{DomainError, Product};
use tokio::sync::RwLock;

use super::fault::FaultPlan;
use crate::error::{Result, SagaError};

/// Trait for product and stock operations.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Returns the products with the given ids. Unknown ids are skipped.
    async fn find_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Removes stock for every `(product, quantity)` line, or for none of
    /// them if any line lacks stock.
    async fn decrement_stock(&self, lines: &[(ProductId, u32)]) -> Result<()>;

    /// Returns stock for every `(product, quantity)` line.
    async fn increment_stock(&self, lines: &[(ProductId, u32)]) -> Result<()>;

    /// Returns the products owned by a seller.
    async fn find_by_seller(&self, seller_id: UserId) -> Result<Vec<Product>>;

    /// Transfers ownership of products to another seller.
    async fn reassign(&self, ids: &[ProductId], seller_id: UserId) -> Result<()>;

    /// Deletes products, returning how many existed.
    async fn delete_many(&self, ids: &[ProductId]) -> Result<usize>;
}

/// In-memory catalog service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogService {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
    decrement_faults: FaultPlan,
    increment_faults: FaultPlan,
}

impl InMemoryCatalogService {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Failure injection for [`CatalogService::decrement_stock`].
    pub fn decrement_faults(&self) -> &FaultPlan {
        &self.decrement_faults
    }

    /// Failure injection for [`CatalogService::increment_stock`].
    pub fn increment_faults(&self) -> &FaultPlan {
        &self.increment_faults
    }

    /// Lists a product.
    pub async fn add(&self, product: Product) {
        self.products.write().await.insert(product.id, product);
    }

    /// Returns a product by id.
    pub async fn product(&self, id: ProductId) -> Option<Product> {
        self.products.read().await.get(&id).cloned()
    }

    /// Returns the units in stock for a product.
    pub async fn stock(&self, id: ProductId) -> Option<u32> {
        self.product(id).await.map(|product| product.quantity)
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalogService {
    async fn find_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let products = self.products.read().await;
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }

    async fn decrement_stock(&self, lines: &[(ProductId, u32)]) -> Result<()> {
        if self.decrement_faults.trip() {
            return Err(SagaError::Catalog("Catalog unavailable".to_string()));
        }

        let mut products = self.products.write().await;
        let mut draft = products.clone();
        for &(product_id, quantity) in lines {
            draft
                .get_mut(&product_id)
                .ok_or(DomainError::ProductNotFound(product_id))?
                .decrement_stock(quantity)?;
        }
        *products = draft;
        Ok(())
    }

    async fn increment_stock(&self, lines: &[(ProductId, u32)]) -> Result<()> {
        if self.increment_faults.trip() {
            return Err(SagaError::Catalog("Catalog unavailable".to_string()));
        }

        let mut products = self.products.write().await;
        for &(product_id, quantity) in lines {
            match products.get_mut(&product_id) {
                Some(product) => product.increment_stock(quantity),
                None => tracing::warn!(%product_id, "cannot restock a deleted product"),
            }
        }
        Ok(())
    }

    async fn find_by_seller(&self, seller_id: UserId) -> Result<Vec<Product>> {
        Ok(self
            .products
            .read()
            .await
            .values()
            .filter(|product| product.seller_id == seller_id)
            .cloned()
            .collect())
    }

    async fn reassign(&self, ids: &[ProductId], seller_id: UserId) -> Result<()> {
        let mut products = self.products.write().await;
        for id in ids {
            if let Some(product) = products.get_mut(id) {
                product.seller_id = seller_id;
            }
        }
        Ok(())
    }

    async fn delete_many(&self, ids: &[ProductId]) -> Result<usize> {
        let mut products = self.products.write().await;
        Ok(ids.iter().filter(|id| products.remove(*id).is_some()).count())
    }
}
