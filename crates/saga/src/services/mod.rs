//! Collaborator service traits and in-memory implementations for saga steps.

pub mod cart;
pub mod catalog;
pub mod fault;
pub mod identity;
pub mod notifier;
pub mod orders;

use std::sync::Arc;

pub use cart::{CartService, InMemoryCartService};
pub use catalog::{CatalogService, InMemoryCatalogService};
pub use fault::FaultPlan;
pub use identity::{IdentityService, InMemoryIdentityService};
pub use notifier::{InMemoryNotifier, Notifier, SentNotification};
pub use orders::{InMemoryOrderService, OrderService};

/// The collaborators a saga calls into.
#[derive(Clone)]
pub struct Services {
    pub cart: Arc<dyn CartService>,
    pub catalog: Arc<dyn CatalogService>,
    pub identity: Arc<dyn IdentityService>,
    pub orders: Arc<dyn OrderService>,
    pub notifier: Arc<dyn Notifier>,
}

/// One in-memory instance of every collaborator, kept concrete so callers
/// can seed data and inject failures.
#[derive(Clone, Default)]
pub struct InMemoryServices {
    pub cart: InMemoryCartService,
    pub catalog: InMemoryCatalogService,
    pub identity: InMemoryIdentityService,
    pub orders: InMemoryOrderService,
    pub notifier: InMemoryNotifier,
}

impl InMemoryServices {
    /// Creates empty collaborators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns shared handles to the same collaborators.
    pub fn services(&self) -> Services {
        Services {
            cart: Arc::new(self.cart.clone()),
            catalog: Arc::new(self.catalog.clone()),
            identity: Arc::new(self.identity.clone()),
            orders: Arc::new(self.orders.clone()),
            notifier: Arc::new(self.notifier.clone()),
        }
    }
}
