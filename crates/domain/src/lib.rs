//! Domain layer for the checkout fulfillment services.
//!
//! This crate holds the value objects and entities that the sagas read and
//! hand to collaborator services:
//! - `Money` amounts in integer cents
//! - cart lines, catalog products, orders and user accounts
//! - per-seller settlement requests and sale notifications

pub mod account;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod money;
pub mod notification;
pub mod sales;
pub mod settlement;

pub use account::{ANONYMOUS_EMAIL, User};
pub use cart::CartItem;
pub use catalog::Product;
pub use error::DomainError;
pub use money::Money;
pub use notification::{NotificationLine, SellerNotification};
pub use sales::{Order, OrderItem};
pub use settlement::SettlementRequest;
