//! # Store and collaborator contracts
//!
//! This module defines the interfaces that the reconciliation engine needs from the outside world.
//!
//! ## Storage
//! * [`OrderManagement`] persists orders and performs the conditional (compare-and-swap) status writes that keep
//!   concurrent payment signals from clobbering each other.
//! * [`CatalogManagement`] owns product data and, critically, the atomic stock decrement.
//! * [`CartManagement`] is the customer's pre-checkout basket.
//! * [`ShippingRateManagement`] stores per-city shipping fees.
//! * [`ReconciliationDatabase`] is the umbrella trait that a complete backend implements.
//!
//! ## Collaborators
//! * [`PaymentProvider`] is implemented once per payment gateway (sandbox, MoMo, Stripe).
//! * [`NotificationSink`] delivers customer notifications. The engine never waits on it.
mod catalog_management;
mod notifications;
mod order_management;
mod payment_provider;
mod reconciliation_database;
mod shipping_rates;

pub use catalog_management::{CartManagement, CatalogManagement};
pub use notifications::{Notification, NotificationError, NotificationKind, NotificationSink};
pub use order_management::{OrderManagement, StoreError};
pub use payment_provider::{PaymentProvider, ProviderError};
pub use reconciliation_database::ReconciliationDatabase;
pub use shipping_rates::ShippingRateManagement;
