//! # Reconciliation engine public API
//!
//! Each API object wraps a database backend that implements the store traits it needs, plus the event producers it
//! publishes to. API objects are cheap to construct, so servers typically build one per worker.
//!
//! * [`checkout_api`] turns carts into orders, reserving stock along the way.
//! * [`payment_flow_api`] opens payment sessions and reconciles payment signals with orders.
//! * [`order_status_api`] applies manual seller and admin status changes.
//! * [`shipping_api`] resolves shipping fees and maintains the rate table.
//!
//! ```rust,ignore
//! use ore_engine::{events::EventProducers, PaymentFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/ore_store.db", 5).await?;
//! let api = PaymentFlowApi::new(db, EventProducers::default());
//! let outcome = api.apply_event(event).await?;
//! ```
pub mod checkout_api;
pub mod errors;
pub mod order_status_api;
pub mod payment_flow_api;
pub mod payment_objects;
pub mod shipping_api;
